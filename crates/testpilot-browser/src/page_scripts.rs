//! JavaScript evaluated inside the page by the local backend.

/// Page structure summary: title, url, text excerpt, links, buttons, inputs, forms.
pub const PAGE_SNAPSHOT: &str = r#"(() => {
  const text = (el) => (el.innerText || el.value || '').trim();
  const links = Array.from(document.querySelectorAll('a'))
    .slice(0, 20)
    .map((a) => ({ text: (a.innerText || '').trim(), href: a.href }))
    .filter((link) => link.text && link.href);
  const buttons = Array.from(document.querySelectorAll('button, input[type="button"], input[type="submit"]'))
    .slice(0, 20)
    .map((btn) => ({ text: text(btn), type: btn.type || 'button' }))
    .filter((btn) => btn.text);
  const inputs = Array.from(document.querySelectorAll('input, textarea'))
    .slice(0, 20)
    .map((input) => ({
      type: input.type || 'text',
      name: input.name || '',
      placeholder: input.placeholder || ''
    }));
  const forms = Array.from(document.querySelectorAll('form'))
    .slice(0, 10)
    .map((form) => ({
      action: form.action || '',
      method: form.method || 'GET',
      inputs: form.querySelectorAll('input, textarea').length
    }));
  return {
    title: document.title,
    url: location.href,
    text_content: document.body ? document.body.innerText.substring(0, 2000) : '',
    links,
    buttons,
    inputs,
    forms
  };
})()"#;

/// Selector inventory used when diagnosing a failed test.
pub const SELECTOR_INVENTORY: &str = r#"(() => {
  const buttons = Array.from(document.querySelectorAll('button, input[type="button"], input[type="submit"]'))
    .map((btn) => ({
      text: (btn.innerText || btn.value || '').trim(),
      id: btn.id || '',
      class: btn.className || ''
    }));
  const links = Array.from(document.querySelectorAll('a'))
    .map((a) => ({
      text: (a.innerText || '').trim(),
      href: a.getAttribute('href') || '',
      id: a.id || ''
    }));
  const inputs = Array.from(document.querySelectorAll('input, textarea, select'))
    .map((input) => ({
      type: input.type || '',
      name: input.name || '',
      id: input.id || '',
      placeholder: input.placeholder || ''
    }));
  return { url: location.href, title: document.title, buttons, links, inputs };
})()"#;

/// Installed on every new document so console output can be read back later.
pub const CONSOLE_CAPTURE: &str = r#"(() => {
  if (window.__testpilotConsole) return;
  window.__testpilotConsole = [];
  for (const level of ['log', 'info', 'warn', 'error', 'debug']) {
    const original = console[level].bind(console);
    console[level] = (...args) => {
      try {
        window.__testpilotConsole.push({
          type: level === 'warn' ? 'warning' : level,
          text: args.map((a) => (typeof a === 'string' ? a : JSON.stringify(a))).join(' '),
          timestamp: Date.now()
        });
      } catch (_) {}
      original(...args);
    };
  }
})();"#;

pub const CONSOLE_MESSAGES: &str = r#"(() => (window.__testpilotConsole || [])
  .filter((m) => m.type === 'warning' || m.type === 'error'))()"#;

pub const NETWORK_REQUESTS: &str = r#"(() => performance.getEntriesByType('resource')
  .filter((e) => ['fetch', 'xmlhttprequest'].includes(e.initiatorType))
  .map((e) => ({ url: e.name, type: e.initiatorType, duration: Math.round(e.duration) })))()"#;

pub const NAVIGATION_HISTORY: &str =
    r#"(() => [{ url: location.href, title: document.title, length: history.length }])()"#;

pub const READY_STATE: &str = "document.readyState";

pub const CLEAR_VALUE_FN: &str = "function() { this.value = ''; }";
