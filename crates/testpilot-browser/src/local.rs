//! Local backend: an in-process CDP session with a Chromium-family browser.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::launch::{LAUNCH_REMEDIATION, LaunchProfile, launch_profiles};
use crate::output::ActionOutput;
use crate::page_scripts;
use crate::{ActionClient, BackendKind, actions, timeouts};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);
const SCREENSHOT_QUALITY: i64 = 60;

#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub headless: bool,
    pub viewport: (u32, u32),
    /// Explicit profile list; resolved from the machine when `None`.
    pub profiles: Option<Vec<LaunchProfile>>,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1920, 1080),
            profiles: None,
        }
    }
}

struct LocalSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile: LaunchProfile,
}

pub struct LocalActionClient {
    options: LocalOptions,
    session: Option<LocalSession>,
}

impl LocalActionClient {
    pub fn new(options: LocalOptions) -> Self {
        Self {
            options,
            session: None,
        }
    }

    /// Profile that launched the current session.
    pub fn active_profile(&self) -> Option<&LaunchProfile> {
        self.session.as_ref().map(|session| &session.profile)
    }

    fn page(&self) -> Result<&Page> {
        self.session
            .as_ref()
            .map(|session| &session.page)
            .ok_or_else(|| anyhow!("Local browser is not initialized"))
    }

    async fn launch(&self, profile: &LaunchProfile) -> Result<(Browser, JoinHandle<()>)> {
        let (width, height) = self.options.viewport;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .window_size(width, height)
            .request_timeout(Duration::from_millis(timeouts::NAVIGATION_MS));
        if let Some(path) = profile.executable() {
            builder = builder.chrome_executable(path);
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler event loop ended");
                    break;
                }
            }
        });
        Ok((browser, handler))
    }

    async fn open_page(browser: &Browser) -> Result<Page> {
        let page = browser.new_page("about:blank").await?;
        page.evaluate_on_new_document(page_scripts::CONSOLE_CAPTURE)
            .await
            .context("Failed to install console capture")?;
        Ok(page)
    }

    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<Element> {
        let page = self.page()?;
        let timeout = Duration::from_millis(timeout_ms);
        let started = Instant::now();
        loop {
            match page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(err) => {
                    if started.elapsed() >= timeout {
                        bail!("Timeout waiting for element '{selector}' after {timeout_ms}ms: {err}");
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn evaluate_value(&self, script: &str) -> Result<Value> {
        let result = self.page()?.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn wait_for_load_state(&self, state: &str, timeout_ms: u64) -> Result<()> {
        let timeout = Duration::from_millis(timeout_ms);
        let started = Instant::now();
        loop {
            let ready = self.evaluate_value(page_scripts::READY_STATE).await?;
            let ready = ready.as_str().unwrap_or_default();
            let reached = match state {
                "domcontentloaded" => ready == "interactive" || ready == "complete",
                _ => ready == "complete",
            };
            if reached {
                break;
            }
            if started.elapsed() >= timeout {
                bail!("Timeout waiting for load state '{state}' after {timeout_ms}ms");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        if state == "networkidle" {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }
        Ok(())
    }

    async fn navigate(&self, args: &Value) -> Result<ActionOutput> {
        let url = required_str(args, "url")?;
        let timeout_ms = args
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(timeouts::NAVIGATION_MS);
        let page = self.page()?;

        tokio::time::timeout(Duration::from_millis(timeout_ms), page.goto(url))
            .await
            .map_err(|_| anyhow!("Navigation to {url} timed out after {timeout_ms}ms"))??;

        let wait_until = args
            .get("wait_until")
            .and_then(Value::as_str)
            .unwrap_or("load");
        self.wait_for_load_state(wait_until, timeout_ms).await?;

        let current = page.url().await?.unwrap_or_else(|| url.to_string());
        Ok(mapping([("url", json!(current)), ("status", json!("success"))]))
    }

    async fn press(&self, args: &Value) -> Result<ActionOutput> {
        let key = args
            .get("key")
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .unwrap_or("Enter");

        if let Some(selector) = args.get("selector").and_then(Value::as_str) {
            let element = self
                .wait_for_element(selector, timeouts::SELECTOR_WAIT_MS)
                .await?;
            element.press_key(key).await?;
        } else {
            let page = self.page()?;
            for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
                let params = DispatchKeyEventParams::builder()
                    .r#type(kind)
                    .key(key.to_string())
                    .build()
                    .map_err(|e| anyhow!("Invalid key event: {e}"))?;
                page.execute(params).await?;
            }
        }
        Ok(mapping([("key", json!(key)), ("status", json!("success"))]))
    }

    async fn screenshot(&self, args: &Value) -> Result<ActionOutput> {
        let full_page = args
            .get("full_page")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let bytes = self
            .page()?
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .quality(SCREENSHOT_QUALITY)
                    .full_page(full_page)
                    .build(),
            )
            .await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(mapping([("screenshot", json!(encoded))]))
    }
}

#[async_trait]
impl ActionClient for LocalActionClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let profiles = self.options.profiles.clone().unwrap_or_else(launch_profiles);
        let mut last_error: Option<anyhow::Error> = None;

        for profile in profiles {
            let (mut browser, handler) = match self.launch(&profile).await {
                Ok(launched) => launched,
                Err(err) => {
                    warn!(profile = profile.label(), error = %err, "Browser launch failed");
                    last_error = Some(err);
                    continue;
                }
            };

            match Self::open_page(&browser).await {
                Ok(page) => {
                    info!(profile = profile.label(), headless = self.options.headless, "Local browser launched");
                    self.session = Some(LocalSession {
                        browser,
                        page,
                        handler,
                        profile,
                    });
                    return Ok(());
                }
                Err(err) => {
                    warn!(profile = profile.label(), error = %err, "Browser started but page setup failed");
                    if let Err(close_err) = browser.close().await {
                        warn!(error = %close_err, "Failed to close partially started browser");
                    }
                    handler.abort();
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no launch profile available".to_string());
        bail!("Cannot launch a local browser. {LAUNCH_REMEDIATION}; last error: {detail}")
    }

    async fn call_action(&mut self, name: &str, args: Value) -> Result<ActionOutput> {
        if name == actions::CLOSE {
            self.close().await?;
            return Ok(ActionOutput::Empty);
        }

        match name {
            actions::NAVIGATE => self.navigate(&args).await,
            actions::CLICK => {
                let selector = required_str(&args, "selector")?;
                let timeout = args
                    .get("timeout")
                    .and_then(Value::as_u64)
                    .unwrap_or(timeouts::LOCAL_CLICK_MS);
                let element = self.wait_for_element(selector, timeout).await?;
                element.click().await?;
                Ok(mapping([("selector", json!(selector)), ("status", json!("success"))]))
            }
            actions::FILL => {
                let selector = required_str(&args, "selector")?;
                let value = args.get("value").and_then(Value::as_str).unwrap_or_default();
                let element = self.wait_for_element(selector, timeouts::FILL_MS).await?;
                element.click().await?;
                element
                    .call_js_fn(page_scripts::CLEAR_VALUE_FN, false)
                    .await?;
                element.type_str(value).await?;
                Ok(mapping([("selector", json!(selector)), ("status", json!("success"))]))
            }
            actions::PRESS => self.press(&args).await,
            actions::WAIT_FOR_SELECTOR => {
                let selector = required_str(&args, "selector")?;
                let timeout = args
                    .get("timeout")
                    .and_then(Value::as_u64)
                    .unwrap_or(timeouts::SELECTOR_WAIT_MS);
                self.wait_for_element(selector, timeout).await?;
                Ok(mapping([("selector", json!(selector)), ("status", json!("success"))]))
            }
            actions::WAIT_FOR_LOAD_STATE => {
                let state = args.get("state").and_then(Value::as_str).unwrap_or("load");
                self.wait_for_load_state(state, timeouts::NAVIGATION_MS)
                    .await?;
                Ok(mapping([("state", json!(state)), ("status", json!("success"))]))
            }
            actions::SCREENSHOT => self.screenshot(&args).await,
            actions::SNAPSHOT => {
                let value = self.evaluate_value(page_scripts::PAGE_SNAPSHOT).await?;
                Ok(ActionOutput::extract(value))
            }
            actions::EVALUATE => {
                let script = required_str(&args, "script")?;
                let value = self.evaluate_value(script).await?;
                Ok(mapping([("result", value)]))
            }
            actions::NETWORK_REQUESTS => {
                let value = self.evaluate_value(page_scripts::NETWORK_REQUESTS).await?;
                Ok(mapping([("requests", value)]))
            }
            actions::CONSOLE_MESSAGES => {
                let value = self.evaluate_value(page_scripts::CONSOLE_MESSAGES).await?;
                Ok(mapping([("messages", value)]))
            }
            actions::NAVIGATION_HISTORY => {
                let value = self.evaluate_value(page_scripts::NAVIGATION_HISTORY).await?;
                Ok(mapping([("history", value)]))
            }
            other => bail!("Local browser does not support action '{other}'"),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let closed = session.browser.close().await;
        session.handler.abort();
        closed.context("Failed to close local browser")?;
        debug!(profile = session.profile.label(), "Local browser closed");
        Ok(())
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Missing required argument '{key}'"))
}

fn mapping<const N: usize>(entries: [(&str, Value); N]) -> ActionOutput {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    ActionOutput::Mapping(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_before_initialize() {
        let mut client = LocalActionClient::new(LocalOptions::default());
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(client.active_profile().is_none());
    }

    #[tokio::test]
    async fn actions_require_initialization() {
        let mut client = LocalActionClient::new(LocalOptions::default());
        let err = client
            .call_action(actions::SCREENSHOT, json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn initialize_reports_remediation_when_every_profile_fails() {
        let mut client = LocalActionClient::new(LocalOptions {
            profiles: Some(vec![
                LaunchProfile::Chrome("/nonexistent/chrome".into()),
                LaunchProfile::BundledChromium("/nonexistent/chromium".into()),
            ]),
            ..LocalOptions::default()
        });
        let err = client.initialize().await.unwrap_err().to_string();
        assert!(err.contains("Cannot launch a local browser"));
        assert!(err.contains("npx playwright install chromium"));
        assert!(client.active_profile().is_none());
    }

    #[test]
    fn required_str_rejects_missing_and_empty() {
        assert!(required_str(&json!({"url": ""}), "url").is_err());
        assert!(required_str(&json!({}), "url").is_err());
        assert_eq!(required_str(&json!({"url": "x"}), "url").unwrap(), "x");
    }
}
