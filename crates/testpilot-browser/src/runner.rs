//! Subprocess test runner: hands generated code to the test framework CLI.
//!
//! This is the last execution tier. It produces no step-level trace, only the
//! process output and exit code.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::launch::{detect_playwright_cache, launch_profiles};

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const PROBE_TIMEOUT_SECS: u64 = 10;
const PYTHON_ENCODING_HEADER: &str = "# -*- coding: utf-8 -*-";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    #[default]
    Typescript,
    Javascript,
    Python,
}

impl ScriptLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }

    /// Unknown tags run as TypeScript, the default generation target.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "python" | "py" => Self::Python,
            "javascript" | "js" => Self::Javascript,
            _ => Self::Typescript,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Self::Python => "test_generated.py",
            Self::Typescript => "generated.spec.ts",
            Self::Javascript => "generated.spec.js",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    pub language: ScriptLanguage,
    pub browser: String,
    pub headless: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub command: String,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeProbe {
    pub node_available: bool,
    pub node_version: Option<String>,
    pub npx_available: bool,
    pub python_available: bool,
    pub python_version: Option<String>,
    pub local_browser: Option<String>,
    pub playwright_cache_detected: bool,
    pub ready: bool,
    pub notes: Vec<String>,
}

#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn probe(&self) -> Result<RuntimeProbe>;

    async fn run(&self, request: &RunRequest) -> Result<RunOutcome>;
}

#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TestRunner for SubprocessRunner {
    async fn probe(&self) -> Result<RuntimeProbe> {
        let mut probe = RuntimeProbe::default();

        if let Ok(output) = run_command_capture("node", &["--version"], None, &[], PROBE_TIMEOUT_SECS).await
            && output.exit_code == 0
        {
            probe.node_available = true;
            probe.node_version = Some(output.stdout.trim().to_string());
        }

        probe.npx_available = which::which("npx").is_ok();

        if let Ok(output) =
            run_command_capture(python_program(), &["--version"], None, &[], PROBE_TIMEOUT_SECS).await
            && output.exit_code == 0
        {
            probe.python_available = true;
            let version = if output.stdout.trim().is_empty() {
                output.stderr.trim()
            } else {
                output.stdout.trim()
            };
            probe.python_version = Some(version.to_string());
        }

        probe.local_browser = launch_profiles()
            .iter()
            .find_map(|profile| profile.executable().map(|path| path.display().to_string()));
        probe.playwright_cache_detected = detect_playwright_cache();
        probe.ready = probe.local_browser.is_some()
            || (probe.npx_available && probe.playwright_cache_detected)
            || (probe.python_available && probe.playwright_cache_detected);

        if !probe.node_available {
            probe.notes.push(
                "Node.js not found. Install Node.js 20+ to run TypeScript/JavaScript tests."
                    .to_string(),
            );
        }
        if !probe.python_available {
            probe.notes.push(
                "Python not found. Install Python 3 with `pip install pytest playwright` to run Python tests."
                    .to_string(),
            );
        }
        if probe.local_browser.is_none() {
            probe.notes.push(
                "No Chrome/Edge executable found on PATH; the local backend will rely on the Playwright cache."
                    .to_string(),
            );
        }
        if !probe.playwright_cache_detected {
            probe.notes.push(
                "Playwright browsers not installed. Run: npx playwright install chromium".to_string(),
            );
        }

        Ok(probe)
    }

    async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        let temp_dir = tempfile::Builder::new()
            .prefix("testpilot-run-")
            .tempdir()?;
        let script_path = write_script(temp_dir.path(), &request.code, request.language).await?;
        let script = script_path.display().to_string();

        let headless = if request.headless { "true" } else { "false" };
        let env = [
            ("PLAYWRIGHT_HEADLESS", headless),
            ("PLAYWRIGHT_BROWSER", request.browser.as_str()),
        ];

        let (program, args): (&str, Vec<&str>) = match request.language {
            ScriptLanguage::Python => (python_program(), vec!["-m", "pytest", script.as_str(), "-v", "-s"]),
            ScriptLanguage::Typescript | ScriptLanguage::Javascript => {
                let mut args = vec!["playwright", "test", script.as_str()];
                if !request.headless {
                    args.push("--headed");
                }
                (npx_program(), args)
            }
        };
        let command = format!("{program} {}", args.join(" "));
        info!(%command, language = request.language.as_str(), "Running generated test");

        let started = Instant::now();
        let output = run_command_capture(
            program,
            &args,
            Some(temp_dir.path()),
            &env,
            request.timeout_secs.max(1),
        )
        .await?;
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(exit_code = output.exit_code, duration_ms, "Test process finished");

        Ok(RunOutcome {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms,
            command,
        })
    }
}

/// Write the prepared source into `dir` under the language's test file name.
async fn write_script(dir: &Path, code: &str, language: ScriptLanguage) -> Result<PathBuf> {
    let path = dir.join(language.file_name());
    tokio::fs::write(&path, prepare_source(code, language)).await?;
    Ok(path)
}

/// Python sources get an encoding header unless they already open with a comment.
pub fn prepare_source(code: &str, language: ScriptLanguage) -> String {
    if language == ScriptLanguage::Python && !code.trim_start().starts_with('#') {
        format!("{PYTHON_ENCODING_HEADER}\n{code}")
    } else {
        code.to_string()
    }
}

fn python_program() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

fn npx_program() -> &'static str {
    if cfg!(windows) { "npx.cmd" } else { "npx" }
}

#[derive(Debug)]
struct CommandCapture {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

async fn run_command_capture(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    env: &[(&str, &str)],
    timeout_secs: u64,
) -> Result<CommandCapture> {
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = match timeout(Duration::from_secs(timeout_secs), command.output()).await {
        Ok(result) => result?,
        Err(_) => bail!("Command timed out after {} seconds", timeout_secs),
    };

    Ok(CommandCapture {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_gets_encoding_header() {
        let prepared = prepare_source("import pytest\n", ScriptLanguage::Python);
        assert!(prepared.starts_with(PYTHON_ENCODING_HEADER));

        let commented = "# already commented\nimport pytest\n";
        assert_eq!(prepare_source(commented, ScriptLanguage::Python), commented);

        let ts = "import { test } from '@playwright/test';";
        assert_eq!(prepare_source(ts, ScriptLanguage::Typescript), ts);
    }

    #[test]
    fn language_tags_resolve() {
        assert_eq!(ScriptLanguage::from_tag("Python"), ScriptLanguage::Python);
        assert_eq!(ScriptLanguage::from_tag("js"), ScriptLanguage::Javascript);
        assert_eq!(ScriptLanguage::from_tag("rust"), ScriptLanguage::Typescript);
        assert!(ScriptLanguage::Typescript.file_name().ends_with(".spec.ts"));
    }

    #[tokio::test]
    async fn script_lands_in_run_dir_with_language_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "print('hi')\n", ScriptLanguage::Python)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("test_generated.py"));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, format!("{PYTHON_ENCODING_HEADER}\nprint('hi')\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_capture_reports_exit_code_and_env() {
        let output = run_command_capture(
            "sh",
            &["-c", "echo $PLAYWRIGHT_BROWSER; echo oops >&2; exit 3"],
            None,
            &[("PLAYWRIGHT_BROWSER", "chromium")],
            10,
        )
        .await
        .unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "chromium");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_capture_times_out() {
        let err = run_command_capture("sleep", &["5"], None, &[], 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
