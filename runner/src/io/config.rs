//! Test runner configuration stored in `.sctest.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::invocation::InvocationSettings;

/// Default config file name, looked up in the watch root.
pub const CONFIG_FILE_NAME: &str = ".sctest.toml";

/// Glob matching SuperCollider class and script files.
pub const DEFAULT_WATCH_PATTERN: &str = "{,**/}*.sc{,d}";

/// Runner configuration (TOML).
///
/// Missing fields default to the values in [`SctestConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SctestConfig {
    /// Extra interpreter arguments, e.g. `["-i", "scqt"]`.
    pub args: Vec<String>,

    /// Seconds passed to the timeout wrapper.
    pub timeout: u64,

    /// Run the whole corpus when watching starts.
    pub all_on_start: bool,

    /// Re-run the whole corpus after an incremental run recovers from a failure.
    pub all_after_pass: bool,

    /// Interpreter executable.
    pub interpreter: String,

    /// External timeout utility wrapping the interpreter.
    pub timeout_command: String,

    /// Unit-test bootstrap script handed to the interpreter.
    ///
    /// Passed through verbatim, so a relative path resolves against the watch
    /// root (the session's working directory). sctest does not ship
    /// `unit-test-cli.scd`; keep a copy in the project root or set an absolute
    /// path to the installed script.
    pub bootstrap: String,

    /// Globs selecting which changed files trigger a run.
    pub watch: Vec<String>,

    /// Poll interval for the file watcher, in milliseconds.
    pub poll_interval_ms: u64,

    /// Desktop notification command. Tokens may contain `{title}`,
    /// `{message}` and `{severity}` placeholders.
    pub notify_command: Option<Vec<String>>,
}

impl Default for SctestConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            timeout: 3,
            all_on_start: false,
            all_after_pass: false,
            interpreter: "sclang".to_string(),
            timeout_command: "timeout".to_string(),
            bootstrap: "unit-test-cli.scd".to_string(),
            watch: vec![DEFAULT_WATCH_PATTERN.to_string()],
            poll_interval_ms: 500,
            notify_command: None,
        }
    }
}

impl SctestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(anyhow!("interpreter must be non-empty"));
        }
        if self.timeout_command.trim().is_empty() {
            return Err(anyhow!("timeout_command must be non-empty"));
        }
        if self.bootstrap.trim().is_empty() {
            return Err(anyhow!("bootstrap must be non-empty"));
        }
        if self.watch.is_empty() {
            return Err(anyhow!("watch must list at least one pattern"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        if let Some(cmd) = &self.notify_command
            && (cmd.is_empty() || cmd[0].trim().is_empty())
        {
            return Err(anyhow!("notify_command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn invocation_settings(&self) -> InvocationSettings {
        InvocationSettings {
            timeout_command: self.timeout_command.clone(),
            timeout_secs: self.timeout,
            interpreter: self.interpreter.clone(),
            args: self.args.clone(),
            bootstrap: self.bootstrap.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SctestConfig::default()`.
pub fn load_config(path: &Path) -> Result<SctestConfig> {
    if !path.exists() {
        let cfg = SctestConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SctestConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SctestConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
