//! Notification sinks for run verdicts.

use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::{Captures, Regex};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::core::types::Verdict;

/// How long a notification command may run before it is killed.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Severity attached to a verdict notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Failed,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Failed => "failed",
        }
    }
}

impl From<Verdict> for Severity {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Success => Severity::Success,
            Verdict::Failed => Severity::Failed,
        }
    }
}

/// Sink for one-per-run verdict notifications. Must not fail the run.
pub trait Notifier {
    fn notify(&self, message: &str, title: &str, severity: Severity);
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(title|message|severity)\}").expect("valid placeholder regex"));

/// Reports notifications through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, title: &str, severity: Severity) {
        match severity {
            Severity::Success => info!(title, "{message}"),
            Severity::Failed => warn!(title, "{message}"),
        }
    }
}

/// Runs an external command (e.g. `notify-send`) per notification.
///
/// Tokens may contain `{title}`, `{message}` and `{severity}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expand placeholders in every token.
    ///
    /// Each token is scanned once, so substituted text is never expanded again.
    pub fn render(&self, message: &str, title: &str, severity: Severity) -> Vec<String> {
        self.command
            .iter()
            .map(|token| {
                PLACEHOLDER
                    .replace_all(token, |caps: &Captures<'_>| match &caps[1] {
                        "title" => title.to_string(),
                        "message" => message.to_string(),
                        _ => severity.as_str().to_string(),
                    })
                    .into_owned()
            })
            .collect()
    }

    fn run(&self, tokens: &[String]) -> Result<()> {
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| anyhow!("notify command is empty"))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {program}"))?;

        match child
            .wait_timeout(self.timeout)
            .context("wait for notify command")?
        {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(anyhow!("{program} exited with {status}")),
            None => {
                child.kill().context("kill notify command")?;
                child.wait().context("wait notify command")?;
                Err(anyhow!("{program} timed out after {:?}", self.timeout))
            }
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, message: &str, title: &str, severity: Severity) {
        let tokens = self.render(message, title, severity);
        debug!(?tokens, "sending notification");
        if let Err(e) = self.run(&tokens) {
            warn!(err = %format!("{e:#}"), "notification failed");
        }
    }
}

/// Either notifier, chosen from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Log(LogNotifier),
    Command(CommandNotifier),
}

impl ConfiguredNotifier {
    pub fn from_command(command: Option<Vec<String>>) -> Self {
        match command {
            Some(command) => ConfiguredNotifier::Command(CommandNotifier::new(command)),
            None => ConfiguredNotifier::Log(LogNotifier),
        }
    }
}

impl Notifier for ConfiguredNotifier {
    fn notify(&self, message: &str, title: &str, severity: Severity) {
        match self {
            ConfiguredNotifier::Log(n) => n.notify(message, title, severity),
            ConfiguredNotifier::Command(n) => n.notify(message, title, severity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_are_expanded() {
        let notifier = CommandNotifier::new(strings(&[
            "notify-send",
            "--urgency={severity}",
            "{title}",
            "{message}",
        ]));
        let tokens = notifier.render("5 passes, 0 failures", "a.sc b.sc", Severity::Success);
        assert_eq!(
            tokens,
            strings(&[
                "notify-send",
                "--urgency=success",
                "a.sc b.sc",
                "5 passes, 0 failures",
            ])
        );
    }

    #[test]
    fn substituted_text_is_not_expanded_again() {
        let notifier = CommandNotifier::new(strings(&["notify", "{title}: {message}"]));
        let tokens = notifier.render("{severity}", "{message}.sc", Severity::Failed);
        assert_eq!(tokens, strings(&["notify", "{message}.sc: {severity}"]));
    }

    #[test]
    fn unknown_braces_are_kept() {
        let notifier = CommandNotifier::new(strings(&["{other} {title}"]));
        assert_eq!(
            notifier.render("m", "t", Severity::Success),
            strings(&["{other} t"])
        );
    }

    #[test]
    fn severity_follows_verdict() {
        assert_eq!(Severity::from(Verdict::Success), Severity::Success);
        assert_eq!(Severity::from(Verdict::Failed), Severity::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn command_notifier_writes_through_shell() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("notified.txt");
        let notifier = CommandNotifier::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("printf '%s|%s' \"$0\" \"$1\" > '{}'", out.display()),
            "{severity}".to_string(),
            "{message}".to_string(),
        ]);
        notifier.run(&notifier.render("1 pass, 1 failure", "t", Severity::Failed))
            .expect("run");
        let written = std::fs::read_to_string(&out).expect("read");
        assert_eq!(written, "failed|1 pass, 1 failure");
    }

    #[test]
    fn missing_notify_program_does_not_panic() {
        let notifier = CommandNotifier::new(strings(&["sctest-no-such-notifier"]))
            .with_timeout(Duration::from_secs(1));
        notifier.notify("m", "t", Severity::Failed);
        assert!(notifier.run(&notifier.render("m", "t", Severity::Failed)).is_err());
    }
}
