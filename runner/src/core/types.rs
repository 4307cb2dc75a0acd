//! Shared deterministic types for run classification and verdicts.
//!
//! These types are the contracts between the pure core and the I/O adapters.
//! Nothing here performs I/O.

use std::fmt;

/// Display style for a single console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// No styling.
    Plain,
    /// `PASS:` lines.
    Pass,
    /// `FAIL:` and `There were failures` lines.
    Fail,
    /// `ERROR:` lines (bold).
    Error,
    /// `WARNING:` lines.
    Warning,
    /// A summary line reporting zero failures.
    VerdictSuccess,
    /// Any other verdict-bearing line.
    VerdictFailure,
    /// Horizontal rule and invocation echo.
    Rule,
}

/// Binary pass/fail judgment for one test-runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failed,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("success"),
            Verdict::Failed => f.write_str("failed"),
        }
    }
}

/// Verdict extracted from a single output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictSignal {
    pub verdict: Verdict,
    /// Human-readable summary, e.g. `5 passes, 0 failures`.
    pub summary: String,
}

/// Result of classifying one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineClassification {
    pub style: Style,
    pub verdict: Option<VerdictSignal>,
}

/// Final status of a child process.
///
/// `code` is `None` when the session ended without ever collecting a status.
/// `signal` names the terminating signal when the child was killed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub pid: Option<u32>,
    pub code: Option<u32>,
    pub signaled: bool,
    pub signal: Option<String>,
}

impl ExitInfo {
    pub fn exited(pid: Option<u32>, code: u32) -> Self {
        Self {
            pid,
            code: Some(code),
            signaled: false,
            signal: None,
        }
    }

    /// Terminated by `signal`; `code` is whatever the platform reported.
    pub fn killed(pid: Option<u32>, code: u32, signal: impl Into<String>) -> Self {
        Self {
            pid,
            code: Some(code),
            signaled: true,
            signal: Some(signal.into()),
        }
    }

    pub fn missing(pid: Option<u32>) -> Self {
        Self {
            pid,
            code: None,
            signaled: false,
            signal: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.code.is_none()
    }

    /// Exit code zero and not terminated by a signal.
    pub fn succeeded(&self) -> bool {
        self.code == Some(0) && !self.signaled
    }

    /// `Pid <pid> exited with status <code>`, naming the signal if one ended
    /// the process.
    pub fn describe(&self) -> String {
        let pid = self
            .pid
            .map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
        let code = self
            .code
            .map_or_else(|| "unknown".to_string(), |code| code.to_string());
        let summary = format!("Pid {pid} exited with status {code}");
        match (self.signaled, self.signal.as_deref()) {
            (true, Some(signal)) => format!("{summary} (killed by signal: {signal})"),
            (true, None) => format!("{summary} (killed by signal)"),
            (false, _) => summary,
        }
    }
}

/// Where a resolved verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// A summary line in the runner output.
    Output,
    /// No summary line; the process exit status decided.
    ExitStatus,
    /// No summary line and no exit status was collected.
    Missing,
}

/// Outcome of one runner invocation. Always carries a resolved verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub verdict: Verdict,
    pub summary: String,
    pub exit: ExitInfo,
    pub source: VerdictSource,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.verdict.is_success()
    }

    /// True when the verdict was not read from runner output.
    pub fn used_fallback(&self) -> bool {
        self.source != VerdictSource::Output
    }
}
