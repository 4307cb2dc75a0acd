//! Verdict aggregation and resolution for a single run.
//!
//! Output evidence always beats the exit status: the runner process is known to
//! exit non-zero after a clean summary, and to die before printing one. The exit
//! status is consulted only when no summary line was seen.

use crate::core::types::{ExitInfo, RunResult, Verdict, VerdictSignal, VerdictSource};

/// Running aggregate of verdict signals seen during one run.
///
/// Failure is sticky: once a `Failed` signal is folded in, nothing replaces it.
/// While no failure has been seen, the latest `Success` signal wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictAggregate {
    current: Option<VerdictSignal>,
}

impl VerdictAggregate {
    pub fn fold(&mut self, signal: VerdictSignal) {
        let failed = self
            .current
            .as_ref()
            .is_some_and(|current| current.verdict == Verdict::Failed);
        if !failed {
            self.current = Some(signal);
        }
    }

    /// `None` while the verdict is still unknown.
    pub fn current(&self) -> Option<&VerdictSignal> {
        self.current.as_ref()
    }
}

/// Resolve the aggregate into a definitive result, falling back to the exit
/// status when the output carried no verdict.
pub fn resolve(aggregate: VerdictAggregate, exit: ExitInfo) -> RunResult {
    if let Some(signal) = aggregate.current {
        return RunResult {
            verdict: signal.verdict,
            summary: signal.summary,
            exit,
            source: VerdictSource::Output,
        };
    }

    let verdict = if exit.succeeded() {
        Verdict::Success
    } else {
        Verdict::Failed
    };
    let source = if exit.is_missing() {
        VerdictSource::Missing
    } else {
        VerdictSource::ExitStatus
    };
    RunResult {
        verdict,
        summary: exit.describe(),
        exit,
        source,
    }
}
