//! Orchestration for a single runner invocation.
//!
//! Streams the session output through the classifier to the console, folds
//! verdict signals, and resolves a [`RunResult`], falling back to the exit
//! status when the output carried no summary.

use tracing::{debug, error, info, instrument, warn};

use crate::core::classifier::classify_line;
use crate::core::invocation::Invocation;
use crate::core::types::{ExitInfo, RunResult, Style};
use crate::core::verdict::{VerdictAggregate, resolve};
use crate::io::console::{Console, DEFAULT_RULE_WIDTH};
use crate::io::notification::{Notifier, Severity};
use crate::io::process::SessionLauncher;

/// Drives one session per call; holds no state between runs.
pub struct RunExecutor<'a, L, C, N> {
    launcher: &'a L,
    console: &'a C,
    notifier: &'a N,
    rule_width: usize,
}

impl<'a, L: SessionLauncher, C: Console, N: Notifier> RunExecutor<'a, L, C, N> {
    pub fn new(launcher: &'a L, console: &'a C, notifier: &'a N) -> Self {
        Self {
            launcher,
            console,
            notifier,
            rule_width: DEFAULT_RULE_WIDTH,
        }
    }

    pub fn with_rule_width(mut self, rule_width: usize) -> Self {
        self.rule_width = rule_width;
        self
    }

    /// Run `invocation` to completion and resolve its verdict.
    ///
    /// Never fails: launch and read errors degrade to a run without an exit
    /// status, which resolves as a failure.
    #[instrument(skip_all, fields(title = invocation.title()))]
    pub fn execute(&self, invocation: &Invocation) -> RunResult {
        self.console
            .print_line(&"=".repeat(self.rule_width), Style::Rule);
        self.console.print_line(
            &format!("Running: {}", invocation.command_line()),
            Style::Rule,
        );

        let mut aggregate = VerdictAggregate::default();
        let launched = self.launcher.launch(invocation, &mut |line| {
            let classification = classify_line(line);
            self.console.print_line(line, classification.style);
            if let Some(signal) = classification.verdict {
                aggregate.fold(signal);
            }
        });

        let exit = match launched {
            Ok(exit) => exit,
            Err(e) => {
                // Launch failed before a process existed, so there is no pid.
                error!(err = %format!("{e:#}"), "test session failed to start");
                ExitInfo::missing(None)
            }
        };
        debug!(
            verdict = ?aggregate.current().map(|signal| signal.verdict),
            code = ?exit.code,
            "session ended"
        );
        if exit.is_missing() {
            warn!(
                pid = ?exit.pid,
                "internal inconsistency: output ended without an exit status"
            );
        }

        let result = resolve(aggregate, exit);
        self.report(invocation.title(), &result);
        result
    }

    fn report(&self, title: &str, result: &RunResult) {
        self.notifier
            .notify(&result.summary, title, Severity::from(result.verdict));

        if !result.used_fallback() {
            info!(verdict = %result.verdict, summary = %result.summary, "test run finished");
            return;
        }
        warn!("didn't find test results in output");
        if result.success() {
            warn!("{}", result.summary);
        } else {
            error!("{}", result.summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Verdict, VerdictSource};
    use crate::test_support::{
        RecordingConsole, RecordingNotifier, ScriptedLauncher, ScriptedRun, settings, to_strings,
    };

    fn invocation(targets: &[&str]) -> Invocation {
        Invocation::build(&settings(), Some(&to_strings(targets)))
    }

    fn run(script: ScriptedRun) -> (RunResult, RecordingConsole, RecordingNotifier) {
        let launcher = ScriptedLauncher::new(vec![script]);
        let console = RecordingConsole::default();
        let notifier = RecordingNotifier::default();
        let result = RunExecutor::new(&launcher, &console, &notifier)
            .with_rule_width(10)
            .execute(&invocation(&["qux.sc"]));
        (result, console, notifier)
    }

    #[test]
    fn prints_rule_and_echo_before_output() {
        let (_, console, _) = run(ScriptedRun::exits(&["PASS: a"], 0));
        let lines = console.lines();
        assert_eq!(lines[0], ("==========".to_string(), Style::Rule));
        assert_eq!(
            lines[1],
            (
                "Running: timeout 3 sclang unit-test-cli.scd qux.sc".to_string(),
                Style::Rule
            )
        );
        assert_eq!(lines[2], ("PASS: a".to_string(), Style::Pass));
    }

    #[test]
    fn summary_line_decides_and_notifies_once() {
        let (result, console, notifier) = run(ScriptedRun::exits(
            &[
                "PASS: ...",
                "FAIL: ...",
                "Finished running test(s): 3 passes, 2 failures",
            ],
            0,
        ));
        assert!(!result.success());
        assert_eq!(result.summary, "3 passes, 2 failures");
        assert_eq!(
            console.lines().last().map(|(_, style)| *style),
            Some(Style::VerdictFailure)
        );
        assert_eq!(
            notifier.calls(),
            vec![(
                "3 passes, 2 failures".to_string(),
                "qux.sc".to_string(),
                Severity::Failed
            )]
        );
    }

    #[test]
    fn clean_summary_wins_over_nonzero_exit() {
        let (result, _, notifier) = run(ScriptedRun::exits(
            &["Finished running test(s): 5 passes, 0 failures"],
            1,
        ));
        assert!(result.success());
        assert_eq!(result.source, VerdictSource::Output);
        assert_eq!(notifier.calls()[0].2, Severity::Success);
    }

    #[test]
    fn failure_is_sticky_across_summary_lines() {
        let (result, _, _) = run(ScriptedRun::exits(
            &[
                "ERROR: Library has not been compiled successfully.",
                "Finished running test(s): 5 passes, 0 failures",
            ],
            0,
        ));
        assert_eq!(result.verdict, Verdict::Failed);
        assert_eq!(result.summary, "Library has not been compiled successfully");
    }

    #[test]
    fn falls_back_to_zero_exit() {
        let (result, _, notifier) = run(ScriptedRun::exits(&["FAIL: looks bad"], 0));
        assert!(result.success());
        assert_eq!(result.source, VerdictSource::ExitStatus);
        assert_eq!(
            notifier.calls()[0].0,
            format!("Pid {} exited with status 0", ScriptedLauncher::PID)
        );
    }

    #[test]
    fn falls_back_to_nonzero_exit() {
        let (result, _, notifier) = run(ScriptedRun::exits(&["PASS: looks good"], 124));
        assert!(!result.success());
        assert_eq!(notifier.calls()[0].2, Severity::Failed);
    }

    #[test]
    fn signaled_exit_without_summary_fails() {
        let (result, _, notifier) = run(ScriptedRun::killed(&[], 1, "Killed"));
        assert!(!result.success());
        assert!(result.exit.signaled);
        assert_eq!(
            notifier.calls()[0].0,
            format!(
                "Pid {} exited with status 1 (killed by signal: Killed)",
                ScriptedLauncher::PID
            )
        );
    }

    #[test]
    fn launch_error_resolves_as_failure() {
        let (result, _, notifier) = run(ScriptedRun::launch_error("no such file"));
        assert!(!result.success());
        assert_eq!(result.source, VerdictSource::Missing);
        assert_eq!(notifier.calls().len(), 1);
    }

    #[test]
    fn launch_error_after_summary_keeps_output_verdict() {
        let (result, _, _) = run(ScriptedRun {
            lines: vec!["Finished running test(s): 2 passes, 0 failures".to_string()],
            exit: Err("read failed".to_string()),
        });
        assert!(result.success());
        assert_eq!(result.source, VerdictSource::Output);
    }

    mod logs {
        use super::*;
        use std::io::Write;
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct LogBuffer(Arc<Mutex<Vec<u8>>>);

        impl Write for LogBuffer {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().expect("log lock").extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for LogBuffer {
            type Writer = LogBuffer;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        fn run_logged(script: ScriptedRun) -> (RunResult, String) {
            let buffer = LogBuffer::default();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(buffer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::TRACE)
                .finish();
            let (result, _, _) = tracing::subscriber::with_default(subscriber, || run(script));
            let bytes = buffer.0.lock().expect("log lock").clone();
            (result, String::from_utf8(bytes).expect("utf8 logs"))
        }

        fn line_with<'a>(logs: &'a str, needle: &str) -> &'a str {
            logs.lines()
                .find(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("no log line containing {needle:?} in:\n{logs}"))
        }

        #[test]
        fn zero_exit_fallback_warns_with_summary() {
            let (result, logs) = run_logged(ScriptedRun::exits(&["no summary here"], 0));
            assert!(result.success());
            assert!(line_with(&logs, "didn't find test results in output").contains("WARN"));
            let summary = line_with(&logs, "Pid 4242 exited with status 0");
            assert!(summary.contains("WARN"));
            assert!(!summary.contains("ERROR"));
        }

        #[test]
        fn nonzero_exit_fallback_logs_error_with_summary() {
            let (result, logs) = run_logged(ScriptedRun::exits(&["no summary here"], 124));
            assert!(!result.success());
            assert!(line_with(&logs, "didn't find test results in output").contains("WARN"));
            let summary = line_with(&logs, "Pid 4242 exited with status 124");
            assert!(summary.contains("ERROR"));
            assert!(!summary.contains("WARN"));
        }

        #[test]
        fn output_verdict_logs_no_fallback_caution() {
            let (result, logs) = run_logged(ScriptedRun::passing());
            assert!(result.success());
            assert!(!logs.contains("didn't find test results in output"));
            assert!(!logs.contains("exited with status"));
            assert!(line_with(&logs, "test run finished").contains("INFO"));
        }
    }
}
