//! Test-only fakes for launchers, sinks and matchers.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::invocation::{Invocation, InvocationSettings};
use crate::core::types::{ExitInfo, Style};
use crate::io::console::Console;
use crate::io::matcher::FileMatcher;
use crate::io::notification::{Notifier, Severity};
use crate::io::process::SessionLauncher;

/// Deterministic settings for building test invocations.
pub fn settings() -> InvocationSettings {
    InvocationSettings {
        timeout_command: "timeout".to_string(),
        timeout_secs: 3,
        interpreter: "sclang".to_string(),
        args: Vec::new(),
        bootstrap: "unit-test-cli.scd".to_string(),
    }
}

/// One scripted session: the lines it prints and how it ends.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub lines: Vec<String>,
    /// `Err` makes `launch` fail after the lines were delivered.
    pub exit: std::result::Result<ExitInfo, String>,
}

impl ScriptedRun {
    pub fn exits(lines: &[&str], code: u32) -> Self {
        Self {
            lines: to_strings(lines),
            exit: Ok(ExitInfo::exited(Some(ScriptedLauncher::PID), code)),
        }
    }

    pub fn killed(lines: &[&str], code: u32, signal: &str) -> Self {
        Self {
            lines: to_strings(lines),
            exit: Ok(ExitInfo::killed(Some(ScriptedLauncher::PID), code, signal)),
        }
    }

    pub fn launch_error(message: &str) -> Self {
        Self {
            lines: Vec::new(),
            exit: Err(message.to_string()),
        }
    }

    /// A run whose summary reports `failures` failures.
    pub fn summary(passes: u32, failures: u32) -> Self {
        let line = format!("Finished running test(s): {passes} passes, {failures} failures");
        Self::exits(&[line.as_str()], 0)
    }

    pub fn passing() -> Self {
        Self::summary(1, 0)
    }

    pub fn failing() -> Self {
        Self::summary(0, 1)
    }
}

/// Launcher that replays queued runs and records every invocation.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    runs: RefCell<VecDeque<ScriptedRun>>,
    invocations: RefCell<Vec<Invocation>>,
}

impl ScriptedLauncher {
    pub const PID: u32 = 4242;

    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.runs.borrow().len()
    }
}

impl SessionLauncher for ScriptedLauncher {
    fn launch(&self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<ExitInfo> {
        self.invocations.borrow_mut().push(invocation.clone());
        let run = self
            .runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted run left for {}", invocation.title()))?;
        for line in &run.lines {
            on_line(line.as_str());
        }
        run.exit.map_err(|message| anyhow!(message))
    }
}

/// Console that records printed lines.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    lines: RefCell<Vec<(String, Style)>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<(String, Style)> {
        self.lines.borrow().clone()
    }
}

impl Console for RecordingConsole {
    fn print_line(&self, text: &str, style: Style) {
        self.lines.borrow_mut().push((text.to_string(), style));
    }
}

/// Notifier that records `(message, title, severity)` calls.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: RefCell<Vec<(String, String, Severity)>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(String, String, Severity)> {
        self.calls.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, title: &str, severity: Severity) {
        self.calls
            .borrow_mut()
            .push((message.to_string(), title.to_string(), severity));
    }
}

/// Matcher returning a fixed answer and recording its inputs.
#[derive(Debug, Default)]
pub struct FixedMatcher {
    answer: Vec<String>,
    calls: RefCell<Vec<(Vec<String>, Vec<String>)>>,
}

impl FixedMatcher {
    pub fn new(answer: &[&str]) -> Self {
        Self {
            answer: to_strings(answer),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Recorded `(patterns, candidates)` pairs.
    pub fn calls(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl FileMatcher for FixedMatcher {
    fn matches(&self, patterns: &[String], candidates: &[String]) -> Vec<String> {
        self.calls
            .borrow_mut()
            .push((patterns.to_vec(), candidates.to_vec()));
        self.answer.clone()
    }
}

pub fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
