//! Run selection and the re-run-after-recovery policy.
//!
//! The controller decides which paths an invocation targets and remembers
//! whether the previous run failed. With `all_after_pass` enabled, an
//! incremental run that goes green right after a red run is followed by a full
//! run, and the full run's result becomes the caller-visible result.

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::core::invocation::{Invocation, InvocationSettings, dedup_paths};
use crate::executor::RunExecutor;
use crate::io::console::Console;
use crate::io::matcher::{FileMatcher, enumerate_candidates};
use crate::io::notification::Notifier;
use crate::io::process::SessionLauncher;

/// Policy switches for the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Run the whole corpus from [`RunController::start`].
    pub all_on_start: bool,
    /// Escalate a recovering incremental run into a full run.
    pub all_after_pass: bool,
    /// Patterns selecting the test corpus for full runs.
    pub patterns: Vec<String>,
}

/// Cross-run memory, scoped to one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub last_run_failed: bool,
}

pub struct RunController<'a, L, C, N, M> {
    executor: RunExecutor<'a, L, C, N>,
    matcher: &'a M,
    settings: InvocationSettings,
    root: PathBuf,
    options: ControllerOptions,
    state: ControllerState,
}

impl<'a, L, C, N, M> RunController<'a, L, C, N, M>
where
    L: SessionLauncher,
    C: Console,
    N: Notifier,
    M: FileMatcher,
{
    pub fn new(
        executor: RunExecutor<'a, L, C, N>,
        matcher: &'a M,
        settings: InvocationSettings,
        root: PathBuf,
        options: ControllerOptions,
    ) -> Self {
        Self {
            executor,
            matcher,
            settings,
            root,
            options,
            state: ControllerState::default(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn matcher(&self) -> &'a M {
        self.matcher
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Lifecycle start: runs everything when `all_on_start` is set.
    pub fn start(&mut self) -> Option<bool> {
        if self.options.all_on_start {
            Some(self.run_all())
        } else {
            debug!("all_on_start disabled, waiting for changes");
            None
        }
    }

    /// Lifecycle stop. Nothing to tear down.
    pub fn stop(&mut self) {
        debug!("controller stopped");
    }

    /// Run the whole corpus once.
    #[instrument(skip_all)]
    pub fn run_all(&mut self) -> bool {
        let success = self.run_full();
        self.state.last_run_failed = !success;
        success
    }

    pub fn run_on_additions(&mut self, paths: &[String]) -> bool {
        self.run_on_change(paths)
    }

    pub fn run_on_modifications(&mut self, paths: &[String]) -> bool {
        self.run_on_change(paths)
    }

    pub fn run_on_removals(&mut self, paths: &[String]) -> bool {
        self.run_on_change(paths)
    }

    /// Run the tests for `paths`, escalating to a full run on recovery.
    ///
    /// An empty `paths` list runs the whole corpus without escalation.
    #[instrument(skip_all, fields(paths = paths.len()))]
    pub fn run_on_change(&mut self, paths: &[String]) -> bool {
        let targets = dedup_paths(paths);
        if targets.is_empty() {
            debug!("no changed paths, running everything");
            return self.run_all();
        }

        let was_failing = self.state.last_run_failed;
        let invocation = Invocation::build(&self.settings, Some(&targets));
        let mut success = self.executor.execute(&invocation).success();

        if success && was_failing && self.options.all_after_pass {
            info!("incremental run recovered, re-running all tests");
            success = self.run_full();
        }

        self.state.last_run_failed = !success;
        success
    }

    fn run_full(&self) -> bool {
        let candidates = match enumerate_candidates(&self.root) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(err = %format!("{e:#}"), "could not enumerate test files");
                Vec::new()
            }
        };
        let matched = self.matcher.matches(&self.options.patterns, &candidates);
        debug!(
            candidates = candidates.len(),
            matched = matched.len(),
            "discovered test files"
        );

        let invocation = Invocation::build(&self.settings, None);
        self.executor.execute(&invocation).success()
    }
}
