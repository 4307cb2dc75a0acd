//! File watching front end for the controller.
//!
//! Raw watcher events are batched on a fixed flush tick, reduced to one change
//! kind per path, filtered through the watch patterns and dispatched to the
//! controller. Runs happen on the calling thread, one at a time; events that
//! arrive during a run are picked up by the next batch.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::controller::RunController;
use crate::io::console::Console;
use crate::io::matcher::{FileMatcher, relative_path};
use crate::io::notification::Notifier;
use crate::io::process::SessionLauncher;

/// How often pending events are flushed into a batch.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Root-relative changed paths grouped by kind, each in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeBatch {
    /// Reduce raw events to one kind per path.
    ///
    /// Added then modified stays added; anything then removed is removed;
    /// removed then added becomes modified. Events outside `root` and
    /// access-only events are ignored.
    pub fn from_events(root: &Path, events: &[NotifyEvent]) -> Self {
        let mut changes: Vec<(String, ChangeKind)> = Vec::new();
        for event in events {
            let kind = match event.kind {
                EventKind::Create(_) => ChangeKind::Added,
                EventKind::Modify(_) => ChangeKind::Modified,
                EventKind::Remove(_) => ChangeKind::Removed,
                _ => continue,
            };
            for path in &event.paths {
                let Some(rel) = relative_path(root, path) else {
                    continue;
                };
                match changes.iter_mut().find(|(p, _)| *p == rel) {
                    Some((_, existing)) => *existing = merge(*existing, kind),
                    None => changes.push((rel, kind)),
                }
            }
        }

        let mut batch = ChangeBatch::default();
        for (path, kind) in changes {
            match kind {
                ChangeKind::Added => batch.added.push(path),
                ChangeKind::Modified => batch.modified.push(path),
                ChangeKind::Removed => batch.removed.push(path),
            }
        }
        batch
    }

    /// Keep only paths matching `patterns`.
    pub fn filter<M: FileMatcher>(self, matcher: &M, patterns: &[String]) -> Self {
        Self {
            added: matcher.matches(patterns, &self.added),
            modified: matcher.matches(patterns, &self.modified),
            removed: matcher.matches(patterns, &self.removed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

fn merge(existing: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (existing, next) {
        (_, ChangeKind::Removed) => ChangeKind::Removed,
        (ChangeKind::Removed, _) => ChangeKind::Modified,
        (ChangeKind::Added, ChangeKind::Modified) => ChangeKind::Added,
        (_, next) => next,
    }
}

/// Dispatch each non-empty group to the matching controller entry point.
///
/// Returns the success of every run, in dispatch order.
pub fn dispatch<L, C, N, M>(
    controller: &mut RunController<'_, L, C, N, M>,
    batch: &ChangeBatch,
) -> Vec<bool>
where
    L: SessionLauncher,
    C: Console,
    N: Notifier,
    M: FileMatcher,
{
    let mut results = Vec::new();
    if !batch.added.is_empty() {
        results.push(controller.run_on_additions(&batch.added));
    }
    if !batch.modified.is_empty() {
        results.push(controller.run_on_modifications(&batch.modified));
    }
    if !batch.removed.is_empty() {
        results.push(controller.run_on_removals(&batch.removed));
    }
    results
}

/// Watch `root` until the watcher disconnects, running tests on change.
pub fn run_watch<L, C, N, M>(
    controller: &mut RunController<'_, L, C, N, M>,
    root: &Path,
    poll_interval: Duration,
) -> Result<()>
where
    L: SessionLauncher,
    C: Console,
    N: Notifier,
    M: FileMatcher,
{
    let (tx, rx) = mpsc::channel::<notify::Result<NotifyEvent>>();
    let mut watcher = PollWatcher::new(
        tx,
        notify::Config::default().with_poll_interval(poll_interval),
    )
    .context("create file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("watch {}", root.display()))?;
    info!(path = %root.display(), "watching for changes");

    controller.start();
    let matcher = controller.matcher();
    let patterns = controller.options().patterns.clone();

    let mut pending: Vec<NotifyEvent> = Vec::new();
    let mut next_flush = Instant::now() + FLUSH_INTERVAL;
    let outcome = loop {
        let wait = next_flush.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Ok(event)) => pending.push(event),
            Ok(Err(e)) => warn!(err = %e, "file watcher error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                break Err(anyhow!("file watcher disconnected"));
            }
        }
        if Instant::now() < next_flush {
            continue;
        }

        if !pending.is_empty() {
            let batch = ChangeBatch::from_events(root, &pending).filter(matcher, &patterns);
            pending.clear();
            if batch.is_empty() {
                debug!("no watched files changed");
            } else {
                debug!(?batch, "dispatching changes");
                dispatch(controller, &batch);
            }
        }
        next_flush = Instant::now() + FLUSH_INTERVAL;
    };

    controller.stop();
    outcome
}
