//! Glob matching of candidate paths against watch patterns.

use std::path::{Component, Path};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Selects the candidate paths relevant to a set of watch patterns.
pub trait FileMatcher {
    /// Return the subset of `candidates` matching any of `patterns`, in
    /// candidate order.
    fn matches(&self, patterns: &[String], candidates: &[String]) -> Vec<String>;
}

/// [`FileMatcher`] backed by `globset`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobMatcher;

impl GlobMatcher {
    fn build(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            // `{,**/}` relies on empty alternates, which globset rejects by default.
            let glob = GlobBuilder::new(pattern)
                .empty_alternates(true)
                .build()
                .with_context(|| format!("invalid glob {pattern:?}"))?;
            builder.add(glob);
        }
        builder.build().context("build glob set")
    }
}

impl FileMatcher for GlobMatcher {
    fn matches(&self, patterns: &[String], candidates: &[String]) -> Vec<String> {
        let set = match Self::build(patterns) {
            Ok(set) => set,
            Err(e) => {
                warn!(err = %format!("{e:#}"), "ignoring watch patterns");
                return Vec::new();
            }
        };
        candidates
            .iter()
            .filter(|candidate| set.is_match(candidate.as_str()))
            .cloned()
            .collect()
    }
}

/// Enumerate files under `root` as sorted, `/`-separated relative paths.
///
/// Hidden entries (leading `.`) are skipped, along with `target/`.
pub fn enumerate_candidates(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path()) {
            files.push(rel);
        }
    }
    debug!(root = %root.display(), count = files.len(), "enumerated candidates");
    Ok(files)
}

/// `path` relative to `root`, joined with `/`. `None` when outside `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && name == "target")
}
