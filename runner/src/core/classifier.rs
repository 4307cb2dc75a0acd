//! Deterministic classification of runner output lines.
//!
//! Styling and verdict extraction are separate passes over the same raw line:
//! [`line_style`] picks the console style from the line prefix, and
//! [`extract_verdict`] looks for the runner's summary markers. [`classify_line`]
//! combines them, letting a verdict override the prefix style.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{LineClassification, Style, Verdict, VerdictSignal};

static FINISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Finished running test\(s\): (\d+ pass(?:es)?, (\d+) failures?)")
        .expect("summary regex is valid")
});

const NOT_COMPILED: &str = "Library has not been compiled successfully";

/// Classify a raw output line (without its trailing newline).
pub fn classify_line(line: &str) -> LineClassification {
    let verdict = extract_verdict(line);
    let style = match &verdict {
        Some(signal) if signal.verdict.is_success() => Style::VerdictSuccess,
        Some(_) => Style::VerdictFailure,
        None => line_style(line),
    };
    LineClassification { style, verdict }
}

/// Style from the line prefix. First match wins.
pub fn line_style(line: &str) -> Style {
    if line.starts_with("PASS:") {
        Style::Pass
    } else if line.starts_with("FAIL:") || line.starts_with("There were failures") {
        Style::Fail
    } else if line.starts_with("ERROR:") {
        Style::Error
    } else if line.starts_with("WARNING:") {
        Style::Warning
    } else {
        Style::Plain
    }
}

/// Extract a verdict signal from a summary or compile-failure line.
pub fn extract_verdict(line: &str) -> Option<VerdictSignal> {
    if let Some(caps) = FINISHED_RE.captures(line) {
        let summary = caps[1].to_string();
        let failures = caps[2].trim_start_matches('0');
        let verdict = if failures.is_empty() {
            Verdict::Success
        } else {
            Verdict::Failed
        };
        return Some(VerdictSignal { verdict, summary });
    }
    if line.contains(&format!("{NOT_COMPILED}.")) {
        return Some(VerdictSignal {
            verdict: Verdict::Failed,
            summary: NOT_COMPILED.to_string(),
        });
    }
    None
}
