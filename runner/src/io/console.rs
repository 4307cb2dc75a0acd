//! Styled console output for streamed runner lines.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;

use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::core::types::Style;

/// Default rule width when `COLUMNS` is unset or invalid.
pub const DEFAULT_RULE_WIDTH: usize = 72;

/// Sink for styled console lines.
pub trait Console {
    /// Print one line; the sink appends the newline.
    fn print_line(&self, text: &str, style: Style);
}

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Resolve `Auto` against the terminal and `NO_COLOR`.
    pub fn should_colorize(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Styles {
    is_colorized: bool,
    pass: OwoStyle,
    fail: OwoStyle,
    error: OwoStyle,
    warning: OwoStyle,
    rule: OwoStyle,
}

impl Styles {
    fn colorize(&mut self) {
        self.is_colorized = true;
        self.pass = OwoStyle::new().green();
        self.fail = OwoStyle::new().red();
        self.error = OwoStyle::new().red().bold();
        self.warning = OwoStyle::new().yellow();
        self.rule = OwoStyle::new().blue();
    }

    fn for_style(&self, style: Style) -> Option<OwoStyle> {
        if !self.is_colorized {
            return None;
        }
        match style {
            Style::Plain => None,
            Style::Pass | Style::VerdictSuccess => Some(self.pass),
            Style::Fail | Style::VerdictFailure => Some(self.fail),
            Style::Error => Some(self.error),
            Style::Warning => Some(self.warning),
            Style::Rule => Some(self.rule),
        }
    }
}

/// Writes lines to a terminal-like writer, colorized on request.
pub struct TerminalConsole<W: Write + Send> {
    out: Mutex<W>,
    styles: Styles,
}

impl TerminalConsole<std::io::Stdout> {
    pub fn stdout(color: ColorChoice) -> Self {
        Self::new(std::io::stdout(), color.should_colorize())
    }
}

impl<W: Write + Send> TerminalConsole<W> {
    pub fn new(out: W, colorize: bool) -> Self {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }
        Self {
            out: Mutex::new(out),
            styles,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl<W: Write + Send> Console for TerminalConsole<W> {
    fn print_line(&self, text: &str, style: Style) {
        let mut out = self.out.lock().unwrap_or_else(|poison| poison.into_inner());
        let written = match self.styles.for_style(style) {
            Some(owo) => writeln!(out, "{}", text.style(owo)),
            None => writeln!(out, "{text}"),
        };
        // Console output is best effort; a closed stdout must not fail the run.
        let _ = written.and_then(|()| out.flush());
    }
}

/// Rule width from the `COLUMNS` environment variable.
pub fn rule_width_from_env() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|cols| cols.trim().parse::<usize>().ok())
        .filter(|cols| *cols > 0)
        .unwrap_or(DEFAULT_RULE_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(colorize: bool, lines: &[(&str, Style)]) -> String {
        let console = TerminalConsole::new(Vec::new(), colorize);
        for (text, style) in lines {
            console.print_line(text, *style);
        }
        String::from_utf8(console.into_inner()).expect("utf8")
    }

    #[test]
    fn uncolored_output_is_plain_text() {
        let out = render(false, &[("PASS: a", Style::Pass), ("plain", Style::Plain)]);
        assert_eq!(out, "PASS: a\nplain\n");
    }

    #[test]
    fn colored_output_wraps_styled_lines() {
        let out = render(true, &[("FAIL: b", Style::Fail), ("plain", Style::Plain)]);
        assert!(out.starts_with("\u{1b}["));
        assert!(out.contains("FAIL: b"));
        assert!(out.ends_with("plain\n"));
    }

    #[test]
    fn error_style_differs_from_fail_style() {
        let error = render(true, &[("x", Style::Error)]);
        let fail = render(true, &[("x", Style::Fail)]);
        assert_ne!(error, fail);
        assert_eq!(
            error,
            format!("{}\n", "x".style(OwoStyle::new().red().bold()))
        );
    }

    #[test]
    fn never_and_always_ignore_terminal() {
        assert!(ColorChoice::Always.should_colorize());
        assert!(!ColorChoice::Never.should_colorize());
    }
}
