//! Command-line construction for one runner invocation.

use std::collections::HashSet;

/// Fixed parts of every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSettings {
    /// External timeout utility (e.g. `timeout`).
    pub timeout_command: String,
    pub timeout_secs: u64,
    /// Interpreter executable (e.g. `sclang`).
    pub interpreter: String,
    /// Extra interpreter arguments, in order.
    pub args: Vec<String>,
    /// Path to the unit-test bootstrap script.
    pub bootstrap: String,
}

/// Immutable command tokens plus a display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    tokens: Vec<String>,
    title: String,
}

impl Invocation {
    /// Build an invocation for `targets`, or for the whole corpus when `None`.
    ///
    /// Targets are de-duplicated, keeping first-seen order.
    pub fn build(settings: &InvocationSettings, targets: Option<&[String]>) -> Self {
        let mut tokens = vec![
            settings.timeout_command.clone(),
            settings.timeout_secs.to_string(),
            settings.interpreter.clone(),
        ];
        tokens.extend(settings.args.iter().cloned());
        tokens.push(settings.bootstrap.clone());

        let title = match targets {
            Some(targets) => {
                let targets = dedup_paths(targets);
                let title = targets.join(" ");
                tokens.extend(targets);
                title
            }
            None => tokens.join(" "),
        };

        Self { tokens, title }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tokens joined by single spaces, for the echo line.
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Order-preserving de-duplication.
pub fn dedup_paths(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|path| seen.insert(path.as_str()))
        .cloned()
        .collect()
}
