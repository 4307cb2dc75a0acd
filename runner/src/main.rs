//! Watch-driven SuperCollider unit-test runner.
//!
//! Runs the external unit-test bootstrap on a pseudo-terminal, colors its output
//! live and reports one verdict per run through notifications and the exit code.

use std::io::Stdout;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use sctest::controller::{ControllerOptions, RunController};
use sctest::executor::RunExecutor;
use sctest::exit_codes;
use sctest::io::config::{CONFIG_FILE_NAME, SctestConfig, load_config, write_config};
use sctest::io::console::{ColorChoice, TerminalConsole, rule_width_from_env};
use sctest::io::matcher::GlobMatcher;
use sctest::io::notification::ConfiguredNotifier;
use sctest::io::process::PtyLauncher;
use sctest::logging;
use sctest::watch::run_watch;

#[derive(Parser)]
#[command(
    name = "sctest",
    version,
    about = "Run SuperCollider unit tests on file changes"
)]
struct Cli {
    /// Project root to watch and run tests in.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `<root>/.sctest.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// When to color console output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the whole test corpus once.
    RunAll,
    /// Run the tests for the given paths once.
    Run {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Watch the root and run tests on every change.
    Watch,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

type CliController<'a> =
    RunController<'a, PtyLauncher, TerminalConsole<Stdout>, ConfiguredNotifier, GlobMatcher>;

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("resolve root {}", cli.root.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

    let success = match cli.command {
        Command::Init { force } => {
            cmd_init(&config_path, force)?;
            true
        }
        Command::RunAll => with_controller(&root, &config_path, cli.color, |controller, _| {
            Ok(controller.run_all())
        })?,
        Command::Run { paths } => with_controller(&root, &config_path, cli.color, |controller, _| {
            Ok(controller.run_on_change(&paths))
        })?,
        Command::Watch => with_controller(&root, &config_path, cli.color, |controller, cfg| {
            run_watch(controller, &root, cfg.poll_interval())?;
            Ok(true)
        })?,
    };

    Ok(if success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

/// Load config, wire the production adapters and hand a controller to `f`.
fn with_controller<F>(root: &Path, config_path: &Path, color: ColorChoice, f: F) -> Result<bool>
where
    F: FnOnce(&mut CliController<'_>, &SctestConfig) -> Result<bool>,
{
    let cfg = load_config(config_path)?;
    debug!(config = %config_path.display(), ?cfg, "config loaded");

    let rule_width = rule_width_from_env();
    let cols = u16::try_from(rule_width).unwrap_or(u16::MAX);
    let launcher = PtyLauncher::new(root.to_path_buf(), cols);
    let console = TerminalConsole::stdout(color);
    let notifier = ConfiguredNotifier::from_command(cfg.notify_command.clone());
    let matcher = GlobMatcher;
    let executor = RunExecutor::new(&launcher, &console, &notifier).with_rule_width(rule_width);
    let mut controller = RunController::new(
        executor,
        &matcher,
        cfg.invocation_settings(),
        root.to_path_buf(),
        ControllerOptions {
            all_on_start: cfg.all_on_start,
            all_after_pass: cfg.all_after_pass,
            patterns: cfg.watch.clone(),
        },
    );
    f(&mut controller, &cfg)
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &SctestConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_paths() {
        let cli = Cli::parse_from(["sctest", "run", "a.sc", "b.sc"]);
        assert!(matches!(cli.command, Command::Run { ref paths } if paths == &["a.sc", "b.sc"]));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn run_requires_paths() {
        assert!(Cli::try_parse_from(["sctest", "run"]).is_err());
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["sctest", "watch", "--color", "never", "--root", "/tmp"]);
        assert!(matches!(cli.command, Command::Watch));
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.root, PathBuf::from("/tmp"));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["sctest", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        cmd_init(&path, false).expect("first init");
        assert!(cmd_init(&path, false).is_err());
        cmd_init(&path, true).expect("forced init");
        assert_eq!(load_config(&path).expect("load"), SctestConfig::default());
    }
}
