//! Binary entry point for the tfind CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Resolve references into test descriptors and build targets
//! tfind find FooTests 'FooTests:BarClass#testA,testB'
//!
//! # Modules close to a mistyped name
//! tfind suggest FooTsts
//!
//! # How a reference would be interpreted
//! tfind classify com.example.BarClass
//!
//! # Resolve a TEST_MAPPING entry list
//! tfind entries presubmit.json
//! ```
//!
//! Every command prints one JSON document on stdout; logs go to stderr.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use testfind::cli::{
    run_classify, run_entries, run_find, run_host_unit_tests, run_suggest, FindArgs, Workspace,
};
use testfind::terminal::TerminalAdapter;
use testfind_core::config::CliOverrides;
use testfind_core::error::{OutputErrorCode, TestfindError};
use testfind_core::fuzzy::FuzzyProfile;
use testfind_core::interaction::{InteractionAdapter, NonInteractiveAdapter};
use testfind_core::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Resolve loosely written test references into runnable tests.
#[derive(Parser, Debug)]
#[command(name = "tfind", version, about = "Resolve test references into runnable tests")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Source tree root (default: current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// module-info JSON file (default: <root>/out/module-info.json).
    #[arg(long, global = true)]
    module_info: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Edit cost profile for fuzzy matching.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    /// Unit costs, for typos.
    Typo,
    /// Cheap insertions, for keyword search.
    Search,
}

impl From<ProfileArg> for FuzzyProfile {
    fn from(profile: ProfileArg) -> Self {
        match profile {
            ProfileArg::Typo => FuzzyProfile::Typo,
            ProfileArg::Search => FuzzyProfile::Search,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve test references into test descriptors.
    Find {
        /// References: modules, classes, packages, paths, configs, plans.
        #[arg(required = true)]
        references: Vec<String>,

        /// Pick one config for modules declaring several.
        #[arg(long)]
        select_config: bool,

        /// Neither read nor write the resolution cache.
        #[arg(long)]
        no_cache: bool,

        /// Drop cached resolutions of these references before resolving.
        #[arg(long)]
        clear_cache: bool,

        /// Do not fall back to fuzzy module matching.
        #[arg(long)]
        no_fuzzy: bool,

        /// Answer every prompt with yes, without asking.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List testable modules close to a name.
    Suggest {
        name: String,

        /// Edit cost profile.
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,

        /// Largest edit distance reported.
        #[arg(long)]
        max_distance: Option<usize>,
    },

    /// Show the interpretations of a reference, in finder order.
    Classify { reference: String },

    /// Resolve a TEST_MAPPING entry list (JSON).
    Entries { file: PathBuf },

    /// List host unit tests under a directory.
    #[command(name = "host-unit-tests")]
    HostUnitTests {
        /// Directory to search (default: current directory).
        dir: Option<String>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), TestfindError> {
    let cwd = std::env::current_dir()
        .map_err(|e| TestfindError::internal(format!("cannot read current directory: {e}")))?;
    let root = cli
        .global
        .root
        .as_ref()
        .map(|root| cwd.join(root))
        .unwrap_or_else(|| cwd.clone());
    let module_info = cli.global.module_info.as_deref();

    match cli.command {
        Command::Find {
            references,
            select_config,
            no_cache,
            clear_cache,
            no_fuzzy,
            yes,
        } => {
            let overrides = CliOverrides {
                no_cache,
                select_config,
                no_fuzzy,
                ..CliOverrides::default()
            };
            let workspace = Workspace::open(&root, &cwd, module_info, &overrides)?;
            let adapter = adapter(yes);
            let args = FindArgs {
                references,
                clear_cache,
            };
            emit(&run_find(&workspace, &args, adapter.as_ref())?)
        }
        Command::Suggest {
            name,
            profile,
            max_distance,
        } => {
            let overrides = CliOverrides {
                profile: profile.map(FuzzyProfile::from),
                max_distance,
                ..CliOverrides::default()
            };
            let workspace = Workspace::open(&root, &cwd, module_info, &overrides)?;
            emit(&run_suggest(&workspace, &name, &NonInteractiveAdapter::new()))
        }
        Command::Classify { reference } => emit(&run_classify(&reference)),
        Command::Entries { file } => {
            let workspace = Workspace::open(&root, &cwd, module_info, &CliOverrides::default())?;
            emit(&run_entries(&workspace, &file, adapter(false).as_ref())?)
        }
        Command::HostUnitTests { dir } => {
            let workspace = Workspace::open(&root, &cwd, module_info, &CliOverrides::default())?;
            emit(&run_host_unit_tests(
                &workspace,
                dir.as_deref(),
                &NonInteractiveAdapter::new(),
            ))
        }
    }
}

/// Prompts go to the terminal only when one is attached and `--yes` is off.
fn adapter(assume_yes: bool) -> Box<dyn InteractionAdapter> {
    if assume_yes {
        Box::new(NonInteractiveAdapter::assume_yes())
    } else if io::stdin().is_terminal() && io::stderr().is_terminal() {
        Box::new(TerminalAdapter::stdio())
    } else {
        Box::new(NonInteractiveAdapter::new())
    }
}

fn emit<T: serde::Serialize>(response: &T) -> Result<(), TestfindError> {
    emit_response(response, &mut io::stdout()).map_err(|e| TestfindError::internal(e.to_string()))?;
    let _ = io::stdout().flush();
    Ok(())
}
