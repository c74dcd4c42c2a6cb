// lscope - household ledger scorecards from the command line

mod analyze;
mod exit_codes;
mod settings;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ledgerscope_scorecard::{ScorecardError, SourceError};

use analyze::{AreaArgs, HouseholdArgs};
use exit_codes::{scorecard_exit_code, EXIT_ERROR, EXIT_INPUT, EXIT_SUCCESS, EXIT_USAGE};
use settings::ConfigCommands;

#[derive(Parser)]
#[command(name = "lscope")]
#[command(about = "Household ledger profiles, bookkeeping quality and anomaly scorecards")]
#[command(long_version = LONG_VERSION)]
#[command(version)]
struct Cli {
    /// Log batch progress to stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one household against the rest of its village
    #[command(after_help = "\
Examples:
  lscope household H03 --ledger ledger.csv --registry registry.csv
  lscope household H03 --ledger ledger.csv --registry registry.csv --start 2024-01 --end 2024-03 --json
  lscope household H03 --ledger ledger.csv --registry registry.csv --config scorecard.toml -o h03.json")]
    Household(HouseholdArgs),

    /// Score every household in a village or town
    #[command(after_help = "\
Examples:
  lscope area --village Qinghe --ledger ledger.csv --registry registry.csv
  lscope area --town Liangxiang --ledger ledger.csv --registry registry.csv --workers 8 --json
  lscope area --town Liangxiang --ledger ledger.csv --registry registry.csv --time-limit 30 -o town.json")]
    Area(AreaArgs),

    /// Inspect scorecard configuration files
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Version, commit, cargo profile and target triple, stamped by build.rs.
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("LSCOPE_COMMIT"), ")",
    "\nprofile: ", env!("LSCOPE_PROFILE"),
    "\ntarget:  ", env!("LSCOPE_TARGET"),
);

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) if verbose => {
            builder.filter_level(log::LevelFilter::Info);
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Warn);
        }
    }
    builder.init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Household(args) => analyze::cmd_household(args),
        Commands::Area(args) => analyze::cmd_area(args),
        Commands::Config(cmd) => settings::cmd_config(cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ScorecardError> for CliError {
    fn from(err: ScorecardError) -> Self {
        let hint = match &err {
            ScorecardError::Source(SourceError::UnknownHousehold(_)) => {
                Some("check the household code against the registry file".to_string())
            }
            ScorecardError::Configuration(_) | ScorecardError::ConfigParse(_) => {
                Some("run `lscope config defaults` for a valid starting point".to_string())
            }
            ScorecardError::InvalidRange { .. } => Some("--start must not be after --end".to_string()),
            _ => None,
        };
        Self { code: scorecard_exit_code(&err), message: err.to_string(), hint }
    }
}
