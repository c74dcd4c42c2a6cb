//! `lscope config`: check and print scorecard settings.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use ledgerscope_scorecard::ScorecardConfig;

use crate::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a scorecard config without running anything
    #[command(after_help = "\
Examples:
  lscope config validate scorecard.toml")]
    Validate {
        /// Path to the scorecard TOML file
        config: PathBuf,
    },

    /// Print the built-in defaults as TOML
    #[command(after_help = "\
Examples:
  lscope config defaults > scorecard.toml")]
    Defaults,
}

pub fn cmd_config(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Validate { config } => {
            load_config(&config)?;
            eprintln!("{}: ok", config.display());
            Ok(())
        }
        ConfigCommands::Defaults => {
            let text = ScorecardConfig::default().to_toml()?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<ScorecardConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    ScorecardConfig::from_toml(&text).map_err(CliError::from)
}
