//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `lscope` exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad args, invalid code or date range)   |
//! | 3    | Invalid scorecard configuration                      |
//! | 4    | Ledger source unavailable or household unknown       |
//! | 5    | Input files unreadable or malformed                  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`scorecard_exit_code`]

use ledgerscope_scorecard::ScorecardError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed household code or dates.
pub const EXIT_USAGE: u8 = 2;

/// Configuration file fails to parse or validate.
pub const EXIT_CONFIG: u8 = 3;

/// The ledger source could not answer (unavailable, unknown household).
pub const EXIT_SOURCE: u8 = 4;

/// Ledger or registry file missing, unreadable, or malformed.
pub const EXIT_INPUT: u8 = 5;

/// Map a library error to its exit code.
pub fn scorecard_exit_code(err: &ScorecardError) -> u8 {
    match err {
        ScorecardError::InvalidParameter(_) | ScorecardError::InvalidRange { .. } => EXIT_USAGE,
        ScorecardError::ConfigParse(_) | ScorecardError::Configuration(_) => EXIT_CONFIG,
        ScorecardError::Source(_) => EXIT_SOURCE,
        ScorecardError::MissingColumn { .. } | ScorecardError::InvalidRecord { .. } | ScorecardError::Io(_) => {
            EXIT_INPUT
        }
        ScorecardError::InsufficientData { .. } | ScorecardError::MissingSection(_) => EXIT_ERROR,
    }
}
