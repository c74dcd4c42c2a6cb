use chrono::NaiveDate;
use thiserror::Error;

/// Failures reported by a [`LedgerSource`](crate::source::LedgerSource).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The backing store could not be reached or returned garbage.
    #[error("ledger source unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the requested window.
    #[error("invalid date range {start}..={end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// No registry entry exists for the household.
    #[error("unknown household '{0}'")]
    UnknownHousehold(String),
}

#[derive(Debug, Error)]
pub enum ScorecardError {
    /// Malformed household code, area selector or date bound.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Window start after window end.
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// No ledger records in the analysis window.
    #[error("household '{household_code}': no ledger records between {start} and {end}")]
    InsufficientData {
        household_code: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Weights or thresholds that fail validation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The report assembler was handed an incomplete set of results.
    #[error("report section missing: {0}")]
    MissingSection(&'static str),
    /// Missing required column in a CSV input.
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: &'static str, column: String },
    /// A CSV row that cannot be turned into a record.
    #[error("{file}, line {line}: {message}")]
    InvalidRecord {
        file: &'static str,
        line: u64,
        message: String,
    },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ScorecardError {
    /// True for errors caused by the ledger source rather than the caller.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}
