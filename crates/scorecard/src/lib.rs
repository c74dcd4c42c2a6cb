//! `ledgerscope-scorecard`: household ledger behavior scorecards.
//!
//! Engine crate: reads ledger records through a [`LedgerSource`], profiles
//! spending, grades recording quality, flags anomalous records, and
//! assembles per-household and per-area reports. No CLI dependencies.

pub mod anomaly;
pub mod assess;
pub mod batch;
pub mod config;
pub mod error;
pub mod grade;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod profile;
pub mod quality;
pub mod reference;
pub mod registry;
pub mod report;
pub mod request;
pub mod source;
pub mod stats;
pub mod summary;

pub use batch::{AreaAnalysisReport, BatchOrchestrator, SkipKind, SkippedHousehold};
pub use config::ScorecardConfig;
pub use error::{ScorecardError, SourceError};
pub use grade::Grade;
pub use model::{AreaSelector, DateWindow, Direction, HouseholdRegistryEntry, LedgerRecord};
pub use pipeline::{analyze_household, analyze_household_with_reference};
pub use pool::{cancel_token, CancelToken};
pub use report::HouseholdAnalysisReport;
pub use request::{AreaRequest, HouseholdRequest};
pub use source::{InMemoryLedger, LedgerSource};
