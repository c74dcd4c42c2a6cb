use std::fmt;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ScorecardConfig;
use crate::error::{ScorecardError, SourceError};
use crate::model::{AreaSelector, DateWindow, HouseholdRegistryEntry, LedgerRecord};
use crate::pipeline::{analyze_records, EngineMode};
use crate::pool::run_indexed;
use crate::reference::PopulationReference;
use crate::registry::RegistrySnapshot;
use crate::report::HouseholdAnalysisReport;
use crate::request::AreaRequest;
use crate::source::LedgerSource;
use crate::summary::{compute_batch_statistics, BatchStatistics};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipKind {
    SourceUnavailable,
    InvalidRange,
    UnknownHousehold,
    InsufficientData,
    /// Analysis ran but the report could not be put together.
    AssemblyFailed,
    Cancelled,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable => write!(f, "source-unavailable"),
            Self::InvalidRange => write!(f, "invalid-range"),
            Self::UnknownHousehold => write!(f, "unknown-household"),
            Self::InsufficientData => write!(f, "insufficient-data"),
            Self::AssemblyFailed => write!(f, "assembly-failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedHousehold {
    pub household_code: String,
    pub reason: String,
    pub kind: SkipKind,
}

impl SkippedHousehold {
    fn from_source(household_code: &str, err: &SourceError) -> Self {
        let kind = match err {
            SourceError::Unavailable(_) => SkipKind::SourceUnavailable,
            SourceError::InvalidRange { .. } => SkipKind::InvalidRange,
            SourceError::UnknownHousehold(_) => SkipKind::UnknownHousehold,
        };
        Self {
            household_code: household_code.to_string(),
            reason: err.to_string(),
            kind,
        }
    }

    fn from_analysis(household_code: &str, err: &ScorecardError) -> Self {
        let kind = match err {
            ScorecardError::Source(e) => return Self::from_source(household_code, e),
            ScorecardError::InsufficientData { .. } => SkipKind::InsufficientData,
            _ => SkipKind::AssemblyFailed,
        };
        Self {
            household_code: household_code.to_string(),
            reason: err.to_string(),
            kind,
        }
    }

    fn cancelled(household_code: &str) -> Self {
        Self {
            household_code: household_code.to_string(),
            reason: "batch cancelled before this household was analyzed".into(),
            kind: SkipKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaInfo {
    pub area: AreaSelector,
    pub requested_households: usize,
    pub analyzed_households: usize,
    pub skipped_households: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaReportMetadata {
    pub area_info: AreaInfo,
    pub generated_at: DateTime<Utc>,
    pub window: DateWindow,
    /// The run was cancelled; unstarted households are listed as skipped.
    pub cancelled: bool,
    pub engine_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaAnalysisReport {
    pub report_metadata: AreaReportMetadata,
    pub batch_statistics: BatchStatistics,
    /// Registry order.
    pub household_results: Vec<HouseholdAnalysisReport>,
    /// Registry order.
    pub skipped: Vec<SkippedHousehold>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the per-household pipeline across an area on a bounded worker pool.
pub struct BatchOrchestrator<'a> {
    source: &'a dyn LedgerSource,
    config: &'a ScorecardConfig,
}

struct Fetched {
    lookup: Result<HouseholdRegistryEntry, SourceError>,
    records: Result<Vec<LedgerRecord>, SourceError>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(source: &'a dyn LedgerSource, config: &'a ScorecardConfig) -> Self {
        Self { source, config }
    }

    pub fn run(
        &self,
        request: &AreaRequest,
        today: NaiveDate,
        cancel: Option<&AtomicBool>,
    ) -> Result<AreaAnalysisReport, ScorecardError> {
        self.run_at(request, today, cancel, Utc::now())
    }

    /// Like [`run`](Self::run) with an explicit report timestamp.
    pub fn run_at(
        &self,
        request: &AreaRequest,
        today: NaiveDate,
        cancel: Option<&AtomicBool>,
        generated_at: DateTime<Utc>,
    ) -> Result<AreaAnalysisReport, ScorecardError> {
        let (area, window) = request.validate(today)?;
        let workers = self.config.batch.workers;

        let codes = self.source.resolve_households(&area)?;
        info!(
            "batch over {area} ({window}): {} households, {workers} workers",
            codes.len()
        );

        // Fetch phase: registry entry and records for every household.
        let fetched = run_indexed(&codes, workers, cancel, |code| Fetched {
            lookup: self.source.lookup_household(code),
            records: self.source.query_records(code, &window),
        });

        let snapshot = RegistrySnapshot::from_lookups(
            codes
                .iter()
                .zip(&fetched)
                .filter_map(|(code, f)| f.as_ref().map(|f| (code.clone(), f.lookup.clone()))),
        );
        let reference = PopulationReference::build(
            fetched
                .iter()
                .flatten()
                .filter_map(|f| f.records.as_ref().ok())
                .map(Vec::as_slice),
            &self.config.profile,
        );
        info!(
            "reference built from {} households, {} registry failures",
            reference.household_count(),
            snapshot.failures()
        );

        // Analysis phase: households whose fetch finished.
        let units: Vec<(usize, &String)> = codes
            .iter()
            .enumerate()
            .filter(|(i, _)| fetched[*i].is_some())
            .collect();
        let analyzed = run_indexed(&units, workers, cancel, |(index, code)| {
            let Some(fetch) = fetched[*index].as_ref() else {
                return Err(SkippedHousehold::cancelled(code));
            };
            self.analyze_one(code, fetch, &snapshot, &window, &reference, generated_at)
        });

        let mut outcomes: Vec<Option<Result<HouseholdAnalysisReport, SkippedHousehold>>> =
            (0..codes.len()).map(|_| None).collect();
        for ((index, _), outcome) in units.iter().zip(analyzed) {
            outcomes[*index] = outcome;
        }

        let mut household_results = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = false;
        for (code, outcome) in codes.iter().zip(outcomes) {
            match outcome {
                Some(Ok(report)) => household_results.push(report),
                Some(Err(skip)) => {
                    warn!("skipping household {code}: {}", skip.reason);
                    skipped.push(skip);
                }
                None => {
                    cancelled = true;
                    skipped.push(SkippedHousehold::cancelled(code));
                }
            }
        }

        let batch_statistics = compute_batch_statistics(&household_results);
        info!(
            "batch over {area} done: {} analyzed, {} skipped{}",
            household_results.len(),
            skipped.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(AreaAnalysisReport {
            report_metadata: AreaReportMetadata {
                area_info: AreaInfo {
                    area,
                    requested_households: codes.len(),
                    analyzed_households: household_results.len(),
                    skipped_households: skipped.len(),
                },
                generated_at,
                window,
                cancelled,
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            batch_statistics,
            household_results,
            skipped,
        })
    }

    fn analyze_one(
        &self,
        code: &str,
        fetch: &Fetched,
        snapshot: &RegistrySnapshot,
        window: &DateWindow,
        reference: &PopulationReference,
        generated_at: DateTime<Utc>,
    ) -> Result<HouseholdAnalysisReport, SkippedHousehold> {
        let entry = match snapshot.get(code) {
            Some(Ok(entry)) => entry,
            Some(Err(e)) => return Err(SkippedHousehold::from_source(code, e)),
            None => return Err(SkippedHousehold::cancelled(code)),
        };
        let records = fetch
            .records
            .as_ref()
            .map_err(|e| SkippedHousehold::from_source(code, e))?;

        if records.is_empty() {
            let err = ScorecardError::InsufficientData {
                household_code: code.to_string(),
                start: window.start(),
                end: window.end(),
            };
            return Err(SkippedHousehold::from_analysis(code, &err));
        }

        analyze_records(
            entry,
            records,
            window,
            reference,
            self.config,
            EngineMode::Sequential,
            generated_at,
        )
        .map_err(|e| SkippedHousehold::from_analysis(code, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::model::Direction;
    use crate::pool::cancel_token;
    use crate::source::InMemoryLedger;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(code: &str, village: &str) -> HouseholdRegistryEntry {
        HouseholdRegistryEntry {
            household_code: code.into(),
            head_name: format!("Head {code}"),
            village_name: village.into(),
            town_name: "Liangxiang".into(),
            population: 2,
        }
    }

    fn month_of_spend(code: &str, base: f64) -> Vec<LedgerRecord> {
        (1..=20)
            .map(|day| LedgerRecord {
                record_id: format!("{code}-{day:02}"),
                household_code: code.into(),
                date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                category_code: "3101".into(),
                item_name: String::new(),
                amount: base + day as f64,
                direction: Direction::Expense,
                coded: true,
            })
            .collect()
    }

    fn request() -> AreaRequest {
        AreaRequest::new(AreaSelector::Village("Qinghe".into())).between(d("2024-01-01"), d("2024-01-31"))
    }

    #[test]
    fn empty_households_are_skipped_as_insufficient() {
        let mut records = month_of_spend("H1", 40.0);
        records.extend(month_of_spend("H3", 50.0));
        let ledger = InMemoryLedger::new(
            vec![entry("H3", "Qinghe"), entry("H2", "Qinghe"), entry("H1", "Qinghe")],
            records,
        );
        let config = ScorecardConfig::default();
        let report = BatchOrchestrator::new(&ledger, &config)
            .run(&request(), d("2024-06-01"), None)
            .unwrap();

        let codes: Vec<&str> = report.household_results.iter().map(|r| r.household_code()).collect();
        assert_eq!(codes, vec!["H3", "H1"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].household_code, "H2");
        assert_eq!(report.skipped[0].kind, SkipKind::InsufficientData);
        assert_eq!(report.report_metadata.area_info.requested_households, 3);
        assert!(!report.report_metadata.cancelled);

        // All-food months.
        let profiles = &report.batch_statistics.profile_stats;
        assert_eq!(profiles.structure_distribution["basic-living"], 2);
        assert_eq!(profiles.lifestyle_distribution["simple-living"], 2);
    }

    #[test]
    fn one_source_failure_in_five() {
        struct FailsFor<'a> {
            inner: &'a InMemoryLedger,
            code: &'static str,
        }
        impl LedgerSource for FailsFor<'_> {
            fn query_records(&self, code: &str, window: &DateWindow) -> Result<Vec<LedgerRecord>, SourceError> {
                if code == self.code {
                    return Err(SourceError::Unavailable("connection reset".into()));
                }
                self.inner.query_records(code, window)
            }
            fn resolve_households(&self, area: &AreaSelector) -> Result<Vec<String>, SourceError> {
                self.inner.resolve_households(area)
            }
            fn lookup_household(&self, code: &str) -> Result<HouseholdRegistryEntry, SourceError> {
                self.inner.lookup_household(code)
            }
        }

        let mut records = Vec::new();
        let mut registry = Vec::new();
        for i in 1..=5 {
            let code = format!("H{i}");
            records.extend(month_of_spend(&code, 30.0 + 10.0 * i as f64));
            registry.push(entry(&code, "Qinghe"));
        }
        let ledger = InMemoryLedger::new(registry, records);
        let source = FailsFor { inner: &ledger, code: "H3" };
        let config = ScorecardConfig::default();
        let report = BatchOrchestrator::new(&source, &config)
            .run(&request(), d("2024-06-01"), None)
            .unwrap();

        assert_eq!(report.household_results.len(), 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].household_code, "H3");
        assert_eq!(report.skipped[0].kind, SkipKind::SourceUnavailable);
        assert_eq!(report.batch_statistics.analyzed_households, 4);
        let graded: usize = report.batch_statistics.quality_stats.grade_distribution.values().sum();
        assert_eq!(graded, 4);
    }

    #[test]
    fn cancelled_batch_accounts_for_every_household() {
        let mut records = Vec::new();
        let mut registry = Vec::new();
        for i in 0..6 {
            let code = format!("H{i}");
            records.extend(month_of_spend(&code, 40.0 + i as f64));
            registry.push(entry(&code, "Qinghe"));
        }
        let ledger = InMemoryLedger::new(registry, records);
        let config = ScorecardConfig::default();
        let cancel = cancel_token();
        cancel.store(true, Ordering::Relaxed);

        let report = BatchOrchestrator::new(&ledger, &config)
            .run(&request(), d("2024-06-01"), Some(&*cancel))
            .unwrap();
        assert!(report.report_metadata.cancelled);
        assert!(report.household_results.is_empty());
        assert_eq!(report.skipped.len(), 6);
        assert!(report.skipped.iter().all(|s| s.kind == SkipKind::Cancelled));
    }

    #[test]
    fn empty_area_gives_empty_report() {
        let ledger = InMemoryLedger::new(vec![entry("H1", "Dongshan")], month_of_spend("H1", 40.0));
        let config = ScorecardConfig::default();
        let report = BatchOrchestrator::new(&ledger, &config)
            .run(&request(), d("2024-06-01"), None)
            .unwrap();
        assert!(report.household_results.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.batch_statistics.analyzed_households, 0);
    }

    #[test]
    fn invalid_area_is_fatal() {
        let ledger = InMemoryLedger::default();
        let config = ScorecardConfig::default();
        let err = BatchOrchestrator::new(&ledger, &config)
            .run(&AreaRequest::new(AreaSelector::Town(String::new())), d("2024-06-01"), None)
            .unwrap_err();
        assert!(matches!(err, ScorecardError::InvalidParameter(_)));
    }

    #[test]
    fn analysis_errors_map_to_skip_kinds() {
        let missing = SkippedHousehold::from_analysis("H1", &ScorecardError::MissingSection("quality"));
        assert_eq!(missing.kind, SkipKind::AssemblyFailed);
        assert_eq!(missing.reason, "report section missing: quality");
        assert_eq!(missing.kind.to_string(), "assembly-failed");
        assert_eq!(serde_json::to_value(missing.kind).unwrap(), "assembly-failed");

        let empty = ScorecardError::InsufficientData {
            household_code: "H1".into(),
            start: d("2024-01-01"),
            end: d("2024-06-01"),
        };
        assert_eq!(SkippedHousehold::from_analysis("H1", &empty).kind, SkipKind::InsufficientData);

        let source = ScorecardError::Source(SourceError::Unavailable("db down".into()));
        assert_eq!(SkippedHousehold::from_analysis("H1", &source).kind, SkipKind::SourceUnavailable);
    }
}
