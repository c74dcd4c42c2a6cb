use std::panic;
use std::thread;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};

use crate::anomaly::detect_anomalies;
use crate::assess::{assess, AssessmentContext};
use crate::config::ScorecardConfig;
use crate::error::ScorecardError;
use crate::model::{AreaSelector, DateWindow, HouseholdRegistryEntry, LedgerRecord};
use crate::profile::build_profile;
use crate::quality::assess_quality;
use crate::reference::PopulationReference;
use crate::report::{HouseholdAnalysisReport, HouseholdBasicInfo, ReportAssembler};
use crate::request::HouseholdRequest;
use crate::source::LedgerSource;

/// How the three independent engines are scheduled for one household.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// One scoped thread per engine, joined before assessment.
    Parallel,
    /// Engines run one after the other on the calling thread.
    Sequential,
}

/// Run profile, quality and anomaly engines over one household's records,
/// assess, and assemble the report.
pub fn analyze_records(
    entry: &HouseholdRegistryEntry,
    records: &[LedgerRecord],
    window: &DateWindow,
    reference: &PopulationReference,
    config: &ScorecardConfig,
    mode: EngineMode,
    generated_at: DateTime<Utc>,
) -> Result<HouseholdAnalysisReport, ScorecardError> {
    let profile_job = || build_profile(records, reference, &config.profile);
    let quality_job = || assess_quality(records, window, &config.quality, &config.grades);
    let anomaly_job = || detect_anomalies(records, reference, &config.anomaly);

    let (profile, quality, anomalies) = match mode {
        EngineMode::Sequential => (profile_job(), quality_job(), anomaly_job()),
        EngineMode::Parallel => thread::scope(|scope| {
            let profile = scope.spawn(profile_job);
            let quality = scope.spawn(quality_job);
            let anomalies = scope.spawn(anomaly_job);
            (
                profile.join().unwrap_or_else(|e| panic::resume_unwind(e)),
                quality.join().unwrap_or_else(|e| panic::resume_unwind(e)),
                anomalies.join().unwrap_or_else(|e| panic::resume_unwind(e)),
            )
        }),
    };

    let assessment = assess(
        quality.total_score,
        anomalies.stats.score,
        AssessmentContext {
            no_records: records.is_empty(),
            insufficient_profile: profile.has_insufficient_data(),
            quality_suggestions: &quality.suggestions,
        },
        &config.assessment,
        &config.grades,
    );

    debug!(
        "household {}: quality {} ({}), anomaly score {}, composite {} ({})",
        entry.household_code,
        quality.total_score,
        quality.grade,
        anomalies.stats.score,
        assessment.score,
        assessment.grade
    );

    ReportAssembler::new(&config.report)
        .window(*window)
        .basic_info(HouseholdBasicInfo::from_records(entry, records))
        .profile(profile)
        .quality(quality)
        .anomalies(anomalies)
        .assessment(assessment)
        .assemble_at(generated_at)
}

/// Analyze one household, comparing it against the rest of its village.
///
/// Parameters are checked before the source is touched. Source failures are
/// returned as errors; an empty window still yields a report flagged as
/// insufficient data.
pub fn analyze_household(
    source: &dyn LedgerSource,
    request: &HouseholdRequest,
    today: NaiveDate,
    config: &ScorecardConfig,
) -> Result<HouseholdAnalysisReport, ScorecardError> {
    let (code, window) = request.validate(today)?;
    let entry = source.lookup_household(&code)?;
    let reference = PopulationReference::for_area(
        source,
        &AreaSelector::Village(entry.village_name.clone()),
        &window,
        &config.profile,
    )?;
    analyze_household_with_reference(source, &entry, &window, &reference, config)
}

/// Analyze one already-resolved household against a caller-supplied
/// reference.
pub fn analyze_household_with_reference(
    source: &dyn LedgerSource,
    entry: &HouseholdRegistryEntry,
    window: &DateWindow,
    reference: &PopulationReference,
    config: &ScorecardConfig,
) -> Result<HouseholdAnalysisReport, ScorecardError> {
    let records = source.query_records(&entry.household_code, window)?;
    info!(
        "analyzing household {} over {window}: {} records",
        entry.household_code,
        records.len()
    );
    analyze_records(
        entry,
        &records,
        window,
        reference,
        config,
        EngineMode::Parallel,
        Utc::now(),
    )
}
