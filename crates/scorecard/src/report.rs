use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyOutcome, AnomalyRecord, AnomalyStats};
use crate::assess::ComprehensiveAssessment;
use crate::config::ReportConfig;
use crate::error::ScorecardError;
use crate::model::{DateWindow, HouseholdRegistryEntry, LedgerRecord};
use crate::profile::ConsumptionProfile;
use crate::quality::QualityScore;
use crate::stats::round2;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdBasicInfo {
    pub household_code: String,
    pub head_name: String,
    pub village_name: String,
    pub population: u32,
    pub total_income: f64,
    pub total_expenditure: f64,
    pub net_income: f64,
    pub record_count: usize,
    pub record_days: usize,
    pub recorded_months: usize,
}

impl HouseholdBasicInfo {
    /// Registry facts plus totals over the window's records.
    pub fn from_records(entry: &HouseholdRegistryEntry, records: &[LedgerRecord]) -> Self {
        let total_income: f64 = records.iter().filter(|r| r.is_income()).map(|r| r.amount).sum();
        let total_expenditure: f64 = records.iter().filter(|r| r.is_expense()).map(|r| r.amount).sum();
        let days: BTreeSet<_> = records.iter().map(|r| r.date).collect();
        let months: BTreeSet<_> = records.iter().map(|r| (r.date.year(), r.date.month())).collect();

        Self {
            household_code: entry.household_code.clone(),
            head_name: entry.head_name.clone(),
            village_name: entry.village_name.clone(),
            population: entry.population,
            total_income: round2(total_income),
            total_expenditure: round2(total_expenditure),
            net_income: round2(total_income - total_expenditure),
            record_count: records.len(),
            record_days: days.len(),
            recorded_months: months.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub stats: AnomalyStats,
    /// Most severe first, at most `max_detail_records`.
    pub details: Vec<AnomalyRecord>,
    pub details_truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataStatus {
    Sufficient,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub window: DateWindow,
    pub data_status: DataStatus,
    pub engine_version: String,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything known about one household over one window. Built once by
/// [`ReportAssembler`] and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdAnalysisReport {
    pub household_basic_info: HouseholdBasicInfo,
    pub consumption_profile: ConsumptionProfile,
    pub quality_assessment: QualityScore,
    pub comprehensive_assessment: ComprehensiveAssessment,
    pub anomaly_detection: AnomalyDetection,
    pub report_metadata: ReportMetadata,
}

impl HouseholdAnalysisReport {
    pub fn household_code(&self) -> &str {
        &self.household_basic_info.household_code
    }

    pub fn has_insufficient_data(&self) -> bool {
        self.report_metadata.data_status == DataStatus::InsufficientData
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Collects the engine outputs and packages them into a report. Every
/// section is required; a missing one fails the assembly.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    max_detail_records: usize,
    window: Option<DateWindow>,
    basic_info: Option<HouseholdBasicInfo>,
    profile: Option<ConsumptionProfile>,
    quality: Option<QualityScore>,
    anomalies: Option<AnomalyOutcome>,
    assessment: Option<ComprehensiveAssessment>,
}

impl ReportAssembler {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            max_detail_records: config.max_detail_records,
            window: None,
            basic_info: None,
            profile: None,
            quality: None,
            anomalies: None,
            assessment: None,
        }
    }

    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn basic_info(mut self, info: HouseholdBasicInfo) -> Self {
        self.basic_info = Some(info);
        self
    }

    pub fn profile(mut self, profile: ConsumptionProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn quality(mut self, quality: QualityScore) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn anomalies(mut self, anomalies: AnomalyOutcome) -> Self {
        self.anomalies = Some(anomalies);
        self
    }

    pub fn assessment(mut self, assessment: ComprehensiveAssessment) -> Self {
        self.assessment = Some(assessment);
        self
    }

    /// Assemble, stamping the report with the current time.
    pub fn assemble(self) -> Result<HouseholdAnalysisReport, ScorecardError> {
        self.assemble_at(Utc::now())
    }

    pub fn assemble_at(
        self,
        generated_at: DateTime<Utc>,
    ) -> Result<HouseholdAnalysisReport, ScorecardError> {
        let window = self.window.ok_or(ScorecardError::MissingSection("report_metadata.window"))?;
        let basic_info = self
            .basic_info
            .ok_or(ScorecardError::MissingSection("household_basic_info"))?;
        let profile = self
            .profile
            .ok_or(ScorecardError::MissingSection("consumption_profile"))?;
        let quality = self
            .quality
            .ok_or(ScorecardError::MissingSection("quality_assessment"))?;
        let anomalies = self
            .anomalies
            .ok_or(ScorecardError::MissingSection("anomaly_detection"))?;
        let assessment = self
            .assessment
            .ok_or(ScorecardError::MissingSection("comprehensive_assessment"))?;

        let data_status = if basic_info.record_count == 0 {
            DataStatus::InsufficientData
        } else {
            DataStatus::Sufficient
        };

        let mut details = anomalies.records;
        let details_truncated = details.len() > self.max_detail_records;
        details.truncate(self.max_detail_records);

        Ok(HouseholdAnalysisReport {
            household_basic_info: basic_info,
            consumption_profile: profile,
            quality_assessment: quality,
            comprehensive_assessment: assessment,
            anomaly_detection: AnomalyDetection {
                stats: anomalies.stats,
                details,
                details_truncated,
            },
            report_metadata: ReportMetadata {
                generated_at,
                window,
                data_status,
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }
}
