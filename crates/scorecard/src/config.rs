use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ScorecardError;

const WEIGHT_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every tunable of the scorecard pipeline. Missing sections take their
/// defaults; the defaults always validate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorecardConfig {
    pub grades: GradeThresholds,
    pub quality: QualityConfig,
    pub profile: ProfileConfig,
    pub anomaly: AnomalyConfig,
    pub assessment: AssessmentConfig,
    pub report: ReportConfig,
    pub batch: BatchConfig,
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

/// Inclusive lower bounds for each grade, strictly descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradeThresholds {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
    pub poor: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 75.0,
            average: 60.0,
            poor: 40.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Recording quality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Consistency reported when only one month has records.
    pub single_month_consistency: f64,
    pub weights: QualityWeights,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            single_month_consistency: 60.0,
            weights: QualityWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityWeights {
    pub completeness: f64,
    pub frequency: f64,
    pub consistency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.4,
            frequency: 0.3,
            consistency: 0.3,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.completeness + self.frequency + self.consistency
    }

    /// Metric name → weight, keyed the same way as the metric scores.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("completeness".to_string(), self.completeness),
            ("frequency".to_string(), self.frequency),
            ("consistency".to_string(), self.consistency),
        ])
    }
}

// ---------------------------------------------------------------------------
// Consumption profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Percentile of population total spend separating low from medium.
    pub level_low_percentile: f64,
    /// Percentile separating medium from high.
    pub level_high_percentile: f64,
    /// Population percentile a category share must exceed to fire a tag.
    pub preference_percentile: f64,
    /// Absolute share floor for preference tags.
    pub min_preference_share: f64,
    /// Spend on items matching a pet keyword above this fires pet-owning.
    pub pet_spend_floor: f64,
    /// Case-insensitive substrings of item names.
    pub pet_keywords: Vec<String>,
    /// Item-name substrings marking connectivity spend (phone, data, broadband).
    pub digital_keywords: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            level_low_percentile: 0.33,
            level_high_percentile: 0.66,
            preference_percentile: 0.75,
            min_preference_share: 0.05,
            pet_spend_floor: 500.0,
            pet_keywords: ["pet", "cat food", "cat litter", "dog food", "veterinary", "宠物"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            digital_keywords: ["通信", "网络", "流量", "话费", "宽带", "broadband", "mobile data", "phone bill"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Anomaly detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyConfig {
    /// Standard scores above this flag an amount outlier.
    pub amount_sigma: f64,
    /// Standard scores above this make the outlier high severity.
    pub extreme_sigma: f64,
    /// Cap on an amount outlier's z / amount_sigma multiplier.
    pub severity_cap: f64,
    /// Reference samples a category key needs before amounts are judged.
    pub min_reference_samples: usize,
    /// Same-day same-category record count above which the day is flagged.
    pub max_same_day_per_category: usize,
    /// Category keys below this share of reference records are rare.
    pub rare_category_share: f64,
    /// Reference size needed before rarity is judged at all.
    pub rare_min_population: usize,
    /// Pressure at which the score reaches 1 - 1/e of its ceiling.
    pub saturation: f64,
    /// Record count floor for the pressure denominator.
    pub record_floor: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            amount_sigma: 2.0,
            extreme_sigma: 3.0,
            severity_cap: 2.0,
            min_reference_samples: 10,
            max_same_day_per_category: 5,
            rare_category_share: 0.01,
            rare_min_population: 200,
            saturation: 10.0,
            record_floor: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Composite assessment, report, batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssessmentConfig {
    pub quality_weight: f64,
    pub anomaly_weight: f64,
    /// Anomaly scores above this add a review suggestion.
    pub review_anomaly_score: f64,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            quality_weight: 0.6,
            anomaly_weight: 0.4,
            review_anomaly_score: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Anomaly detail records kept in a report.
    pub max_detail_records: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_detail_records: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

pub const MAX_WORKERS: usize = 64;

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

fn invalid(msg: impl Into<String>) -> ScorecardError {
    ScorecardError::Configuration(msg.into())
}

fn check_fraction(name: &str, value: f64) -> Result<(), ScorecardError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), ScorecardError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(format!("{name} must be a positive number, got {value}")));
    }
    Ok(())
}

fn check_weight_sum(name: &str, sum: f64) -> Result<(), ScorecardError> {
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(invalid(format!("{name} must sum to 1, got {sum}")));
    }
    Ok(())
}

impl ScorecardConfig {
    pub fn from_toml(input: &str) -> Result<Self, ScorecardError> {
        let config: ScorecardConfig =
            toml::from_str(input).map_err(|e| ScorecardError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ScorecardError> {
        toml::to_string_pretty(self).map_err(|e| ScorecardError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ScorecardError> {
        self.grades.validate()?;

        // Quality
        let w = &self.quality.weights;
        check_fraction("quality.weights.completeness", w.completeness)?;
        check_fraction("quality.weights.frequency", w.frequency)?;
        check_fraction("quality.weights.consistency", w.consistency)?;
        check_weight_sum("quality.weights", w.sum())?;
        let single = self.quality.single_month_consistency;
        if !(0.0..=100.0).contains(&single) {
            return Err(invalid(format!(
                "quality.single_month_consistency must be within [0, 100], got {single}"
            )));
        }

        // Profile
        let p = &self.profile;
        check_fraction("profile.level_low_percentile", p.level_low_percentile)?;
        check_fraction("profile.level_high_percentile", p.level_high_percentile)?;
        if p.level_low_percentile >= p.level_high_percentile {
            return Err(invalid(format!(
                "profile.level_low_percentile ({}) must be below level_high_percentile ({})",
                p.level_low_percentile, p.level_high_percentile
            )));
        }
        check_fraction("profile.preference_percentile", p.preference_percentile)?;
        check_fraction("profile.min_preference_share", p.min_preference_share)?;
        if !(p.pet_spend_floor.is_finite() && p.pet_spend_floor >= 0.0) {
            return Err(invalid(format!(
                "profile.pet_spend_floor must be non-negative, got {}",
                p.pet_spend_floor
            )));
        }
        if p.pet_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid("profile.pet_keywords must not contain empty keywords"));
        }
        if p.digital_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid("profile.digital_keywords must not contain empty keywords"));
        }

        // Anomaly
        let a = &self.anomaly;
        check_positive("anomaly.amount_sigma", a.amount_sigma)?;
        check_positive("anomaly.extreme_sigma", a.extreme_sigma)?;
        if a.extreme_sigma < a.amount_sigma {
            return Err(invalid(format!(
                "anomaly.extreme_sigma ({}) must not be below amount_sigma ({})",
                a.extreme_sigma, a.amount_sigma
            )));
        }
        check_positive("anomaly.severity_cap", a.severity_cap)?;
        check_positive("anomaly.saturation", a.saturation)?;
        check_fraction("anomaly.rare_category_share", a.rare_category_share)?;
        if a.min_reference_samples < 2 {
            return Err(invalid("anomaly.min_reference_samples must be at least 2"));
        }
        if a.max_same_day_per_category == 0 {
            return Err(invalid("anomaly.max_same_day_per_category must be at least 1"));
        }
        if a.record_floor == 0 {
            return Err(invalid("anomaly.record_floor must be at least 1"));
        }

        // Assessment
        let s = &self.assessment;
        check_fraction("assessment.quality_weight", s.quality_weight)?;
        check_fraction("assessment.anomaly_weight", s.anomaly_weight)?;
        check_weight_sum("assessment weights", s.quality_weight + s.anomaly_weight)?;
        if !(0.0..=100.0).contains(&s.review_anomaly_score) {
            return Err(invalid(format!(
                "assessment.review_anomaly_score must be within [0, 100], got {}",
                s.review_anomaly_score
            )));
        }

        // Batch
        if self.batch.workers == 0 || self.batch.workers > MAX_WORKERS {
            return Err(invalid(format!(
                "batch.workers must be between 1 and {MAX_WORKERS}, got {}",
                self.batch.workers
            )));
        }

        Ok(())
    }
}

impl GradeThresholds {
    pub fn validate(&self) -> Result<(), ScorecardError> {
        let ordered = [
            ("excellent", self.excellent),
            ("good", self.good),
            ("average", self.average),
            ("poor", self.poor),
        ];
        for (name, value) in ordered {
            if !(value > 0.0 && value <= 100.0) {
                return Err(invalid(format!(
                    "grades.{name} must be within (0, 100], got {value}"
                )));
            }
        }
        for pair in ordered.windows(2) {
            let (upper_name, upper) = pair[0];
            let (lower_name, lower) = pair[1];
            if upper <= lower {
                return Err(invalid(format!(
                    "grades.{upper_name} ({upper}) must be above grades.{lower_name} ({lower})"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
