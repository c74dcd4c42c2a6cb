use serde::{Deserialize, Serialize};

use crate::config::{AssessmentConfig, GradeThresholds};
use crate::grade::Grade;
use crate::quality::Suggestion;
use crate::stats::round2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weighted quality total.
    pub quality_component: f64,
    /// Weighted anomaly-free share, i.e. weight · (100 − anomaly score).
    pub anomaly_component: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAssessment {
    pub grade: Grade,
    pub score: f64,
    pub description: String,
    pub score_breakdown: ScoreBreakdown,
    pub suggestions: Vec<Suggestion>,
}

/// What the assessor needs to know about the household besides the scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentContext<'a> {
    /// The window held no ledger records at all.
    pub no_records: bool,
    /// The profile could not place the household in a spend tier.
    pub insufficient_profile: bool,
    pub quality_suggestions: &'a [Suggestion],
}

/// Composite score: quality weight · quality + anomaly weight · (100 − anomaly).
pub fn composite_score(quality_total: f64, anomaly_score: f64, config: &AssessmentConfig) -> ScoreBreakdown {
    ScoreBreakdown {
        quality_component: round2(config.quality_weight * quality_total),
        anomaly_component: round2(config.anomaly_weight * (100.0 - anomaly_score)),
    }
}

/// Combine bookkeeping quality and anomaly pressure into one graded verdict.
pub fn assess(
    quality_total: f64,
    anomaly_score: f64,
    context: AssessmentContext<'_>,
    config: &AssessmentConfig,
    grades: &GradeThresholds,
) -> ComprehensiveAssessment {
    // Nothing to grade in an empty window.
    let (breakdown, score, grade, description) = if context.no_records {
        (
            ScoreBreakdown {
                quality_component: 0.0,
                anomaly_component: 0.0,
            },
            0.0,
            Grade::VeryPoor,
            "Insufficient data: no ledger records were found in the analysis window.".to_string(),
        )
    } else {
        let breakdown = composite_score(quality_total, anomaly_score, config);
        let raw = config.quality_weight * quality_total + config.anomaly_weight * (100.0 - anomaly_score);
        let score = round2(raw.clamp(0.0, 100.0));
        let grade = Grade::from_score(score, grades);
        (breakdown, score, grade, describe(grade, score))
    };

    let mut suggestions = context.quality_suggestions.to_vec();
    if anomaly_score > config.review_anomaly_score {
        suggestions.push(Suggestion::ReviewFlaggedRecords);
    }
    if context.insufficient_profile {
        suggestions.push(Suggestion::RecordMoreData);
    }
    suggestions.sort();
    suggestions.dedup();

    ComprehensiveAssessment {
        grade,
        score,
        description,
        score_breakdown: breakdown,
        suggestions,
    }
}

fn describe(grade: Grade, score: f64) -> String {
    match grade {
        Grade::Excellent => format!(
            "Excellent bookkeeping (composite score {score:.2}): records are complete and reliable with very few anomalies."
        ),
        Grade::Good => format!(
            "Good bookkeeping (composite score {score:.2}): records are largely reliable with a small number of anomalies."
        ),
        Grade::Average => format!(
            "Average bookkeeping (composite score {score:.2}): the data is usable but gaps or anomalies need attention."
        ),
        Grade::Poor => format!(
            "Poor bookkeeping (composite score {score:.2}): records are patchy and anomalies are frequent."
        ),
        Grade::VeryPoor => format!(
            "Very poor bookkeeping (composite score {score:.2}): the records cannot be relied on without review."
        ),
    }
}
