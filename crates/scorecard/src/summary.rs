use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grade::Grade;
use crate::report::HouseholdAnalysisReport;
use crate::stats::MetricSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityBatchStats {
    pub total_score: Option<MetricSummary>,
    /// Metric name → summary across households.
    pub metrics: BTreeMap<String, MetricSummary>,
    pub grade_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyBatchStats {
    pub score: Option<MetricSummary>,
    pub count: Option<MetricSummary>,
    pub total_anomalies: usize,
    pub type_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveBatchStats {
    pub score: Option<MetricSummary>,
    pub grade_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileBatchStats {
    pub level_distribution: BTreeMap<String, usize>,
    pub preference_distribution: BTreeMap<String, usize>,
    pub structure_distribution: BTreeMap<String, usize>,
    pub lifestyle_distribution: BTreeMap<String, usize>,
}

/// Distribution statistics over the successfully analyzed households.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub analyzed_households: usize,
    pub quality_stats: QualityBatchStats,
    pub anomaly_stats: AnomalyBatchStats,
    pub comprehensive_stats: ComprehensiveBatchStats,
    pub profile_stats: ProfileBatchStats,
}

fn empty_grade_histogram() -> BTreeMap<String, usize> {
    Grade::ALL.iter().map(|g| (g.to_string(), 0)).collect()
}

/// Compute batch statistics from household reports.
pub fn compute_batch_statistics(reports: &[HouseholdAnalysisReport]) -> BatchStatistics {
    let mut quality_totals = Vec::with_capacity(reports.len());
    let mut metric_values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut quality_grades = empty_grade_histogram();

    let mut anomaly_scores = Vec::with_capacity(reports.len());
    let mut anomaly_counts = Vec::with_capacity(reports.len());
    let mut total_anomalies = 0;
    let mut type_distribution: BTreeMap<String, usize> = BTreeMap::new();

    let mut composite_scores = Vec::with_capacity(reports.len());
    let mut composite_grades = empty_grade_histogram();

    let mut level_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut preference_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut structure_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut lifestyle_distribution: BTreeMap<String, usize> = BTreeMap::new();

    for r in reports {
        let q = &r.quality_assessment;
        quality_totals.push(q.total_score);
        for (name, value) in &q.metric_scores {
            metric_values.entry(name.clone()).or_default().push(*value);
        }
        *quality_grades.entry(q.grade.to_string()).or_insert(0) += 1;

        let a = &r.anomaly_detection.stats;
        anomaly_scores.push(a.score);
        anomaly_counts.push(a.count as f64);
        total_anomalies += a.count;
        for (reason, n) in &a.type_distribution {
            *type_distribution.entry(reason.clone()).or_insert(0) += n;
        }

        let c = &r.comprehensive_assessment;
        composite_scores.push(c.score);
        *composite_grades.entry(c.grade.to_string()).or_insert(0) += 1;

        let p = &r.consumption_profile;
        for tag in &p.level_tags {
            *level_distribution.entry(tag.to_string()).or_insert(0) += 1;
        }
        for tag in &p.preference_tags {
            *preference_distribution.entry(tag.to_string()).or_insert(0) += 1;
        }
        for tag in &p.structure_tags {
            *structure_distribution.entry(tag.to_string()).or_insert(0) += 1;
        }
        for tag in &p.lifestyle_tags {
            *lifestyle_distribution.entry(tag.to_string()).or_insert(0) += 1;
        }
    }

    BatchStatistics {
        analyzed_households: reports.len(),
        quality_stats: QualityBatchStats {
            total_score: MetricSummary::from_values(&quality_totals),
            metrics: metric_values
                .into_iter()
                .filter_map(|(name, values)| MetricSummary::from_values(&values).map(|s| (name, s)))
                .collect(),
            grade_distribution: quality_grades,
        },
        anomaly_stats: AnomalyBatchStats {
            score: MetricSummary::from_values(&anomaly_scores),
            count: MetricSummary::from_values(&anomaly_counts),
            total_anomalies,
            type_distribution,
        },
        comprehensive_stats: ComprehensiveBatchStats {
            score: MetricSummary::from_values(&composite_scores),
            grade_distribution: composite_grades,
        },
        profile_stats: ProfileBatchStats {
            level_distribution,
            preference_distribution,
            structure_distribution,
            lifestyle_distribution,
        },
    }
}
