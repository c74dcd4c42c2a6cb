use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{GradeThresholds, QualityConfig, QualityWeights};
use crate::grade::Grade;
use crate::model::{DateWindow, LedgerRecord};
use crate::stats::{mean, round2};

const FREQUENCY_HINT_BELOW: f64 = 70.0;
const CONSISTENCY_HINT_BELOW: f64 = 80.0;
const CODED_SHARE_HINT_BELOW: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suggestion {
    IncreaseRecordingFrequency,
    RecordEveryMonth,
    KeepRecordsSteady,
    CompleteCategoryCoding,
    ReviewFlaggedRecords,
    RecordMoreData,
}

/// Raw metric scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub frequency: f64,
    pub consistency: f64,
}

impl QualityMetrics {
    pub const ZERO: QualityMetrics = QualityMetrics {
        completeness: 0.0,
        frequency: 0.0,
        consistency: 0.0,
    };

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("completeness".to_string(), round2(self.completeness)),
            ("frequency".to_string(), round2(self.frequency)),
            ("consistency".to_string(), round2(self.consistency)),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordingCoverage {
    pub record_count: usize,
    pub recorded_months: u32,
    pub expected_months: u32,
    pub recorded_days: u32,
    pub calendar_days: u32,
    /// Share of records with a finalized category code.
    pub coded_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub grade: Grade,
    pub total_score: f64,
    pub metric_scores: BTreeMap<String, f64>,
    pub metric_weights: BTreeMap<String, f64>,
    pub coverage: RecordingCoverage,
    pub suggestions: Vec<Suggestion>,
}

/// Weighted total of the metrics and its grade.
pub fn score_metrics(
    metrics: &QualityMetrics,
    weights: &QualityWeights,
    grades: &GradeThresholds,
) -> (f64, Grade) {
    let total = metrics.completeness * weights.completeness
        + metrics.frequency * weights.frequency
        + metrics.consistency * weights.consistency;
    let total = round2(total.clamp(0.0, 100.0));
    (total, Grade::from_score(total, grades))
}

/// Score how completely and regularly the household keeps its books over the
/// window. Records are expected to lie inside the window.
pub fn assess_quality(
    records: &[LedgerRecord],
    window: &DateWindow,
    config: &QualityConfig,
    grades: &GradeThresholds,
) -> QualityScore {
    let coverage = coverage(records, window);
    let metrics = if records.is_empty() {
        QualityMetrics::ZERO
    } else {
        QualityMetrics {
            completeness: ratio_score(coverage.recorded_months, coverage.expected_months),
            frequency: ratio_score(coverage.recorded_days, coverage.calendar_days),
            consistency: consistency(records, config.single_month_consistency),
        }
    };

    let (total_score, grade) = score_metrics(&metrics, &config.weights, grades);
    debug!(
        "quality: completeness={:.2} frequency={:.2} consistency={:.2} total={total_score} grade={grade}",
        metrics.completeness, metrics.frequency, metrics.consistency
    );

    QualityScore {
        grade,
        total_score,
        metric_scores: metrics.to_map(),
        metric_weights: config.weights.to_map(),
        coverage,
        suggestions: suggestions(&metrics, &coverage),
    }
}

fn coverage(records: &[LedgerRecord], window: &DateWindow) -> RecordingCoverage {
    let months: BTreeSet<(i32, u32)> = records
        .iter()
        .map(|r| (r.date.year(), r.date.month()))
        .collect();
    let days: BTreeSet<_> = records.iter().map(|r| r.date).collect();
    let coded = records.iter().filter(|r| r.coded).count();

    RecordingCoverage {
        record_count: records.len(),
        recorded_months: months.len() as u32,
        expected_months: window.calendar_months(),
        recorded_days: days.len() as u32,
        calendar_days: window.calendar_days(),
        coded_share: if records.is_empty() {
            0.0
        } else {
            coded as f64 / records.len() as f64
        },
    }
}

fn ratio_score(observed: u32, expected: u32) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    (observed as f64 / expected as f64 * 100.0).min(100.0)
}

/// 100·(1 − D) floored at 0, with D the mean squared month-over-month change
/// in spend over the squared mean monthly spend.
fn consistency(records: &[LedgerRecord], single_month: f64) -> f64 {
    let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for r in records {
        let spent = monthly.entry((r.date.year(), r.date.month())).or_default();
        if r.is_expense() {
            *spent += r.amount;
        }
    }
    if monthly.len() < 2 {
        return single_month;
    }

    let totals: Vec<f64> = monthly.into_values().collect();
    let monthly_mean = mean(&totals);
    if monthly_mean <= 0.0 {
        return 100.0;
    }
    let squared_deltas: Vec<f64> = totals
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).powi(2))
        .collect();
    let dispersion = mean(&squared_deltas) / (monthly_mean * monthly_mean);
    (100.0 * (1.0 - dispersion)).max(0.0)
}

fn suggestions(metrics: &QualityMetrics, coverage: &RecordingCoverage) -> Vec<Suggestion> {
    let mut out = Vec::new();
    if metrics.frequency < FREQUENCY_HINT_BELOW {
        out.push(Suggestion::IncreaseRecordingFrequency);
    }
    if metrics.completeness < 100.0 {
        out.push(Suggestion::RecordEveryMonth);
    }
    if metrics.consistency < CONSISTENCY_HINT_BELOW {
        out.push(Suggestion::KeepRecordsSteady);
    }
    if coverage.record_count > 0 && coverage.coded_share < CODED_SHARE_HINT_BELOW {
        out.push(Suggestion::CompleteCategoryCoding);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn spend(id: &str, date: &str, amount: f64) -> LedgerRecord {
        LedgerRecord {
            record_id: id.into(),
            household_code: "h".into(),
            date: d(date),
            category_code: "3101".into(),
            item_name: String::new(),
            amount,
            direction: Direction::Expense,
            coded: true,
        }
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(d(start), d(end)).unwrap()
    }

    #[test]
    fn weighted_total_of_known_metrics() {
        let metrics = QualityMetrics {
            completeness: 100.0,
            frequency: 95.0,
            consistency: 90.0,
        };
        let (total, grade) = score_metrics(
            &metrics,
            &QualityWeights::default(),
            &GradeThresholds::default(),
        );
        assert!((total - 95.5).abs() < 1e-9);
        assert_eq!(grade, Grade::Excellent);
    }

    #[test]
    fn zero_records_score_zero_and_very_poor() {
        let score = assess_quality(
            &[],
            &window("2024-01-01", "2024-03-31"),
            &QualityConfig::default(),
            &GradeThresholds::default(),
        );
        assert_eq!(score.total_score, 0.0);
        assert_eq!(score.grade, Grade::VeryPoor);
        assert!(score.metric_scores.values().all(|v| *v == 0.0));
        let weight_sum: f64 = score.metric_weights.values().sum();
        assert!((weight_sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn completeness_and_frequency_from_coverage() {
        // 2 of 3 months, 4 distinct days of 91.
        let records = vec![
            spend("a", "2024-01-02", 100.0),
            spend("b", "2024-01-02", 20.0),
            spend("c", "2024-01-20", 30.0),
            spend("d", "2024-03-05", 100.0),
            spend("e", "2024-03-06", 50.0),
        ];
        let score = assess_quality(
            &records,
            &window("2024-01-01", "2024-03-31"),
            &QualityConfig::default(),
            &GradeThresholds::default(),
        );
        assert_eq!(score.coverage.recorded_months, 2);
        assert_eq!(score.coverage.expected_months, 3);
        assert_eq!(score.coverage.recorded_days, 4);
        assert_eq!(score.coverage.calendar_days, 91);
        assert_eq!(score.metric_scores["completeness"], 66.67);
        assert_eq!(score.metric_scores["frequency"], 4.4);
        // Equal monthly spend, so no month-over-month change.
        assert_eq!(score.metric_scores["consistency"], 100.0);
        assert!(score.suggestions.contains(&Suggestion::IncreaseRecordingFrequency));
        assert!(score.suggestions.contains(&Suggestion::RecordEveryMonth));
    }

    #[test]
    fn single_month_uses_fixed_consistency() {
        let records = vec![spend("a", "2024-01-02", 100.0)];
        let score = assess_quality(
            &records,
            &window("2024-01-01", "2024-01-31"),
            &QualityConfig::default(),
            &GradeThresholds::default(),
        );
        assert_eq!(score.metric_scores["consistency"], 60.0);
        assert_eq!(score.metric_scores["completeness"], 100.0);
    }

    #[test]
    fn consistency_drops_with_monthly_swings() {
        // Monthly totals 100, 300: mean 200, one delta of 200.
        // D = 200^2 / 200^2 = 1 -> consistency 0.
        let records = vec![spend("a", "2024-01-02", 100.0), spend("b", "2024-02-02", 300.0)];
        assert_eq!(consistency(&records, 60.0), 0.0);

        // 100, 110, 100: mean 103.33, deltas 10, -10 -> D = 100 / 10677.8
        let records = vec![
            spend("a", "2024-01-02", 100.0),
            spend("b", "2024-02-02", 110.0),
            spend("c", "2024-03-02", 100.0),
        ];
        let c = consistency(&records, 60.0);
        assert!((c - 99.0635).abs() < 1e-3, "got {c}");
    }

    #[test]
    fn uncoded_records_suggest_coding() {
        let mut records = vec![spend("a", "2024-01-02", 100.0), spend("b", "2024-01-03", 100.0)];
        records[1].coded = false;
        let score = assess_quality(
            &records,
            &window("2024-01-01", "2024-01-31"),
            &QualityConfig::default(),
            &GradeThresholds::default(),
        );
        assert_eq!(score.coverage.coded_share, 0.5);
        assert!(score.suggestions.contains(&Suggestion::CompleteCategoryCoding));
    }

    #[test]
    fn total_stays_within_bounds() {
        let metrics = QualityMetrics {
            completeness: 100.0,
            frequency: 100.0,
            consistency: 100.0,
        };
        let (total, grade) = score_metrics(
            &metrics,
            &QualityWeights::default(),
            &GradeThresholds::default(),
        );
        assert_eq!(total, 100.0);
        assert_eq!(grade, Grade::Excellent);
    }
}
