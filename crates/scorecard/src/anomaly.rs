use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AnomalyConfig;
use crate::model::{Direction, LedgerRecord};
use crate::reference::PopulationReference;
use crate::stats::round2;

/// Spreads at or below this are treated as "all amounts equal".
const MIN_SPREAD: f64 = 1e-9;

const FREQUENCY_CONTRIBUTION: f64 = 0.5;
const RARE_CONTRIBUTION: f64 = 0.2;
const AMOUNT_CONTRIBUTION: f64 = 0.5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyReason {
    AmountOutlier,
    FrequencyOutlier,
    CategoryRare,
}

impl fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmountOutlier => write!(f, "amount-outlier"),
            Self::FrequencyOutlier => write!(f, "frequency-outlier"),
            Self::CategoryRare => write!(f, "category-rare"),
        }
    }
}

/// Declared most severe first, so ascending order lists high before low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub record_id: String,
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
    pub direction: Direction,
    pub reason: AnomalyReason,
    pub severity: Severity,
    /// Standard score of the amount, amount outliers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub count: usize,
    /// 0-100, higher is worse.
    pub score: f64,
    pub type_distribution: BTreeMap<String, usize>,
    pub severity_distribution: BTreeMap<String, usize>,
}

/// Every flagged record plus the aggregate stats.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyOutcome {
    pub records: Vec<AnomalyRecord>,
    pub stats: AnomalyStats,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Flag outlying records of one household against population statistics.
/// Deterministic: the same records and reference always give the same output.
pub fn detect_anomalies(
    records: &[LedgerRecord],
    reference: &PopulationReference,
    config: &AnomalyConfig,
) -> AnomalyOutcome {
    let mut flagged: Vec<(AnomalyRecord, f64)> = Vec::new();

    let judge_rarity = reference.reference_records() >= config.rare_min_population;

    for r in records.iter().filter(|r| r.coded && r.amount > 0.0) {
        let key = r.category_key();

        if let Some(stats) = reference.amount_stats(&key) {
            let usable = stats.count >= config.min_reference_samples
                && stats.std_dev.is_finite()
                && stats.std_dev > MIN_SPREAD;
            if usable {
                let z = (r.amount - stats.mean).abs() / stats.std_dev;
                if z.is_finite() && z > config.amount_sigma {
                    let severity = if z > config.extreme_sigma {
                        Severity::High
                    } else {
                        Severity::Medium
                    };
                    let contribution =
                        AMOUNT_CONTRIBUTION * (z / config.amount_sigma).min(config.severity_cap);
                    flagged.push((
                        anomaly(r, AnomalyReason::AmountOutlier, severity, Some(round2(z))),
                        contribution,
                    ));
                }
            }
        }

        if judge_rarity && reference.category_share(&key) < config.rare_category_share {
            flagged.push((
                anomaly(r, AnomalyReason::CategoryRare, Severity::Low, None),
                RARE_CONTRIBUTION,
            ));
        }
    }

    for r in crowded_days(records, config.max_same_day_per_category) {
        flagged.push((
            anomaly(r, AnomalyReason::FrequencyOutlier, Severity::Medium, None),
            FREQUENCY_CONTRIBUTION,
        ));
    }

    // One finding per record: amount beats frequency beats rarity.
    let mut per_record: BTreeMap<String, (AnomalyRecord, f64)> = BTreeMap::new();
    for (a, contribution) in flagged {
        match per_record.get(&a.record_id) {
            Some((kept, _)) if kept.reason <= a.reason => {}
            _ => {
                per_record.insert(a.record_id.clone(), (a, contribution));
            }
        }
    }

    let contributions: Vec<f64> = per_record.values().map(|(_, c)| *c).collect();
    let score = anomaly_score(&contributions, records.len(), config);

    let mut out: Vec<AnomalyRecord> = per_record.into_values().map(|(a, _)| a).collect();
    out.sort_by(detail_order);

    let mut type_distribution = BTreeMap::new();
    let mut severity_distribution = BTreeMap::new();
    for a in &out {
        *type_distribution.entry(a.reason.to_string()).or_insert(0) += 1;
        *severity_distribution.entry(a.severity.to_string()).or_insert(0) += 1;
    }

    debug!(
        "anomalies: {} flagged over {} records, score {score}",
        out.len(),
        records.len()
    );

    AnomalyOutcome {
        stats: AnomalyStats {
            count: out.len(),
            score,
            type_distribution,
            severity_distribution,
        },
        records: out,
    }
}

/// Saturating score: 100·(1 − e^(−P/saturation)) where P is the summed
/// contribution per 100 records, the record count floored at `record_floor`.
pub fn anomaly_score(contributions: &[f64], record_count: usize, config: &AnomalyConfig) -> f64 {
    if contributions.is_empty() {
        return 0.0;
    }
    let denominator = record_count.max(config.record_floor) as f64;
    let pressure = 100.0 * contributions.iter().sum::<f64>() / denominator;
    let score = 100.0 * (1.0 - (-pressure / config.saturation).exp());
    round2(score.clamp(0.0, 100.0))
}

/// One representative per (date, category code) group holding more than
/// `limit` coded records: the largest, earliest id on ties.
fn crowded_days(records: &[LedgerRecord], limit: usize) -> Vec<&LedgerRecord> {
    let mut groups: BTreeMap<(NaiveDate, &str), Vec<&LedgerRecord>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.coded) {
        groups
            .entry((r.date, r.category_code.as_str()))
            .or_default()
            .push(r);
    }

    groups
        .into_values()
        .filter(|group| group.len() > limit)
        .filter_map(|group| {
            group.into_iter().reduce(|best, r| {
                match r.amount.total_cmp(&best.amount) {
                    Ordering::Greater => r,
                    Ordering::Equal if r.record_id < best.record_id => r,
                    _ => best,
                }
            })
        })
        .collect()
}

fn anomaly(
    r: &LedgerRecord,
    reason: AnomalyReason,
    severity: Severity,
    deviation: Option<f64>,
) -> AnomalyRecord {
    AnomalyRecord {
        record_id: r.record_id.clone(),
        date: r.date,
        category: r.category_code.clone(),
        amount: r.amount,
        direction: r.direction,
        reason,
        severity,
        deviation,
    }
}

/// Severity first, then larger amounts, then date, record id and reason.
fn detail_order(a: &AnomalyRecord, b: &AnomalyRecord) -> Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| b.amount.total_cmp(&a.amount))
        .then_with(|| a.date.cmp(&b.date))
        .then_with(|| a.record_id.cmp(&b.record_id))
        .then_with(|| a.reason.cmp(&b.reason))
}
