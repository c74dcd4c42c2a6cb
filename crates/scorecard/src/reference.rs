//! Population statistics the per-household engines compare against.
//!
//! A reference is built once from the union of a population's records and
//! is read-only afterwards; batch workers share one instance by reference.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::config::ProfileConfig;
use crate::model::{AreaSelector, CategoryKey, DateWindow, ExpenseCategory, LedgerRecord};
use crate::source::LedgerSource;
use crate::stats::{mean, percentile, sort_ascending, std_dev};

/// Amount distribution of one category key across the population. Only
/// coded records with a positive amount contribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmountStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl AmountStats {
    fn from_values(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            mean: mean(values),
            std_dev: std_dev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Total-spend tier boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpendBreakpoints {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PopulationReference {
    household_count: usize,
    spending_households: usize,
    spend_breakpoints: Option<SpendBreakpoints>,
    share_thresholds: BTreeMap<ExpenseCategory, f64>,
    amount_stats: BTreeMap<CategoryKey, AmountStats>,
    reference_records: usize,
}

impl PopulationReference {
    /// Build from each household's record set.
    pub fn build<'a, I>(households: I, config: &ProfileConfig) -> Self
    where
        I: IntoIterator<Item = &'a [LedgerRecord]>,
    {
        let mut household_count = 0;
        let mut totals: Vec<f64> = Vec::new();
        let mut shares: BTreeMap<ExpenseCategory, Vec<f64>> = BTreeMap::new();
        let mut amounts: BTreeMap<CategoryKey, Vec<f64>> = BTreeMap::new();

        for records in households {
            household_count += 1;

            let mut total = 0.0;
            let mut by_category: BTreeMap<ExpenseCategory, f64> = BTreeMap::new();
            for r in records {
                if r.is_expense() {
                    total += r.amount;
                    if let Some(category) = ExpenseCategory::of(r) {
                        *by_category.entry(category).or_default() += r.amount;
                    }
                }
                if r.coded && r.amount > 0.0 {
                    amounts.entry(r.category_key()).or_default().push(r.amount);
                }
            }

            if total > 0.0 {
                totals.push(total);
                for category in ExpenseCategory::ALL {
                    let spent = by_category.get(&category).copied().unwrap_or(0.0);
                    shares.entry(category).or_default().push(spent / total);
                }
            }
        }

        sort_ascending(&mut totals);
        let spend_breakpoints = match (
            percentile(&totals, config.level_low_percentile),
            percentile(&totals, config.level_high_percentile),
        ) {
            (Some(low), Some(high)) => Some(SpendBreakpoints { low, high }),
            _ => None,
        };

        let share_thresholds = shares
            .into_iter()
            .filter_map(|(category, mut values)| {
                sort_ascending(&mut values);
                percentile(&values, config.preference_percentile).map(|t| (category, t))
            })
            .collect();

        let reference_records = amounts.values().map(Vec::len).sum();
        let amount_stats = amounts
            .into_iter()
            .map(|(key, values)| (key, AmountStats::from_values(&values)))
            .collect();

        let reference = Self {
            household_count,
            spending_households: totals.len(),
            spend_breakpoints,
            share_thresholds,
            amount_stats,
            reference_records,
        };
        debug!(
            "population reference: {} households ({} spending), {} reference records, {} category keys",
            reference.household_count,
            reference.spending_households,
            reference.reference_records,
            reference.amount_stats.len()
        );
        reference
    }

    /// Build from every household of an area. Households whose records
    /// cannot be fetched are left out of the population.
    pub fn for_area(
        source: &dyn LedgerSource,
        area: &AreaSelector,
        window: &DateWindow,
        config: &ProfileConfig,
    ) -> Result<Self, crate::error::SourceError> {
        let codes = source.resolve_households(area)?;
        let mut fetched = Vec::with_capacity(codes.len());
        for code in &codes {
            match source.query_records(code, window) {
                Ok(records) => fetched.push(records),
                Err(e) => warn!("household {code} left out of {area} reference: {e}"),
            }
        }
        Ok(Self::build(fetched.iter().map(Vec::as_slice), config))
    }

    pub fn household_count(&self) -> usize {
        self.household_count
    }

    /// Households with positive total spend.
    pub fn spending_households(&self) -> usize {
        self.spending_households
    }

    pub fn spend_breakpoints(&self) -> Option<SpendBreakpoints> {
        self.spend_breakpoints
    }

    /// Share a household must exceed to count as preferring the category.
    pub fn share_threshold(&self, category: ExpenseCategory) -> Option<f64> {
        self.share_thresholds.get(&category).copied()
    }

    pub fn amount_stats(&self, key: &CategoryKey) -> Option<&AmountStats> {
        self.amount_stats.get(key)
    }

    /// Coded, positive-amount records in the population.
    pub fn reference_records(&self) -> usize {
        self.reference_records
    }

    /// Fraction of reference records that fall under the key.
    pub fn category_share(&self, key: &CategoryKey) -> f64 {
        if self.reference_records == 0 {
            return 0.0;
        }
        let count = self.amount_stats.get(key).map(|s| s.count).unwrap_or(0);
        count as f64 / self.reference_records as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use chrono::NaiveDate;

    fn expense(id: &str, code: &str, amount: f64) -> LedgerRecord {
        LedgerRecord {
            record_id: id.into(),
            household_code: "h".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            category_code: code.into(),
            item_name: String::new(),
            amount,
            direction: Direction::Expense,
            coded: true,
        }
    }

    #[test]
    fn breakpoints_and_thresholds_from_population() {
        let a = vec![expense("a1", "3101", 100.0)];
        let b = vec![expense("b1", "3101", 100.0), expense("b2", "3301", 100.0)];
        let c = vec![expense("c1", "3301", 300.0)];
        let empty: Vec<LedgerRecord> = Vec::new();
        let reference = PopulationReference::build(
            [a.as_slice(), b.as_slice(), c.as_slice(), empty.as_slice()],
            &ProfileConfig::default(),
        );

        assert_eq!(reference.household_count(), 4);
        assert_eq!(reference.spending_households(), 3);

        // totals sorted: 100, 200, 300
        let bp = reference.spend_breakpoints().unwrap();
        assert!((bp.low - 166.0).abs() < 1e-9);
        assert!((bp.high - 232.0).abs() < 1e-9);

        // food shares sorted: 0.0, 0.5, 1.0 -> p75 = 0.75
        let food = reference.share_threshold(ExpenseCategory::Food).unwrap();
        assert!((food - 0.75).abs() < 1e-9);
        assert_eq!(reference.share_threshold(ExpenseCategory::Healthcare), Some(0.0));
    }

    #[test]
    fn amount_stats_skip_uncoded_and_zero() {
        let mut uncoded = expense("u", "3101", 999.0);
        uncoded.coded = false;
        let records = vec![
            expense("a", "3101", 10.0),
            expense("b", "3102", 30.0),
            expense("z", "3101", 0.0),
            uncoded,
        ];
        let reference = PopulationReference::build([records.as_slice()], &ProfileConfig::default());
        let key = CategoryKey {
            prefix: "31".into(),
            direction: Direction::Expense,
        };
        let stats = reference.amount_stats(&key).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.std_dev, 10.0);
        assert_eq!(reference.reference_records(), 2);
        assert_eq!(reference.category_share(&key), 1.0);
    }

    #[test]
    fn empty_population_has_no_breakpoints() {
        let reference = PopulationReference::build(
            std::iter::empty::<&[LedgerRecord]>(),
            &ProfileConfig::default(),
        );
        let key = CategoryKey {
            prefix: "31".into(),
            direction: Direction::Expense,
        };
        assert!(reference.spend_breakpoints().is_none());
        assert_eq!(reference.category_share(&key), 0.0);
    }
}
