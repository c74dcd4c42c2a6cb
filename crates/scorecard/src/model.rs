use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ScorecardError;

// ---------------------------------------------------------------------------
// Ledger input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "income"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

/// One transaction from a household's ledger. Amount is a non-negative
/// magnitude; the direction says which side of the books it sits on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub record_id: String,
    pub household_code: String,
    pub date: NaiveDate,
    pub category_code: String,
    #[serde(default)]
    pub item_name: String,
    pub amount: f64,
    pub direction: Direction,
    /// Category classification has been finalized.
    pub coded: bool,
}

impl LedgerRecord {
    /// Two-digit category prefix, e.g. `31` for `3101`.
    pub fn category_prefix(&self) -> &str {
        self.category_code.get(..2).unwrap_or(&self.category_code)
    }

    pub fn is_expense(&self) -> bool {
        self.direction == Direction::Expense
    }

    pub fn is_income(&self) -> bool {
        self.direction == Direction::Income
    }

    /// Key used to look up reference amount statistics.
    pub fn category_key(&self) -> CategoryKey {
        CategoryKey {
            prefix: self.category_prefix().to_string(),
            direction: self.direction,
        }
    }
}

/// Reference statistics are pooled per (two-digit prefix, direction).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryKey {
    pub prefix: String,
    pub direction: Direction,
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix, self.direction)
    }
}

// ---------------------------------------------------------------------------
// Standard categories
// ---------------------------------------------------------------------------

/// The eight standard consumption categories, keyed by two-digit code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpenseCategory {
    Food,
    Clothing,
    Housing,
    HouseholdGoods,
    TransportCommunication,
    EducationRecreation,
    Healthcare,
    OtherGoods,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 8] = [
        Self::Food,
        Self::Clothing,
        Self::Housing,
        Self::HouseholdGoods,
        Self::TransportCommunication,
        Self::EducationRecreation,
        Self::Healthcare,
        Self::OtherGoods,
    ];

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "31" => Some(Self::Food),
            "32" => Some(Self::Clothing),
            "33" => Some(Self::Housing),
            "34" => Some(Self::HouseholdGoods),
            "35" => Some(Self::TransportCommunication),
            "36" => Some(Self::EducationRecreation),
            "37" => Some(Self::Healthcare),
            "38" => Some(Self::OtherGoods),
            _ => None,
        }
    }

    /// Category of a coded expense record; `None` for income, uncoded or
    /// non-standard codes.
    pub fn of(record: &LedgerRecord) -> Option<Self> {
        if !record.coded || !record.is_expense() {
            return None;
        }
        Self::from_prefix(record.category_prefix())
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Food => "food",
            Self::Clothing => "clothing",
            Self::Housing => "housing",
            Self::HouseholdGoods => "household-goods",
            Self::TransportCommunication => "transport-communication",
            Self::EducationRecreation => "education-recreation",
            Self::Healthcare => "healthcare",
            Self::OtherGoods => "other-goods",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeSource {
    Wage,
    Business,
    Property,
    Transfer,
}

impl IncomeSource {
    pub fn of(record: &LedgerRecord) -> Option<Self> {
        if !record.coded || !record.is_income() {
            return None;
        }
        match record.category_prefix() {
            "21" => Some(Self::Wage),
            "22" => Some(Self::Business),
            "23" => Some(Self::Property),
            "24" => Some(Self::Transfer),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Request scope
// ---------------------------------------------------------------------------

/// Inclusive analysis window. Construction guarantees `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ScorecardError> {
        if start > end {
            return Err(ScorecardError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Calendar days in the window, both ends included.
    pub fn calendar_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    /// Calendar months touched by the window.
    pub fn calendar_months(&self) -> u32 {
        let months = |d: NaiveDate| d.year() * 12 + d.month0() as i32;
        (months(self.end) - months(self.start)) as u32 + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "name", rename_all = "snake_case")]
pub enum AreaSelector {
    Village(String),
    Town(String),
}

impl AreaSelector {
    pub fn name(&self) -> &str {
        match self {
            Self::Village(name) | Self::Town(name) => name,
        }
    }
}

impl fmt::Display for AreaSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Village(name) => write!(f, "village '{name}'"),
            Self::Town(name) => write!(f, "town '{name}'"),
        }
    }
}

/// Registry facts about a household, as held by the ledger source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdRegistryEntry {
    pub household_code: String,
    pub head_name: String,
    pub village_name: String,
    pub town_name: String,
    pub population: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(code: &str, direction: Direction, coded: bool) -> LedgerRecord {
        LedgerRecord {
            record_id: "r1".into(),
            household_code: "h1".into(),
            date: date("2024-01-05"),
            category_code: code.into(),
            item_name: String::new(),
            amount: 10.0,
            direction,
            coded,
        }
    }

    #[test]
    fn window_counts_days_and_months() {
        let w = DateWindow::new(date("2024-01-15"), date("2024-03-02")).unwrap();
        assert_eq!(w.calendar_days(), 48);
        assert_eq!(w.calendar_months(), 3);
        assert!(w.contains(date("2024-02-29")));
        assert!(!w.contains(date("2024-03-03")));
    }

    #[test]
    fn window_across_year_boundary() {
        let w = DateWindow::new(date("2023-11-01"), date("2024-02-10")).unwrap();
        assert_eq!(w.calendar_months(), 4);
    }

    #[test]
    fn window_rejects_inverted_range() {
        let err = DateWindow::new(date("2024-02-01"), date("2024-01-01")).unwrap_err();
        assert!(matches!(err, ScorecardError::InvalidRange { .. }));
    }

    #[test]
    fn categories_from_codes() {
        assert_eq!(
            ExpenseCategory::of(&record("3102", Direction::Expense, true)),
            Some(ExpenseCategory::Food)
        );
        assert_eq!(ExpenseCategory::of(&record("3102", Direction::Expense, false)), None);
        assert_eq!(ExpenseCategory::of(&record("2101", Direction::Income, true)), None);
        assert_eq!(
            IncomeSource::of(&record("2201", Direction::Income, true)),
            Some(IncomeSource::Business)
        );
    }

    #[test]
    fn short_codes_use_whole_code_as_prefix() {
        let r = record("3", Direction::Expense, true);
        assert_eq!(r.category_prefix(), "3");
        assert_eq!(r.category_key().to_string(), "3_expense");
    }

    #[test]
    fn area_selector_serializes_tagged() {
        let json = serde_json::to_string(&AreaSelector::Town("Liangxiang".into())).unwrap();
        assert_eq!(json, r#"{"level":"town","name":"Liangxiang"}"#);
    }
}
