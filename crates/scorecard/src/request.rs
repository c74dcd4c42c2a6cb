//! Validation of raw analysis requests. Nothing downstream runs until a
//! request has passed through here.

use chrono::{Datelike, NaiveDate};

use crate::error::ScorecardError;
use crate::model::{AreaSelector, DateWindow};

const MAX_CODE_LEN: usize = 32;

/// Which end of the window a partial date bound fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdRequest {
    pub household_code: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaRequest {
    pub area: AreaSelector,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl HouseholdRequest {
    pub fn new(household_code: impl Into<String>) -> Self {
        Self {
            household_code: household_code.into(),
            start: None,
            end: None,
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Checked household code and resolved window. `today` fills in open
    /// bounds.
    pub fn validate(&self, today: NaiveDate) -> Result<(String, DateWindow), ScorecardError> {
        let code = validate_household_code(&self.household_code)?;
        let window = resolve_window(self.start, self.end, today)?;
        Ok((code, window))
    }
}

impl AreaRequest {
    pub fn new(area: AreaSelector) -> Self {
        Self {
            area,
            start: None,
            end: None,
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(AreaSelector, DateWindow), ScorecardError> {
        let name = self.area.name().trim();
        if name.is_empty() {
            return Err(ScorecardError::InvalidParameter(
                "area name must not be empty".into(),
            ));
        }
        let area = match &self.area {
            AreaSelector::Village(_) => AreaSelector::Village(name.to_string()),
            AreaSelector::Town(_) => AreaSelector::Town(name.to_string()),
        };
        let window = resolve_window(self.start, self.end, today)?;
        Ok((area, window))
    }
}

pub fn validate_household_code(code: &str) -> Result<String, ScorecardError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ScorecardError::InvalidParameter(
            "household code must not be empty".into(),
        ));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(ScorecardError::InvalidParameter(format!(
            "household code '{code}' is longer than {MAX_CODE_LEN} characters"
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ScorecardError::InvalidParameter(format!(
            "household code '{code}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(code.to_string())
}

/// Fill open bounds: no start means January 1 of the end's year, no end
/// means `today`.
pub fn resolve_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<DateWindow, ScorecardError> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => first_of_year(end.year())?,
    };
    DateWindow::new(start, end)
}

/// Parse `YYYY-MM-DD`, or `YYYY-MM` expanded to the first or last day of the
/// month depending on the side.
pub fn parse_date_bound(text: &str, side: BoundSide) -> Result<NaiveDate, ScorecardError> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }

    let invalid = || {
        ScorecardError::InvalidParameter(format!(
            "cannot parse date '{text}' (expected YYYY-MM-DD or YYYY-MM)"
        ))
    };
    let (year, month) = text.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    match side {
        BoundSide::Start => Ok(first),
        BoundSide::End => last_of_month(first).ok_or_else(invalid),
    }
}

fn first_of_year(year: i32) -> Result<NaiveDate, ScorecardError> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| ScorecardError::InvalidParameter(format!("year {year} out of range")))
}

fn last_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}
