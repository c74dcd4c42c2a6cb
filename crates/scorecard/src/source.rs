use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{ScorecardError, SourceError};
use crate::model::{AreaSelector, DateWindow, Direction, HouseholdRegistryEntry, LedgerRecord};

/// Read-only access to ledger records and the household registry.
///
/// Implementations are shared across batch workers, so they must be `Sync`.
/// Calls may block; the engine never retries a failed call.
pub trait LedgerSource: Sync {
    /// Records of one household inside the window, ordered by date then
    /// record id.
    fn query_records(
        &self,
        household_code: &str,
        window: &DateWindow,
    ) -> Result<Vec<LedgerRecord>, SourceError>;

    /// Household codes in the area, in registry order.
    fn resolve_households(&self, area: &AreaSelector) -> Result<Vec<String>, SourceError>;

    fn lookup_household(&self, household_code: &str) -> Result<HouseholdRegistryEntry, SourceError>;
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// A `LedgerSource` over pre-loaded records and registry entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    registry: Vec<HouseholdRegistryEntry>,
    records: BTreeMap<String, Vec<LedgerRecord>>,
}

impl InMemoryLedger {
    pub fn new(registry: Vec<HouseholdRegistryEntry>, records: Vec<LedgerRecord>) -> Self {
        let mut by_household: BTreeMap<String, Vec<LedgerRecord>> = BTreeMap::new();
        for record in records {
            by_household
                .entry(record.household_code.clone())
                .or_default()
                .push(record);
        }
        for rows in by_household.values_mut() {
            rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.record_id.cmp(&b.record_id)));
        }
        Self {
            registry,
            records: by_household,
        }
    }

    /// Build from a ledger CSV and a registry CSV.
    pub fn from_csv(ledger_csv: &str, registry_csv: &str) -> Result<Self, ScorecardError> {
        let records = load_ledger_csv(ledger_csv)?;
        let registry = load_registry_csv(registry_csv)?;
        Ok(Self::new(registry, records))
    }

    pub fn household_count(&self) -> usize {
        self.registry.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

impl LedgerSource for InMemoryLedger {
    fn query_records(
        &self,
        household_code: &str,
        window: &DateWindow,
    ) -> Result<Vec<LedgerRecord>, SourceError> {
        Ok(self
            .records
            .get(household_code)
            .map(|rows| {
                rows.iter()
                    .filter(|r| window.contains(r.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn resolve_households(&self, area: &AreaSelector) -> Result<Vec<String>, SourceError> {
        Ok(self
            .registry
            .iter()
            .filter(|entry| match area {
                AreaSelector::Village(name) => &entry.village_name == name,
                AreaSelector::Town(name) => &entry.town_name == name,
            })
            .map(|entry| entry.household_code.clone())
            .collect())
    }

    fn lookup_household(&self, household_code: &str) -> Result<HouseholdRegistryEntry, SourceError> {
        self.registry
            .iter()
            .find(|entry| entry.household_code == household_code)
            .cloned()
            .ok_or_else(|| SourceError::UnknownHousehold(household_code.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

const LEDGER_FILE: &str = "ledger";
const REGISTRY_FILE: &str = "registry";

struct CsvTable {
    file: &'static str,
    headers: Vec<String>,
    rows: Vec<(u64, csv::StringRecord)>,
}

impl CsvTable {
    fn read(file: &'static str, data: &str) -> Result<Self, ScorecardError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ScorecardError::Io(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ScorecardError::Io(e.to_string()))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows.push((line, record));
        }
        Ok(Self { file, headers, rows })
    }

    fn idx(&self, name: &str) -> Result<usize, ScorecardError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ScorecardError::MissingColumn {
                file: self.file,
                column: name.into(),
            })
    }

    fn bad_row(&self, line: u64, message: String) -> ScorecardError {
        ScorecardError::InvalidRecord {
            file: self.file,
            line,
            message,
        }
    }
}

/// Parse ledger rows: `record_id, household_code, date, category_code,
/// item_name, amount, direction, coded`.
pub fn load_ledger_csv(data: &str) -> Result<Vec<LedgerRecord>, ScorecardError> {
    let table = CsvTable::read(LEDGER_FILE, data)?;

    let record_id_idx = table.idx("record_id")?;
    let household_idx = table.idx("household_code")?;
    let date_idx = table.idx("date")?;
    let category_idx = table.idx("category_code")?;
    let item_idx = table.idx("item_name")?;
    let amount_idx = table.idx("amount")?;
    let direction_idx = table.idx("direction")?;
    let coded_idx = table.idx("coded")?;

    let mut records = Vec::with_capacity(table.rows.len());

    for (line, row) in &table.rows {
        let line = *line;
        let field = |i: usize| row.get(i).unwrap_or("");

        let record_id = field(record_id_idx).to_string();
        if record_id.is_empty() {
            return Err(table.bad_row(line, "empty record_id".into()));
        }
        let household_code = field(household_idx).to_string();
        if household_code.is_empty() {
            return Err(table.bad_row(line, format!("record '{record_id}': empty household_code")));
        }

        let date_str = field(date_idx);
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
            table.bad_row(line, format!("record '{record_id}': cannot parse date '{date_str}'"))
        })?;

        let amount_str = field(amount_idx);
        let amount: f64 = amount_str
            .parse()
            .ok()
            .filter(|a: &f64| a.is_finite() && *a >= 0.0)
            .ok_or_else(|| {
                table.bad_row(
                    line,
                    format!("record '{record_id}': amount must be a non-negative number, got '{amount_str}'"),
                )
            })?;

        let direction = parse_direction(field(direction_idx)).ok_or_else(|| {
            table.bad_row(
                line,
                format!("record '{record_id}': unknown direction '{}'", field(direction_idx)),
            )
        })?;

        let coded = parse_flag(field(coded_idx)).ok_or_else(|| {
            table.bad_row(
                line,
                format!("record '{record_id}': cannot parse coded flag '{}'", field(coded_idx)),
            )
        })?;

        records.push(LedgerRecord {
            record_id,
            household_code,
            date,
            category_code: field(category_idx).to_string(),
            item_name: field(item_idx).to_string(),
            amount,
            direction,
            coded,
        });
    }

    Ok(records)
}

/// Parse registry rows: `household_code, head_name, village_name, town_name,
/// population`. Row order is registry order.
pub fn load_registry_csv(data: &str) -> Result<Vec<HouseholdRegistryEntry>, ScorecardError> {
    let table = CsvTable::read(REGISTRY_FILE, data)?;

    let code_idx = table.idx("household_code")?;
    let head_idx = table.idx("head_name")?;
    let village_idx = table.idx("village_name")?;
    let town_idx = table.idx("town_name")?;
    let population_idx = table.idx("population")?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for (line, row) in &table.rows {
        let field = |i: usize| row.get(i).unwrap_or("");
        let household_code = field(code_idx).to_string();
        if household_code.is_empty() {
            return Err(table.bad_row(*line, "empty household_code".into()));
        }
        let population_str = field(population_idx);
        let population: u32 = population_str.parse().map_err(|_| {
            table.bad_row(
                *line,
                format!("household '{household_code}': cannot parse population '{population_str}'"),
            )
        })?;
        entries.push(HouseholdRegistryEntry {
            household_code,
            head_name: field(head_idx).to_string(),
            village_name: field(village_idx).to_string(),
            town_name: field(town_idx).to_string(),
            population,
        });
    }
    Ok(entries)
}

fn parse_direction(value: &str) -> Option<Direction> {
    match value.to_ascii_lowercase().as_str() {
        "income" | "in" | "1" => Some(Direction::Income),
        "expense" | "out" | "2" => Some(Direction::Expense),
        _ => None,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: &str = "\
record_id,household_code,date,category_code,item_name,amount,direction,coded
r3,H1,2024-02-01,3101,rice,12.5,expense,true
r1,H1,2024-01-10,2101,salary,3000,income,1
r2,H1,2024-01-10,3201,coat,80,expense,0
r4,H2,2024-01-15,3301,rent,900,expense,true
";

    const REGISTRY: &str = "\
household_code,head_name,village_name,town_name,population
H2,Zhang Wei,Qinghe,Liangxiang,3
H1,Li Na,Qinghe,Liangxiang,4
H3,Wang Fang,Dongshan,Changyang,2
";

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(
            NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn loads_and_orders_records() {
        let ledger = InMemoryLedger::from_csv(LEDGER, REGISTRY).unwrap();
        assert_eq!(ledger.record_count(), 4);
        assert_eq!(ledger.household_count(), 3);

        let rows = ledger
            .query_records("H1", &window("2024-01-01", "2024-12-31"))
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(rows[0].direction, Direction::Income);
        assert!(!rows[1].coded);
    }

    #[test]
    fn query_respects_window() {
        let ledger = InMemoryLedger::from_csv(LEDGER, REGISTRY).unwrap();
        let rows = ledger
            .query_records("H1", &window("2024-01-01", "2024-01-31"))
            .unwrap();
        assert_eq!(rows.len(), 2);
        let none = ledger
            .query_records("H3", &window("2024-01-01", "2024-12-31"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn resolves_in_registry_order() {
        let ledger = InMemoryLedger::from_csv(LEDGER, REGISTRY).unwrap();
        let codes = ledger
            .resolve_households(&AreaSelector::Village("Qinghe".into()))
            .unwrap();
        assert_eq!(codes, vec!["H2", "H1"]);
        let town = ledger
            .resolve_households(&AreaSelector::Town("Changyang".into()))
            .unwrap();
        assert_eq!(town, vec!["H3"]);
    }

    #[test]
    fn unknown_household_lookup_fails() {
        let ledger = InMemoryLedger::from_csv(LEDGER, REGISTRY).unwrap();
        assert_eq!(ledger.lookup_household("H1").unwrap().population, 4);
        assert_eq!(
            ledger.lookup_household("H9").unwrap_err(),
            SourceError::UnknownHousehold("H9".into())
        );
    }

    #[test]
    fn missing_column_is_reported() {
        let err = load_ledger_csv("record_id,household_code,date\nr1,H1,2024-01-01\n").unwrap_err();
        assert!(matches!(err, ScorecardError::MissingColumn { .. }));
        assert!(err.to_string().contains("category_code"));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let data = "\
record_id,household_code,date,category_code,item_name,amount,direction,coded
r1,H1,2024-01-01,3101,rice,-5,expense,true
";
        let err = load_ledger_csv(data).unwrap_err();
        assert!(matches!(err, ScorecardError::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn bad_date_names_record() {
        let data = "\
record_id,household_code,date,category_code,item_name,amount,direction,coded
r9,H1,2024-13-01,3101,rice,5,expense,true
";
        let err = load_ledger_csv(data).unwrap_err();
        assert!(err.to_string().contains("r9"));
        assert!(err.to_string().contains("2024-13-01"));
    }
}
