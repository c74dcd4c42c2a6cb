use std::collections::HashMap;

use crate::error::SourceError;
use crate::model::HouseholdRegistryEntry;

/// Registry lookups for one batch run, taken once up front and read-only
/// afterwards. Failed lookups are kept so every worker sees the same answer.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: HashMap<String, Result<HouseholdRegistryEntry, SourceError>>,
}

impl RegistrySnapshot {
    pub fn from_lookups<I>(lookups: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<HouseholdRegistryEntry, SourceError>)>,
    {
        Self {
            entries: lookups.into_iter().collect(),
        }
    }

    /// `None` when the code was never looked up.
    pub fn get(&self, household_code: &str) -> Option<&Result<HouseholdRegistryEntry, SourceError>> {
        self.entries.get(household_code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.values().filter(|e| e.is_err()).count()
    }
}
