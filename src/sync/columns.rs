use csv_async::StringRecord;
use std::collections::HashMap;

use super::IngestError;

/// Values of the current CSV record keyed by semantic column name.
pub type ValueMap = HashMap<&'static str, String>;

/// Matches the semantic column names a catalog needs to their positions in
/// one particular header row.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    entries: Vec<(&'static str, usize)>,
}

impl ColumnResolver {
    /// Resolves every required name against `headers`. Fails on the first
    /// name that is not present; there is no partially resolved map.
    pub fn build(
        required: &[&'static str],
        headers: &StringRecord,
    ) -> Result<Self, IngestError> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name, idx))
            .collect();

        let entries = required
            .iter()
            .map(|&name| match positions.get(name) {
                Some(&idx) => Ok((name, idx)),
                None => Err(IngestError::MissingColumn(name.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ColumnResolver { entries })
    }

    pub fn create_value_map(&self) -> ValueMap {
        self.entries
            .iter()
            .map(|(name, _)| (*name, String::new()))
            .collect()
    }

    /// Overwrites the map with the values of `record`, reusing each
    /// string's buffer.
    pub fn populate(&self, record: &StringRecord, values: &mut ValueMap) {
        for (name, idx) in &self.entries {
            let raw = record.get(*idx).unwrap_or_default();
            let slot = values.entry(*name).or_default();
            slot.clear();
            slot.push_str(raw);
        }
    }
}
