//! Population / density lookup for the non-absolute units

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::Deserialize;

use crate::config::Demographic;
use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demographics {
    pub population: f64,
    /// People per square kilometre
    pub density: f64,
}

/// Name -> ID -> figures, with a case-insensitive prefix fallback
#[derive(Debug, Clone, Default)]
pub struct PopulationTable {
    ids: HashMap<String, String>,
    records: HashMap<String, Demographics>,
    /// Lowercased record name -> ID, ordered for deterministic prefix matches
    by_lower_name: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PopulationRecord {
    name: String,
    id: String,
    population: f64,
    density: f64,
}

impl PopulationTable {
    pub fn from_demographics(entries: &[Demographic]) -> Self {
        let mut table = PopulationTable::default();
        for entry in entries {
            table.insert(&entry.name, &entry.id, entry.population, entry.density);
            for alias in &entry.aliases {
                table.ids.insert(alias.clone(), entry.id.clone());
            }
        }
        table
    }

    /// Parse a `name,id,population,density` CSV
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut table = PopulationTable::default();
        for record in rdr.deserialize::<PopulationRecord>() {
            let r = record?;
            table.insert(&r.name, &r.id, r.population, r.density);
        }
        Ok(table)
    }

    fn insert(&mut self, name: &str, id: &str, population: f64, density: f64) {
        self.ids.insert(name.to_string(), id.to_string());
        self.by_lower_name
            .insert(name.to_lowercase(), id.to_string());
        self.records.insert(
            id.to_string(),
            Demographics {
                population,
                density,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact name or alias first, then case-insensitive. As a last resort a
    /// single record whose name extends `name` at a word boundary
    /// ("Congo" -> "Congo (Brazzaville)"). Ambiguous or partial-word matches
    /// resolve to nothing.
    pub fn lookup(&self, name: &str) -> Option<Demographics> {
        if let Some(d) = self.ids.get(name).and_then(|id| self.records.get(id)) {
            return Some(*d);
        }

        let lower = name.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if let Some(id) = self.by_lower_name.get(&lower) {
            return self.records.get(id).copied();
        }

        let mut extended = self
            .by_lower_name
            .range(lower.clone()..)
            .take_while(|(record, _)| record.starts_with(&lower))
            .filter(|(record, _)| {
                record[lower.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| !c.is_alphanumeric())
            });
        match (extended.next(), extended.next()) {
            (Some((_, id)), None) => self.records.get(id).copied(),
            _ => None,
        }
    }
}
