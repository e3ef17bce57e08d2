//! Name Normalizer - raw upstream labels to canonical entities
//!
//! Each raw row lands in at most one entity. Excluded rows land nowhere,
//! pulled-up sub-regions become their own entity and are never summed into
//! their parent.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{NameConfig, Region};
use crate::download::RawRow;
use crate::error::ConfigError;

/// How raw rows are grouped into entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionMode {
    /// One entity per country, plus pulled-up regions
    Countries,
    /// One entity per province/state of `parent`
    Subdivisions { parent: String },
}

impl RegionMode {
    pub fn for_region(region: &Region) -> Self {
        match &region.parent {
            Some(parent) => RegionMode::Subdivisions {
                parent: parent.clone(),
            },
            None => RegionMode::Countries,
        }
    }
}

/// A normalized unit of analysis and the raw rows that feed it
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEntity {
    pub name: String,
    /// Indices into the raw row slice this entity was built from
    pub rows: Vec<usize>,
}

/// Exclusion, rename and pull-up tables with rename chains pre-resolved
#[derive(Debug, Clone, Default)]
pub struct NameTables {
    exclude: HashSet<String>,
    renames: HashMap<String, String>,
    pull_up: HashSet<(String, String)>,
}

impl NameTables {
    pub fn from_config(names: &NameConfig) -> Result<Self, ConfigError> {
        let mut direct: HashMap<String, String> = HashMap::new();
        for rename in &names.renames {
            if rename.from != rename.to {
                direct.insert(rename.from.clone(), rename.to.clone());
            } else {
                direct.remove(&rename.from);
            }
        }

        // Collapse chains (a -> b -> c becomes a -> c) so one lookup is final
        let mut renames = HashMap::with_capacity(direct.len());
        for from in direct.keys() {
            let mut seen = HashSet::new();
            let mut current = from.as_str();
            while let Some(next) = direct.get(current) {
                if !seen.insert(current) {
                    return Err(ConfigError::RenameCycle(from.clone()));
                }
                current = next.as_str();
            }
            renames.insert(from.clone(), current.to_string());
        }

        let tables = NameTables {
            exclude: names.exclude.iter().cloned().collect(),
            renames,
            pull_up: HashSet::new(),
        };
        let pull_up = names
            .pull_up
            .iter()
            .map(|p| (tables.rename(&p.parent), tables.rename(&p.region)))
            .collect();

        Ok(NameTables { pull_up, ..tables })
    }

    /// Canonical display name for a raw label. Unknown labels pass through.
    pub fn rename(&self, label: &str) -> String {
        self.renames
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        self.exclude.contains(label)
    }

    fn is_pulled_up(&self, country: &str, province: &str) -> bool {
        self.pull_up
            .contains(&(country.to_string(), province.to_string()))
    }

    /// Entity name a row contributes to under `mode`, or `None` if it is left out
    fn aggregation_key(&self, row: &RawRow, mode: &RegionMode) -> Option<String> {
        if self.is_excluded(&row.country_region)
            || row
                .province_state
                .as_deref()
                .is_some_and(|p| self.is_excluded(p))
        {
            return None;
        }

        let country = self.rename(&row.country_region);
        let province = row.province_state.as_deref().map(|p| self.rename(p));
        let pulled_up = province
            .as_deref()
            .is_some_and(|p| self.is_pulled_up(&country, p));

        match mode {
            RegionMode::Countries => {
                if pulled_up {
                    province
                } else {
                    Some(country)
                }
            }
            RegionMode::Subdivisions { parent } => {
                if &country != parent || pulled_up {
                    return None;
                }
                // National-level rows of the parent keep the parent's name
                Some(province.unwrap_or(country))
            }
        }
    }
}

/// Group raw rows into canonical entities, sorted by name
pub fn normalize(rows: &[RawRow], mode: &RegionMode, tables: &NameTables) -> Vec<CanonicalEntity> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut skipped = 0usize;

    for (i, row) in rows.iter().enumerate() {
        match tables.aggregation_key(row, mode) {
            Some(key) => groups.entry(key).or_default().push(i),
            None => skipped += 1,
        }
    }

    tracing::debug!(
        "Normalized {} rows into {} entities ({} rows left out, mode={:?})",
        rows.len(),
        groups.len(),
        skipped,
        mode
    );

    groups
        .into_iter()
        .map(|(name, rows)| CanonicalEntity { name, rows })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PullUp, Rename};

    fn row(country: &str, province: Option<&str>, counts: &[u64]) -> RawRow {
        RawRow {
            country_region: country.to_string(),
            province_state: province.map(str::to_string),
            counts: counts.to_vec(),
        }
    }

    fn tables() -> NameTables {
        NameTables::from_config(&NameConfig {
            exclude: vec!["Diamond Princess".to_string(), "Grand Princess".to_string()],
            renames: vec![
                Rename { from: "Korea, South".into(), to: "South Korea".into() },
                Rename { from: "Mainland China".into(), to: "China".into() },
                Rename { from: "Macao".into(), to: "Macau".into() },
            ],
            pull_up: vec![PullUp { parent: "China".into(), region: "Hong Kong".into() }],
            legacy_aliases: Default::default(),
        })
        .unwrap()
    }

    fn rows() -> Vec<RawRow> {
        vec![
            row("China", Some("Hubei"), &[10, 20, 30]),
            row("China", Some("Hong Kong"), &[1, 2, 3]),
            row("Mainland China", Some("Beijing"), &[4, 5, 6]),
            row("Korea, South", None, &[7, 8, 9]),
            row("Diamond Princess", None, &[100, 100, 100]),
            row("Canada", Some("Grand Princess"), &[50, 50, 50]),
            row("Canada", Some("Ontario"), &[2, 4, 8]),
        ]
    }

    fn column_sum(rows: &[RawRow], idx: &[usize], day: usize) -> u64 {
        idx.iter().map(|&i| rows[i].counts[day]).sum()
    }

    #[test]
    fn test_countries_mode() {
        let rows = rows();
        let entities = normalize(&rows, &RegionMode::Countries, &tables());
        let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Canada", "China", "Hong Kong", "South Korea"]);

        // Mainland China merges into China, Hong Kong is pulled out
        let china = entities.iter().find(|e| e.name == "China").unwrap();
        assert_eq!(china.rows, vec![0, 2]);
        let hk = entities.iter().find(|e| e.name == "Hong Kong").unwrap();
        assert_eq!(hk.rows, vec![1]);
    }

    #[test]
    fn test_no_double_counting() {
        let rows = rows();
        let tables = tables();
        for mode in [
            RegionMode::Countries,
            RegionMode::Subdivisions { parent: "China".into() },
            RegionMode::Subdivisions { parent: "Canada".into() },
        ] {
            let entities = normalize(&rows, &mode, &tables);
            let mut used: Vec<usize> = entities.iter().flat_map(|e| e.rows.clone()).collect();
            let before = used.len();
            used.sort_unstable();
            used.dedup();
            assert_eq!(before, used.len(), "row used twice in {:?}", mode);

            let included: Vec<usize> = (0..rows.len())
                .filter(|&i| tables.aggregation_key(&rows[i], &mode).is_some())
                .collect();
            for day in 0..3 {
                let entity_total: u64 = entities.iter().map(|e| column_sum(&rows, &e.rows, day)).sum();
                assert_eq!(entity_total, column_sum(&rows, &included, day));
            }
        }
    }

    #[test]
    fn test_subdivision_mode_skips_pulled_up() {
        let rows = rows();
        let mode = RegionMode::Subdivisions { parent: "China".into() };
        let entities = normalize(&rows, &mode, &tables());
        let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Beijing", "Hubei"]);
    }

    #[test]
    fn test_excluded_province() {
        let rows = rows();
        let mode = RegionMode::Subdivisions { parent: "Canada".into() };
        let entities = normalize(&rows, &mode, &tables());
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Ontario");
    }

    #[test]
    fn test_rename_idempotent() {
        let tables = NameTables::from_config(&NameConfig {
            renames: vec![
                Rename { from: "A".into(), to: "B".into() },
                Rename { from: "B".into(), to: "C".into() },
                Rename { from: "X".into(), to: "Y".into() },
                Rename { from: "X".into(), to: "Z".into() },
            ],
            ..Default::default()
        })
        .unwrap();
        for label in ["A", "B", "C", "X", "Unknown"] {
            let once = tables.rename(label);
            assert_eq!(tables.rename(&once), once);
        }
        assert_eq!(tables.rename("A"), "C");
        assert_eq!(tables.rename("X"), "Z");
        assert_eq!(tables.rename("Unknown"), "Unknown");
    }

    #[test]
    fn test_rename_cycle_rejected() {
        let result = NameTables::from_config(&NameConfig {
            renames: vec![
                Rename { from: "A".into(), to: "B".into() },
                Rename { from: "B".into(), to: "A".into() },
            ],
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::RenameCycle(_))));
    }
}
