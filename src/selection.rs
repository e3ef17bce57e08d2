//! Selection/Filter Store - which entities are on the chart

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    /// Every entity name in the current dataset, sorted
    available: Vec<String>,
    selected: BTreeSet<String>,
}

impl SelectionStore {
    /// Replace the available names. Selected names missing from the new set
    /// are kept so they come back when a later dataset has them.
    pub fn set_available(&mut self, mut names: Vec<String>) {
        names.sort();
        names.dedup();
        self.available = names;
    }

    pub fn select<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = names.into_iter().map(Into::into).collect();
    }

    pub fn toggle(&mut self, name: &str) {
        if !self.selected.remove(name) {
            self.selected.insert(name.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.available.iter().cloned().collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    /// Selected names present in the current dataset, in display order
    pub fn visible_selection(&self) -> Vec<String> {
        self.available
            .iter()
            .filter(|n| self.selected.contains(*n))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over available names
    pub fn search(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        self.available
            .iter()
            .filter(|n| needle.is_empty() || n.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SelectionStore {
        let mut s = SelectionStore::default();
        s.set_available(vec!["Spain".into(), "Italy".into(), "South Korea".into()]);
        s
    }

    #[test]
    fn test_search() {
        let s = store();
        assert_eq!(s.search("s"), vec!["South Korea", "Spain"]);
        assert_eq!(s.search("  KOREA "), vec!["South Korea"]);
        assert_eq!(s.search("").len(), 3);
        assert!(s.search("xyz").is_empty());
    }

    #[test]
    fn test_select_all_none() {
        let mut s = store();
        s.select_all();
        assert_eq!(s.selected().len(), 3);
        s.deselect_all();
        assert!(s.selected().is_empty());
    }

    #[test]
    fn test_selection_survives_dataset_swap() {
        let mut s = store();
        s.select(["Italy", "Spain"]);
        s.set_available(vec!["Italy".into()]);
        assert_eq!(s.visible_selection(), vec!["Italy"]);
        s.set_available(vec!["Italy".into(), "Spain".into()]);
        assert_eq!(s.visible_selection(), vec!["Italy", "Spain"]);
        s.toggle("Italy");
        assert!(!s.is_selected("Italy"));
    }
}
