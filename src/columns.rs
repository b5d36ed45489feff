//! Bidirectional mapping between original spreadsheet column names and the
//! synthetic `col_0..col_{n-1}` identifiers the grid is fed.
//!
//! Imported headers can contain spaces, punctuation, accents or anything
//! else a spreadsheet author typed; the synthetic ids keep all of that out
//! of the rendering layer. A mapping is only meaningful together with the
//! exact ordered field list it was built from, so it is rebuilt for every
//! response instead of cached.

use std::collections::HashMap;

use crate::models::Record;

#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: Vec<String>,
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ColumnMapping {
    /// Build the mapping for an ordered field list: `columns[i]` <-> `col_i`.
    /// Deterministic for identical input.
    pub fn build(columns: &[String]) -> Self {
        let mut forward = HashMap::with_capacity(columns.len());
        let mut reverse = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            let safe = format!("col_{i}");
            forward.insert(name.clone(), safe.clone());
            reverse.insert(safe, name.clone());
        }
        Self {
            columns: columns.to_vec(),
            forward,
            reverse,
        }
    }

    /// The original field names, in the order the mapping was built from.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn safe_id(&self, original: &str) -> Option<&str> {
        self.forward.get(original).map(String::as_str)
    }

    pub fn original(&self, safe: &str) -> Option<&str> {
        self.reverse.get(safe).map(String::as_str)
    }

    /// Rename a record's fields to their synthetic ids, in mapping order.
    /// Fields missing from the record are skipped; fields not covered by
    /// the mapping are dropped (they were filtered out upstream).
    pub fn apply(&self, record: &Record) -> Record {
        let mut out = Record::new();
        for name in &self.columns {
            if let Some(value) = record.get(name) {
                // forward always contains every name in `columns`
                if let Some(safe) = self.forward.get(name) {
                    out.insert(safe.clone(), value.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn forward_then_reverse_round_trips_every_name() {
        let columns = cols(&["Asset Tag", "Building (main)", "N° Série", "col_0"]);
        let mapping = ColumnMapping::build(&columns);
        for name in &columns {
            let safe = mapping.safe_id(name).expect("every column is mapped");
            assert_eq!(mapping.original(safe), Some(name.as_str()));
        }
    }

    #[test]
    fn ids_follow_input_order() {
        let mapping = ColumnMapping::build(&cols(&["B", "A", "C"]));
        assert_eq!(mapping.safe_id("B"), Some("col_0"));
        assert_eq!(mapping.safe_id("A"), Some("col_1"));
        assert_eq!(mapping.safe_id("C"), Some("col_2"));
        assert_eq!(mapping.original("col_9"), None);
    }

    #[test]
    fn rebuilding_from_same_input_is_deterministic() {
        let columns = cols(&["X", "Y", "Z"]);
        let a = ColumnMapping::build(&columns);
        let b = ColumnMapping::build(&columns);
        for name in &columns {
            assert_eq!(a.safe_id(name), b.safe_id(name));
        }
    }

    #[test]
    fn apply_tolerates_missing_fields_and_drops_unmapped_ones() {
        let mapping = ColumnMapping::build(&cols(&["Asset Tag", "Building"]));
        let mut record = Record::new();
        record.insert("Building".into(), json!("A"));
        record.insert("Secret".into(), json!("hidden"));

        let renamed = mapping.apply(&record);
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed.get("col_1"), Some(&json!("A")));
        assert!(renamed.get("col_0").is_none());
        assert!(!renamed.values().any(|v| v == &json!("hidden")));
    }

    #[test]
    fn apply_preserves_mapping_order() {
        let mapping = ColumnMapping::build(&cols(&["A", "B", "C"]));
        let mut record = Record::new();
        record.insert("C".into(), json!(3));
        record.insert("A".into(), json!(1));
        record.insert("B".into(), json!(2));

        let renamed = mapping.apply(&record);
        let keys: Vec<&String> = renamed.keys().collect();
        assert_eq!(keys, vec!["col_0", "col_1", "col_2"]);
    }
}
