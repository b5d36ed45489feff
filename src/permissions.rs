//! Permission resolution: which rows and which columns a principal may see.
//!
//! Row access is an OR over per-field value grants ("Building must be A or
//! B"); column access is a plain allow-list. Admins and principals with no
//! grants are unrestricted. The row filter is a small expression evaluated
//! in-process against each record, so it stays independent of the store's
//! own query capabilities.

use serde_json::Value;

use crate::models::{LocationPermissions, Record, Role};

/// Field-name keywords that mark a column as "location-like". These columns
/// drive the permission pickers in user management and are the only ones
/// offered for row grants.
const LOCATION_TERMS: [&str; 5] = ["location", "batiment", "building", "room", "site"];

pub fn is_location_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    LOCATION_TERMS.iter().any(|term| lower.contains(term))
}

/// Subset of `columns` that look location-like, original order preserved.
pub fn location_fields(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| is_location_field(c))
        .cloned()
        .collect()
}

/// What to do when a principal has location grants declared but every
/// allowed-value list is empty. The original tool fell back to match-all;
/// the strict reading is match-nothing. Chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyGrantPolicy {
    #[default]
    MatchAll,
    MatchNone,
}

/// One clause of a row filter: record[field] must be one of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIn {
    pub field: String,
    pub values: Vec<String>,
}

/// Row-visibility predicate for one principal.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    MatchAll,
    MatchNone,
    /// OR over the clauses: a record is visible if any clause matches.
    AnyOf(Vec<FieldIn>),
}

impl RowFilter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RowFilter::MatchAll => true,
            RowFilter::MatchNone => false,
            RowFilter::AnyOf(clauses) => clauses.iter().any(|clause| {
                record
                    .get(&clause.field)
                    .map(|value| clause.values.iter().any(|v| value_matches(value, v)))
                    .unwrap_or(false)
            }),
        }
    }
}

/// Compare a record value against an allowed value. Grants are entered as
/// strings, but imported cells may be numbers; numbers compare by their
/// canonical string form.
fn value_matches(value: &Value, allowed: &str) -> bool {
    match value {
        Value::String(s) => s == allowed,
        Value::Number(n) => n.to_string() == allowed,
        Value::Bool(b) => b.to_string() == allowed,
        _ => false,
    }
}

/// Build the row predicate for a principal.
///
/// Admins and principals with no location grants see everything. Fields
/// whose allowed-value list is empty contribute no clause; if that leaves
/// the OR empty, `policy` decides between all and nothing.
pub fn resolve_row_filter(
    role: Role,
    grants: &LocationPermissions,
    policy: EmptyGrantPolicy,
) -> RowFilter {
    if role.is_admin() || grants.is_empty() {
        return RowFilter::MatchAll;
    }

    let clauses: Vec<FieldIn> = grants
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(field, values)| FieldIn {
            field: field.clone(),
            values: values.clone(),
        })
        .collect();

    if clauses.is_empty() {
        return match policy {
            EmptyGrantPolicy::MatchAll => RowFilter::MatchAll,
            EmptyGrantPolicy::MatchNone => RowFilter::MatchNone,
        };
    }

    RowFilter::AnyOf(clauses)
}

/// Columns a principal may see, in `all_columns` order.
///
/// Admins and principals with an empty allow-list get every column. The
/// allow-list's own ordering is irrelevant; the sniffed column order wins.
pub fn resolve_visible_columns(
    role: Role,
    column_grants: &[String],
    all_columns: &[String],
) -> Vec<String> {
    if role.is_admin() || column_grants.is_empty() {
        return all_columns.to_vec();
    }
    all_columns
        .iter()
        .filter(|c| column_grants.iter().any(|g| g == *c))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn grants(entries: &[(&str, &[&str])]) -> LocationPermissions {
        entries
            .iter()
            .map(|(field, values)| {
                (
                    field.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn admin_sees_all_rows() {
        let g = grants(&[("Building", &["A"])]);
        let filter = resolve_row_filter(Role::Admin, &g, EmptyGrantPolicy::MatchAll);
        assert_eq!(filter, RowFilter::MatchAll);
    }

    #[test]
    fn no_grants_means_all_rows() {
        let filter =
            resolve_row_filter(Role::User, &BTreeMap::new(), EmptyGrantPolicy::MatchNone);
        assert_eq!(filter, RowFilter::MatchAll);
    }

    #[test]
    fn building_grant_filters_rows() {
        let g = grants(&[("Building", &["A"])]);
        let filter = resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchAll);

        let in_a = record(&[("Asset Tag", json!("X1")), ("Building", json!("A"))]);
        let in_b = record(&[("Asset Tag", json!("X2")), ("Building", json!("B"))]);
        let missing = record(&[("Asset Tag", json!("X3"))]);
        assert!(filter.matches(&in_a));
        assert!(!filter.matches(&in_b));
        assert!(!filter.matches(&missing));
    }

    #[test]
    fn clauses_are_ored_across_fields() {
        let g = grants(&[("Building", &["A"]), ("Room", &["101"])]);
        let filter = resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchAll);

        let by_room = record(&[("Building", json!("B")), ("Room", json!("101"))]);
        let neither = record(&[("Building", json!("B")), ("Room", json!("202"))]);
        assert!(filter.matches(&by_room));
        assert!(!filter.matches(&neither));
    }

    #[test]
    fn numeric_cells_compare_by_string_form() {
        let g = grants(&[("Room", &["101"])]);
        let filter = resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchAll);
        assert!(filter.matches(&record(&[("Room", json!(101))])));
        assert!(!filter.matches(&record(&[("Room", json!(102))])));
    }

    #[test]
    fn empty_value_lists_follow_policy() {
        let g = grants(&[("Building", &[]), ("Room", &[])]);
        assert_eq!(
            resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchAll),
            RowFilter::MatchAll
        );
        assert_eq!(
            resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchNone),
            RowFilter::MatchNone
        );
    }

    #[test]
    fn empty_lists_are_dropped_from_the_or() {
        let g = grants(&[("Building", &[]), ("Room", &["101"])]);
        let filter = resolve_row_filter(Role::User, &g, EmptyGrantPolicy::MatchNone);
        assert_eq!(
            filter,
            RowFilter::AnyOf(vec![FieldIn {
                field: "Room".into(),
                values: vec!["101".into()],
            }])
        );
    }

    #[test]
    fn visible_columns_preserve_sniffed_order() {
        let all = vec![
            "Asset Tag".to_string(),
            "Building".to_string(),
            "Owner".to_string(),
        ];
        // Grant list deliberately out of order.
        let grants = vec!["Owner".to_string(), "Asset Tag".to_string()];
        let visible = resolve_visible_columns(Role::User, &grants, &all);
        assert_eq!(visible, vec!["Asset Tag".to_string(), "Owner".to_string()]);
    }

    #[test]
    fn admin_or_empty_grants_see_every_column() {
        let all = vec!["A".to_string(), "B".to_string()];
        let grants = vec!["A".to_string()];
        assert_eq!(resolve_visible_columns(Role::Admin, &grants, &all), all);
        assert_eq!(resolve_visible_columns(Role::User, &[], &all), all);
    }

    #[test]
    fn location_field_detection() {
        assert!(is_location_field("Building"));
        assert!(is_location_field("Room Number"));
        assert!(is_location_field("BATIMENT"));
        assert!(is_location_field("Site Code"));
        assert!(!is_location_field("Asset Tag"));

        let cols = vec![
            "Asset Tag".to_string(),
            "Building".to_string(),
            "Serial".to_string(),
            "Room".to_string(),
        ];
        assert_eq!(
            location_fields(&cols),
            vec!["Building".to_string(), "Room".to_string()]
        );
    }
}
