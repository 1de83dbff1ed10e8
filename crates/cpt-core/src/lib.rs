//! Core domain model and identity types for CPT.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CRATE_NAME: &str = "cpt-core";

/// One tracked candidate. Known columns are typed; every other column the
/// backend returns rides along in `fields`, keyed by column name, so the
/// display layer can show whatever the current schema provides. The
/// check-in/snooze column stays in `fields` because its name is
/// configuration, not code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateRow {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opaque_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl CandidateRow {
    /// Column access by backend column name, uniform across typed and
    /// passthrough columns. Returns `None` for columns this row does not
    /// carry a value for.
    pub fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => self.id.clone().map(Value::String),
            "name" => Some(Value::String(self.name.clone())),
            "link" => Some(Value::String(self.link.clone())),
            "status" => Some(Value::String(self.status.clone())),
            "created_at" => self.created_at.clone().map(Value::String),
            "start_date" => self.start_date.clone().map(Value::String),
            other => self.fields.get(other).cloned(),
        }
    }

    /// Whether this row carries the column at all, null values included.
    /// Drives the "show a column only if the schema provides it" rule.
    pub fn has_column(&self, column: &str) -> bool {
        match column {
            "name" | "link" | "status" => true,
            "id" => self.id.is_some(),
            "created_at" => self.created_at.is_some(),
            "start_date" => self.start_date.is_some(),
            other => self.fields.contains_key(other),
        }
    }

    /// The configured check-in column, raw.
    pub fn snooze_value(&self, snooze_field: &str) -> Option<&Value> {
        self.fields.get(snooze_field)
    }

    pub fn key(&self) -> RowKey {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => RowKey::Id(id.to_string()),
            _ => RowKey::LinkName {
                link: self.link.clone(),
                name: self.name.clone(),
            },
        }
    }

    pub fn matches_key(&self, key: &RowKey) -> bool {
        match key {
            RowKey::Id(id) => self.id.as_deref() == Some(id.as_str()),
            RowKey::LinkName { link, name } => self.link == *link && self.name == *name,
        }
    }

    /// Echo a successful backend update into the in-memory copy.
    pub fn apply_patch(&mut self, patch: &RowPatch) {
        match patch.column.as_str() {
            "status" => {
                self.status = patch
                    .value
                    .as_str()
                    .map(ToString::to_string)
                    .unwrap_or_default();
            }
            "name" => {
                self.name = patch
                    .value
                    .as_str()
                    .map(ToString::to_string)
                    .unwrap_or_default();
            }
            "start_date" => {
                self.start_date = patch.value.as_str().map(ToString::to_string);
            }
            other => {
                self.fields.insert(other.to_string(), patch.value.clone());
            }
        }
    }
}

/// Identity used for every mutation and every optimistic echo. `id` wins
/// when present; legacy rows fall back to the `(link, name)` pair. Both
/// paths must resolve the same record, so lookups go through this type
/// everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKey {
    Id(String),
    LinkName { link: String, name: String },
}

impl RowKey {
    /// Build a key from the identifier fields a form or API call supplies.
    /// Returns `None` when every identifier is blank.
    pub fn from_parts(id: &str, link: &str, name: &str) -> Option<RowKey> {
        if !id.is_empty() {
            return Some(RowKey::Id(id.to_string()));
        }
        if link.is_empty() && name.is_empty() {
            return None;
        }
        Some(RowKey::LinkName {
            link: link.to_string(),
            name: name.to_string(),
        })
    }
}

/// A single-column update shipped to the backend and echoed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPatch {
    pub column: String,
    pub value: Value,
}

impl RowPatch {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// The one-entry JSON object the backend expects as an update body.
    pub fn to_object(&self) -> serde_json::Map<String, Value> {
        let mut object = serde_json::Map::with_capacity(1);
        object.insert(self.column.clone(), self.value.clone());
        object
    }
}

/// The five projections over the row set. Never persisted; recomputed from
/// the full set on every mutation or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Active,
    Review,
    Checkin,
    Search,
    Tenure,
}

impl ViewKind {
    pub const ALL: [ViewKind; 5] = [
        ViewKind::Active,
        ViewKind::Review,
        ViewKind::Checkin,
        ViewKind::Search,
        ViewKind::Tenure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Active => "active",
            ViewKind::Review => "review",
            ViewKind::Checkin => "checkin",
            ViewKind::Search => "search",
            ViewKind::Tenure => "tenure",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewKind::Active => "Active",
            ViewKind::Review => "Review",
            ViewKind::Checkin => "Check-in",
            ViewKind::Search => "Search",
            ViewKind::Tenure => "Tenure",
        }
    }

    pub fn parse(value: &str) -> Option<ViewKind> {
        ViewKind::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

/// JS-style truthiness for passthrough values: the review predicate asks
/// only "is something entered in the check-in column", not "is it a date".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

mod opaque_id {
    //! Backend ids arrive as strings or integers depending on the table's
    //! key type; both are opaque here.

    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(id: &Option<String>, ser: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => ser.serialize_str(id),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(de)?;
        Ok(match value {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_deserialize_with_passthrough_columns() {
        let row: CandidateRow = serde_json::from_value(json!({
            "id": 42,
            "name": "Ada",
            "link": "https://example.com/ada",
            "status": "Connecting",
            "current_company": "Analytical Engines",
            "check_in": "2025-06-20",
            "notes": null,
        }))
        .unwrap();

        assert_eq!(row.id.as_deref(), Some("42"));
        assert_eq!(row.status, "Connecting");
        assert_eq!(
            row.snooze_value("check_in"),
            Some(&Value::String("2025-06-20".into()))
        );
        // null still counts as schema presence for column selection
        assert!(row.has_column("notes"));
        assert!(!row.has_column("start_date"));
    }

    #[test]
    fn key_prefers_id_over_link_name() {
        let with_id: CandidateRow = serde_json::from_value(json!({
            "id": "abc", "name": "Ada", "link": "https://example.com/ada"
        }))
        .unwrap();
        assert_eq!(with_id.key(), RowKey::Id("abc".into()));

        let legacy: CandidateRow = serde_json::from_value(json!({
            "name": "Ada", "link": "https://example.com/ada"
        }))
        .unwrap();
        assert_eq!(
            legacy.key(),
            RowKey::LinkName {
                link: "https://example.com/ada".into(),
                name: "Ada".into()
            }
        );
    }

    #[test]
    fn both_identity_paths_resolve_the_same_row() {
        let row: CandidateRow = serde_json::from_value(json!({
            "id": "abc", "name": "Ada", "link": "https://example.com/ada"
        }))
        .unwrap();

        let by_link_name = RowKey::from_parts("", "https://example.com/ada", "Ada").unwrap();
        let by_id = RowKey::from_parts("abc", "", "").unwrap();
        assert!(row.matches_key(&by_link_name));
        assert!(row.matches_key(&by_id));
    }

    #[test]
    fn from_parts_rejects_blank_identifiers() {
        assert_eq!(RowKey::from_parts("", "", ""), None);
    }

    #[test]
    fn patches_echo_into_typed_and_passthrough_columns() {
        let mut row = CandidateRow {
            name: "Ada".into(),
            ..Default::default()
        };
        row.apply_patch(&RowPatch::new("status", "cold"));
        row.apply_patch(&RowPatch::new("check_in", "2025-09-01"));
        assert_eq!(row.status, "cold");
        assert_eq!(
            row.snooze_value("check_in"),
            Some(&Value::String("2025-09-01".into()))
        );
    }

    #[test]
    fn truthiness_matches_data_entry_expectations() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!("2025-06-20")));
        assert!(is_truthy(&json!(["a"])));
    }
}
