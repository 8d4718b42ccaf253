//! Inputs to the tree builder: app metadata, tables, the signed-in user,
//! page context, sample API responses and the clock.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::tree::ValueType;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default = "any_type")]
    pub value_type: ValueType,
}

fn any_type() -> ValueType {
    ValueType::Any
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub rows: Vec<Value>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.push(FieldSchema::new(name, value_type));
        self
    }

    pub fn row(mut self, row: Value) -> Self {
        self.rows.push(row);
        self
    }

    /// Declared fields, or when none are declared, the keys of the rows in
    /// first-seen order typed from their first non-null value.
    pub fn schema(&self) -> Vec<FieldSchema> {
        if !self.fields.is_empty() {
            return self.fields.clone();
        }

        let mut inferred: IndexMap<&str, ValueType> = IndexMap::new();
        for object in self.rows.iter().filter_map(Value::as_object) {
            for (key, value) in object {
                let entry = inferred.entry(key.as_str()).or_insert(ValueType::Any);
                if *entry == ValueType::Any {
                    *entry = ValueType::infer(value);
                }
            }
        }
        inferred
            .into_iter()
            .map(|(name, value_type)| FieldSchema::new(name, value_type))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: IndexMap<String, Value>,
}

/// A named sample response whose shape is exposed as an `apiResponse` root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub name: String,
    #[serde(default)]
    pub sample: Value,
}

/// Everything the host application supplies, as read from a workspace file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub app: AppState,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub page: Option<PageContext>,
    #[serde(default)]
    pub api_responses: Vec<ApiResponse>,
}

#[derive(Debug)]
pub enum WorkspaceError {
    Io { path: String, source: std::io::Error },
    Parse { origin: String, source: serde_json::Error },
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceError::Io { path, source } => write!(f, "cannot read '{}': {}", path, source),
            WorkspaceError::Parse { origin, source } => {
                write!(f, "invalid workspace in {}: {}", origin, source)
            }
        }
    }
}

impl std::error::Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkspaceError::Io { source, .. } => Some(source),
            WorkspaceError::Parse { source, .. } => Some(source),
        }
    }
}

impl Workspace {
    pub fn from_json(source: &str) -> Result<Self, WorkspaceError> {
        serde_json::from_str(source).map_err(|source| WorkspaceError::Parse {
            origin: "<input>".to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, WorkspaceError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| WorkspaceError::Parse {
            origin: display,
            source,
        })
    }
}

/// Wall clock behind the `system` roots.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at one instant, for previews and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self(DateTime::parse_from_rfc3339(rfc3339)?.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"{
        "app": {"id": "app-1", "name": "Shop"},
        "tables": [
            {"name": "products", "fields": [{"name": "name", "type": "text"}, {"name": "price", "type": "number"}],
             "rows": [{"name": "A", "price": 10}]},
            {"name": "orders", "rows": [{"total": null}, {"total": 5, "placed": "2024-01-02"}]}
        ],
        "user": {"id": "u1", "name": "Ada", "email": "ada@example.com", "role": "admin"},
        "apiResponses": [{"name": "weather", "sample": {"temp": 21}}]
    }"#;

    #[test]
    fn test_workspace_from_json() {
        let workspace = Workspace::from_json(SHOP).unwrap();
        assert_eq!(workspace.app.name, "Shop");
        assert_eq!(workspace.tables.len(), 2);
        assert_eq!(workspace.tables[0].fields[0].value_type, ValueType::String);
        assert_eq!(workspace.user.as_ref().unwrap().role, "admin");
        assert!(workspace.page.is_none());
        assert_eq!(workspace.api_responses[0].name, "weather");
    }

    #[test]
    fn test_schema_inferred_from_rows() {
        let workspace = Workspace::from_json(SHOP).unwrap();
        let schema = workspace.tables[1].schema();
        assert_eq!(
            schema,
            vec![
                FieldSchema::new("total", ValueType::Number),
                FieldSchema::new("placed", ValueType::Date),
            ]
        );
    }

    #[test]
    fn test_invalid_workspace() {
        let err = Workspace::from_json(r#"{"tables": 3}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid workspace in <input>"));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::parse("2024-03-05T14:30:00Z").unwrap();
        assert_eq!(clock.now().timestamp_millis(), 1_709_649_000_000);
        assert!(FixedClock::parse("yesterday").is_err());
    }
}
