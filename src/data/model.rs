use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Value – a single cell of a record
// ---------------------------------------------------------------------------

/// A scalar cell value. Serialized untagged, so the JSON form is the bare
/// string, number or `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    #[default]
    Null,
}

/// Canonical bit pattern: `-0.0` folds onto `0.0` and every NaN onto one NaN,
/// so `Eq` and `Hash` agree and join keys are total.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

// -- Manual Eq/Hash so Value tuples can key a HashMap --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl Value {
    /// The number inside, if this is a numeric cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of the value; `None` for null.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::String(_) => Some(ColumnType::String),
            Value::Number(_) => Some(ColumnType::Number),
            Value::Null => None,
        }
    }

    /// Plain equality as a predicate sees it: NaN never equals anything.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }
}

// ---------------------------------------------------------------------------
// Schema / metadata
// ---------------------------------------------------------------------------

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Number => write!(f, "number"),
        }
    }
}

/// Column name → declared type. Sorted by name, which fixes column order
/// everywhere downstream.
pub type Schema = BTreeMap<String, ColumnType>;

/// One row: column name → value. A missing column is read as null.
pub type Record = BTreeMap<String, Value>;

/// Per-column annotations, keyed by column name.
pub type Metadata = BTreeMap<String, ColumnMetadata>;

/// Which direction of a metric counts as "good".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetterWhen {
    Lower,
    #[default]
    Higher,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub better_when: Option<BetterWhen>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Where a dataset came from: shipped with the application or derived by the
/// user (every join result is `Custom`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Predefined,
    Custom,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// A named, typed, row-oriented table. Never mutated by the engine; every
/// operation builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default)]
    pub source: Source,
    pub schema: Schema,
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// A record value that breaks the schema invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("row {row}: column '{column}' is not declared in the schema")]
    UnknownColumn { row: usize, column: String },

    #[error("row {row}: column '{column}' is declared {expected} but holds a {found}")]
    TypeMismatch {
        row: usize,
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
}

impl Dataset {
    pub fn new(name: impl Into<String>, source: Source, schema: Schema, data: Vec<Record>) -> Self {
        Dataset {
            name: name.into(),
            source,
            schema,
            data,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the dataset has no records.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema.keys().cloned().collect()
    }

    /// Ranking direction for a column, `Higher` unless metadata says otherwise.
    pub fn better_when(&self, column: &str) -> BetterWhen {
        self.metadata
            .get(column)
            .and_then(|m| m.better_when)
            .unwrap_or_default()
    }

    /// Every record value that is not covered by the schema or whose runtime
    /// type differs from the declared one. Nulls always conform.
    pub fn validate(&self) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        for (row, record) in self.data.iter().enumerate() {
            for (column, value) in record {
                let Some(expected) = self.schema.get(column) else {
                    violations.push(SchemaViolation::UnknownColumn {
                        row,
                        column: column.clone(),
                    });
                    continue;
                };
                if let Some(found) = value.column_type() {
                    if found != *expected {
                        violations.push(SchemaViolation::TypeMismatch {
                            row,
                            column: column.clone(),
                            expected: *expected,
                            found,
                        });
                    }
                }
            }
        }
        violations
    }

    /// Drop the rows, keeping what a schema listing would carry.
    pub fn schema_only(&self) -> DatasetSchemaOnly {
        DatasetSchemaOnly {
            name: self.name.clone(),
            schema: self.schema.clone(),
            source: Some(self.source),
            data: None,
            metadata: (!self.metadata.is_empty()).then(|| self.metadata.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema listings
// ---------------------------------------------------------------------------

/// A dataset as described by schema discovery: rows are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchemaOnly {
    pub name: String,
    pub schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A candidate found to share type-compatible columns with some target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinableDataset {
    #[serde(flatten)]
    pub dataset: DatasetSchemaOnly,
    #[serde(rename = "joinKeys")]
    pub join_keys: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
