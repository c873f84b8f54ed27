use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{ColumnType, Dataset, Record, Value};

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison operator of a [`DatasetFilter`], without its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    NotEq,
    NotNull,
    Includes,
    Lt,
    Gt,
    #[serde(rename = "lteq")]
    LtEq,
    #[serde(rename = "gteq")]
    GtEq,
    Range,
}

const STRING_OPS: &[FilterOp] = &[
    FilterOp::Eq,
    FilterOp::NotEq,
    FilterOp::NotNull,
    FilterOp::Includes,
];

const NUMBER_OPS: &[FilterOp] = &[
    FilterOp::Eq,
    FilterOp::NotEq,
    FilterOp::NotNull,
    FilterOp::Lt,
    FilterOp::Gt,
    FilterOp::LtEq,
    FilterOp::GtEq,
    FilterOp::Range,
];

impl FilterOp {
    /// Operators offered for a column of the given declared type.
    pub fn for_type(column_type: ColumnType) -> &'static [FilterOp] {
        match column_type {
            ColumnType::String => STRING_OPS,
            ColumnType::Number => NUMBER_OPS,
        }
    }

    /// Wire name, as used in serialized filters.
    pub fn name(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::NotEq => "not_eq",
            FilterOp::NotNull => "not_null",
            FilterOp::Includes => "includes",
            FilterOp::Lt => "lt",
            FilterOp::Gt => "gt",
            FilterOp::LtEq => "lteq",
            FilterOp::GtEq => "gteq",
            FilterOp::Range => "range",
        }
    }

    /// Human-readable label for filter pickers.
    pub fn label(self) -> &'static str {
        match self {
            FilterOp::Eq => "Equals",
            FilterOp::NotEq => "Not Equals",
            FilterOp::NotNull => "Is Not Null",
            FilterOp::Includes => "Includes",
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::LtEq => "≤",
            FilterOp::GtEq => "≥",
            FilterOp::Range => "In Range",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter operator '{0}'")]
pub struct ParseFilterOpError(pub String);

impl FromStr for FilterOp {
    type Err = ParseFilterOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NUMBER_OPS
            .iter()
            .chain(STRING_OPS)
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| ParseFilterOpError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Operands parsed from text input
// ---------------------------------------------------------------------------

/// Operand of a filter, typed for its operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `not_null` takes no operand.
    None,
    Value(Value),
    Number(f64),
    Text(String),
    Range(f64, f64),
}

/// Unparseable or empty text becomes NaN, which no numeric comparison accepts.
fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(f64::NAN)
}

/// `"min, max"` → bounds. Missing segments are NaN.
fn parse_range(raw: &str) -> (f64, f64) {
    let mut parts = raw.split(',').map(parse_number);
    let min = parts.next().unwrap_or(f64::NAN);
    let max = parts.next().unwrap_or(f64::NAN);
    (min, max)
}

fn parse_scalar(column_type: ColumnType, raw: &str) -> Value {
    match column_type {
        ColumnType::Number => Value::Number(parse_number(raw)),
        ColumnType::String => Value::String(raw.to_string()),
    }
}

/// Convert the text a user typed into the operand `op` expects for a column
/// of `column_type`. Never fails; malformed numbers turn into NaN.
pub fn parse_operand(op: FilterOp, column_type: ColumnType, raw: &str) -> Operand {
    match op {
        FilterOp::NotNull => Operand::None,
        FilterOp::Eq | FilterOp::NotEq => Operand::Value(parse_scalar(column_type, raw)),
        FilterOp::Lt | FilterOp::Gt | FilterOp::LtEq | FilterOp::GtEq => {
            Operand::Number(parse_number(raw))
        }
        FilterOp::Includes => Operand::Text(raw.to_string()),
        FilterOp::Range => {
            let (min, max) = parse_range(raw);
            Operand::Range(min, max)
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A single typed predicate on one column, tagged by operator.
///
/// `eq`, `not_eq` and `not_null` apply to any column; `includes` only to
/// text; the ordering operators and `range` only to numbers. A cell whose
/// runtime type does not fit the operator fails the predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DatasetFilter {
    Eq { field: String, value: Value },
    NotEq { field: String, value: Value },
    NotNull { field: String },
    Includes { field: String, value: String },
    Lt { field: String, value: f64 },
    Gt { field: String, value: f64 },
    #[serde(rename = "lteq")]
    LtEq { field: String, value: f64 },
    #[serde(rename = "gteq")]
    GtEq { field: String, value: f64 },
    Range { field: String, value: [f64; 2] },
}

impl DatasetFilter {
    /// Build a filter from UI text, with the operand coerced by
    /// [`parse_operand`].
    pub fn from_text(
        op: FilterOp,
        field: impl Into<String>,
        column_type: ColumnType,
        raw: &str,
    ) -> Self {
        let field = field.into();
        match parse_operand(op, column_type, raw) {
            Operand::None => DatasetFilter::NotNull { field },
            Operand::Value(value) if op == FilterOp::NotEq => DatasetFilter::NotEq { field, value },
            Operand::Value(value) => DatasetFilter::Eq { field, value },
            Operand::Text(value) => DatasetFilter::Includes { field, value },
            Operand::Number(value) => match op {
                FilterOp::Lt => DatasetFilter::Lt { field, value },
                FilterOp::Gt => DatasetFilter::Gt { field, value },
                FilterOp::LtEq => DatasetFilter::LtEq { field, value },
                _ => DatasetFilter::GtEq { field, value },
            },
            Operand::Range(min, max) => DatasetFilter::Range {
                field,
                value: [min, max],
            },
        }
    }

    /// Column the predicate reads.
    pub fn field(&self) -> &str {
        match self {
            DatasetFilter::Eq { field, .. }
            | DatasetFilter::NotEq { field, .. }
            | DatasetFilter::NotNull { field }
            | DatasetFilter::Includes { field, .. }
            | DatasetFilter::Lt { field, .. }
            | DatasetFilter::Gt { field, .. }
            | DatasetFilter::LtEq { field, .. }
            | DatasetFilter::GtEq { field, .. }
            | DatasetFilter::Range { field, .. } => field,
        }
    }

    pub fn op(&self) -> FilterOp {
        match self {
            DatasetFilter::Eq { .. } => FilterOp::Eq,
            DatasetFilter::NotEq { .. } => FilterOp::NotEq,
            DatasetFilter::NotNull { .. } => FilterOp::NotNull,
            DatasetFilter::Includes { .. } => FilterOp::Includes,
            DatasetFilter::Lt { .. } => FilterOp::Lt,
            DatasetFilter::Gt { .. } => FilterOp::Gt,
            DatasetFilter::LtEq { .. } => FilterOp::LtEq,
            DatasetFilter::GtEq { .. } => FilterOp::GtEq,
            DatasetFilter::Range { .. } => FilterOp::Range,
        }
    }

    /// Evaluate the predicate against one record.
    pub fn matches(&self, record: &Record) -> bool {
        let cell = record.get(self.field());
        let number = cell.and_then(Value::as_f64);
        match self {
            DatasetFilter::Eq { value, .. } => cell.is_some_and(|c| c.matches(value)),
            DatasetFilter::NotEq { value, .. } => !cell.is_some_and(|c| c.matches(value)),
            DatasetFilter::NotNull { .. } => cell.is_some_and(|c| !c.is_null()),
            DatasetFilter::Includes { value, .. } => cell
                .and_then(Value::as_str)
                .is_some_and(|text| text.contains(value.as_str())),
            DatasetFilter::Lt { value, .. } => number.is_some_and(|n| n < *value),
            DatasetFilter::Gt { value, .. } => number.is_some_and(|n| n > *value),
            DatasetFilter::LtEq { value, .. } => number.is_some_and(|n| n <= *value),
            DatasetFilter::GtEq { value, .. } => number.is_some_and(|n| n >= *value),
            DatasetFilter::Range {
                value: [min, max], ..
            } => number.is_some_and(|n| n >= *min && n <= *max),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter state
// ---------------------------------------------------------------------------

/// How the filters of a [`FilterState`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

/// An ordered list of predicates, their combinator and an optional row cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub filters: Vec<DatasetFilter>,
    #[serde(default)]
    pub logic: FilterLogic,
    /// Keep at most this many matching rows. `0` means no cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl FilterState {
    /// Whether a record passes the combined predicate. With no filters every
    /// record passes, whatever the logic.
    pub fn matches(&self, record: &Record) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.logic {
            FilterLogic::And => self.filters.iter().all(|f| f.matches(record)),
            FilterLogic::Or => self.filters.iter().any(|f| f.matches(record)),
        }
    }

    fn row_cap(&self) -> usize {
        match self.limit {
            Some(n) if n > 0 => n,
            _ => usize::MAX,
        }
    }
}

/// Indices of the records passing `state`, capped at its limit.
pub fn matching_indices(dataset: &Dataset, state: &FilterState) -> Vec<usize> {
    dataset
        .data
        .iter()
        .enumerate()
        .filter(|(_, record)| state.matches(record))
        .map(|(i, _)| i)
        .take(state.row_cap())
        .collect()
}

/// A copy of `dataset` holding only the records that pass `state`, in their
/// original order and truncated to the limit.
pub fn filter_dataset(dataset: &Dataset, state: &FilterState) -> Dataset {
    let data: Vec<Record> = matching_indices(dataset, state)
        .into_iter()
        .map(|i| dataset.data[i].clone())
        .collect();

    log::debug!(
        "filtered '{}': kept {} of {} rows ({} filters, {:?})",
        dataset.name,
        data.len(),
        dataset.len(),
        state.filters.len(),
        state.logic
    );

    Dataset {
        name: dataset.name.clone(),
        source: dataset.source,
        schema: dataset.schema.clone(),
        data,
        metadata: dataset.metadata.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
