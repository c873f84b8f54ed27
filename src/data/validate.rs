use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::model::{ColumnType, Schema};

// ---------------------------------------------------------------------------
// Join feasibility diagnostics
// ---------------------------------------------------------------------------

/// Which input of a join a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    First,
    Second,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::First => write!(f, "first"),
            JoinSide::Second => write!(f, "second"),
        }
    }
}

/// One reason a pair of datasets cannot be joined with the given keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinIssue {
    #[error("no join keys were given")]
    NoJoinKeys,

    #[error("join key '{key}' is missing from the {side} dataset")]
    MissingJoinKey { key: String, side: JoinSide },

    #[error("join key '{key}' is {first} in the first dataset but {second} in the second")]
    JoinKeyTypeMismatch {
        key: String,
        first: ColumnType,
        second: ColumnType,
    },

    #[error("select key '{key}' is not a column of the {side} dataset")]
    UnknownSelectKey { key: String, side: JoinSide },

    #[error("select key '{key}' is selected from both datasets")]
    SelectKeyCollision { key: String },
}

/// A join request that failed the feasibility check, with every issue found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("datasets cannot be joined: {}", describe(.issues))]
pub struct JoinRejected {
    pub issues: Vec<JoinIssue>,
}

fn describe(issues: &[JoinIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Keys with duplicates removed, first occurrence wins.
pub(crate) fn distinct(keys: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    keys.iter()
        .filter(|k| seen.insert(k.as_str()))
        .cloned()
        .collect()
}

/// Select keys of one side with the join keys taken out.
pub(crate) fn select_only(select_keys: &[String], join_keys: &[String]) -> Vec<String> {
    distinct(select_keys)
        .into_iter()
        .filter(|k| !join_keys.contains(k))
        .collect()
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Check that two schemas can be joined on `join_keys` and that the selected
/// columns give every output column exactly one owner.
///
/// Requirements:
/// * at least one join key is given
/// * every join key exists in both schemas with the same declared type
/// * every select key exists in its own schema
/// * select keys (minus join keys) are disjoint across the two sides
pub fn check_join(
    first_schema: &Schema,
    first_select_keys: &[String],
    second_schema: &Schema,
    second_select_keys: &[String],
    join_keys: &[String],
) -> Result<(), JoinRejected> {
    let join_keys = distinct(join_keys);
    let mut issues = Vec::new();

    if join_keys.is_empty() {
        issues.push(JoinIssue::NoJoinKeys);
    }
    for key in &join_keys {
        match (first_schema.get(key), second_schema.get(key)) {
            (Some(first), Some(second)) if first != second => {
                issues.push(JoinIssue::JoinKeyTypeMismatch {
                    key: key.clone(),
                    first: *first,
                    second: *second,
                });
            }
            (first, second) => {
                if first.is_none() {
                    issues.push(JoinIssue::MissingJoinKey {
                        key: key.clone(),
                        side: JoinSide::First,
                    });
                }
                if second.is_none() {
                    issues.push(JoinIssue::MissingJoinKey {
                        key: key.clone(),
                        side: JoinSide::Second,
                    });
                }
            }
        }
    }

    let first_select = select_only(first_select_keys, &join_keys);
    let second_select = select_only(second_select_keys, &join_keys);

    for (keys, schema, side) in [
        (&first_select, first_schema, JoinSide::First),
        (&second_select, second_schema, JoinSide::Second),
    ] {
        for key in keys.iter().filter(|k| !schema.contains_key(*k)) {
            issues.push(JoinIssue::UnknownSelectKey {
                key: key.clone(),
                side,
            });
        }
    }

    for key in first_select.iter().filter(|k| second_select.contains(*k)) {
        issues.push(JoinIssue::SelectKeyCollision { key: key.clone() });
    }

    if issues.is_empty() {
        return Ok(());
    }
    for issue in &issues {
        log::warn!("join check failed: {issue}");
    }
    Err(JoinRejected { issues })
}

/// Boolean form of [`check_join`]: a feasibility probe that never errors.
///
/// Stricter than a bare key-type and disjointness check: an empty join-key
/// list, or a select key missing from its own schema, also gives `false`.
pub fn can_join(
    first_schema: &Schema,
    first_select_keys: &[String],
    second_schema: &Schema,
    second_select_keys: &[String],
    join_keys: &[String],
) -> bool {
    check_join(
        first_schema,
        first_select_keys,
        second_schema,
        second_select_keys,
        join_keys,
    )
    .is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
