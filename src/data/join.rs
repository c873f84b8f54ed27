use std::collections::HashMap;

use thiserror::Error;

use super::model::{
    Dataset, DatasetSchemaOnly, JoinableDataset, Metadata, Record, Schema, Source, Value,
};
use super::validate::{JoinRejected, check_join, distinct, select_only};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// A fully formed join request. Both inputs are borrowed and never modified.
#[derive(Debug, Clone)]
pub struct JoinParams<'a> {
    /// Name of the resulting dataset.
    pub name: String,
    pub first_dataset: &'a Dataset,
    pub first_select_keys: Vec<String>,
    pub second_dataset: &'a Dataset,
    pub second_select_keys: Vec<String>,
    pub join_keys: Vec<String>,
    /// `true` → full outer join (unmatched rows null-filled),
    /// `false` → inner join.
    pub include_missing_keys: bool,
}

// ---------------------------------------------------------------------------
// Key buckets
// ---------------------------------------------------------------------------

/// At most one representative record per side for one join-key tuple.
#[derive(Debug, Default)]
struct Bucket<'a> {
    first: Option<&'a Record>,
    second: Option<&'a Record>,
    /// The tuple holds a null, so an inner join drops the bucket.
    null_key: bool,
}

/// The join-key tuple of a record. An absent key reads as null.
fn key_tuple(record: &Record, join_keys: &[String]) -> Vec<Value> {
    join_keys
        .iter()
        .map(|k| record.get(k).cloned().unwrap_or_default())
        .collect()
}

/// Group both inputs by join-key tuple, keeping first-seen order across the
/// first-then-second scan. Within one side a later duplicate replaces the
/// earlier record. Null is an ordinary tuple member here.
fn bucket_records<'a>(
    first: &'a [Record],
    second: &'a [Record],
    join_keys: &[String],
) -> Vec<Bucket<'a>> {
    let mut buckets: Vec<Bucket<'a>> = Vec::new();
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();

    let sides = first
        .iter()
        .map(|r| (r, true))
        .chain(second.iter().map(|r| (r, false)));

    for (record, is_first) in sides {
        let key = key_tuple(record, join_keys);
        let null_key = key.iter().any(Value::is_null);
        let slot = *index.entry(key).or_insert_with(|| {
            buckets.push(Bucket {
                null_key,
                ..Bucket::default()
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        if is_first {
            bucket.first = Some(record);
        } else {
            bucket.second = Some(record);
        }
    }
    buckets
}

/// Copy the listed columns that are present in `record` into `row`.
fn overlay(row: &mut Record, record: &Record, columns: &[String]) {
    for col in columns {
        if let Some(value) = record.get(col) {
            row.insert(col.clone(), value.clone());
        }
    }
}

fn fill_nulls(row: &mut Record, columns: &[String]) {
    for col in columns {
        row.insert(col.clone(), Value::Null);
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Join two datasets on equal join-key tuples.
///
/// Output rows follow the first-seen order of their key tuple. Each side
/// contributes its join keys plus its select keys; for an outer join the
/// columns of a missing side are filled with nulls. Null key values group
/// like any other value, but an inner join never emits a null-keyed row. The
/// result is always a `Custom` dataset whose schema is the union of all
/// selected columns.
pub fn try_join(params: &JoinParams<'_>) -> Result<Dataset, JoinRejected> {
    let first = params.first_dataset;
    let second = params.second_dataset;

    check_join(
        &first.schema,
        &params.first_select_keys,
        &second.schema,
        &params.second_select_keys,
        &params.join_keys,
    )?;

    let join_keys = distinct(&params.join_keys);
    let first_select = select_only(&params.first_select_keys, &join_keys);
    let second_select = select_only(&params.second_select_keys, &join_keys);
    let first_columns: Vec<String> = join_keys.iter().chain(&first_select).cloned().collect();
    let second_columns: Vec<String> = join_keys.iter().chain(&second_select).cloned().collect();

    let buckets = bucket_records(&first.data, &second.data, &join_keys);
    let bucket_count = buckets.len();

    let mut data = Vec::with_capacity(bucket_count);
    for bucket in buckets {
        if bucket.null_key && !params.include_missing_keys {
            continue;
        }
        let mut row = Record::new();
        match (bucket.first, bucket.second) {
            (Some(left), Some(right)) => {
                overlay(&mut row, left, &first_columns);
                overlay(&mut row, right, &second_columns);
            }
            (left, right) if params.include_missing_keys => {
                if left.is_none() {
                    fill_nulls(&mut row, &first_columns);
                }
                if right.is_none() {
                    fill_nulls(&mut row, &second_columns);
                }
                if let Some(left) = left {
                    overlay(&mut row, left, &first_columns);
                }
                if let Some(right) = right {
                    overlay(&mut row, right, &second_columns);
                }
            }
            _ => continue,
        }
        if row.is_empty() {
            continue;
        }
        for key in &join_keys {
            row.entry(key.clone()).or_insert(Value::Null);
        }
        data.push(row);
    }

    let mut schema = Schema::new();
    let mut metadata = Metadata::new();
    for key in first_columns.iter().chain(&second_select) {
        if let Some(ty) = first.schema.get(key).or_else(|| second.schema.get(key)) {
            schema.insert(key.clone(), *ty);
        }
        if let Some(meta) = first.metadata.get(key).or_else(|| second.metadata.get(key)) {
            metadata.insert(key.clone(), meta.clone());
        }
    }

    log::debug!(
        "joined '{}' ({} rows) with '{}' ({} rows) into '{}': {} key groups, {} rows kept",
        first.name,
        first.len(),
        second.name,
        second.len(),
        params.name,
        bucket_count,
        data.len()
    );

    Ok(Dataset {
        name: params.name.clone(),
        source: Source::Custom,
        schema,
        data,
        metadata,
    })
}

/// [`try_join`] without the diagnostics: `None` when the join is infeasible.
pub fn join(params: &JoinParams<'_>) -> Option<Dataset> {
    try_join(params).ok()
}

// ---------------------------------------------------------------------------
// Joinability discovery
// ---------------------------------------------------------------------------

/// Candidates sharing at least one same-named, same-typed column with
/// `target`, in input order. The shared columns become the join keys.
pub fn find_joinable(target: &Dataset, candidates: &[DatasetSchemaOnly]) -> Vec<JoinableDataset> {
    candidates
        .iter()
        .filter(|candidate| candidate.name != target.name)
        .filter_map(|candidate| {
            let join_keys: Vec<String> = target
                .schema
                .iter()
                .filter(|(col, ty)| candidate.schema.get(*col) == Some(*ty))
                .map(|(col, _)| col.clone())
                .collect();
            if join_keys.is_empty() {
                return None;
            }
            Some(JoinableDataset {
                dataset: candidate.clone(),
                join_keys,
            })
        })
        .collect()
}

/// A step of [`join_joinable`] that could not be performed.
#[derive(Debug, Error)]
#[error("could not join '{candidate}' into '{target}'")]
pub struct JoinChainError {
    pub target: String,
    pub candidate: String,
    #[source]
    pub source: JoinRejected,
}

/// Outer-join every joinable candidate into `target`, one after another, on
/// all of their shared columns. Each intermediate result is named
/// `"{left} / {right}"`.
pub fn join_joinable(target: &Dataset, candidates: &[Dataset]) -> Result<Dataset, JoinChainError> {
    let listings: Vec<DatasetSchemaOnly> = candidates.iter().map(Dataset::schema_only).collect();
    let joinable = find_joinable(target, &listings);

    let mut result = target.clone();
    for (found, candidate) in joinable.into_iter().filter_map(|found| {
        let candidate = candidates.iter().find(|c| c.name == found.dataset.name)?;
        Some((found, candidate))
    }) {
        let params = JoinParams {
            name: format!("{} / {}", result.name, candidate.name),
            first_dataset: &result,
            first_select_keys: result.column_names(),
            second_dataset: candidate,
            second_select_keys: candidate.column_names(),
            join_keys: found.join_keys,
            include_missing_keys: true,
        };
        result = try_join(&params).map_err(|source| JoinChainError {
            target: params.first_dataset.name.clone(),
            candidate: candidate.name.clone(),
            source,
        })?;
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{BetterWhen, ColumnMetadata, ColumnType};
    use crate::data::validate::JoinIssue;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scores() -> Dataset {
        Dataset::new(
            "Scores",
            Source::Predefined,
            Schema::from([
                ("Country".to_string(), ColumnType::String),
                ("Score".to_string(), ColumnType::Number),
            ]),
            vec![
                record(&[("Country", "X".into()), ("Score", 5.into())]),
                record(&[("Country", "Y".into()), ("Score", 7.into())]),
            ],
        )
    }

    fn gdp() -> Dataset {
        Dataset::new(
            "GDP",
            Source::Predefined,
            Schema::from([
                ("Country".to_string(), ColumnType::String),
                ("GDP".to_string(), ColumnType::Number),
            ]),
            vec![record(&[("Country", "X".into()), ("GDP", 100.into())])],
        )
    }

    fn params<'a>(a: &'a Dataset, b: &'a Dataset, outer: bool) -> JoinParams<'a> {
        JoinParams {
            name: "Joined".into(),
            first_dataset: a,
            first_select_keys: a.column_names(),
            second_dataset: b,
            second_select_keys: b.column_names(),
            join_keys: keys(&["Country"]),
            include_missing_keys: outer,
        }
    }

    #[test]
    fn outer_join_null_fills_missing_side() {
        let (a, b) = (scores(), gdp());
        let joined = join(&params(&a, &b, true)).unwrap();
        assert_eq!(
            joined.data,
            vec![
                record(&[("Country", "X".into()), ("Score", 5.into()), ("GDP", 100.into())]),
                record(&[("Country", "Y".into()), ("Score", 7.into()), ("GDP", Value::Null)]),
            ]
        );
        assert_eq!(joined.source, Source::Custom);
        assert_eq!(joined.name, "Joined");
        assert_eq!(joined.column_names(), keys(&["Country", "GDP", "Score"]));
    }

    #[test]
    fn inner_join_drops_unmatched_rows() {
        let (a, b) = (scores(), gdp());
        let joined = join(&params(&a, &b, false)).unwrap();
        assert_eq!(
            joined.data,
            vec![record(&[("Country", "X".into()), ("Score", 5.into()), ("GDP", 100.into())])]
        );
    }

    #[test]
    fn rows_follow_first_seen_key_order() {
        let a = scores();
        let mut b = gdp();
        b.data = vec![
            record(&[("Country", "Z".into()), ("GDP", 1.into())]),
            record(&[("Country", "Y".into()), ("GDP", 2.into())]),
        ];
        let joined = join(&params(&a, &b, true)).unwrap();
        let countries: Vec<&Value> = joined.data.iter().map(|r| &r["Country"]).collect();
        assert_eq!(countries, vec![&Value::from("X"), &Value::from("Y"), &Value::from("Z")]);
        assert_eq!(joined.data[0]["GDP"], Value::Null);
        assert_eq!(joined.data[2]["Score"], Value::Null);
    }

    #[test]
    fn later_duplicate_on_one_side_wins() {
        let mut a = scores();
        a.data.push(record(&[("Country", "X".into()), ("Score", 9.into())]));
        let b = gdp();
        let joined = join(&params(&a, &b, false)).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.data[0]["Score"], Value::from(9));
    }

    #[test]
    fn composite_keys_do_not_collide_on_delimiters() {
        let schema = Schema::from([
            ("A".to_string(), ColumnType::String),
            ("B".to_string(), ColumnType::String),
            ("V".to_string(), ColumnType::Number),
        ]);
        let left = Dataset::new(
            "L",
            Source::Custom,
            schema.clone(),
            vec![record(&[("A", "a|b".into()), ("B", "c".into()), ("V", 1.into())])],
        );
        let mut right_schema = schema;
        right_schema.remove("V");
        right_schema.insert("W".to_string(), ColumnType::Number);
        let right = Dataset::new(
            "R",
            Source::Custom,
            right_schema,
            vec![record(&[("A", "a".into()), ("B", "b|c".into()), ("W", 2.into())])],
        );
        let p = JoinParams {
            name: "J".into(),
            first_dataset: &left,
            first_select_keys: keys(&["V"]),
            second_dataset: &right,
            second_select_keys: keys(&["W"]),
            join_keys: keys(&["A", "B"]),
            include_missing_keys: false,
        };
        assert!(join(&p).unwrap().is_empty());
    }

    #[test]
    fn null_join_keys_only_match_in_outer_joins() {
        let mut a = scores();
        a.data.push(record(&[("Country", Value::Null), ("Score", 1.into())]));
        let mut b = gdp();
        b.data.push(record(&[("GDP", 50.into())]));

        let inner = join(&params(&a, &b, false)).unwrap();
        assert_eq!(inner.len(), 1);
        assert!(inner.data.iter().all(|r| !r["Country"].is_null()));

        // an absent key reads as null and lands in the same bucket
        let outer = join(&params(&a, &b, true)).unwrap();
        assert_eq!(outer.len(), 3);
        assert_eq!(
            outer.data[2],
            record(&[("Country", Value::Null), ("Score", 1.into()), ("GDP", 50.into())])
        );
    }

    #[test]
    fn null_keyed_duplicates_collapse_to_one_row() {
        let schema = |col: &str| {
            Schema::from([
                ("K".to_string(), ColumnType::String),
                (col.to_string(), ColumnType::Number),
            ])
        };
        let left = Dataset::new(
            "L",
            Source::Custom,
            schema("S"),
            vec![
                record(&[("K", "x".into()), ("S", 1.into())]),
                record(&[("K", Value::Null), ("S", 2.into())]),
                record(&[("K", Value::Null), ("S", 3.into())]),
            ],
        );
        let right = Dataset::new(
            "R",
            Source::Custom,
            schema("G"),
            vec![record(&[("K", Value::Null), ("G", 9.into())])],
        );
        let p = JoinParams {
            name: "J".into(),
            first_dataset: &left,
            first_select_keys: keys(&["S"]),
            second_dataset: &right,
            second_select_keys: keys(&["G"]),
            join_keys: keys(&["K"]),
            include_missing_keys: true,
        };
        let outer = join(&p).unwrap();
        assert_eq!(
            outer.data,
            vec![
                record(&[("K", "x".into()), ("S", 1.into()), ("G", Value::Null)]),
                record(&[("K", Value::Null), ("S", 3.into()), ("G", 9.into())]),
            ]
        );

        let inner = join(&JoinParams {
            include_missing_keys: false,
            ..p
        })
        .unwrap();
        assert!(inner.is_empty());
    }

    #[test]
    fn only_selected_columns_are_carried() {
        let mut a = scores();
        a.schema.insert("Rank".to_string(), ColumnType::Number);
        a.data[0].insert("Rank".to_string(), 1.into());
        let b = gdp();
        let p = JoinParams {
            first_select_keys: keys(&["Score"]),
            ..params(&a, &b, true)
        };
        let joined = join(&p).unwrap();
        assert!(!joined.schema.contains_key("Rank"));
        assert!(joined.data.iter().all(|r| !r.contains_key("Rank")));
    }

    #[test]
    fn schema_and_metadata_prefer_first_dataset() {
        let meta = |unit: &str| ColumnMetadata {
            unit: Some(unit.into()),
            better_when: Some(BetterWhen::Higher),
            description: None,
        };
        let a = scores().with_metadata(Metadata::from([("Country".to_string(), meta("first"))]));
        let b = gdp().with_metadata(Metadata::from([
            ("Country".to_string(), meta("second")),
            ("GDP".to_string(), meta("USD")),
        ]));
        let joined = join(&params(&a, &b, true)).unwrap();
        assert_eq!(joined.metadata["Country"].unit.as_deref(), Some("first"));
        assert_eq!(joined.metadata["GDP"].unit.as_deref(), Some("USD"));
        assert!(!joined.metadata.contains_key("Score"));
    }

    #[test]
    fn infeasible_join_returns_none() {
        let a = scores();
        let b = scores();
        assert!(join(&params(&a, &b, true)).is_none());
        let err = try_join(&params(&a, &b, true)).unwrap_err();
        assert_eq!(err.issues, vec![JoinIssue::SelectKeyCollision { key: "Score".into() }]);
    }

    #[test]
    fn inputs_are_left_untouched() {
        let (a, b) = (scores(), gdp());
        let (a_before, b_before) = (a.clone(), b.clone());
        let _ = join(&params(&a, &b, true));
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn find_joinable_keeps_same_typed_shared_columns() {
        let target = scores();
        let mismatched = DatasetSchemaOnly {
            name: "Ranks".into(),
            schema: Schema::from([("Score".to_string(), ColumnType::String)]),
            source: None,
            data: None,
            metadata: None,
        };
        let candidates = vec![target.schema_only(), mismatched, gdp().schema_only()];
        let found = find_joinable(&target, &candidates);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dataset.name, "GDP");
        assert_eq!(found[0].join_keys, keys(&["Country"]));
    }

    #[test]
    fn find_joinable_preserves_candidate_order() {
        let target = scores();
        let mut second = gdp().schema_only();
        second.name = "Another".into();
        let found = find_joinable(&target, &[gdp().schema_only(), second]);
        let names: Vec<&str> = found.iter().map(|j| j.dataset.name.as_str()).collect();
        assert_eq!(names, vec!["GDP", "Another"]);
    }

    #[test]
    fn join_joinable_chains_outer_joins() {
        let speed = Dataset::new(
            "Speed",
            Source::Predefined,
            Schema::from([
                ("Country".to_string(), ColumnType::String),
                ("Mbps".to_string(), ColumnType::Number),
            ]),
            vec![record(&[("Country", "Y".into()), ("Mbps", 80.into())])],
        );
        let joined = join_joinable(&scores(), &[gdp(), speed]).unwrap();
        assert_eq!(joined.name, "Scores / GDP / Speed");
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.data[1]["Mbps"], Value::from(80));
        assert_eq!(joined.data[1]["GDP"], Value::Null);
    }

    #[test]
    fn join_joinable_reports_the_failing_candidate() {
        let clash = Dataset::new(
            "Clash",
            Source::Predefined,
            Schema::from([
                ("Country".to_string(), ColumnType::String),
                ("Score".to_string(), ColumnType::String),
            ]),
            Vec::new(),
        );
        let err = join_joinable(&scores(), &[clash]).unwrap_err();
        assert_eq!(err.candidate, "Clash");
        assert_eq!(err.target, "Scores");
    }
}
