use std::cmp::Ordering;

use serde::Serialize;

use super::extrema::{Extrema, ExtremaMap};
use super::model::{BetterWhen, Dataset, Metadata, Record, Value};

// ---------------------------------------------------------------------------
// Single-entity ranking against a column's range
// ---------------------------------------------------------------------------

/// Where `value` sits in the column's range, as a whole percentage (at least
/// 1). Flipped to `100 - p` when lower values are better.
///
/// `None` when the value is not a finite number, the column had no numbers,
/// or every observation was equal.
pub fn top_percentage(value: &Value, extrema: &Extrema, better_when: BetterWhen) -> Option<u32> {
    let v = value.as_f64().filter(|v| v.is_finite())?;
    let (min, max) = extrema.bounds()?;
    if max == min {
        return None;
    }
    let rounded = ((v - min) / (max - min) * 100.0).ceil();
    let scaled = match better_when {
        BetterWhen::Lower => 100.0 - rounded,
        BetterWhen::Higher => rounded,
    };
    Some(scaled.max(1.0) as u32)
}

/// One field of a record with its rank in the full dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRank {
    pub field: String,
    pub value: Value,
    pub top_percentage: Option<u32>,
}

/// Rank every field of `record` (except `exclude`) against `extrema`,
/// ascending by percentage. Fields that cannot be ranked go last, in column
/// order.
pub fn rank_metrics(
    record: &Record,
    extrema: &ExtremaMap,
    metadata: &Metadata,
    exclude: &[&str],
) -> Vec<MetricRank> {
    let mut ranks: Vec<MetricRank> = record
        .iter()
        .filter(|(field, _)| !exclude.contains(&field.as_str()))
        .map(|(field, value)| {
            let better_when = metadata
                .get(field)
                .and_then(|m| m.better_when)
                .unwrap_or_default();
            MetricRank {
                field: field.clone(),
                value: value.clone(),
                top_percentage: extrema
                    .get(field)
                    .and_then(|bounds| top_percentage(value, bounds, better_when)),
            }
        })
        .collect();
    ranks.sort_by_key(|r| (r.top_percentage.is_none(), r.top_percentage));
    ranks
}

// ---------------------------------------------------------------------------
// Neighbours of one record
// ---------------------------------------------------------------------------

/// The records ranked right around `target` by `field`: up to `window`
/// better ones, then `target`, then up to `window` worse ones. Ranking is
/// descending unless the column's metadata says lower is better. Records
/// are identified by `identity_field`; an unranked target comes back alone.
pub fn closest_records(
    dataset: &Dataset,
    field: &str,
    identity_field: &str,
    target: &Record,
    window: usize,
) -> Vec<Record> {
    let number = |r: &Record| r.get(field).and_then(Value::as_f64);

    let mut ranked: Vec<&Record> = dataset.data.iter().filter(|r| number(*r).is_some()).collect();
    ranked.sort_by(|a, b| match (number(*a), number(*b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => Ordering::Equal,
    });
    if dataset.better_when(field) != BetterWhen::Lower {
        ranked.reverse();
    }

    let position = target
        .get(identity_field)
        .and_then(|id| ranked.iter().position(|r| r.get(identity_field) == Some(id)));
    let Some(idx) = position else {
        return vec![target.clone()];
    };

    let above = &ranked[idx.saturating_sub(window)..idx];
    let below = &ranked[idx + 1..ranked.len().min(idx + 1 + window)];
    above
        .iter()
        .map(|r| (*r).clone())
        .chain(std::iter::once(target.clone()))
        .chain(below.iter().map(|r| (*r).clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
