use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use super::model::{ColumnType, Dataset, Record, Value};

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

/// Minimum and maximum of the numbers seen in one column.
///
/// A column with no numbers keeps the `+inf / -inf` sentinel; check
/// [`Extrema::is_empty`] (or use [`Extrema::bounds`]) before treating the
/// pair as real bounds. JSON has no infinities, so the sentinel serializes as
/// `null` and real bounds as `{"min": .., "max": ..}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
}

impl Serialize for Extrema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Bounds {
            min: f64,
            max: f64,
        }
        self.bounds()
            .map(|(min, max)| Bounds { min, max })
            .serialize(serializer)
    }
}

impl Default for Extrema {
    fn default() -> Self {
        Extrema::EMPTY
    }
}

impl Extrema {
    pub const EMPTY: Extrema = Extrema {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    /// Widen the bounds to include `value`. NaN is ignored.
    pub fn observe(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// No number was observed.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// `(min, max)`, or `None` for the no-data sentinel.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        (!self.is_empty()).then_some((self.min, self.max))
    }

    /// Rescale `value` into `[0, 1]`; a column with a single distinct value
    /// maps everything to `0`.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }
}

/// Column name → extrema.
pub type ExtremaMap = BTreeMap<String, Extrema>;

/// Per-field min/max over `records`, counting only non-null numeric cells.
/// Every requested field gets an entry, empty if it had no numbers.
pub fn calc_extrema(records: &[Record], fields: &[String]) -> ExtremaMap {
    let mut extrema: ExtremaMap = fields.iter().map(|f| (f.clone(), Extrema::EMPTY)).collect();
    for record in records {
        for (field, bounds) in extrema.iter_mut() {
            if let Some(n) = record.get(field).and_then(Value::as_f64) {
                bounds.observe(n);
            }
        }
    }
    extrema
}

/// Extrema of every column the schema declares as `number`.
pub fn metric_extrema(dataset: &Dataset) -> ExtremaMap {
    let fields: Vec<String> = dataset
        .schema
        .iter()
        .filter(|(_, ty)| **ty == ColumnType::Number)
        .map(|(name, _)| name.clone())
        .collect();
    calc_extrema(&dataset.data, &fields)
}

// ---------------------------------------------------------------------------
// Chart normalization
// ---------------------------------------------------------------------------

/// A record whose series values were rescaled to `[0, 1]`, together with the
/// values they replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub record: Record,
    pub original: BTreeMap<String, f64>,
}

/// Rescale the numeric cells of `fields` against their extrema over
/// `records`, so several series with different units share one axis.
/// Non-numeric cells are left as they are.
pub fn normalize_records(records: &[Record], fields: &[String]) -> Vec<NormalizedRecord> {
    let extrema = calc_extrema(records, fields);
    records
        .iter()
        .map(|source| {
            let mut record = source.clone();
            let mut original = BTreeMap::new();
            for (field, bounds) in &extrema {
                if let Some(n) = source.get(field).and_then(Value::as_f64) {
                    original.insert(field.clone(), n);
                    record.insert(field.clone(), Value::Number(bounds.normalize(n)));
                }
            }
            NormalizedRecord { record, original }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
