use super::model::{ColumnType, Dataset, Record, Schema, Source, Value};

/// Column holding the original column name in a transposed dataset.
pub const FIELD_NAME_COLUMN: &str = "Field Name";

/// Turn columns into rows: one row per column of `dataset` other than
/// `identity_field`, one column per entity.
///
/// Each row carries the source column name under [`FIELD_NAME_COLUMN`] and the
/// entity values under the entity's identity text. An entity column takes the
/// declared type of the last transposed column in schema order. Records with a
/// null or missing identity are skipped; a repeated identity keeps its last
/// record.
pub fn transpose(dataset: &Dataset, identity_field: &str) -> Dataset {
    let entities: Vec<(String, &Record)> = dataset
        .data
        .iter()
        .filter_map(|record| {
            let id = record.get(identity_field).filter(|v| !v.is_null())?;
            Some((id.to_string(), record))
        })
        .collect();

    let mut schema = Schema::from([(FIELD_NAME_COLUMN.to_string(), ColumnType::String)]);
    let mut data = Vec::new();
    for (field, ty) in dataset.schema.iter().filter(|(col, _)| *col != identity_field) {
        let mut row = Record::new();
        row.insert(FIELD_NAME_COLUMN.to_string(), Value::from(field.as_str()));
        for (entity, record) in &entities {
            row.insert(entity.clone(), record.get(field).cloned().unwrap_or_default());
            schema.insert(entity.clone(), *ty);
        }
        data.push(row);
    }

    log::debug!(
        "transposed '{}' on '{identity_field}': {} fields x {} entities",
        dataset.name,
        data.len(),
        entities.len()
    );

    Dataset::new(format!("Transposed {}", dataset.name), Source::Custom, schema, data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
