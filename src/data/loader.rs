use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value as JsonValue;

use super::model::{ColumnType, Dataset, Record, Schema, Source, Value};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.json` – either a serialized [`Dataset`] (`name`, `schema`, `data`, …)
///   or a raw table `{ "headers": [...], "data": [{...}, ...] }`
/// * `.csv`  – header row followed by data rows
///
/// Raw tables get their schema inferred (see [`infer_dataset`]) and are named
/// after the file stem. Cells breaking the schema are logged, not rejected.
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    for violation in dataset.validate() {
        log::warn!("{}: {violation}", dataset.name);
    }
    log::debug!(
        "loaded '{}' from {}: {} columns, {} rows",
        dataset.name,
        path.display(),
        dataset.schema.len(),
        dataset.len()
    );
    Ok(dataset)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let obj = root.as_object().context("Expected top-level JSON object")?;
    if obj.contains_key("schema") {
        return serde_json::from_value(root).context("decoding dataset");
    }

    let headers: Vec<String> = obj
        .get("headers")
        .and_then(|h| h.as_array())
        .context("Expected either a 'schema' or a 'headers' array")?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            h.as_str()
                .map(str::to_string)
                .with_context(|| format!("header {i} is not a string"))
        })
        .collect::<Result<_>>()?;

    let rows = obj
        .get("data")
        .and_then(|d| d.as_array())
        .context("missing 'data' array")?;

    let mut cells = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let row = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        cells.push(
            headers
                .iter()
                .map(|h| row.get(h).map(json_cell_text).unwrap_or_default())
                .collect(),
        );
    }

    Ok(infer_dataset(file_stem(path), &headers, cells))
}

fn json_cell_text(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        cells.push(record.iter().map(str::to_string).collect());
    }

    Ok(infer_dataset(file_stem(path), &headers, cells))
}

// ---------------------------------------------------------------------------
// Type inference
// ---------------------------------------------------------------------------

fn parse_cell(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Build a dataset from text cells. A column is `number` when it has at
/// least one non-empty cell and every non-empty cell parses as a float;
/// otherwise `string`. Empty cells become null.
pub fn infer_dataset(
    name: impl Into<String>,
    headers: &[String],
    rows: Vec<Vec<String>>,
) -> Dataset {
    let schema: Schema = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let mut non_empty = rows
                .iter()
                .filter_map(|row| row.get(col))
                .filter(|cell| !cell.is_empty())
                .peekable();
            let numeric =
                non_empty.peek().is_some() && non_empty.all(|cell| parse_cell(cell).is_some());
            let ty = if numeric {
                ColumnType::Number
            } else {
                ColumnType::String
            };
            (header.clone(), ty)
        })
        .collect();

    let data = rows
        .into_iter()
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .map(|(header, cell)| {
                    let value = match (schema.get(header), cell.is_empty()) {
                        (_, true) => Value::Null,
                        (Some(ColumnType::Number), false) => {
                            parse_cell(&cell).map(Value::Number).unwrap_or_default()
                        }
                        _ => Value::String(cell),
                    };
                    (header.clone(), value)
                })
                .collect::<Record>()
        })
        .collect();

    Dataset::new(name, Source::Predefined, schema, data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_columns_get_inferred_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("happiness.csv");
        fs::write(&path, "Country,Score,Region\nX,5.5,North\nY,,South\nZ,7,\n").unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.name, "happiness");
        assert_eq!(ds.source, Source::Predefined);
        assert_eq!(ds.schema["Country"], ColumnType::String);
        assert_eq!(ds.schema["Score"], ColumnType::Number);
        assert_eq!(ds.data[0]["Score"], Value::Number(5.5));
        assert_eq!(ds.data[1]["Score"], Value::Null);
        assert_eq!(ds.data[2]["Region"], Value::Null);
        assert!(ds.validate().is_empty());
    }

    #[test]
    fn json_dataset_is_decoded_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(
            &path,
            r#"{"name": "World Scores", "source": "custom",
                "schema": {"Country": "string", "Score": "number"},
                "data": [{"Country": "X", "Score": 5}]}"#,
        )
        .unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.name, "World Scores");
        assert_eq!(ds.source, Source::Custom);
        assert_eq!(ds.data[0]["Score"], Value::from(5));
    }

    #[test]
    fn json_raw_table_is_inferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diet.json");
        fs::write(
            &path,
            r#"{"headers": ["Country", "Cost"],
                "data": [{"Country": "X", "Cost": "3.5"}, {"Country": "Y", "Cost": ""}]}"#,
        )
        .unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.name, "diet");
        assert_eq!(ds.schema["Cost"], ColumnType::Number);
        assert_eq!(ds.data[0]["Cost"], Value::Number(3.5));
        assert_eq!(ds.data[1]["Cost"], Value::Null);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_file(Path::new("data.parquet")).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }

    #[test]
    fn all_empty_column_is_text() {
        let ds = infer_dataset("t", &["A".to_string()], vec![vec![String::new()]]);
        assert_eq!(ds.schema["A"], ColumnType::String);
        assert_eq!(ds.data[0]["A"], Value::Null);
    }
}
