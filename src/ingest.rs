//! Dataset ingestion from CSV, TSV and JSON files

use crate::error::{Result, TabreconError};
use crate::model::{FieldValue, RowData};
use indexmap::IndexSet;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Supported input formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("tsv") | Some("tab") => Ok(Self::Tsv),
            Some("json") => Ok(Self::Json),
            _ => Err(TabreconError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// A parsed file, ready to attach to a workflow
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub filename: String,
    pub size: u64,
    /// Column names in source order
    pub columns: Vec<String>,
    pub rows: Vec<RowData>,
}

impl LoadedDataset {
    /// Load a dataset file from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TabreconError::invalid_input(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let format = InputFormat::from_path(path)?;
        let size = fs::metadata(path)?.len();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let (columns, rows) = match format {
            InputFormat::Csv => parse_delimited(fs::File::open(path)?, b',')?,
            InputFormat::Tsv => parse_delimited(fs::File::open(path)?, b'\t')?,
            InputFormat::Json => parse_json(&fs::read_to_string(path)?)?,
        };

        log::debug!(
            "Loaded {}: {} column(s), {} row(s), {} bytes",
            filename,
            columns.len(),
            rows.len(),
            size
        );

        Ok(Self {
            filename,
            size,
            columns,
            rows,
        })
    }
}

/// Parse delimited text with a header row. Every cell is text; empty cells are null.
pub fn parse_delimited<R: Read>(reader: R, delimiter: u8) -> Result<(Vec<String>, Vec<RowData>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = header_names(headers.iter())?;

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() > columns.len() {
            return Err(TabreconError::invalid_input(format!(
                "Row {} has {} fields but the header has {}",
                idx + 1,
                record.len(),
                columns.len()
            )));
        }
        let data: RowData = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = match record.get(i) {
                    Some(cell) if !cell.is_empty() => FieldValue::Text(cell.to_string()),
                    _ => FieldValue::Null,
                };
                (column.clone(), value)
            })
            .collect();
        rows.push(data);
    }

    Ok((columns, rows))
}

/// Parse a JSON array of objects. Columns are the union of keys in first-seen order.
pub fn parse_json(content: &str) -> Result<(Vec<String>, Vec<RowData>)> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        return Err(TabreconError::invalid_input(
            "JSON dataset must be an array of objects",
        ));
    };

    let mut columns: IndexSet<String> = IndexSet::new();
    let mut objects = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(TabreconError::invalid_input(format!(
                "JSON dataset element {} is not an object",
                idx
            )));
        };
        columns.extend(map.keys().cloned());
        objects.push(map);
    }

    let rows = objects
        .into_iter()
        .map(|mut map| {
            columns
                .iter()
                .map(|column| {
                    let value = map.remove(column).map(json_field).unwrap_or(FieldValue::Null);
                    (column.clone(), value)
                })
                .collect()
        })
        .collect();

    Ok((columns.into_iter().collect(), rows))
}

fn json_field(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
        },
        Value::String(s) => FieldValue::Text(s),
        nested @ (Value::Array(_) | Value::Object(_)) => FieldValue::Text(nested.to_string()),
    }
}

/// Trimmed header names; blanks get positional names, duplicates are rejected
fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    let mut seen = IndexSet::new();
    for (i, name) in raw.enumerate() {
        let name = name.trim();
        let name = if name.is_empty() {
            format!("column_{}", i + 1)
        } else {
            name.to_string()
        };
        if !seen.insert(name.clone()) {
            return Err(TabreconError::invalid_input(format!(
                "Duplicate column name in header: {}",
                name
            )));
        }
    }
    Ok(seen.into_iter().collect())
}
