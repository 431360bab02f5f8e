use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::models::RawRow;

/// Decode a CSV upload into rows keyed by header name. Blank cells become
/// `null`; interpreting values is left to normalization.
pub fn read_rows<R: Read>(input: R) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read CSV header row")?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to decode CSV row {index}"))?;
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let value = if cell.trim().is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_rows(file)
}
