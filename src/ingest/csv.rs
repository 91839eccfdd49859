use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Parsed tabular input ready for the ingestion boundary: the declared
/// column schema plus one flat field map per row.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, Value>>,
}

/// Read a CSV file into column names and row field maps. Cells that parse
/// as numbers are kept numeric so rating columns survive as ratings.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<ParsedTable> {
    let file = File::open(&path)?;
    let mut reader = csv::Reader::from_reader(file);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.is_empty() {
        return Err(Error::InvalidDatasetState(
            "CSV file has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = BTreeMap::new();
        for (column, cell) in columns.iter().zip(record.iter()) {
            fields.insert(column.clone(), parse_cell(cell));
        }
        rows.push(fields);
    }

    tracing::info!(rows = rows.len(), columns = columns.len(), "Parsed CSV file");
    Ok(ParsedTable { columns, rows })
}

fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_headers_and_typed_cells() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rating,comments,name").unwrap();
        writeln!(file, "5,Great product,Alex").unwrap();
        writeln!(file, "2.5,Too slow,Sam").unwrap();

        let table = read_csv(file.path()).unwrap();

        assert_eq!(table.columns, vec!["rating", "comments", "name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["rating"], Value::from(5));
        assert_eq!(table.rows[0]["comments"], Value::from("Great product"));
        assert_eq!(table.rows[1]["rating"], Value::from(2.5));
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(read_csv(file.path()).is_err());
    }
}
