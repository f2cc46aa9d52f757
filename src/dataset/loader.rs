//! Load observation tables and claims triangles from CSV files

use std::path::Path;

use csv::Reader;

use crate::dataset::{DataTable, Triangle, Value};
use crate::error::{EngineError, Result};

/// Parse one CSV cell: number if it parses, text otherwise, empty = missing.
fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Number(v),
        _ => Value::Text(trimmed.to_string()),
    }
}

/// Load an observation table from a CSV file with a header row.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<DataTable> {
    let reader = Reader::from_path(path)?;
    read_table(reader)
}

/// Load an observation table from any reader (string buffer, network stream).
pub fn load_table_from_reader<R: std::io::Read>(reader: R) -> Result<DataTable> {
    read_table(Reader::from_reader(reader))
}

fn read_table<R: std::io::Read>(mut reader: Reader<R>) -> Result<DataTable> {
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<Value> = record.iter().map(parse_cell).collect();
        // Short records happen with trailing commas; pad to the header width.
        row.resize(headers.len(), Value::Missing);
        row.truncate(headers.len());
        rows.push(row);
    }

    DataTable::new(headers, rows)
}

/// Load a cumulative claims triangle from a CSV file.
///
/// The file must contain an `origin` column; every other column is treated
/// as one development period, in file order. Blank or non-numeric cells
/// become missing (the unobserved lower-right of the triangle).
pub fn load_triangle<P: AsRef<Path>>(path: P) -> Result<Triangle> {
    let reader = Reader::from_path(path)?;
    read_triangle(reader)
}

/// Load a claims triangle from any reader.
pub fn load_triangle_from_reader<R: std::io::Read>(reader: R) -> Result<Triangle> {
    read_triangle(Reader::from_reader(reader))
}

fn read_triangle<R: std::io::Read>(reader: Reader<R>) -> Result<Triangle> {
    let table = read_table(reader)?;

    let origin_col = table
        .column_index("origin")
        .ok_or_else(|| EngineError::InvalidInput("triangle CSV must contain an 'origin' column".into()))?;

    let dev_cols: Vec<usize> = (0..table.headers().len())
        .filter(|&c| c != origin_col)
        .collect();

    let mut origins = Vec::with_capacity(table.n_rows());
    let mut cells = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        let origin = table
            .cell(row, origin_col)
            .label()
            .unwrap_or_else(|| format!("row_{row}"));
        let amounts: Vec<Option<f64>> = dev_cols
            .iter()
            .map(|&c| table.cell(row, c).as_number())
            .collect();
        origins.push(origin);
        cells.push(amounts);
    }

    Triangle::new(origins, cells)
}
