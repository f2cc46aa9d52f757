//! Tabular dataset abstraction shared by the analysis engines
//!
//! Observation data arrives as arbitrary CSV files, so the table is dynamic:
//! named columns over row-major cells, each cell numeric, text, or missing.
//! The engines never mutate a table; each computation borrows it read-only.

mod columns;
mod loader;

pub use columns::{
    resolve, resolve_age, resolve_event, resolve_qx, resolve_time, ColumnRole, AGE_CANDIDATES,
    EVENT_CANDIDATES, QX_CANDIDATES, TIME_CANDIDATES,
};
pub use loader::{load_table, load_table_from_reader, load_triangle, load_triangle_from_reader};

/// A single cell of an observation table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric cell (anything that parses as f64).
    Number(f64),
    /// Non-numeric text cell.
    Text(String),
    /// Empty cell.
    Missing,
}

impl Value {
    /// Numeric view of the cell, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// String form used for grouping (strata keys).
    pub fn label(&self) -> Option<String> {
        match self {
            Value::Number(v) => Some(format_numeric_label(*v)),
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }
}

/// Render a numeric strata key without a trailing ".0" for whole numbers,
/// so a 0/1-coded group column produces labels "0" and "1".
fn format_numeric_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Dynamic observation table: named columns over row-major cells.
#[derive(Debug, Clone)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    /// Build a table from headers and row-major cells.
    ///
    /// Ragged rows are rejected so that column indexing is always valid.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> crate::error::Result<Self> {
        let width = headers.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(crate::error::EngineError::InvalidInput(format!(
                "row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Column headers in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, column index).
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    /// All cells of one column, in row order.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[col])
    }

    /// Numeric view of a column: one entry per row, `None` where the cell is
    /// missing or non-numeric.
    pub fn numeric_column(&self, col: usize) -> Vec<Option<f64>> {
        self.column(col).map(Value::as_number).collect()
    }

    /// A column is numeric when it has at least one present cell and every
    /// present cell parses as a number.
    pub fn is_numeric_column(&self, col: usize) -> bool {
        let mut seen = false;
        for cell in self.column(col) {
            match cell {
                Value::Number(_) => seen = true,
                Value::Text(_) => return false,
                Value::Missing => {}
            }
        }
        seen
    }

    /// A binary column is numeric with present values drawn from {0, 1}.
    pub fn is_binary_column(&self, col: usize) -> bool {
        let mut seen = false;
        for cell in self.column(col) {
            match cell {
                Value::Number(v) if *v == 0.0 || *v == 1.0 => seen = true,
                Value::Number(_) | Value::Text(_) => return false,
                Value::Missing => {}
            }
        }
        seen
    }

    /// Indices of all numeric columns, in header order.
    pub fn numeric_column_indices(&self) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&c| self.is_numeric_column(c))
            .collect()
    }
}

/// Cumulative claims triangle: rows are origin periods, columns are
/// development periods. `None` marks the unobserved lower-right cells.
#[derive(Debug, Clone)]
pub struct Triangle {
    origins: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
    n_dev: usize,
}

impl Triangle {
    /// Build a triangle from per-origin rows of cumulative amounts.
    pub fn new(origins: Vec<String>, cells: Vec<Vec<Option<f64>>>) -> crate::error::Result<Self> {
        if origins.len() != cells.len() {
            return Err(crate::error::EngineError::InvalidInput(format!(
                "{} origin labels for {} rows",
                origins.len(),
                cells.len()
            )));
        }
        let n_dev = cells.first().map(|r| r.len()).unwrap_or(0);
        if cells.iter().any(|r| r.len() != n_dev) {
            return Err(crate::error::EngineError::InvalidInput(
                "triangle rows have unequal development-period counts".into(),
            ));
        }
        Ok(Self { origins, cells, n_dev })
    }

    /// Origin-period labels in row order.
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// Number of origin rows.
    pub fn n_origin(&self) -> usize {
        self.cells.len()
    }

    /// Number of development columns.
    pub fn n_dev(&self) -> usize {
        self.n_dev
    }

    /// Cumulative amount at (origin row, development column), if observed.
    pub fn cell(&self, origin: usize, dev: usize) -> Option<f64> {
        self.cells[origin][dev]
    }

    /// One origin row.
    pub fn row(&self, origin: usize) -> &[Option<f64>] {
        &self.cells[origin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataTable {
        DataTable::new(
            vec!["time".into(), "event".into(), "group".into()],
            vec![
                vec![Value::Number(5.0), Value::Number(1.0), Value::Text("a".into())],
                vec![Value::Number(8.0), Value::Number(0.0), Value::Text("b".into())],
                vec![Value::Missing, Value::Number(1.0), Value::Text("a".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_and_binary_detection() {
        let t = table();
        assert!(t.is_numeric_column(0));
        assert!(t.is_numeric_column(1));
        assert!(!t.is_numeric_column(2));
        assert!(t.is_binary_column(1));
        assert!(!t.is_binary_column(0));
        assert_eq!(t.numeric_column_indices(), vec![0, 1]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = DataTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Number(1.0)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_labels() {
        assert_eq!(Value::Number(1.0).label().unwrap(), "1");
        assert_eq!(Value::Number(2.5).label().unwrap(), "2.5");
        assert!(Value::Missing.label().is_none());
    }

    #[test]
    fn test_triangle_shape() {
        let tri = Triangle::new(
            vec!["2020".into(), "2021".into()],
            vec![
                vec![Some(100.0), Some(150.0)],
                vec![Some(200.0), None],
            ],
        )
        .unwrap();
        assert_eq!(tri.n_origin(), 2);
        assert_eq!(tri.n_dev(), 2);
        assert_eq!(tri.cell(1, 1), None);
    }
}
