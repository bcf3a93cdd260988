//! Result frame (§3): an ordered, named sequence of columns with typed cells.
//! Engine-agnostic on purpose — the DataFusion adapter in `curlake-query`
//! converts Arrow `RecordBatch`es into this shape at the dispatcher boundary.

use std::fmt;

/// A single typed cell value. Deliberately small: the result frame is a
/// caller-facing shape, not a full columnar representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    TimestampNanos(i64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, ""),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int64(i) => write!(f, "{i}"),
            Cell::Float64(v) => write!(f, "{v}"),
            Cell::Utf8(s) => write!(f, "{s}"),
            Cell::TimestampNanos(ns) => write!(f, "{ns}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Row order is query-defined; if the query does not specify one the frame
/// order is unspecified but stable within a single execution (§3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFrame {
    pub columns: Vec<Column>,
}

impl ResultFrame {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self { columns: Vec::new() }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
