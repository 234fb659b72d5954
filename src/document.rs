//! Typed layout-analysis result.
//!
//! The layout service answers with a deeply nested JSON document. Everything
//! the pipeline needs is deserialized here, once, into plain structs; no
//! other module looks at raw JSON keys. Field names follow the service's
//! camelCase wire format (`rowCount`, `columnCount`, `rowIndex`, ...).

use serde::{Deserialize, Serialize};

/// The full layout of one analysed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysisResult {
    /// Full plain-text content of the document in reading order.
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub pages: Vec<Page>,

    /// Tables in document order.
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-indexed.
    pub page_number: u32,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// `"inch"` for PDFs, `"pixel"` for images.
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub content: String,
    /// Flattened `[x0, y0, x1, y1, ...]` bounding polygon.
    #[serde(default)]
    pub polygon: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub polygon: Vec<f64>,
    #[serde(default)]
    pub confidence: f64,
}

/// A sparse table: dimensions plus the anchor cells that carry content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(rename = "rowCount", default)]
    pub row_count: usize,
    #[serde(rename = "columnCount", default)]
    pub col_count: usize,
    #[serde(default)]
    pub cells: Vec<CellDescriptor>,
}

impl TableDescriptor {
    pub fn new(row_count: usize, col_count: usize) -> Self {
        Self {
            row_count,
            col_count,
            cells: Vec::new(),
        }
    }

    /// Append a cell, builder style.
    pub fn with_cell(mut self, cell: CellDescriptor) -> Self {
        self.cells.push(cell);
        self
    }

    /// Cells whose anchor lies outside `[0, row_count) × [0, col_count)`.
    pub fn out_of_bounds_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.row_index >= self.row_count || c.col_index >= self.col_count)
            .count()
    }
}

/// The top-left anchor of a (possibly merged) table region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDescriptor {
    #[serde(rename = "rowIndex")]
    pub row_index: usize,
    #[serde(rename = "columnIndex")]
    pub col_index: usize,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "rowSpan", default = "one")]
    pub row_span: usize,
    #[serde(rename = "columnSpan", default = "one")]
    pub col_span: usize,
    /// Service-side role hint (`columnHeader`, `rowHeader`, `content`, ...).
    /// Informational only; the header convention is positional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

fn one() -> usize {
    1
}

impl CellDescriptor {
    /// A 1×1 cell.
    pub fn new(row_index: usize, col_index: usize, content: impl Into<String>) -> Self {
        Self {
            row_index,
            col_index,
            content: content.into(),
            row_span: 1,
            col_span: 1,
            kind: None,
        }
    }

    pub fn spanning(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span;
        self.col_span = col_span;
        self
    }
}
