//! Grid reconstruction: sparse cell list → dense, span-correct HTML table.
//!
//! The layout service only reports the top-left *anchor* of each merged
//! region. To hand the oracle a table it can read, we rebuild the dense
//! `row_count × col_count` grid, suppress every coordinate that belongs to
//! another cell's span, and render the result as HTML with
//! `rowspan`/`colspan` attributes.
//!
//! ## Rules
//!
//! 1. Duplicate anchors: the later cell in input order wins.
//! 2. Spans are clipped to the table bounds and to coordinates already
//!    claimed by an earlier span in render order, so every coordinate is
//!    rendered by exactly one cell. The emitted attributes carry the clipped
//!    spans.
//! 3. An anchor sitting on a claimed coordinate is suppressed along with it.
//! 4. Rows `0` and `1` are header rows (`<th>`), everything below is data
//!    (`<td>`), placeholders included. Transcripts put the column titles and
//!    a sub-title row at the top; the count is fixed at [`HEADER_ROWS`].
//! 5. Anchors outside the declared bounds are ignored.

use crate::document::{CellDescriptor, TableDescriptor};

/// Number of leading rows rendered as header cells.
pub const HEADER_ROWS: usize = 2;

/// Header (`<th>`) or data (`<td>`) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Header,
    Data,
}

impl CellKind {
    fn for_row(row: usize) -> Self {
        if row < HEADER_ROWS {
            CellKind::Header
        } else {
            CellKind::Data
        }
    }

    fn tag(self) -> &'static str {
        match self {
            CellKind::Header => "th",
            CellKind::Data => "td",
        }
    }
}

/// One emitted cell of a reconstructed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub row: usize,
    pub col: usize,
    pub content: String,
    /// Effective (clipped) span, always ≥ 1.
    pub row_span: usize,
    pub col_span: usize,
    pub kind: CellKind,
    /// True when no cell descriptor claimed this coordinate.
    pub placeholder: bool,
}

/// A dense table, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedTable {
    row_count: usize,
    col_count: usize,
    rows: Vec<Vec<RenderedCell>>,
    html: String,
}

impl ReconstructedTable {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    /// Emitted cells per row. Covered coordinates do not appear.
    pub fn rows(&self) -> &[Vec<RenderedCell>] {
        &self.rows
    }

    /// The table as HTML markup.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Trimmed, non-empty header cell texts in render order.
    pub fn header_texts(&self) -> Vec<String> {
        self.rows
            .iter()
            .flatten()
            .filter(|c| c.kind == CellKind::Header && !c.placeholder)
            .map(|c| c.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Rebuild the dense grid for one table descriptor and render it.
pub fn reconstruct(descriptor: &TableDescriptor) -> ReconstructedTable {
    let (rows, cols) = (descriptor.row_count, descriptor.col_count);

    if rows == 0 || cols == 0 {
        return ReconstructedTable {
            row_count: rows,
            col_count: cols,
            rows: Vec::new(),
            html: render_html(&[]),
        };
    }

    let mut anchors: Vec<Vec<Option<&CellDescriptor>>> = vec![vec![None; cols]; rows];
    for cell in &descriptor.cells {
        if cell.row_index < rows && cell.col_index < cols {
            anchors[cell.row_index][cell.col_index] = Some(cell);
        }
    }

    let mut covered = vec![vec![false; cols]; rows];
    let mut rendered = Vec::with_capacity(rows);

    for (r, anchor_row) in anchors.iter().enumerate() {
        let kind = CellKind::for_row(r);
        let mut row = Vec::with_capacity(cols);

        for (c, anchor) in anchor_row.iter().enumerate() {
            if covered[r][c] {
                continue;
            }
            match anchor {
                Some(cell) => {
                    let (row_span, col_span) = claim_span(
                        &mut covered,
                        r,
                        c,
                        cell.row_span.max(1),
                        cell.col_span.max(1),
                    );
                    row.push(RenderedCell {
                        row: r,
                        col: c,
                        content: cell.content.clone(),
                        row_span,
                        col_span,
                        kind,
                        placeholder: false,
                    });
                }
                None => row.push(RenderedCell {
                    row: r,
                    col: c,
                    content: String::new(),
                    row_span: 1,
                    col_span: 1,
                    kind,
                    placeholder: true,
                }),
            }
        }
        rendered.push(row);
    }

    let html = render_html(&rendered);
    ReconstructedTable {
        row_count: rows,
        col_count: cols,
        rows: rendered,
        html,
    }
}

/// Mark the span rectangle anchored at `(row, col)` as covered and return
/// the effective `(row_span, col_span)`.
///
/// The rectangle grows right along the anchor row while coordinates are
/// free, then down while the whole strip below is free.
fn claim_span(
    covered: &mut [Vec<bool>],
    row: usize,
    col: usize,
    row_span: usize,
    col_span: usize,
) -> (usize, usize) {
    let rows = covered.len();
    let cols = covered[row].len();

    let mut width = 1;
    while width < col_span && col + width < cols && !covered[row][col + width] {
        width += 1;
    }

    let mut height = 1;
    while height < row_span
        && row + height < rows
        && (col..col + width).all(|c| !covered[row + height][c])
    {
        height += 1;
    }

    for cells in covered.iter_mut().skip(row).take(height) {
        for flag in cells.iter_mut().skip(col).take(width) {
            *flag = true;
        }
    }
    // The anchor itself is rendered, not covered.
    covered[row][col] = false;

    (height, width)
}

fn render_html(rows: &[Vec<RenderedCell>]) -> String {
    let mut html = vec![r#"<table border="1">"#.to_string()];

    for row in rows {
        html.push("<tr>".to_string());
        for cell in row {
            let tag = cell.kind.tag();
            let mut attrs = String::new();
            if cell.row_span > 1 {
                attrs.push_str(&format!(r#" rowspan="{}""#, cell.row_span));
            }
            if cell.col_span > 1 {
                attrs.push_str(&format!(r#" colspan="{}""#, cell.col_span));
            }
            html.push(format!(
                "<{tag}{attrs}>{}</{tag}>",
                escape_html(&cell.content)
            ));
        }
        html.push("</tr>".to_string());
    }

    html.push("</table>".to_string());
    html.join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
