//! Table collection: every table of an analysis result, reconstructed, in
//! document order.
//!
//! Order matters downstream: the classification verdicts are matched back
//! to tables purely by position, so this module must never sort, filter or
//! deduplicate.

use crate::document::DocumentAnalysisResult;
use crate::pipeline::grid::{reconstruct, ReconstructedTable};
use tracing::{debug, warn};

/// Reconstruct all tables of `analysis`, preserving their order.
pub fn collect_tables(analysis: &DocumentAnalysisResult) -> Vec<ReconstructedTable> {
    analysis
        .tables
        .iter()
        .enumerate()
        .map(|(idx, descriptor)| {
            let skipped = descriptor.out_of_bounds_cells();
            if skipped > 0 {
                warn!(
                    "Table {}: ignoring {} cells outside its {}x{} bounds",
                    idx, skipped, descriptor.row_count, descriptor.col_count
                );
            }
            let table = reconstruct(descriptor);
            debug!(
                "Table {}: {}x{}, headers {:?}",
                idx,
                table.row_count(),
                table.col_count(),
                table.header_texts()
            );
            table
        })
        .collect()
}
