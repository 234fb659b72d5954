//! Fail-closed gates between the oracle stages.
//!
//! Everything here is pure: oracle verdicts in, a decision out. The
//! orchestrator in [`crate::extract`] calls these in order and stops at the
//! first `Err`.

use crate::error::ExtractError;
use crate::output::{ClassifiedTable, ExtractedRecord};
use crate::pipeline::grid::ReconstructedTable;
use crate::schema::TableClassification;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationItem<'a> {
    table_content: &'a str,
    is_marks_table: &'static str,
}

/// Oracle input for table classification: a JSON list with one
/// `{tableContent, isMarksTable}` entry per table, in document order. The
/// verdict slot is left for the oracle to fill.
pub fn classification_input(tables: &[ReconstructedTable]) -> String {
    let items: Vec<ClassificationItem<'_>> = tables
        .iter()
        .map(|t| ClassificationItem {
            table_content: t.html(),
            is_marks_table: "true/false",
        })
        .collect();
    // Serializing borrowed strings into a Vec cannot fail.
    serde_json::to_string_pretty(&items).unwrap_or_default()
}

/// Pair each table with the verdict at the same position.
///
/// The content is always our own markup; whatever the oracle echoed back is
/// discarded. A verdict count that differs from the table count is a
/// protocol violation, because positional pairing would be meaningless.
pub fn pair_verdicts(
    tables: &[ReconstructedTable],
    classification: TableClassification,
) -> Result<Vec<ClassifiedTable>, ExtractError> {
    if classification.tables.len() != tables.len() {
        warn!(
            "Oracle returned {} verdicts for {} tables",
            classification.tables.len(),
            tables.len()
        );
        return Err(ExtractError::OracleProtocolViolation {
            expected: tables.len(),
            received: classification.tables.len(),
        });
    }

    Ok(tables
        .iter()
        .zip(classification.tables)
        .map(|(table, verdict)| ClassifiedTable {
            table_content: table.html().to_string(),
            is_marks_table: verdict.is_marks_table,
        })
        .collect())
}

/// Multi-table gate: the position of the marks table, if there is one.
///
/// More than one marks table is [`ExtractError::AmbiguousDocument`]; we do
/// not guess which one is authoritative.
pub fn marks_table_index(classified: &[ClassifiedTable]) -> Result<Option<usize>, ExtractError> {
    let marks: Vec<usize> = classified
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_marks_table)
        .map(|(i, _)| i)
        .collect();

    debug!("Marks tables at positions {:?}", marks);
    match marks.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(ExtractError::AmbiguousDocument {
            marks_tables: marks.len(),
        }),
    }
}

/// Per-table ambiguity gate.
pub fn check_grading_scale(table_index: usize, is_multiple: bool) -> Result<(), ExtractError> {
    if is_multiple {
        Err(ExtractError::UnsupportedLayout { table_index })
    } else {
        Ok(())
    }
}

/// Aggregation gate: a success never carries an empty `marks` list.
pub fn ensure_marks(marks: Vec<ExtractedRecord>) -> Result<Vec<ExtractedRecord>, ExtractError> {
    if marks.is_empty() {
        Err(ExtractError::ExtractionFailure)
    } else {
        Ok(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CellDescriptor, TableDescriptor};
    use crate::pipeline::grid::reconstruct;
    use crate::schema::TableVerdict;

    fn table(label: &str) -> ReconstructedTable {
        reconstruct(&TableDescriptor::new(1, 1).with_cell(CellDescriptor::new(0, 0, label)))
    }

    fn verdicts(flags: &[bool]) -> TableClassification {
        TableClassification {
            tables: flags
                .iter()
                .map(|&is_marks_table| TableVerdict {
                    table_content: "echo".into(),
                    is_marks_table,
                })
                .collect(),
        }
    }

    #[test]
    fn classification_input_lists_tables_in_order() {
        let input = classification_input(&[table("first"), table("second")]);
        let parsed: serde_json::Value = serde_json::from_str(&input).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0]["tableContent"].as_str().unwrap().contains("first"));
        assert!(items[1]["tableContent"].as_str().unwrap().contains("second"));
        assert_eq!(items[0]["isMarksTable"], "true/false");
    }

    #[test]
    fn pairing_keeps_our_markup_and_order() {
        let tables = [table("a"), table("b")];
        let classified = pair_verdicts(&tables, verdicts(&[false, true])).unwrap();
        assert_eq!(classified[0].table_content, tables[0].html());
        assert!(!classified[0].is_marks_table);
        assert_eq!(classified[1].table_content, tables[1].html());
        assert!(classified[1].is_marks_table);
    }

    #[test]
    fn count_mismatch_is_a_protocol_violation() {
        let err = pair_verdicts(&[table("a"), table("b")], verdicts(&[true])).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::OracleProtocolViolation {
                expected: 2,
                received: 1
            }
        ));
    }

    #[test]
    fn multi_table_gate() {
        let classified = |flags: &[bool]| -> Vec<ClassifiedTable> {
            flags
                .iter()
                .map(|&is_marks_table| ClassifiedTable {
                    table_content: String::new(),
                    is_marks_table,
                })
                .collect()
        };
        assert_eq!(marks_table_index(&classified(&[])).unwrap(), None);
        assert_eq!(marks_table_index(&classified(&[false, false])).unwrap(), None);
        assert_eq!(marks_table_index(&classified(&[false, true, false])).unwrap(), Some(1));
        assert!(matches!(
            marks_table_index(&classified(&[true, false, true])),
            Err(ExtractError::AmbiguousDocument { marks_tables: 2 })
        ));
    }

    #[test]
    fn grading_scale_gate() {
        assert!(check_grading_scale(0, false).is_ok());
        assert!(matches!(
            check_grading_scale(3, true),
            Err(ExtractError::UnsupportedLayout { table_index: 3 })
        ));
    }

    #[test]
    fn aggregation_gate() {
        assert!(matches!(ensure_marks(vec![]), Err(ExtractError::ExtractionFailure)));
        let marks = ensure_marks(vec![ExtractedRecord::new("Math", "A")]).unwrap();
        assert_eq!(marks.len(), 1);
    }
}
