//! Pipeline output types.
//!
//! These are what a caller sees: the student's identity, the per-subject
//! records, and the intermediate [`ClassifiedTable`] verdicts for callers
//! that want to log them. All serialize with camelCase keys, the shape of
//! the success half of the request/response contract:
//!
//! ```json
//! {
//!   "studentInformation": {"name": "…", "board": "…", "school": "…", "city": "…", "country": "…"},
//!   "marks": [{"subjectName": "Math", "subjectGrade": "A"}]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Who the transcript belongs to. Extracted once from the full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInformation {
    pub name: String,
    /// Examination board or curriculum (e.g. "CBSE", "Cambridge").
    pub board: String,
    pub school: String,
    pub city: String,
    pub country: String,
}

/// One subject and its final grade, exactly as the oracle read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub subject_name: String,
    /// Numeric ("87.5") or letter-based ("A*", "B+") grade.
    pub subject_grade: String,
}

impl ExtractedRecord {
    pub fn new(subject_name: impl Into<String>, subject_grade: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_grade: subject_grade.into(),
        }
    }
}

/// A reconstructed table paired with the oracle's role verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedTable {
    /// The pipeline's own HTML for the table at this position.
    pub table_content: String,
    pub is_marks_table: bool,
}

/// The terminal output of one successful extraction.
///
/// Only ever constructed once every gate has passed; `marks` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub student_information: StudentInformation,
    pub marks: Vec<ExtractedRecord>,
}
