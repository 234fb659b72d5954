//! Output schemas for the four oracle tasks.
//!
//! Each schema is a serde type plus a JSON Schema describing it. The JSON
//! Schema goes into the oracle's instruction; the serde type is what the
//! reply is deserialized into. Keeping both next to each other is the only
//! way to notice when they drift.

use crate::output::{ExtractedRecord, StudentInformation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A type the oracle can be asked to produce.
pub trait OracleSchema: DeserializeOwned + Send {
    /// Schema name shown to the oracle.
    const NAME: &'static str;

    /// JSON Schema of the expected reply object.
    fn json_schema() -> Value;
}

/// Schema name plus JSON Schema, as sent with an oracle request.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSpec {
    pub name: &'static str,
    pub schema: Value,
}

impl SchemaSpec {
    pub fn of<T: OracleSchema>() -> Self {
        Self {
            name: T::NAME,
            schema: T::json_schema(),
        }
    }
}

impl OracleSchema for StudentInformation {
    const NAME: &'static str = "StudentInformation";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "board": {"type": "string"},
                "school": {"type": "string"},
                "city": {"type": "string"},
                "country": {"type": "string"}
            },
            "required": ["name", "board", "school", "city", "country"],
            "additionalProperties": false
        })
    }
}

/// One role verdict, in the same position as the table it judges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableVerdict {
    /// Echo of the table, ignored by the pipeline.
    #[serde(default)]
    pub table_content: String,
    pub is_marks_table: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableClassification {
    pub tables: Vec<TableVerdict>,
}

impl OracleSchema for TableClassification {
    const NAME: &'static str = "TableClassification";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "tables": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "tableContent": {"type": "string"},
                            "isMarksTable": {"type": "boolean"}
                        },
                        "required": ["tableContent", "isMarksTable"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["tables"],
            "additionalProperties": false
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsMultipleGradingScale {
    pub is_multiple_grading_scale: bool,
}

impl OracleSchema for IsMultipleGradingScale {
    const NAME: &'static str = "IsMultipleGradingScale";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "isMultipleGradingScale": {"type": "boolean"}
            },
            "required": ["isMultipleGradingScale"],
            "additionalProperties": false
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedOutput {
    pub subjects: Vec<ExtractedRecord>,
}

impl OracleSchema for ExtractedOutput {
    const NAME: &'static str = "ExtractedOutput";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "subjects": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "subjectName": {"type": "string"},
                            "subjectGrade": {"type": "string"}
                        },
                        "required": ["subjectName", "subjectGrade"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["subjects"],
            "additionalProperties": false
        })
    }
}
