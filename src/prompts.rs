//! System instructions for the four oracle tasks.
//!
//! Every prompt lives here so wording changes never touch the gating logic
//! in [`crate::extract`], and so tests can inspect prompts without a live
//! model. The schema block appended by [`schema_instruction`] is what turns
//! a chat model into a structured-output oracle: it names the schema, shows
//! it, and forbids anything but a single JSON object in the reply.

use crate::schema::SchemaSpec;

/// Identity extraction from the document's full text.
pub const IDENTITY_PROMPT: &str = r#"You are an expert at reading school transcripts and mark sheets.
Extract the student's information from the document text provided by the user:

- name: the student's full name as printed
- board: the examination board or curriculum (e.g. CBSE, ICSE, Cambridge, IB)
- school: the name of the school or institution
- city: the city of the school
- country: the country of the school

Use an empty string for any field the document does not state. Do not guess."#;

/// Role classification over the ordered list of reconstructed tables.
pub const TABLE_CLASSIFICATION_PROMPT: &str = r#"You are a table classifier for school transcripts.
The user provides a JSON list of tables, each rendered as HTML, in document order.
For each table decide whether it lists a student's marks or grades per subject.

Return exactly one entry per input table, in the same order as the input.
Set "isMarksTable" to true only for tables whose rows are subjects and whose
columns hold that student's marks or grades. Tables of personal details,
grading legends, attendance or signatures are not marks tables."#;

/// Detection of tables that mix grading scales, sittings or year levels.
pub const MULTIPLE_GRADING_SCALE_PROMPT: &str = r#"You are checking a single HTML table taken from a school transcript.
Decide whether the table mixes results that must not be combined:

- more than one grading scale (e.g. GCSE and IGCSE grades in the same table)
- results of more than one examination year or sitting (e.g. 2024 and 2025)
- results of more than one year level (e.g. grade 9, grade 10 and grade 11)

Set "isMultipleGradingScale" to true only if the table mixes any of these."#;

/// Subject/grade extraction from the single surviving marks table.
pub const MARKS_EXTRACTION_PROMPT: &str = r#"You extract a student's final results from a single HTML table taken from a school transcript.
For every subject row, return the subject name and its final grade.

"subjectGrade" holds either:
- a numeric mark written as a decimal number (e.g. "87" or "87.5"), or
- a letter-based grade including any modifiers (e.g. "A*", "B+", "Distinction")

Keep the order of the rows in the table. Skip totals, averages and blank rows."#;

/// Build the schema block appended to every task instruction.
pub fn schema_instruction(schema: &SchemaSpec) -> String {
    let pretty = serde_json::to_string_pretty(&schema.schema).unwrap_or_else(|_| "{}".to_string());
    format!(
        "\n\nRespond with a single JSON object conforming to the JSON Schema named \"{}\":\n\n{}\n\n\
Output ONLY the JSON object. Do NOT wrap it in code fences. Do NOT add commentary.",
        schema.name, pretty
    )
}
