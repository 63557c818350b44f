//! # Results Export
//!
//! Renders stored results as a CSV spreadsheet for download.

use super::model::ResultRow;

/// Column order of the exported sheet
pub const HEADER: [&str; 9] = [
    "id",
    "username",
    "class_name",
    "lesson_from",
    "lesson_to",
    "total_questions",
    "score",
    "answers",
    "created_at",
];

/// Render rows as RFC 4180 CSV with a header line and CRLF line endings
pub fn results_to_csv(rows: &[ResultRow]) -> String {
    let mut output = String::with_capacity(64 * (rows.len() + 1));
    push_record(&mut output, HEADER.iter().map(|h| h.to_string()));

    for row in rows {
        push_record(
            &mut output,
            [
                row.id.to_string(),
                row.username.clone(),
                row.class_name.clone().unwrap_or_default(),
                optional_int(row.lesson_from),
                optional_int(row.lesson_to),
                optional_int(row.total_questions),
                row.score.to_string(),
                row.answers.clone(),
                row.created_at.clone(),
            ],
        );
    }
    output
}

fn optional_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn push_record(output: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        escape_field(output, &field);
    }
    output.push_str("\r\n");
}

/// Quote fields holding separators, quotes or line breaks.
/// Fields starting with a formula trigger get a leading apostrophe.
fn escape_field(output: &mut String, field: &str) {
    let guarded;
    let field = if field.starts_with(['=', '+', '-', '@']) && field.parse::<f64>().is_err() {
        guarded = format!("'{}", field);
        guarded.as_str()
    } else {
        field
    };

    if field.contains([',', '"', '\n', '\r']) {
        output.push('"');
        for c in field.chars() {
            if c == '"' {
                output.push('"');
            }
            output.push(c);
        }
        output.push('"');
    } else {
        output.push_str(field);
    }
}
