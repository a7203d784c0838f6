//! Column access for result records. Missing or mistyped columns are read as
//! absent; callers decide whether that is worth a warning.

use graphstate_core::{JsonValue, Record};

pub(crate) fn text<'a>(record: &'a Record, column: &str) -> Option<&'a str> {
    record.get(column).and_then(JsonValue::as_str)
}

pub(crate) fn owned_text(record: &Record, column: &str) -> Option<String> {
    text(record, column).map(str::to_string)
}

pub(crate) fn count(record: &Record, column: &str) -> u64 {
    record
        .get(column)
        .and_then(JsonValue::as_u64)
        .unwrap_or_default()
}
