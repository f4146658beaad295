//! Preview extraction — deterministic truncation of a generated reply.
//!
//! Replies are split on escaped delimiters (the two characters `\` `n`), never
//! on real newlines. A reply that does not contain the delimiter is returned
//! whole.

use crate::tasks::OutputFormat;

use super::prompt::ESCAPED_NEWLINE;

/// Reply meaning the generator found nothing relevant.
pub const NO_DATA_SENTINEL: &str = "No data found";

/// Delimiter between records of a JSON reply.
const JSON_RECORD_DELIMITER: &str = "},\\n    {";

/// Closing appended to a truncated JSON preview.
const JSON_PREVIEW_CLOSING: &str = "}\\n}";

const JSON_PREVIEW_SEGMENTS: usize = 3;
/// Header plus three rows.
const CSV_PREVIEW_LINES: usize = 4;
/// Header, separator plus three rows.
const MARKDOWN_PREVIEW_LINES: usize = 5;

/// True when the trimmed reply is the no-data sentinel, with or without a period.
pub fn is_no_data_sentinel(reply: &str) -> bool {
    let reply = reply.trim();
    reply == NO_DATA_SENTINEL || reply.strip_suffix('.') == Some(NO_DATA_SENTINEL)
}

/// Cut a reply down to its first few records.
///
/// The sentinel is passed through unchanged.
pub fn extract_preview(reply: &str, format: OutputFormat) -> String {
    if is_no_data_sentinel(reply) {
        return reply.to_string();
    }

    match format {
        OutputFormat::Json => {
            let mut preview = keep_segments(reply, JSON_RECORD_DELIMITER, JSON_PREVIEW_SEGMENTS);
            preview.push_str(JSON_PREVIEW_CLOSING);
            preview
        }
        OutputFormat::Csv => keep_segments(reply, ESCAPED_NEWLINE, CSV_PREVIEW_LINES),
        OutputFormat::Markdown => keep_segments(reply, ESCAPED_NEWLINE, MARKDOWN_PREVIEW_LINES),
    }
}

fn keep_segments(reply: &str, delimiter: &str, count: usize) -> String {
    reply
        .split(delimiter)
        .take(count)
        .collect::<Vec<_>>()
        .join(delimiter)
}
