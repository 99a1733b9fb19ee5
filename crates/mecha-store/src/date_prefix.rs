//! Leading-date detection for free-text assignments.
//!
//! `"2025-03-10 Read chapter 4"` targets 2025-03-10. The heuristic only looks
//! at the first 10 characters: exactly two hyphens there marks a date
//! candidate. A text that happens to start that way but does not parse is
//! treated as undated and kept whole.

use chrono::NaiveDate;

const PREFIX_LEN: usize = 10;

/// Outcome of looking for a leading `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePrefix<'a> {
    /// A parseable date, and the text after it with one separator dropped.
    Dated { date: NaiveDate, rest: &'a str },
    Undated,
}

/// Split a leading `YYYY-MM-DD` off `text` (which should already be trimmed).
pub fn parse_date_prefix(text: &str) -> DatePrefix<'_> {
    let prefix_end = match text.char_indices().nth(PREFIX_LEN) {
        Some((idx, _)) => idx,
        None => text.len(),
    };
    let prefix = &text[..prefix_end];
    if prefix.matches('-').count() != 2 || !is_zero_padded_date(prefix) {
        return DatePrefix::Undated;
    }
    let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") else {
        return DatePrefix::Undated;
    };

    // Drop one separator character after the date, whatever it is.
    let rest = &text[prefix_end..];
    let rest = match rest.chars().next() {
        Some(sep) => &rest[sep.len_utf8()..],
        None => rest,
    };
    DatePrefix::Dated {
        date,
        rest: rest.trim(),
    }
}

/// `DDDD-DD-DD` shape check; chrono alone accepts space-padded fields.
fn is_zero_padded_date(prefix: &str) -> bool {
    let bytes = prefix.as_bytes();
    bytes.len() == PREFIX_LEN
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
