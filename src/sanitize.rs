//! Final-answer sanitization.
//!
//! Some models degenerate into repeating their last sentence over and
//! over. [`truncate_trailing_repetition`] detects a trailing run of
//! three or more identical sentence units and cuts the output after
//! the first repetition, keeping the original sentence plus one
//! repeat. Short texts pass through untouched — the heuristic only
//! fires on genuinely pathological output.

/// Texts shorter than this are never touched.
const MIN_TEXT_LEN: usize = 80;

/// Minimum number of sentence units before the heuristic applies.
const MIN_UNITS: usize = 5;

/// Run length at which the trailing repetition is considered
/// pathological.
const MIN_RUN: usize = 3;

/// Removes a pathological trailing repetition from `text`.
///
/// Returns the input unchanged unless it has at least [`MIN_UNITS`]
/// sentence-like units and ends in a run of at least [`MIN_RUN`]
/// identical ones; in that case everything after the first repetition
/// is dropped.
pub fn truncate_trailing_repetition(text: &str) -> String {
    if text.len() < MIN_TEXT_LEN {
        return text.to_string();
    }

    let units = split_units(text);
    if units.len() < MIN_UNITS {
        return text.to_string();
    }

    let last = units[units.len() - 1].trim();
    if last.is_empty() {
        return text.to_string();
    }

    let run = units
        .iter()
        .rev()
        .take_while(|u| u.trim() == last)
        .count();
    if run < MIN_RUN {
        return text.to_string();
    }

    // Keep everything before the run, plus the original sentence and
    // its first repetition.
    let keep = units.len() - run + 2;
    units[..keep].concat().trim_end().to_string()
}

/// Splits text into sentence-like units, each carrying its terminator
/// and any following whitespace.
fn split_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            // Absorb consecutive terminators ("..." / "?!") into one unit.
            let mut end = i + c.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '\n') {
                    end = j + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            units.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        units.push(&text[start..]);
    }
    units
}
