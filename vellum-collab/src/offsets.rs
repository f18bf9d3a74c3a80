//! Offset translation between UTF-16 code units and Unicode codepoints.
//!
//! The editor widget reports change ranges in UTF-16 code units; the wire
//! protocol and the compiler count codepoints. The two differ whenever a
//! character outside the Basic Multilingual Plane (a surrogate pair)
//! precedes the edit point. Translation always runs against the
//! last-synchronized content, never the live buffer, so unacknowledged
//! edits are not double-counted.

use crate::protocol::EditChange;

/// A text change as produced by the editor widget, in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf16Change {
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

/// Codepoint count of the prefix ending at `utf16_offset`.
///
/// An offset landing inside a surrogate pair rounds past the pair.
pub fn codepoint_offset(content: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    let mut codepoints = 0;
    for ch in content.chars() {
        if units >= utf16_offset {
            break;
        }
        units += ch.len_utf16();
        codepoints += 1;
    }
    codepoints
}

/// Total codepoints in `content`.
pub fn codepoint_len(content: &str) -> usize {
    content.chars().count()
}

/// Recompute a UTF-16 change in codepoint units against `last_synced`.
pub fn translate_change(last_synced: &str, change: &Utf16Change) -> EditChange {
    let start = codepoint_offset(last_synced, change.range_offset);
    let end = codepoint_offset(last_synced, change.range_offset + change.range_length);
    EditChange {
        text: change.text.clone(),
        range_offset: start,
        range_length: end - start,
        rest_length: codepoint_len(last_synced) - end,
    }
}

/// Splice a codepoint-space change into `content`.
pub fn apply_change(content: &str, change: &EditChange) -> String {
    let start = byte_offset(content, change.range_offset);
    let end = byte_offset(content, change.range_offset + change.range_length);
    let mut out = String::with_capacity(content.len() + change.text.len());
    out.push_str(&content[..start]);
    out.push_str(&change.text);
    out.push_str(&content[end..]);
    out
}

fn byte_offset(content: &str, codepoint: usize) -> usize {
    content
        .char_indices()
        .nth(codepoint)
        .map(|(i, _)| i)
        .unwrap_or(content.len())
}
