//! Markup segmentation: heading-level section splitting and template
//! enumeration. These are the only two markup operations the rest of the
//! pipeline needs; no grammar-level parsing happens here.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(={2,6})\s*(.+?)\s*={2,6}\s*$").unwrap());

/// Splits `text` into the leading block and the ordered segments opened by
/// headings of exactly `level`. A segment runs from its heading to the next
/// heading of the same or a shallower level. The lead is everything before
/// the first such segment (all of `text` if there is none).
pub fn split_sections(text: &str, level: usize) -> (&str, Vec<&str>) {
    let headings: Vec<(usize, usize)> = HEADING_REGEX
        .captures_iter(text)
        .map(|caps| {
            let m = caps.get(0).unwrap();
            (m.start(), caps.get(1).unwrap().as_str().len())
        })
        .collect();

    let mut sections = Vec::new();
    let mut lead_end = text.len();
    for (i, &(start, lvl)) in headings.iter().enumerate() {
        if lvl != level {
            continue;
        }
        if sections.is_empty() {
            lead_end = start;
        }
        let end = headings[i + 1..]
            .iter()
            .find(|&&(_, l)| l <= level)
            .map(|&(s, _)| s)
            .unwrap_or(text.len());
        sections.push(&text[start..end]);
    }
    (&text[..lead_end], sections)
}

/// Enumerates top-level template invocations (`{{ ... }}`, nesting respected)
/// as literal substrings of `text`, in document order. Unclosed templates are
/// skipped.
pub fn templates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            match find_matching_close(bytes, i) {
                Some(close) => {
                    out.push(&text[i..close + 2]);
                    i = close + 2;
                }
                None => i += 2,
            }
        } else {
            i += 1;
        }
    }
    out
}

/// Byte index of the `}}` that closes the `{{` at `start`.
fn find_matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}
