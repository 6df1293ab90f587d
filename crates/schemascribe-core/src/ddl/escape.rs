use std::sync::LazyLock;

use regex::Regex;

/// Quote character enclosing a description literal in the emitted DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
}

impl Quote {
    pub fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Prepare description text for a string literal quoted with `quote`.
///
/// Non-breaking spaces become spaces, whitespace runs collapse to one space,
/// the ends are trimmed, backslashes are doubled and the enclosing quote
/// character is backslash-escaped. Length is not checked here.
pub fn escape_description(text: &str, quote: Quote) -> String {
    let normalized = text.replace('\u{a0}', " ");
    let collapsed = WHITESPACE_RE.replace_all(&normalized, " ");
    let q = quote.as_char();

    let mut out = String::with_capacity(collapsed.len());
    for ch in collapsed.trim().chars() {
        if ch == '\\' {
            out.push_str("\\\\");
        } else if ch == q {
            out.push('\\');
            out.push(ch);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Longest prefix of `text` whose escaped form stays within `max_len`
/// characters under either quote style. Trailing whitespace is dropped.
///
/// Escaped length only grows as the prefix grows, so the cut is found by
/// binary search over char counts.
pub fn fit_escaped(text: &str, max_len: usize) -> &str {
    let fits = |prefix: &str| escaped_width(prefix) <= max_len;

    let ends: Vec<usize> = text
        .char_indices()
        .map(|(i, ch)| i + ch.len_utf8())
        .collect();
    if ends.is_empty() || fits(text) {
        return text.trim_end();
    }

    // Invariant: a prefix of `lo` chars fits, one of `hi` chars does not.
    let (mut lo, mut hi) = (0usize, ends.len().min(max_len + 1));
    if fits(&text[..ends[hi - 1]]) {
        lo = hi;
        hi = ends.len();
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(&text[..ends[mid - 1]]) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let end = if lo == 0 { 0 } else { ends[lo - 1] };
    text[..end].trim_end()
}

fn escaped_width(text: &str) -> usize {
    escape_description(text, Quote::Single)
        .chars()
        .count()
        .max(escape_description(text, Quote::Double).chars().count())
}
