//! Shortening long tokens and bodies for log lines

/// Byte offset of the `n`-th char, or `s.len()` if there are fewer.
fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Keep the first `limit` chars, appending `ellipsis` if anything was cut.
pub fn trim(s: &str, limit: usize, ellipsis: &str) -> String {
    if s.chars().count() < limit {
        return s.to_string();
    }
    format!("{}{ellipsis}", &s[..char_offset(s, limit)])
}

/// Keep both ends of a long string, e.g. `DXF1 [...] AAAA [412]`.
pub fn shorten(s: &str, limit: usize) -> String {
    let len = s.chars().count();
    if len < limit {
        return s.to_string();
    }
    let k = limit / 2;
    let head = &s[..char_offset(s, k)];
    let tail = &s[char_offset(s, len - k)..];
    format!("{head} [...] {tail} [{}]", s.len())
}
