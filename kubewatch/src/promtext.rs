//! A minimal Prometheus text-exposition parser and the glob filters applied
//! to scraped metric names.
//!
//! Labels are stripped: the resulting map is keyed by bare metric name and
//! duplicate names overwrite (last wins). Lines carrying `NaN` or infinite
//! values are rejected, as are lines with an unterminated labels block.

use std::collections::HashMap;

/// Parses a text-exposition body into a name-to-value map, admitting only
/// names matched by `filters` (an empty filter list admits everything).
pub(crate) fn parse(body: &str, filters: &[String]) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    for raw in body.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = parse_sample(line) else {
            continue;
        };
        if !matches_filters(name, filters) {
            continue;
        }
        values.insert(name.to_string(), value);
    }
    values
}

/// Parses one `name[{labels}] value [timestamp]` sample line. Returns `None`
/// for malformed lines and non-finite values.
fn parse_sample(line: &str) -> Option<(&str, f64)> {
    let (name, rest) = match line.find('{') {
        Some(open) => {
            // The labels block must be closed; a missing `}` rejects the line.
            let close = open + line[open..].find('}')?;
            (line[..open].trim_end(), &line[close + 1..])
        }
        None => {
            let space = line.find(char::is_whitespace)?;
            (&line[..space], &line[space..])
        }
    };
    if name.is_empty() {
        return None;
    }
    // The value is the first token after the name; a trailing timestamp
    // token is ignored.
    let value: f64 = rest.split_whitespace().next()?.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((name, value))
}

/// Returns true when `name` matches at least one pattern, or when no
/// patterns are configured.
pub(crate) fn matches_filters(name: &str, filters: &[String]) -> bool {
    filters.is_empty() || filters.iter().any(|pattern| glob_match(pattern, name))
}

/// Matches `name` against a `*`-wildcard pattern by literal-segment
/// scanning: segments between `*`s must appear in order, a pattern without a
/// leading `*` anchors its first segment as a prefix, and a pattern without
/// a trailing `*` anchors its last segment as an exact suffix.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = name;

    let first = segments[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last_index = segments.len() - 1;
    for segment in &segments[1..last_index] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(found) => rest = &rest[found + segment.len()..],
            None => return false,
        }
    }

    let last = segments[last_index];
    last.is_empty() || rest.ends_with(last)
}
