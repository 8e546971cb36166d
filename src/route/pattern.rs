//! Pattern parsing and path normalization.
//!
//! # Responsibilities
//! - Parse declared patterns (`/users/{id}`, `/files/{*path}`) into segments
//! - Normalize concrete request paths the same way at compile and match time
//! - Percent-decode path segments
//!
//! Both sides must normalize identically or the compiler's conflict checks
//! stop being meaningful at match time.

use crate::error::CompileError;
use crate::route::model::Segment;

/// Parse a declared pattern into segments.
///
/// Rules: the pattern starts with `/`; `{name}` is a named parameter;
/// `{*name}` is a wildcard and must be the last segment; empty segments
/// (from doubled or trailing slashes) are dropped; capture names must be
/// unique within the pattern.
pub fn parse(pattern: &str) -> Result<Vec<Segment>, CompileError> {
    let invalid = |reason: &str| CompileError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if !pattern.starts_with('/') {
        return Err(invalid("pattern must start with '/'"));
    }

    let mut segments = Vec::new();
    let mut names: Vec<&str> = Vec::new();

    for raw in pattern.split('/') {
        if raw.is_empty() {
            continue;
        }
        if let Some(inner) = raw.strip_prefix('{') {
            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid("unclosed '{' in segment"))?;
            let (wildcard, name) = match inner.strip_prefix('*') {
                Some(name) => (true, name),
                None => (false, inner),
            };
            if name.is_empty() {
                return Err(invalid("empty capture name"));
            }
            if name.contains(['{', '}', '*', '/']) {
                return Err(invalid("capture name contains reserved characters"));
            }
            if names.contains(&name) {
                return Err(invalid("duplicate capture name"));
            }
            names.push(name);
            if wildcard {
                segments.push(Segment::Wildcard(name.to_string()));
            } else {
                segments.push(Segment::Param(name.to_string()));
            }
        } else {
            if raw.contains(['{', '}']) {
                return Err(invalid("braces are only allowed as a full segment"));
            }
            segments.push(Segment::Literal(raw.to_string()));
        }
    }

    // Wildcards capture the remainder, so nothing may follow one.
    if let Some(pos) = segments
        .iter()
        .position(|s| matches!(s, Segment::Wildcard(_)))
    {
        if pos != segments.len() - 1 {
            return Err(invalid("wildcard must be the last segment"));
        }
    }

    Ok(segments)
}

/// Render segments back to canonical pattern text. Used for duplicate
/// detection and for naming patterns in conflict reports.
pub fn render(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        match seg {
            Segment::Literal(text) => out.push_str(text),
            Segment::Param(name) => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            Segment::Wildcard(name) => {
                out.push_str("{*");
                out.push_str(name);
                out.push('}');
            }
        }
    }
    out
}

/// Split a concrete request path into decoded segments.
///
/// Empty segments from leading, trailing, or doubled slashes are dropped, so
/// `/items/42/` and `/items/42` normalize identically and `/` is the empty
/// segment list. Returns `None` when a segment carries an invalid percent
/// escape; an undecodable path cannot match any route.
pub fn split_path(path: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for raw in path.split('/') {
        if raw.is_empty() {
            continue;
        }
        segments.push(percent_decode(raw)?);
    }
    Some(segments)
}

/// Decode `%XX` escapes in one path segment. `+` is left alone: it only
/// means space in query strings.
pub fn percent_decode(segment: &str) -> Option<String> {
    if !segment.contains('%') {
        return Some(segment.to_string());
    }
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_val(*bytes.get(i + 1)?)?;
            let lo = hex_val(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.into())
    }

    #[test]
    fn parses_literals_params_and_wildcards() {
        let segs = parse("/users/{id}/files/{*path}").unwrap();
        assert_eq!(
            segs,
            vec![
                lit("users"),
                Segment::Param("id".into()),
                lit("files"),
                Segment::Wildcard("path".into()),
            ]
        );
    }

    #[test]
    fn root_pattern_is_empty_segment_list() {
        assert!(parse("/").unwrap().is_empty());
        assert_eq!(render(&[]), "/");
    }

    #[test]
    fn normalizes_doubled_and_trailing_slashes() {
        assert_eq!(parse("//users//{id}/").unwrap(), parse("/users/{id}").unwrap());
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(matches!(
            parse("users/{id}"),
            Err(CompileError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn rejects_unclosed_brace() {
        assert!(parse("/users/{id").is_err());
    }

    #[test]
    fn rejects_empty_capture_name() {
        assert!(parse("/users/{}").is_err());
        assert!(parse("/files/{*}").is_err());
    }

    #[test]
    fn rejects_mid_pattern_wildcard() {
        assert!(parse("/files/{*path}/meta").is_err());
    }

    #[test]
    fn rejects_duplicate_capture_names() {
        assert!(parse("/a/{x}/b/{x}").is_err());
        assert!(parse("/a/{x}/{*x}").is_err());
    }

    #[test]
    fn rejects_partial_braces() {
        assert!(parse("/users/x{id}").is_err());
    }

    #[test]
    fn render_round_trips() {
        for p in ["/users/{id}", "/files/{*path}", "/a/b/c"] {
            assert_eq!(render(&parse(p).unwrap()), p);
        }
    }

    #[test]
    fn split_path_drops_empty_segments() {
        assert_eq!(split_path("/items/42/").unwrap(), vec!["items", "42"]);
        assert_eq!(split_path("//items///42").unwrap(), vec!["items", "42"]);
        assert!(split_path("/").unwrap().is_empty());
    }

    #[test]
    fn split_path_percent_decodes() {
        assert_eq!(split_path("/a%20b").unwrap(), vec!["a b"]);
        assert_eq!(split_path("/caf%C3%A9").unwrap(), vec!["café"]);
    }

    #[test]
    fn split_path_rejects_bad_escapes() {
        assert!(split_path("/a%2").is_none());
        assert!(split_path("/a%zz").is_none());
    }

    #[test]
    fn plus_is_not_space_in_paths() {
        assert_eq!(split_path("/a+b").unwrap(), vec!["a+b"]);
    }
}
