//! Route pattern compilation and path helpers.
//!
//! | Pattern              | Example match              | Captured params                  |
//! |----------------------|----------------------------|----------------------------------|
//! | `/notes`             | `/notes`                   | *(none)*                         |
//! | `/notes/:id`         | `/notes/42.xml`            | `id → "42.xml"`                  |
//! | `/public/*`          | `/public/css/site.css`     | `wildcard → "/css/site.css"`     |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Incoming paths are split on `/` first and each segment is then
//! percent-decoded, so an escaped `%2F` never starts a new segment.

use std::borrow::Cow;

use crate::context::Parameters;

/// Parameter name under which a wildcard pattern captures the rest of the path.
pub(crate) const WILDCARD_PARAM: &str = "wildcard";

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    // Matches the prefix itself and anything below it.
    Wildcard(String),
}

impl Pattern {
    /// Classifies `pattern`: a `/*` suffix is a wildcard, any `:` makes it
    /// parameterized, everything else is an exact match.
    pub(crate) fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    pub(crate) fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => p
                .split('/')
                .map(Cow::Borrowed)
                .eq(path.split('/').map(decode_segment))
                .then(Parameters::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<Cow<'_, str>> = path
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(decode_segment)
                    .collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if *s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.as_str(), path_seg.into_owned()),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let rest = path.strip_prefix(prefix.as_str())?;
                if !rest.is_empty() && !rest.starts_with('/') {
                    return None;
                }
                let rest = rest
                    .split('/')
                    .map(decode_segment)
                    .collect::<Vec<_>>()
                    .join("/");
                let mut params = Parameters::new();
                params.insert(WILDCARD_PARAM, rest);
                Some(params)
            }
        }
    }
}

// Malformed escapes and non-UTF-8 results leave the segment as sent.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Joins a scope prefix and a route URI into one clean absolute path.
///
/// Empty and `.` segments are dropped, `..` pops, and the result always starts
/// with `/` and never ends with one (except the root itself).
pub(crate) fn join_path(prefix: &str, uri: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in prefix.split('/').chain(uri.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Returns `true` when the final segment of `path` is a named parameter.
///
/// Scans backward from the last character: a `:` seen before any `/` marks
/// the path dynamic.
pub(crate) fn ends_in_param(path: &str) -> bool {
    for c in path.chars().rev() {
        match c {
            ':' => return true,
            '/' => return false,
            _ => {}
        }
    }
    false
}

pub(crate) fn ends_in_wildcard(path: &str) -> bool {
    path == "*" || path.ends_with("/*")
}
