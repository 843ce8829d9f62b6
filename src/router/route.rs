//! Route patterns and path matching.
//!
//! A pattern is a `/`-delimited path template made of three segment kinds:
//!
//! - **literal** segments (`users`) match the same text, case-sensitively;
//! - **parameter** segments (`:id`) match any single non-empty path
//!   segment and bind its value under the given name;
//! - a terminal **wildcard** segment (`*`) greedily consumes all remaining
//!   path segments and binds them, joined by `/`, under `*`.
//!
//! Segment counts must match exactly unless a wildcard is present. One
//! trailing slash is ignored on both patterns and paths, except for the
//! root path itself.

use std::collections::HashMap;

/// Parameters bound by route matching, keyed by the `:name` of the
/// parameter segment that captured them.
///
/// Lookup of an absent name yields `""`, never a panic.
#[derive(Debug, Clone, Default)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// The value captured under `name`, or `""` if nothing bound it.
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    /// Whether `name` was bound during matching.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the match bound no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, name: &str, value: String) {
        self.0.insert(name.to_owned(), value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    // Literal segments before the first parameter or wildcard; the
    // tie-break key when several patterns match one path.
    static_prefix: usize,
}

impl Pattern {
    pub(crate) fn compile(raw: &str) -> Self {
        let count = split(raw).count();
        let segments: Vec<Segment> = split(raw)
            .enumerate()
            .map(|(i, seg)| match seg.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                // `*` is a wildcard only in terminal position.
                None if seg == "*" && i == count - 1 => Segment::Wildcard,
                None => Segment::Literal(seg.to_owned()),
            })
            .collect();

        let static_prefix = segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count();

        Self {
            raw: raw.to_owned(),
            segments,
            static_prefix,
        }
    }

    /// The pattern as registered.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn static_prefix(&self) -> usize {
        self.static_prefix
    }

    /// Matches `path` against this pattern, binding parameters on success.
    pub(crate) fn matches(&self, path: &str) -> Option<Params> {
        let mut params = Params::default();
        let mut segments = self.segments.iter();
        let mut remaining = split(path).peekable();

        loop {
            match (segments.next(), remaining.peek()) {
                (Some(Segment::Wildcard), _) => {
                    let rest: Vec<&str> = remaining.collect();
                    params.insert("*", rest.join("/"));
                    return Some(params);
                }
                (Some(Segment::Literal(lit)), Some(seg)) if lit == seg => {
                    remaining.next();
                }
                (Some(Segment::Param(name)), Some(seg)) if !seg.is_empty() => {
                    params.insert(name, (*seg).to_owned());
                    remaining.next();
                }
                (None, None) => return Some(params),
                _ => return None,
            }
        }
    }
}

/// Splits a path or pattern into segments. Empty segments (the leading
/// slash, a trailing slash, repeated slashes) are dropped, so `/` yields
/// no segments and `/users//42/` yields `["users", "42"]`.
fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod compile_tests {
    use super::*;

    #[test]
    fn segment_kinds() {
        let pattern = Pattern::compile("/users/:id/posts/*");

        assert_eq!(
            pattern.segments,
            vec![
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Literal("posts".into()),
                Segment::Wildcard,
            ]
        );
        assert_eq!(pattern.static_prefix(), 1);
        assert_eq!(pattern.raw(), "/users/:id/posts/*");
    }

    #[test]
    fn wildcard_is_terminal_only() {
        let pattern = Pattern::compile("/files/*/extra");

        // A non-terminal `*` is just a literal segment.
        assert_eq!(
            pattern.segments,
            vec![
                Segment::Literal("files".into()),
                Segment::Literal("*".into()),
                Segment::Literal("extra".into()),
            ]
        );
    }

    #[test]
    fn root_pattern_is_empty() {
        let pattern = Pattern::compile("/");
        assert!(pattern.segments.is_empty());
        assert_eq!(pattern.static_prefix(), 0);
    }

    #[test]
    fn fully_static_prefix() {
        assert_eq!(Pattern::compile("/api/v1/users").static_prefix(), 3);
        assert_eq!(Pattern::compile("/:tenant/users").static_prefix(), 0);
    }
}

#[cfg(test)]
mod match_tests {
    use super::*;

    #[test]
    fn literal_match_is_exact_and_case_sensitive() {
        let pattern = Pattern::compile("/api/users");

        assert!(pattern.matches("/api/users").is_some());
        assert!(pattern.matches("/api/Users").is_none());
        assert!(pattern.matches("/api").is_none());
        assert!(pattern.matches("/api/users/42").is_none());
    }

    #[test]
    fn params_bind_their_segment() {
        let pattern = Pattern::compile("/users/:id");

        let params = pattern.matches("/users/42").unwrap();
        assert_eq!(params.get("id"), "42");
        assert_eq!(params.get("missing"), "");

        // Segment-count mismatch without a wildcard.
        assert!(pattern.matches("/users/42/extra").is_none());
        assert!(pattern.matches("/users").is_none());
    }

    #[test]
    fn multiple_params() {
        let pattern = Pattern::compile("/repos/:owner/:name");
        let params = pattern.matches("/repos/rust-lang/rust").unwrap();

        assert_eq!(params.get("owner"), "rust-lang");
        assert_eq!(params.get("name"), "rust");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn wildcard_consumes_the_remainder() {
        let pattern = Pattern::compile("/static/*");

        let params = pattern.matches("/static/css/site.css").unwrap();
        assert_eq!(params.get("*"), "css/site.css");

        let params = pattern.matches("/static/app.js").unwrap();
        assert_eq!(params.get("*"), "app.js");

        // The wildcard also matches zero remaining segments.
        let params = pattern.matches("/static").unwrap();
        assert_eq!(params.get("*"), "");
    }

    #[test]
    fn root_matches_root_only() {
        let pattern = Pattern::compile("/");

        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/anything").is_none());
    }

    #[test]
    fn one_trailing_slash_is_ignored() {
        let pattern = Pattern::compile("/users/:id");

        assert!(pattern.matches("/users/42/").is_some());
        assert!(Pattern::compile("/users/").matches("/users").is_some());
    }
}
