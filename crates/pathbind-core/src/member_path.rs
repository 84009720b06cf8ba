#![forbid(unsafe_code)]

//! Parsed member paths (`a.b[0].c`).
//!
//! # Design
//!
//! A [`MemberPath`] is an immutable, cheaply clonable list of
//! [`PathSegment`]s. Dots separate member names; bracketed groups are indexer
//! segments and become segments of their own, so `a.b[0].c` parses into
//! `a`, `b`, `[0]`, `c`.
//!
//! # Invariants
//!
//! 1. Parsing either fails with a [`PathParseError`] or yields a path whose
//!    `Display` output parses back to an equal path.
//! 2. No segment is empty; indexer segments always carry at least one
//!    non-empty argument.
//! 3. The empty string is the only input that yields an empty path.
//!
//! # Failure Modes
//!
//! | Input | Error |
//! |-------|-------|
//! | `a..b`, `.a`, `a.` | [`PathParseError::EmptySegment`] |
//! | `a[0` | [`PathParseError::UnterminatedIndexer`] |
//! | `a[]`, `a[ ]` | [`PathParseError::EmptyIndexer`] |
//! | `a]`, `a b` | [`PathParseError::UnexpectedCharacter`] |
//! | `from_segments` with `member("a.b")` | [`PathParseError::InvalidSegment`] |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::PathParseError;

/// One hop of a member path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    name: Box<str>,
    indexer: bool,
}

impl PathSegment {
    /// A plain member segment (`Name`).
    #[must_use]
    pub fn member(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            indexer: false,
        }
    }

    /// An indexer segment. `args` is the text between the brackets.
    #[must_use]
    pub fn indexer(args: &str) -> Self {
        Self {
            name: format!("[{args}]").into_boxed_str(),
            indexer: true,
        }
    }

    /// Segment name as written in the path. Indexers include their brackets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_indexer(&self) -> bool {
        self.indexer
    }

    /// Comma-separated indexer arguments, trimmed. Empty for member segments.
    #[must_use]
    pub fn indexer_args(&self) -> Vec<&str> {
        if !self.indexer {
            return Vec::new();
        }
        let inner = &self.name[1..self.name.len() - 1];
        inner.split(',').map(str::trim).collect()
    }

    /// The single integer argument of an indexer like `[3]`.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.indexer_args().as_slice() {
            [single] => single.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable parsed member path.
///
/// Cloning shares the segment storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MemberPath {
    segments: Arc<[PathSegment]>,
}

impl MemberPath {
    /// The empty path: the observed member is the root object itself.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
        }
    }

    /// Build a path from segments constructed by hand.
    ///
    /// Each segment must be one that [`parse`](Self::parse) could have
    /// produced on its own, so the result still displays as a parseable path.
    pub fn from_segments(segments: Vec<PathSegment>) -> Result<Self, PathParseError> {
        for segment in &segments {
            let reparsed = Parser::new(segment.name()).run()?;
            if reparsed.as_slice() != std::slice::from_ref(segment) {
                return Err(PathParseError::InvalidSegment {
                    segment: segment.name().to_owned(),
                });
            }
        }
        Ok(Self::from_parsed(segments))
    }

    fn from_parsed(segments: Vec<PathSegment>) -> Self {
        Self {
            segments: Arc::from(segments),
        }
    }

    /// Parse a path string.
    pub fn parse(path: &str) -> Result<Self, PathParseError> {
        Parser::new(path)
            .run()
            .inspect_err(|error| log_rejected(path, error))
            .map(Self::from_parsed)
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    /// Last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }
}

impl Default for MemberPath {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromStr for MemberPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && !segment.is_indexer() {
                f.write_str(".")?;
            }
            f.write_str(segment.name())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberPath({self})")
    }
}

#[cfg(feature = "tracing")]
fn log_rejected(path: &str, error: &PathParseError) {
    tracing::debug!(path, %error, "member path rejected");
}

#[cfg(not(feature = "tracing"))]
fn log_rejected(_path: &str, _error: &PathParseError) {}

struct Parser<'a> {
    path: &'a str,
    segments: Vec<PathSegment>,
    name_start: Option<usize>,
    // A dot was just consumed; the next token must be a name.
    expect_name: bool,
}

impl<'a> Parser<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            segments: Vec::new(),
            name_start: None,
            expect_name: false,
        }
    }

    fn run(mut self) -> Result<Vec<PathSegment>, PathParseError> {
        if self.path.is_empty() {
            return Ok(Vec::new());
        }

        let mut chars = self.path.char_indices().peekable();
        while let Some((pos, ch)) = chars.next() {
            match ch {
                '.' => {
                    let closed = self.close_name(pos);
                    // `a..b`, `.a`, and `].` after nothing are all empty segments.
                    if !closed && (self.segments.is_empty() || self.expect_name) {
                        return Err(self.empty_segment(pos));
                    }
                    self.expect_name = true;
                }
                '[' => {
                    if self.expect_name && self.name_start.is_none() {
                        // `a.[0]`
                        return Err(self.empty_segment(pos));
                    }
                    self.close_name(pos);
                    let args_start = pos + 1;
                    let mut end = None;
                    for (inner_pos, inner) in chars.by_ref() {
                        match inner {
                            ']' => {
                                end = Some(inner_pos);
                                break;
                            }
                            '[' => {
                                return Err(PathParseError::UnexpectedCharacter {
                                    path: self.path.to_owned(),
                                    position: inner_pos,
                                    found: inner,
                                });
                            }
                            _ => {}
                        }
                    }
                    let Some(end) = end else {
                        return Err(PathParseError::UnterminatedIndexer {
                            path: self.path.to_owned(),
                            position: pos,
                        });
                    };
                    let args = &self.path[args_start..end];
                    if args.split(',').any(|arg| arg.trim().is_empty()) {
                        return Err(PathParseError::EmptyIndexer {
                            path: self.path.to_owned(),
                            position: pos,
                        });
                    }
                    self.segments.push(PathSegment::indexer(args));
                    self.expect_name = false;
                    // Only `.`, `[` or end of input may follow an indexer.
                    if let Some(&(next_pos, next)) = chars.peek()
                        && next != '.'
                        && next != '['
                    {
                        return Err(PathParseError::UnexpectedCharacter {
                            path: self.path.to_owned(),
                            position: next_pos,
                            found: next,
                        });
                    }
                }
                c if c == ']' || c.is_whitespace() => {
                    return Err(PathParseError::UnexpectedCharacter {
                        path: self.path.to_owned(),
                        position: pos,
                        found: c,
                    });
                }
                _ => {
                    if self.name_start.is_none() {
                        self.name_start = Some(pos);
                    }
                }
            }
        }

        let end = self.path.len();
        if !self.close_name(end) && self.expect_name {
            return Err(self.empty_segment(end));
        }
        Ok(self.segments)
    }

    /// Push the pending name (if any). Returns whether a name was pushed.
    fn close_name(&mut self, end: usize) -> bool {
        match self.name_start.take() {
            Some(start) => {
                self.segments.push(PathSegment::member(&self.path[start..end]));
                self.expect_name = false;
                true
            }
            None => false,
        }
    }

    fn empty_segment(&self, position: usize) -> PathParseError {
        PathParseError::EmptySegment {
            path: self.path.to_owned(),
            position,
        }
    }
}
