//! Error types shared by path parsing and member descriptors.

use thiserror::Error;

/// A member path string could not be parsed.
///
/// Positions are byte offsets into `path`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("empty segment at {position} in member path '{path}'")]
    EmptySegment { path: String, position: usize },

    #[error("unterminated indexer starting at {position} in member path '{path}'")]
    UnterminatedIndexer { path: String, position: usize },

    #[error("empty indexer argument at {position} in member path '{path}'")]
    EmptyIndexer { path: String, position: usize },

    #[error("unexpected character '{found}' at {position} in member path '{path}'")]
    UnexpectedCharacter {
        path: String,
        position: usize,
        found: char,
    },

    #[error("segment '{segment}' is not a single member or indexer")]
    InvalidSegment { segment: String },
}

/// A member descriptor failed to read or write a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemberError {
    /// The owner object is not of the type the member was resolved for.
    #[error("member '{member}' cannot be used on an owner of type '{actual}'")]
    OwnerMismatch { member: String, actual: &'static str },

    #[error("member '{member}' is read-only")]
    ReadOnly { member: String },

    #[error("member '{member}' failed: {message}")]
    Failed { member: String, message: String },
}

impl MemberError {
    #[must_use]
    pub fn failed(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            member: member.into(),
            message: message.into(),
        }
    }
}
