//! Errors surfaced by observers.
//!
//! Structural problems travel as data: they are stored in snapshots and
//! delivered through `on_error`, never raised out of `add_listener` or a
//! change notification.

use pathbind_core::{MemberError, PathParseError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    #[error(transparent)]
    InvalidPath(#[from] PathParseError),

    /// A required segment does not exist on the runtime type of its owner.
    #[error("member '{member}' of path '{path}' not found on type '{type_name}'")]
    MemberNotFound {
        path: String,
        member: String,
        type_name: &'static str,
    },

    /// A member getter or setter reported a failure.
    #[error("member '{member}' of path '{path}' failed")]
    Member {
        path: String,
        member: String,
        #[source]
        source: MemberError,
    },

    #[error("path '{path}' has no available last member")]
    Unavailable { path: String },

    #[error("observer for path '{path}' is disposed")]
    Disposed { path: String },

    #[error("path listener panicked: {message}")]
    ListenerPanicked { message: String },

    #[error("walking path '{path}' panicked: {message}")]
    WalkPanicked { path: String, message: String },
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
