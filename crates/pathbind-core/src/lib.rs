#![forbid(unsafe_code)]

//! Core: member paths, object handles, and member descriptor contracts.
//!
//! # Role in pathbind
//! `pathbind-core` holds the value types and the collaborator contracts the
//! observation engine (`pathbind-runtime`) is written against. It does no
//! observing itself.
//!
//! # Primary responsibilities
//! - **MemberPath**: parsing and canonical display of `a.b[0].c` paths.
//! - **Object / WeakObject / TargetRef**: type-erased strong and weak handles
//!   to the observed object graph.
//! - **MemberDescriptor / MemberResolver**: the reflection boundary.
//! - **Subscription**: RAII tokens for member change subscriptions.
//!
//! # How it fits in the system
//! A binding layer supplies a [`member::MemberResolver`]; the runtime parses
//! paths with [`member_path::MemberPath`], resolves each hop through the
//! resolver, and keeps the returned [`subscription::Subscription`]s alive only
//! while someone listens.

pub mod error;
pub mod member;
pub mod member_path;
pub mod metadata;
pub mod object;
pub mod subscription;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;

pub use error::{MemberError, PathParseError};
pub use member::{
    IdentityMember, MemberDescriptor, MemberFlags, MemberKind, MemberListener, MemberRef,
    MemberResolver,
};
pub use member_path::{MemberPath, PathSegment};
pub use metadata::Metadata;
pub use object::{Object, TargetRef, TypeKey, Value, WeakObject};
pub use subscription::Subscription;
