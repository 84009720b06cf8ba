#![forbid(unsafe_code)]

//! Member descriptor contracts consumed by the observation engine.
//!
//! # Design
//!
//! Reflection lives outside the engine. A [`MemberResolver`] maps
//! `(type, segment, kind, flags)` to a [`MemberRef`]; the engine then drives
//! that descriptor only through the capability set on [`MemberDescriptor`]:
//! read, optionally write, and optionally observe. The member's
//! [`MemberKind`] is fixed at resolution time, so the walk never inspects
//! concrete descriptor types.
//!
//! Observation hands the descriptor an `Arc<dyn MemberListener>`. Sources
//! are expected to call it on change and may drop it once it reports dead.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::MemberError;
use crate::member_path::PathSegment;
use crate::metadata::Metadata;
use crate::object::{Object, TypeKey, Value};
use crate::subscription::Subscription;

/// What a resolved member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberKind {
    /// Property, field, or indexer: has a value, may be writable.
    Accessor,
    /// Event: no value of its own, only observable.
    Event,
    /// Zero-argument method read as a pseudo-property.
    Method,
    /// The owner itself (empty path).
    Identity,
}

bitflags! {
    /// Member lookup policy passed to the resolver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MemberFlags: u16 {
        const STATIC     = 0b0000_0001;
        const INSTANCE   = 0b0000_0010;
        const PUBLIC     = 0b0000_0100;
        const NON_PUBLIC = 0b0000_1000;
        /// Members attached to a type from the outside (attached properties).
        const ATTACHED   = 0b0001_0000;
        /// Extension members contributed by other modules.
        const EXTENSION  = 0b0010_0000;
        /// Members discovered at runtime on dynamic objects.
        const DYNAMIC    = 0b0100_0000;

        const INSTANCE_PUBLIC = Self::INSTANCE.bits() | Self::PUBLIC.bits();
        const ALL_ACCESS = Self::PUBLIC.bits() | Self::NON_PUBLIC.bits();
    }
}

impl Default for MemberFlags {
    fn default() -> Self {
        Self::INSTANCE_PUBLIC | Self::ATTACHED | Self::EXTENSION | Self::DYNAMIC
    }
}

/// Change callback handed to [`MemberDescriptor::try_observe`].
pub trait MemberListener: Send + Sync {
    /// Called by the source after `member` changed on the observed owner.
    ///
    /// Returns `false` once the listener is dead; sources may then drop it.
    fn on_member_changed(&self, member: &str) -> bool;
}

/// Capability surface of one resolved member.
pub trait MemberDescriptor: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> MemberKind;

    /// Type the member was declared on.
    fn declaring_type(&self) -> TypeKey;

    fn can_read(&self) -> bool {
        !matches!(self.kind(), MemberKind::Event)
    }

    fn can_write(&self) -> bool {
        false
    }

    fn get_value(&self, owner: &Object, metadata: Option<&Metadata>) -> Result<Value, MemberError>;

    /// Write `value`. Returns `Ok(false)` when the member does not accept
    /// writes through this descriptor.
    fn set_value(
        &self,
        owner: &Object,
        value: Value,
        metadata: Option<&Metadata>,
    ) -> Result<bool, MemberError> {
        let _ = (owner, value, metadata);
        Ok(false)
    }

    /// Subscribe `listener` to changes of this member on `owner`.
    ///
    /// `None` means the member cannot be observed.
    fn try_observe(
        &self,
        owner: &Object,
        listener: Arc<dyn MemberListener>,
        metadata: Option<&Metadata>,
    ) -> Option<Subscription> {
        let _ = (owner, listener, metadata);
        None
    }
}

/// Shared handle to a resolved member.
pub type MemberRef = Arc<dyn MemberDescriptor>;

/// Identity comparison for member handles (data pointer only).
#[must_use]
pub fn same_member(a: &MemberRef, b: &MemberRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl fmt::Debug for dyn MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("declaring_type", &self.declaring_type())
            .finish()
    }
}

/// Reflection backend.
pub trait MemberResolver: Send + Sync {
    /// Resolve `segment` on `owner_type`.
    ///
    /// `kind` is the member kind the caller needs; resolvers return `None`
    /// rather than a member of another kind.
    fn try_resolve(
        &self,
        owner_type: &TypeKey,
        segment: &PathSegment,
        kind: MemberKind,
        flags: MemberFlags,
    ) -> Option<MemberRef>;
}

/// The member of an empty path: its value is the owner itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMember;

impl IdentityMember {
    #[must_use]
    pub fn shared() -> MemberRef {
        Arc::new(Self)
    }
}

impl MemberDescriptor for IdentityMember {
    fn name(&self) -> &str {
        ""
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Identity
    }

    fn declaring_type(&self) -> TypeKey {
        TypeKey::of::<Object>()
    }

    fn get_value(&self, owner: &Object, _metadata: Option<&Metadata>) -> Result<Value, MemberError> {
        Ok(Value::Object(owner.clone()))
    }
}
