#![forbid(unsafe_code)]

//! Type-erased object handles.
//!
//! # Design
//!
//! The engine observes object graphs it does not own. [`Object`] is a shared
//! handle (`Arc<dyn Any + Send + Sync>`) that remembers the concrete
//! [`TypeKey`] it was created from, so member resolution can key on the
//! runtime type without downcasting. [`WeakObject`] is the non-owning form
//! and [`TargetRef`] lets an observer hold its root either way.
//!
//! # Invariants
//!
//! 1. `Object::type_key()` always names the concrete type passed to
//!    [`Object::new`] / [`Object::from_arc`], never `Arc<..>` itself.
//! 2. Identity (`ptr_eq`) is allocation identity; clones are identical.
//! 3. A [`WeakObject`] never keeps its referent alive.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Runtime type identity used as the member resolution key.
///
/// Equality and hashing use the [`TypeId`] only; the name is for messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared, type-erased handle to a live object.
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    type_key: TypeKey,
}

impl Object {
    /// Move `value` into a new shared allocation.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing allocation without copying it.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_key: TypeKey::of::<T>(),
        }
    }

    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_key.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Recover the typed `Arc`, sharing the allocation.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Arc::downgrade(&self.inner),
            type_key: self.type_key,
        }
    }

    /// Number of strong handles to the allocation.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.downcast_ref::<String>() {
            return write!(f, "Object({s:?})");
        }
        if let Some(s) = self.downcast_ref::<&'static str>() {
            return write!(f, "Object({s:?})");
        }
        write!(
            f,
            "Object<{}>({:p})",
            self.type_key.name,
            Arc::as_ptr(&self.inner)
        )
    }
}

/// Non-owning handle to an [`Object`].
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<dyn Any + Send + Sync>,
    type_key: TypeKey,
}

impl WeakObject {
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object {
            inner,
            type_key: self.type_key,
        })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Whether this handle refers to the same allocation as `object`.
    ///
    /// Stays meaningful after the referent died: a dead handle never equals
    /// a live object.
    #[must_use]
    pub fn ptr_eq(&self, object: &Object) -> bool {
        self.upgrade().is_some_and(|alive| alive.ptr_eq(object))
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("type", &self.type_key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A member value.
///
/// `Unset` and `Null` both break a path walk; they differ only for
/// consumers that distinguish "never assigned" from "assigned nothing".
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unset,
    Null,
    Object(Object),
}

impl Value {
    /// Wrap a plain value in a fresh [`Object`].
    #[must_use]
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Object::new(value))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Unset | Self::Null => None,
        }
    }

    #[must_use]
    pub fn into_object(self) -> Option<Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Unset | Self::Null => None,
        }
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object().and_then(Object::downcast_ref::<T>)
    }

    /// `true` unless the value is [`Value::Unset`] or [`Value::Null`].
    #[must_use]
    pub fn is_some(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Option<Object>> for Value {
    fn from(object: Option<Object>) -> Self {
        object.map_or(Self::Null, Self::Object)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::Null => f.write_str("Null"),
            Self::Object(object) => object.fmt(f),
        }
    }
}

/// How an observer holds its root object.
#[derive(Debug, Clone)]
pub enum TargetRef {
    Strong(Object),
    Weak(WeakObject),
}

impl TargetRef {
    #[must_use]
    pub fn new(target: &Object, weak: bool) -> Self {
        if weak {
            Self::Weak(target.downgrade())
        } else {
            Self::Strong(target.clone())
        }
    }

    #[must_use]
    pub fn resolve(&self) -> Option<Object> {
        match self {
            Self::Strong(object) => Some(object.clone()),
            Self::Weak(weak) => weak.upgrade(),
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Strong(_) => true,
            Self::Weak(weak) => weak.is_alive(),
        }
    }

    #[must_use]
    pub fn is_weak(&self) -> bool {
        matches!(self, Self::Weak(_))
    }
}
