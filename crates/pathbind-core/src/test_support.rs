#![forbid(unsafe_code)]

//! In-memory reflective object model for tests and benches.
//!
//! Enabled by the `test-helpers` feature. Objects keep their member values in
//! a [`PropertyBag`] and raise change notifications by member name; a
//! [`ModelResolver`] is populated with declarations per Rust type and counts
//! every resolution so tests can assert caching behavior.
//!
//! # Example
//!
//! ```
//! use pathbind_core::member::{MemberFlags, MemberKind, MemberResolver};
//! use pathbind_core::member_path::PathSegment;
//! use pathbind_core::object::{Object, TypeKey, Value};
//! use pathbind_core::test_support::{Model, ModelResolver};
//!
//! let resolver = ModelResolver::new().property::<Model>("Name");
//! let root = Object::new(Model::new());
//! Model::props(&root).set("Name", Value::of(String::from("Ann")));
//!
//! let member = resolver
//!     .try_resolve(
//!         &TypeKey::of::<Model>(),
//!         &PathSegment::member("Name"),
//!         MemberKind::Accessor,
//!         MemberFlags::default(),
//!     )
//!     .unwrap();
//! let value = member.get_value(&root, None).unwrap();
//! assert_eq!(value.downcast_ref::<String>().unwrap(), "Ann");
//! assert_eq!(resolver.resolve_count(), 1);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::MemberError;
use crate::member::{
    MemberDescriptor, MemberFlags, MemberKind, MemberListener, MemberRef, MemberResolver,
};
use crate::member_path::PathSegment;
use crate::metadata::Metadata;
use crate::object::{Object, TypeKey, Value};
use crate::subscription::Subscription;

/// Notification key used by list indexers.
pub const INDEXER_CHANGED: &str = "Item[]";

struct ListenerEntry {
    id: u64,
    member: String,
    listener: Arc<dyn MemberListener>,
}

/// Member values plus per-member change listeners.
#[derive(Default)]
pub struct PropertyBag {
    values: Mutex<HashMap<String, Value>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl PropertyBag {
    #[must_use]
    pub fn get(&self, name: &str) -> Value {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Store `value` and notify listeners of `name`.
    pub fn set(&self, name: &str, value: Value) {
        self.set_silently(name, value);
        self.notify(name);
    }

    /// Store `value` without raising a notification.
    pub fn set_silently(&self, name: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), value);
    }

    /// Raise a change (or event) notification for `name`.
    ///
    /// Listeners run outside the bag's locks; dead listeners are pruned.
    pub fn notify(&self, name: &str) {
        let targets: Vec<(u64, Arc<dyn MemberListener>)> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.member == name)
            .map(|entry| (entry.id, Arc::clone(&entry.listener)))
            .collect();

        let dead: Vec<u64> = targets
            .into_iter()
            .filter(|(_, listener)| !listener.on_member_changed(name))
            .map(|(id, _)| id)
            .collect();
        if !dead.is_empty() {
            self.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|entry| !dead.contains(&entry.id));
        }
    }

    pub fn subscribe(&self, member: &str, listener: Arc<dyn MemberListener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerEntry {
                id,
                member: member.to_owned(),
                listener,
            });
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| entry.id != id);
    }

    /// Total number of registered listeners across all members.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn listener_count_for(&self, member: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.member == member)
            .count()
    }
}

/// Types whose members live in a [`PropertyBag`].
pub trait HasProperties: Any + Send + Sync {
    fn properties(&self) -> &PropertyBag;
}

macro_rules! bag_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Default)]
        pub struct $name {
            bag: PropertyBag,
        }

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Builder-style initial value (no notification).
            #[must_use]
            pub fn with(self, name: &str, value: Value) -> Self {
                self.bag.set_silently(name, value);
                self
            }

            /// Property bag of an [`Object`] holding this type.
            ///
            /// # Panics
            ///
            /// Panics if `object` holds another type.
            #[must_use]
            pub fn props(object: &Object) -> &PropertyBag {
                match object.downcast_ref::<Self>() {
                    Some(value) => &value.bag,
                    None => panic!(
                        "expected {}, found {}",
                        stringify!($name),
                        object.type_key().name()
                    ),
                }
            }
        }

        impl HasProperties for $name {
            fn properties(&self) -> &PropertyBag {
                &self.bag
            }
        }
    };
}

bag_type!(
    /// General purpose test object.
    Model
);
bag_type!(
    /// A second bag type, for tests where a hop changes runtime type.
    Record
);

/// Indexable list with a change notification for every element write.
#[derive(Default)]
pub struct ModelList {
    items: Mutex<Vec<Value>>,
    bag: PropertyBag,
}

impl ModelList {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Mutex::new(items),
            bag: PropertyBag::default(),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace (or append at `len`) an element and raise [`INDEXER_CHANGED`].
    pub fn set(&self, index: usize, value: Value) {
        {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                items.resize(index, Value::Unset);
                items.push(value);
            }
        }
        self.bag.notify(INDEXER_CHANGED);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HasProperties for ModelList {
    fn properties(&self) -> &PropertyBag {
        &self.bag
    }
}

fn owner_of<'a, T: HasProperties>(owner: &'a Object, member: &str) -> Result<&'a T, MemberError> {
    owner
        .downcast_ref::<T>()
        .ok_or_else(|| MemberError::OwnerMismatch {
            member: member.to_owned(),
            actual: owner.type_key().name(),
        })
}

fn observe_bag<T: HasProperties>(
    owner: &Object,
    key: &str,
    listener: Arc<dyn MemberListener>,
) -> Option<Subscription> {
    let typed = owner.downcast::<T>()?;
    let id = typed.properties().subscribe(key, listener);
    let weak: Weak<T> = Arc::downgrade(&typed);
    Some(Subscription::new(move || {
        if let Some(owner) = weak.upgrade() {
            owner.properties().unsubscribe(id);
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Normal,
    ReadOnly,
    Unobservable,
    Failing,
    Panicking,
}

struct PropertyMember<T> {
    name: String,
    behavior: Behavior,
    _owner: std::marker::PhantomData<fn() -> T>,
}

impl<T: HasProperties> MemberDescriptor for PropertyMember<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Accessor
    }

    fn declaring_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn can_write(&self) -> bool {
        self.behavior != Behavior::ReadOnly
    }

    fn get_value(&self, owner: &Object, _metadata: Option<&Metadata>) -> Result<Value, MemberError> {
        let typed = owner_of::<T>(owner, &self.name)?;
        match self.behavior {
            Behavior::Failing => Err(MemberError::failed(&self.name, "getter failed")),
            Behavior::Panicking => panic!("getter for '{}' panicked", self.name),
            _ => Ok(typed.properties().get(&self.name)),
        }
    }

    fn set_value(
        &self,
        owner: &Object,
        value: Value,
        _metadata: Option<&Metadata>,
    ) -> Result<bool, MemberError> {
        let typed = owner_of::<T>(owner, &self.name)?;
        if self.behavior == Behavior::ReadOnly {
            return Err(MemberError::ReadOnly {
                member: self.name.clone(),
            });
        }
        typed.properties().set(&self.name, value);
        Ok(true)
    }

    fn try_observe(
        &self,
        owner: &Object,
        listener: Arc<dyn MemberListener>,
        _metadata: Option<&Metadata>,
    ) -> Option<Subscription> {
        if self.behavior == Behavior::Unobservable {
            return None;
        }
        observe_bag::<T>(owner, &self.name, listener)
    }
}

type MethodFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

struct MethodMember<T> {
    name: String,
    call: MethodFn<T>,
}

impl<T: HasProperties> MemberDescriptor for MethodMember<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Method
    }

    fn declaring_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn get_value(&self, owner: &Object, _metadata: Option<&Metadata>) -> Result<Value, MemberError> {
        let typed = owner_of::<T>(owner, &self.name)?;
        Ok((self.call)(typed))
    }
}

struct EventMember<T> {
    name: String,
    _owner: std::marker::PhantomData<fn() -> T>,
}

impl<T: HasProperties> MemberDescriptor for EventMember<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Event
    }

    fn declaring_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn get_value(&self, _owner: &Object, _metadata: Option<&Metadata>) -> Result<Value, MemberError> {
        Ok(Value::Unset)
    }

    fn try_observe(
        &self,
        owner: &Object,
        listener: Arc<dyn MemberListener>,
        _metadata: Option<&Metadata>,
    ) -> Option<Subscription> {
        observe_bag::<T>(owner, &self.name, listener)
    }
}

struct IndexerMember {
    name: String,
    index: usize,
}

impl MemberDescriptor for IndexerMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Accessor
    }

    fn declaring_type(&self) -> TypeKey {
        TypeKey::of::<ModelList>()
    }

    fn can_write(&self) -> bool {
        true
    }

    fn get_value(&self, owner: &Object, _metadata: Option<&Metadata>) -> Result<Value, MemberError> {
        Ok(owner_of::<ModelList>(owner, &self.name)?.get(self.index))
    }

    fn set_value(
        &self,
        owner: &Object,
        value: Value,
        _metadata: Option<&Metadata>,
    ) -> Result<bool, MemberError> {
        owner_of::<ModelList>(owner, &self.name)?.set(self.index, value);
        Ok(true)
    }

    fn try_observe(
        &self,
        owner: &Object,
        listener: Arc<dyn MemberListener>,
        _metadata: Option<&Metadata>,
    ) -> Option<Subscription> {
        observe_bag::<ModelList>(owner, INDEXER_CHANGED, listener)
    }
}

struct Declared {
    member: MemberRef,
    attached: bool,
}

/// Declaration-driven [`MemberResolver`] with resolution counters.
#[derive(Default)]
pub struct ModelResolver {
    types: HashMap<TypeKey, HashMap<(String, MemberKind), Declared>>,
    list_indexer: bool,
    resolve_calls: AtomicUsize,
    calls_by_name: Mutex<HashMap<String, usize>>,
}

impl ModelResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn declare<T: Any>(
        mut self,
        name: &str,
        kind: MemberKind,
        member: MemberRef,
        attached: bool,
    ) -> Self {
        self.types
            .entry(TypeKey::of::<T>())
            .or_default()
            .insert((name.to_owned(), kind), Declared { member, attached });
        self
    }

    fn declare_property<T: HasProperties>(self, name: &str, behavior: Behavior, attached: bool) -> Self {
        let member = Arc::new(PropertyMember::<T> {
            name: name.to_owned(),
            behavior,
            _owner: std::marker::PhantomData,
        });
        self.declare::<T>(name, MemberKind::Accessor, member, attached)
    }

    /// Readable, writable, observable property.
    #[must_use]
    pub fn property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::Normal, false)
    }

    #[must_use]
    pub fn read_only_property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::ReadOnly, false)
    }

    /// Property whose `try_observe` returns `None`.
    #[must_use]
    pub fn unobservable_property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::Unobservable, false)
    }

    /// Property that only resolves when [`MemberFlags::ATTACHED`] is requested.
    #[must_use]
    pub fn attached_property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::Normal, true)
    }

    /// Property whose getter returns [`MemberError::Failed`].
    #[must_use]
    pub fn failing_property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::Failing, false)
    }

    /// Property whose getter panics.
    #[must_use]
    pub fn panicking_property<T: HasProperties>(self, name: &str) -> Self {
        self.declare_property::<T>(name, Behavior::Panicking, false)
    }

    /// Zero-argument method read as a pseudo-property.
    #[must_use]
    pub fn method<T: HasProperties>(
        self,
        name: &str,
        call: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        let member = Arc::new(MethodMember::<T> {
            name: name.to_owned(),
            call: Arc::new(call),
        });
        self.declare::<T>(name, MemberKind::Method, member, false)
    }

    /// Event raised with [`PropertyBag::notify`] under `name`.
    #[must_use]
    pub fn event<T: HasProperties>(self, name: &str) -> Self {
        let member = Arc::new(EventMember::<T> {
            name: name.to_owned(),
            _owner: std::marker::PhantomData,
        });
        self.declare::<T>(name, MemberKind::Event, member, false)
    }

    /// Resolve integer indexer segments on [`ModelList`].
    #[must_use]
    pub fn list_indexer(mut self) -> Self {
        self.list_indexer = true;
        self
    }

    /// Total `try_resolve` calls.
    #[must_use]
    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// `try_resolve` calls for one segment name.
    #[must_use]
    pub fn resolve_count_for(&self, name: &str) -> usize {
        self.calls_by_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.resolve_calls.store(0, Ordering::SeqCst);
        self.calls_by_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MemberResolver for ModelResolver {
    fn try_resolve(
        &self,
        owner_type: &TypeKey,
        segment: &PathSegment,
        kind: MemberKind,
        flags: MemberFlags,
    ) -> Option<MemberRef> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(segment.name().to_owned())
            .or_default() += 1;

        if !flags.contains(MemberFlags::INSTANCE) {
            return None;
        }

        if segment.is_indexer() {
            if !self.list_indexer || !owner_type.is::<ModelList>() || kind != MemberKind::Accessor {
                return None;
            }
            let index = segment.index()?;
            return Some(Arc::new(IndexerMember {
                name: segment.name().to_owned(),
                index,
            }));
        }

        let declared = self
            .types
            .get(owner_type)?
            .get(&(segment.name().to_owned(), kind))?;
        if declared.attached && !flags.contains(MemberFlags::ATTACHED) {
            return None;
        }
        Some(Arc::clone(&declared.member))
    }
}
