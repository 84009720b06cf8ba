//! Per-hop walking primitives shared by every path shape.
//!
//! A walk runs outside the observer lock against a [`ChainHops`] taken out of
//! the observer. Slot `i` of a chain holds the subscription for segment `i`;
//! the terminal slot is the last one. Walks that run without a subscriber
//! (one-shot reads, non-observable options) never touch the member sources'
//! listener lists.

use std::sync::Arc;

use pathbind_core::{
    MemberKind, MemberListener, MemberPath, MemberRef, MemberResolver, Metadata, Object,
    PathSegment, Subscription, TypeKey, WeakObject, member::same_member,
};
use tracing::{debug, trace};

use crate::config::ObserverOptions;
use crate::error::ObserverError;
use crate::snapshot::MemberPathMembers;

/// Which listener a hop subscription feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopRole {
    /// A hop before the terminal: changes re-walk the path.
    Intermediate,
    /// The terminal member (or its companion event).
    Terminal,
}

/// A descriptor resolved for one segment, keyed by the owner type it was
/// resolved on.
#[derive(Clone)]
pub struct CachedMember {
    owner_type: TypeKey,
    member: MemberRef,
}

/// A live hop subscription.
pub struct HopSlot {
    owner: WeakObject,
    member: MemberRef,
    token: Option<Subscription>,
}

/// Outcome of one walk, kept by the observer until the next one.
///
/// Holds the penultimate owner weakly so a settled observer never keeps the
/// target graph alive.
#[derive(Clone, Default)]
pub struct Published {
    members: Vec<MemberRef>,
    penultimate: Option<WeakObject>,
    error: Option<ObserverError>,
}

impl Published {
    pub(crate) fn unavailable(members: Vec<MemberRef>, error: Option<ObserverError>) -> Self {
        Self {
            members,
            penultimate: None,
            error,
        }
    }

    pub(crate) fn complete(members: Vec<MemberRef>, owner: &Object) -> Self {
        Self {
            members,
            penultimate: Some(owner.downgrade()),
            error: None,
        }
    }

    pub(crate) fn error(&self) -> Option<&ObserverError> {
        self.error.as_ref()
    }

    pub(crate) fn is_available(&self) -> bool {
        self.error.is_none() && self.penultimate.as_ref().is_some_and(WeakObject::is_alive)
    }

    pub(crate) fn snapshot(&self, path: &MemberPath, source: Option<Object>) -> MemberPathMembers {
        let penultimate = self.penultimate.as_ref().and_then(WeakObject::upgrade);
        let complete = penultimate.is_some();
        MemberPathMembers::new(
            path.clone(),
            source,
            penultimate,
            self.members.clone(),
            self.error.clone(),
            complete,
        )
    }
}

/// Hop subscriptions, stable-path caches, and the last published walk.
#[derive(Default)]
pub struct ChainHops {
    slots: Vec<Option<HopSlot>>,
    cache: Vec<Option<CachedMember>>,
    event_cache: Option<CachedMember>,
    published: Option<Published>,
}

impl ChainHops {
    /// Empty slots sharing `other`'s resolved-member caches.
    pub(crate) fn with_caches_of(other: &Self) -> Self {
        Self {
            cache: other.cache.clone(),
            event_cache: other.event_cache.clone(),
            ..Self::default()
        }
    }

    /// Fill empty cache entries from `other`.
    pub(crate) fn merge_caches(&mut self, other: &Self) {
        if self.cache.len() < other.cache.len() {
            self.cache.resize_with(other.cache.len(), || None);
        }
        for (mine, theirs) in self.cache.iter_mut().zip(&other.cache) {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
        if self.event_cache.is_none() {
            self.event_cache.clone_from(&other.event_cache);
        }
    }

    fn slot_mut(&mut self, index: usize) -> &mut Option<HopSlot> {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        &mut self.slots[index]
    }

    fn cache_mut(&mut self, index: usize) -> &mut Option<CachedMember> {
        if self.cache.len() <= index {
            self.cache.resize_with(index + 1, || None);
        }
        &mut self.cache[index]
    }

    /// Drop every slot at `len` and beyond.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }

    /// Take all slots and forget the published walk. Caches are kept.
    ///
    /// The returned slots unsubscribe when dropped; callers drop them after
    /// releasing the observer lock.
    pub(crate) fn release(&mut self) -> Vec<Option<HopSlot>> {
        self.published = None;
        std::mem::take(&mut self.slots)
    }

    /// [`release`](Self::release) plus the caches.
    pub(crate) fn clear(&mut self) -> Vec<Option<HopSlot>> {
        self.cache.clear();
        self.event_cache = None;
        self.release()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.token.is_some())
            .count()
    }

    pub(crate) fn published(&self) -> Option<&Published> {
        self.published.as_ref()
    }

    pub(crate) fn publish(&mut self, published: Published) {
        self.published = Some(published);
    }
}

/// Creates the member listener for a hop of the given role.
pub type ListenerFactory<'a> = &'a dyn Fn(HopRole) -> Arc<dyn MemberListener>;

/// Result of walking one intermediate hop.
pub enum Step {
    /// The hop's value; the walk continues on it.
    Next(Object),
    /// The walk stopped without an error.
    Broken,
    Failed(ObserverError),
}

/// Everything a walker needs besides the hops themselves.
pub struct WalkContext<'a> {
    path: &'a MemberPath,
    options: &'a ObserverOptions,
    resolver: &'a dyn MemberResolver,
    metadata: Option<&'a Metadata>,
    listeners: Option<ListenerFactory<'a>>,
}

impl<'a> WalkContext<'a> {
    pub(crate) fn new(
        path: &'a MemberPath,
        options: &'a ObserverOptions,
        resolver: &'a dyn MemberResolver,
        metadata: Option<&'a Metadata>,
        listeners: Option<ListenerFactory<'a>>,
    ) -> Self {
        Self {
            path,
            options,
            resolver,
            metadata,
            listeners,
        }
    }

    pub(crate) fn path(&self) -> &MemberPath {
        self.path
    }

    fn segment(&self, index: usize) -> &PathSegment {
        &self.path.segments()[index]
    }

    fn resolve_cached(
        &self,
        cache: &mut Option<CachedMember>,
        owner_type: TypeKey,
        segment: &PathSegment,
        kinds: &[MemberKind],
    ) -> Option<MemberRef> {
        if self.options.stable_path
            && let Some(cached) = cache.as_ref()
            && cached.owner_type == owner_type
        {
            return Some(Arc::clone(&cached.member));
        }
        let flags = self.options.effective_flags();
        let member = kinds
            .iter()
            .find_map(|&kind| self.resolver.try_resolve(&owner_type, segment, kind, flags))?;
        if self.options.stable_path {
            if cache.is_some() {
                debug!(
                    path = %self.path,
                    segment = %segment,
                    owner = owner_type.name(),
                    "owner type changed; member re-resolved"
                );
            }
            *cache = Some(CachedMember {
                owner_type,
                member: Arc::clone(&member),
            });
        }
        Some(member)
    }

    fn not_found(&self, index: usize, owner: &Object) -> Step {
        if self.options.optional {
            trace!(path = %self.path, segment = index, "optional member missing");
            return Step::Broken;
        }
        Step::Failed(ObserverError::MemberNotFound {
            path: self.path.to_string(),
            member: self.segment(index).name().to_owned(),
            type_name: owner.type_key().name(),
        })
    }

    /// Keep the slot's token when owner and member are unchanged; otherwise
    /// release it and observe `member` on `owner` afresh.
    fn subscribe(
        &self,
        slot: &mut Option<HopSlot>,
        owner: &Object,
        member: &MemberRef,
        role: HopRole,
    ) {
        let Some(listeners) = self.listeners else {
            *slot = None;
            return;
        };
        if let Some(existing) = slot.as_ref()
            && existing.owner.ptr_eq(owner)
            && same_member(&existing.member, member)
        {
            return;
        }
        *slot = None;
        let token = member.try_observe(owner, listeners(role), self.metadata);
        if token.is_none() {
            trace!(path = %self.path, member = member.name(), "member is not observable");
        }
        *slot = Some(HopSlot {
            owner: owner.downgrade(),
            member: Arc::clone(member),
            token,
        });
    }

    /// Resolve, observe, and read intermediate hop `index` on `owner`.
    pub(crate) fn step(
        &self,
        index: usize,
        owner: &Object,
        hops: &mut ChainHops,
        members: &mut Vec<MemberRef>,
    ) -> Step {
        let segment = self.segment(index);
        let Some(member) = self.resolve_cached(
            hops.cache_mut(index),
            owner.type_key(),
            segment,
            &[MemberKind::Accessor],
        ) else {
            hops.truncate(index);
            return self.not_found(index, owner);
        };
        members.push(Arc::clone(&member));
        self.subscribe(hops.slot_mut(index), owner, &member, HopRole::Intermediate);

        match member.get_value(owner, self.metadata) {
            Ok(value) => match value.into_object() {
                Some(next) => Step::Next(next),
                None => {
                    hops.truncate(index + 1);
                    trace!(path = %self.path, segment = index, "hop value missing; chain broken");
                    Step::Broken
                }
            },
            Err(source) => {
                hops.truncate(index + 1);
                Step::Failed(ObserverError::Member {
                    path: self.path.to_string(),
                    member: member.name().to_owned(),
                    source,
                })
            }
        }
    }

    fn terminal_kinds(&self) -> &'static [MemberKind] {
        if self.options.method_terminal {
            &[MemberKind::Method]
        } else {
            &[MemberKind::Accessor, MemberKind::Event]
        }
    }

    /// Resolve and observe the terminal segment on `owner`, finishing the
    /// walk.
    pub(crate) fn terminal(
        &self,
        owner: &Object,
        hops: &mut ChainHops,
        mut members: Vec<MemberRef>,
    ) -> Published {
        let index = self.path.len() - 1;
        let segment = self.segment(index);
        let Some(member) = self.resolve_cached(
            hops.cache_mut(index),
            owner.type_key(),
            segment,
            self.terminal_kinds(),
        ) else {
            hops.truncate(index);
            return match self.not_found(index, owner) {
                Step::Failed(error) => Published::unavailable(members, Some(error)),
                Step::Next(_) | Step::Broken => Published::unavailable(members, None),
            };
        };
        members.push(Arc::clone(&member));

        if self.options.method_terminal {
            match self.companion_event(owner, &member, hops) {
                Some(event) => {
                    self.subscribe(hops.slot_mut(index), owner, &event, HopRole::Terminal);
                }
                None => hops.truncate(index),
            }
        } else {
            self.subscribe(hops.slot_mut(index), owner, &member, HopRole::Terminal);
        }
        hops.truncate(index + 1);
        Published::complete(members, owner)
    }

    /// The `<method><suffix>` event announcing a method result change.
    fn companion_event(
        &self,
        owner: &Object,
        method: &MemberRef,
        hops: &mut ChainHops,
    ) -> Option<MemberRef> {
        let name = format!("{}{}", method.name(), self.options.method_event_suffix);
        let segment = PathSegment::member(name.as_str());
        let event = self.resolve_cached(
            &mut hops.event_cache,
            owner.type_key(),
            &segment,
            &[MemberKind::Event],
        );
        if event.is_none() {
            debug!(
                path = %self.path,
                event = %name,
                "companion event not found; method result is not observed"
            );
        }
        event
    }
}
