#![forbid(unsafe_code)]

//! Member path observers.
//!
//! # Design
//!
//! Every path shape shares one state machine, [`PathObserver`], and differs
//! only in its [`PathWalker`]: the empty path reports the root itself, a
//! single segment resolves one member on the root, and longer paths walk
//! intermediate hops before the terminal one. Method terminals are a mode of
//! the single and multi walkers.
//!
//! ```text
//!   Uninitialized --first listener--> Walking --> Settled { available }
//!         ^                              ^              |
//!         |                              +--hop change--+
//!         +---------last listener removed---------------+
//!   any state --dispose--> Disposed
//! ```
//!
//! Walks run outside the state lock against hop slots taken out of it, and
//! are published only if the observer's session is unchanged when they
//! finish. Hop listeners hold a [`Weak`] back-reference plus the session
//! they were created in.
//!
//! # Invariants
//!
//! 1. With zero listeners an observer holds zero hop subscriptions.
//! 2. A path of `N` segments never holds more than `N` subscriptions.
//! 3. At most one walk runs per observer; requests arriving meanwhile are
//!    coalesced into a follow-up walk by the thread already walking.
//! 4. After `dispose` no listener is called, no subscription is held, and
//!    `is_alive` is `false`.
//!
//! # Failure Modes
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Required member missing | `MemberNotFound` in the snapshot and via `on_error` |
//! | Getter error | `Member` in the snapshot and via `on_error` |
//! | Walk panics | Caught; `WalkPanicked`, all hop subscriptions dropped |
//! | Root collected | Path unavailable, no error; the chain is released on the next hop change or read |

mod empty;
mod multi;
mod single;
pub mod walk;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use bitflags::bitflags;
use pathbind_core::{
    MemberListener, MemberPath, MemberResolver, Metadata, Object, TargetRef,
};
use tracing::{debug, trace, warn};

use crate::config::ObserverOptions;
use crate::error::{ObserverError, panic_message};
use crate::listener::{self, ListenerRegistry, ListenerSnapshot, Notification, PathObserverListener};
use crate::snapshot::{MemberPathLastMember, MemberPathMembers};

pub use empty::EmptyWalker;
pub use multi::MultiWalker;
pub use single::SingleWalker;
use walk::{ChainHops, HopRole, ListenerFactory, Published, WalkContext};

/// Observer for the empty path: the root itself.
pub type EmptyPathObserver = PathObserver<EmptyWalker>;
/// Observer for a one-segment path.
pub type SinglePathObserver = PathObserver<SingleWalker>;
/// Observer for a path of two or more segments.
pub type MultiPathObserver = PathObserver<MultiWalker>;

/// Which observer family serves a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    Empty,
    Single,
    Multi,
    /// Single segment naming a method, observed through its companion event.
    MethodSingle,
    /// Multi-segment path ending in a method.
    MethodMulti,
}

/// Lifecycle of one observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// No listener, no subscriptions.
    Uninitialized,
    Walking,
    /// Last walk published; `available` when the terminal member resolved.
    Settled { available: bool },
    /// Terminal.
    Disposed,
}

/// Consumer-facing surface of a path observer.
pub trait MemberPathObserver: Send + Sync {
    fn path(&self) -> &MemberPath;

    /// The root, if still alive and not disposed.
    fn target(&self) -> Option<Object>;

    /// Root resolves and the observer is not disposed.
    fn is_alive(&self) -> bool;

    fn kind(&self) -> ObserverKind;

    fn state(&self) -> ObserverState;

    /// Register `listener`. The first registration walks and subscribes the
    /// path. No-op after [`dispose`](Self::dispose).
    fn add_listener(&self, listener: Arc<dyn PathObserverListener>);

    /// Remove one registration of `listener` (by identity). Removing the
    /// last one releases every hop subscription.
    fn remove_listener(&self, listener: &Arc<dyn PathObserverListener>);

    fn listener_count(&self) -> usize;

    /// Active hop subscriptions.
    fn subscription_count(&self) -> usize;

    /// Current members of the path.
    ///
    /// A settled observable observer answers from its last walk; otherwise
    /// the path is walked on demand without subscribing, passing `metadata`
    /// to the getters.
    fn members(&self, metadata: Option<&Metadata>) -> MemberPathMembers;

    fn last_member(&self, metadata: Option<&Metadata>) -> MemberPathLastMember;

    /// Idempotent. Drops listeners, subscriptions, and the root reference.
    fn dispose(&self);
}

/// Shape-specific part of a walk.
pub trait PathWalker: Send + Sync + 'static {
    fn kind(&self, options: &ObserverOptions) -> ObserverKind;

    /// Walk from a live `root`, updating `hops` in place.
    fn walk(&self, cx: &WalkContext<'_>, root: &Object, hops: &mut ChainHops) -> Published;
}

bitflags! {
    /// Why a walk was requested. Requests coalesce while a walk runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct WalkReasons: u8 {
        /// First listener registered.
        const INITIAL     = 0b001;
        /// An intermediate hop changed.
        const STRUCTURE   = 0b010;
        /// The terminal member changed.
        const LAST_MEMBER = 0b100;
    }
}

struct Shared {
    target: Option<TargetRef>,
    listeners: ListenerRegistry,
    /// Bumped whenever hop subscriptions are released wholesale.
    session: u64,
    state: ObserverState,
    hops: ChainHops,
}

/// Path observer parameterized by its walk shape.
pub struct PathObserver<W> {
    path: MemberPath,
    options: ObserverOptions,
    resolver: Arc<dyn MemberResolver>,
    walker: W,
    kind: ObserverKind,
    this: Weak<Self>,
    shared: Mutex<Shared>,
    walk_gate: Mutex<()>,
    pending: AtomicU8,
    disposed: AtomicBool,
}

impl<W: PathWalker> PathObserver<W> {
    pub(crate) fn new(
        target: &Object,
        path: MemberPath,
        options: ObserverOptions,
        resolver: Arc<dyn MemberResolver>,
        walker: W,
    ) -> Arc<Self> {
        let kind = walker.kind(&options);
        let target = TargetRef::new(target, options.weak_target);
        Arc::new_cyclic(|this| Self {
            path,
            options,
            resolver,
            walker,
            kind,
            this: this.clone(),
            shared: Mutex::new(Shared {
                target: Some(target),
                listeners: ListenerRegistry::default(),
                session: 0,
                state: ObserverState::Uninitialized,
                hops: ChainHops::default(),
            }),
            walk_gate: Mutex::new(()),
            pending: AtomicU8::new(0),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Request a walk (or a terminal notification) and serve pending
    /// requests unless another call is already doing so.
    fn schedule(&self, reasons: WalkReasons) {
        self.pending.fetch_or(reasons.bits(), Ordering::SeqCst);
        loop {
            let gate = match self.walk_gate.try_lock() {
                Ok(gate) => gate,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            let reasons = WalkReasons::from_bits_truncate(self.pending.swap(0, Ordering::SeqCst));
            if !reasons.is_empty() {
                self.run(reasons);
            }
            drop(gate);
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
        }
    }

    fn run(&self, reasons: WalkReasons) {
        if reasons.intersects(WalkReasons::INITIAL | WalkReasons::STRUCTURE) {
            let Some((listeners, error)) = self.walk_and_install() else {
                return;
            };
            if reasons.contains(WalkReasons::STRUCTURE) {
                self.notify(&listeners, Notification::PathMembersChanged);
            }
            if let Some(error) = &error {
                self.notify(&listeners, Notification::Error(error));
            }
        } else if reasons.contains(WalkReasons::LAST_MEMBER) {
            let listeners = {
                let shared = self.lock();
                if !matches!(shared.state, ObserverState::Settled { .. }) {
                    return;
                }
                shared.listeners.snapshot()
            };
            self.notify(&listeners, Notification::LastMemberChanged);
        }
    }

    /// Walk with subscriptions and publish the result if the session still
    /// matches. Returns the listeners to notify and the walk's error.
    fn walk_and_install(&self) -> Option<(ListenerSnapshot, Option<ObserverError>)> {
        let (root, session, mut hops) = {
            let mut shared = self.lock();
            if self.is_disposed() || shared.listeners.is_empty() {
                return None;
            }
            shared.state = ObserverState::Walking;
            let hops = std::mem::take(&mut shared.hops);
            let root = shared.target.as_ref().and_then(TargetRef::resolve);
            (root, shared.session, hops)
        };

        let this = self.this.clone();
        let factory = move |role: HopRole| -> Arc<dyn MemberListener> {
            Arc::new(HopListener {
                observer: this.clone(),
                session,
                role,
            })
        };
        let listeners = if self.options.observable {
            Some(&factory as ListenerFactory<'_>)
        } else {
            None
        };
        let cx = WalkContext::new(&self.path, &self.options, &*self.resolver, None, listeners);
        let published = self.run_walker(&cx, root.as_ref(), &mut hops);
        let available = published.is_available();
        let error = published.error().cloned();
        hops.publish(published);

        let mut shared = self.lock();
        if self.is_disposed() || shared.session != session || shared.listeners.is_empty() {
            if !self.is_disposed() {
                shared.hops.merge_caches(&hops);
            }
            drop(shared);
            trace!(path = %self.path, session, "walk outlived its session; discarded");
            return None;
        }
        let stale = std::mem::replace(&mut shared.hops, hops);
        shared.state = ObserverState::Settled { available };
        let subscriptions = shared.hops.subscription_count();
        let listeners = shared.listeners.snapshot();
        drop(shared);
        drop(stale);
        debug!(
            path = %self.path,
            available,
            subscriptions,
            failed = error.is_some(),
            "path walked"
        );
        Some((listeners, error))
    }

    fn run_walker(
        &self,
        cx: &WalkContext<'_>,
        root: Option<&Object>,
        hops: &mut ChainHops,
    ) -> Published {
        let Some(root) = root else {
            hops.truncate(0);
            trace!(path = %self.path, "target is gone");
            return Published::unavailable(Vec::new(), None);
        };
        match catch_unwind(AssertUnwindSafe(|| self.walker.walk(cx, root, hops))) {
            Ok(published) => published,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(path = %self.path, panic = %message, "path walk panicked");
                hops.truncate(0);
                Published::unavailable(
                    Vec::new(),
                    Some(ObserverError::WalkPanicked {
                        path: self.path.to_string(),
                        message,
                    }),
                )
            }
        }
    }

    fn notify(&self, listeners: &[Arc<dyn PathObserverListener>], notification: Notification<'_>) {
        if listeners.is_empty() {
            return;
        }
        listener::dispatch(
            self,
            listeners,
            notification,
            || self.is_disposed(),
            |listener| self.lock().listeners.contains(listener),
        );
    }

    fn on_hop_changed(&self, session: u64, role: HopRole, member: &str) -> bool {
        if self.is_disposed() {
            return false;
        }
        let root_alive = {
            let shared = self.lock();
            if shared.session != session {
                trace!(path = %self.path, member, "stale hop notification ignored");
                return false;
            }
            shared.target.as_ref().is_some_and(TargetRef::is_alive)
        };
        trace!(path = %self.path, member, ?role, root_alive, "hop changed");
        // A collected root invalidates the whole chain, not just the terminal.
        self.schedule(match role {
            HopRole::Terminal if root_alive => WalkReasons::LAST_MEMBER,
            _ => WalkReasons::STRUCTURE,
        });
        true
    }
}

impl<W: PathWalker> MemberPathObserver for PathObserver<W> {
    fn path(&self) -> &MemberPath {
        &self.path
    }

    fn target(&self) -> Option<Object> {
        self.lock().target.as_ref().and_then(TargetRef::resolve)
    }

    fn is_alive(&self) -> bool {
        !self.is_disposed() && self.lock().target.as_ref().is_some_and(TargetRef::is_alive)
    }

    fn kind(&self) -> ObserverKind {
        self.kind
    }

    fn state(&self) -> ObserverState {
        let shared = self.lock();
        match shared.state {
            ObserverState::Settled { available: true }
                if !shared.target.as_ref().is_some_and(TargetRef::is_alive) =>
            {
                ObserverState::Settled { available: false }
            }
            state => state,
        }
    }

    fn add_listener(&self, listener: Arc<dyn PathObserverListener>) {
        let first = {
            let mut shared = self.lock();
            if self.is_disposed() {
                return;
            }
            shared.listeners.add(listener)
        };
        if first {
            self.schedule(WalkReasons::INITIAL);
        }
    }

    fn remove_listener(&self, listener: &Arc<dyn PathObserverListener>) {
        let released = {
            let mut shared = self.lock();
            if !shared.listeners.remove(listener) || !shared.listeners.is_empty() {
                return;
            }
            shared.session = shared.session.wrapping_add(1);
            shared.state = ObserverState::Uninitialized;
            shared.hops.release()
        };
        debug!(
            path = %self.path,
            released = released.iter().flatten().count(),
            "last listener removed"
        );
        drop(released);
    }

    fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn subscription_count(&self) -> usize {
        self.lock().hops.subscription_count()
    }

    fn members(&self, metadata: Option<&Metadata>) -> MemberPathMembers {
        let (root, mut hops) = {
            let shared = self.lock();
            if self.is_disposed() {
                return MemberPathMembers::unavailable(
                    self.path.clone(),
                    Some(ObserverError::Disposed {
                        path: self.path.to_string(),
                    }),
                );
            }
            let root = shared.target.as_ref().and_then(TargetRef::resolve);
            if root.is_none() {
                let orphaned = shared.hops.subscription_count() > 0
                    || shared.hops.published().is_some_and(Published::is_available);
                drop(shared);
                if orphaned {
                    // Release the chain the collected root left behind.
                    self.schedule(WalkReasons::STRUCTURE);
                }
                return MemberPathMembers::unavailable(self.path.clone(), None);
            }
            if self.options.observable
                && let Some(published) = shared.hops.published()
            {
                return published.snapshot(&self.path, root);
            }
            (root, ChainHops::with_caches_of(&shared.hops))
        };

        let cx = WalkContext::new(&self.path, &self.options, &*self.resolver, metadata, None);
        let published = self.run_walker(&cx, root.as_ref(), &mut hops);
        if self.options.stable_path {
            self.lock().hops.merge_caches(&hops);
        }
        published.snapshot(&self.path, root)
    }

    fn last_member(&self, metadata: Option<&Metadata>) -> MemberPathLastMember {
        self.members(metadata).last_member()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (slots, listeners, target) = {
            let mut shared = self.lock();
            shared.session = shared.session.wrapping_add(1);
            shared.state = ObserverState::Disposed;
            (
                shared.hops.clear(),
                shared.listeners.clear(),
                shared.target.take(),
            )
        };
        debug!(
            path = %self.path,
            listeners = listeners.len(),
            subscriptions = slots.iter().flatten().count(),
            "observer disposed"
        );
        drop((slots, listeners, target));
    }
}

impl<W> fmt::Debug for PathObserver<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PathObserver")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("state", &shared.state)
            .field("listeners", &shared.listeners.len())
            .field("subscriptions", &shared.hops.subscription_count())
            .finish()
    }
}

/// Member listener installed on a hop; forwards to the observer while the
/// session it was created in is current.
struct HopListener<W> {
    observer: Weak<PathObserver<W>>,
    session: u64,
    role: HopRole,
}

impl<W: PathWalker> MemberListener for HopListener<W> {
    fn on_member_changed(&self, member: &str) -> bool {
        match self.observer.upgrade() {
            Some(observer) => observer.on_hop_changed(self.session, self.role, member),
            None => false,
        }
    }
}
