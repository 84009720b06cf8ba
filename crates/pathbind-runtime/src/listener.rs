#![forbid(unsafe_code)]

//! Path observer listeners: registry and contained dispatch.
//!
//! # Design
//!
//! Most observers carry exactly one listener (the binding that created
//! them), so [`ListenerRegistry`] stores listeners as `Empty | One | Many`
//! and only allocates a `Vec` once a second listener arrives. Dispatch works
//! on a [`SmallVec`] snapshot taken under the observer lock; callbacks run
//! after the lock is released.
//!
//! # Failure Modes
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Listener panics in a change callback | Caught; reported to every other listener as [`ObserverError::ListenerPanicked`]; dispatch continues |
//! | Listener panics in `on_error` | Caught, logged at `warn`, dropped |
//! | Observer disposed mid-dispatch | Remaining listeners are skipped |

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::{ObserverError, panic_message};
use crate::observer::MemberPathObserver;

/// Consumer of path observer notifications.
///
/// Callbacks run without any observer lock held and may call back into the
/// observer, including `remove_listener` and `dispose`. A listener removed
/// while a notification is being delivered, by itself or by an earlier
/// listener, is not called for the rest of that delivery.
pub trait PathObserverListener: Send + Sync {
    /// A hop before the terminal changed and the path was walked again.
    fn on_path_members_changed(&self, observer: &dyn MemberPathObserver);

    /// The terminal member's value changed on the same owner.
    fn on_last_member_changed(&self, observer: &dyn MemberPathObserver);

    /// A walk failed, or another listener panicked.
    fn on_error(&self, observer: &dyn MemberPathObserver, error: &ObserverError);
}

pub(crate) type ListenerSnapshot = SmallVec<[Arc<dyn PathObserverListener>; 2]>;

#[inline]
fn same_listener(a: &Arc<dyn PathObserverListener>, b: &Arc<dyn PathObserverListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Registered listeners of one observer, in registration order.
#[derive(Default)]
pub(crate) enum ListenerRegistry {
    #[default]
    Empty,
    One(Arc<dyn PathObserverListener>),
    Many(Vec<Arc<dyn PathObserverListener>>),
}

impl ListenerRegistry {
    /// Register `listener`. Returns `true` when it is the first one.
    pub(crate) fn add(&mut self, listener: Arc<dyn PathObserverListener>) -> bool {
        match std::mem::take(self) {
            Self::Empty => {
                *self = Self::One(listener);
                true
            }
            Self::One(existing) => {
                *self = Self::Many(vec![existing, listener]);
                false
            }
            Self::Many(mut all) => {
                all.push(listener);
                *self = Self::Many(all);
                false
            }
        }
    }

    /// Remove one registration of `listener`, compared by identity.
    pub(crate) fn remove(&mut self, listener: &Arc<dyn PathObserverListener>) -> bool {
        match self {
            Self::Empty => false,
            Self::One(existing) => {
                if same_listener(existing, listener) {
                    *self = Self::Empty;
                    true
                } else {
                    false
                }
            }
            Self::Many(all) => {
                let Some(index) = all.iter().position(|l| same_listener(l, listener)) else {
                    return false;
                };
                all.remove(index);
                match all.len() {
                    0 => *self = Self::Empty,
                    1 => {
                        if let Some(last) = all.pop() {
                            *self = Self::One(last);
                        }
                    }
                    _ => {}
                }
                true
            }
        }
    }

    /// Whether `listener` holds at least one registration.
    pub(crate) fn contains(&self, listener: &Arc<dyn PathObserverListener>) -> bool {
        match self {
            Self::Empty => false,
            Self::One(existing) => same_listener(existing, listener),
            Self::Many(all) => all.iter().any(|l| same_listener(l, listener)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Many(all) => all.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Take every listener out, leaving the registry empty.
    pub(crate) fn clear(&mut self) -> ListenerSnapshot {
        let snapshot = self.snapshot();
        *self = Self::Empty;
        snapshot
    }

    pub(crate) fn snapshot(&self) -> ListenerSnapshot {
        match self {
            Self::Empty => SmallVec::new(),
            Self::One(listener) => smallvec::smallvec![Arc::clone(listener)],
            Self::Many(all) => all.iter().cloned().collect(),
        }
    }
}

/// What is being delivered.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Notification<'a> {
    PathMembersChanged,
    LastMemberChanged,
    Error(&'a ObserverError),
}

/// Deliver `notification` to `listeners` in order.
///
/// `cancelled` is polled before each listener; once it returns `true` the
/// rest of the snapshot is skipped. Listeners for which `registered` returns
/// `false` were removed after the snapshot was taken and are passed over.
pub(crate) fn dispatch(
    observer: &dyn MemberPathObserver,
    listeners: &[Arc<dyn PathObserverListener>],
    notification: Notification<'_>,
    cancelled: impl Fn() -> bool,
    registered: impl Fn(&Arc<dyn PathObserverListener>) -> bool,
) {
    for (index, listener) in listeners.iter().enumerate() {
        if cancelled() {
            trace!(
                path = %observer.path(),
                skipped = listeners.len() - index,
                "dispatch cancelled"
            );
            return;
        }
        if !registered(listener) {
            continue;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| match notification {
            Notification::PathMembersChanged => listener.on_path_members_changed(observer),
            Notification::LastMemberChanged => listener.on_last_member_changed(observer),
            Notification::Error(error) => listener.on_error(observer, error),
        }));
        let Err(payload) = outcome else {
            continue;
        };
        let message = panic_message(payload.as_ref());
        if matches!(notification, Notification::Error(_)) {
            warn!(
                path = %observer.path(),
                listener = index,
                panic = %message,
                "on_error panicked"
            );
            continue;
        }
        warn!(
            path = %observer.path(),
            listener = index,
            panic = %message,
            "path listener panicked"
        );
        let error = ObserverError::ListenerPanicked { message };
        for (other_index, other) in listeners.iter().enumerate() {
            if other_index == index {
                continue;
            }
            if cancelled() {
                break;
            }
            if registered(other) {
                report_error(observer, other, &error);
            }
        }
    }
}

fn report_error(
    observer: &dyn MemberPathObserver,
    listener: &Arc<dyn PathObserverListener>,
    error: &ObserverError,
) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_error(observer, error))) {
        warn!(
            path = %observer.path(),
            panic = %panic_message(payload.as_ref()),
            "on_error panicked while reporting a listener panic"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use pathbind_core::{MemberPath, Object};

    use crate::observer::{ObserverKind, ObserverState};
    use crate::snapshot::{MemberPathLastMember, MemberPathMembers};

    struct StubObserver(MemberPath);

    impl MemberPathObserver for StubObserver {
        fn path(&self) -> &MemberPath {
            &self.0
        }
        fn target(&self) -> Option<Object> {
            None
        }
        fn is_alive(&self) -> bool {
            true
        }
        fn kind(&self) -> ObserverKind {
            ObserverKind::Single
        }
        fn state(&self) -> ObserverState {
            ObserverState::Uninitialized
        }
        fn add_listener(&self, _listener: Arc<dyn PathObserverListener>) {}
        fn remove_listener(&self, _listener: &Arc<dyn PathObserverListener>) {}
        fn listener_count(&self) -> usize {
            0
        }
        fn subscription_count(&self) -> usize {
            0
        }
        fn members(&self, _metadata: Option<&pathbind_core::Metadata>) -> MemberPathMembers {
            MemberPathMembers::unavailable(self.0.clone(), None)
        }
        fn last_member(&self, metadata: Option<&pathbind_core::Metadata>) -> MemberPathLastMember {
            self.members(metadata).last_member()
        }
        fn dispose(&self) {}
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        panic_on_change: bool,
        panic_on_error: bool,
    }

    impl Recorder {
        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl PathObserverListener for Recorder {
        fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {
            self.log.lock().unwrap().push("members".into());
            if self.panic_on_change {
                panic!("members boom");
            }
        }
        fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {
            self.log.lock().unwrap().push("last".into());
            if self.panic_on_change {
                panic!("last boom");
            }
        }
        fn on_error(&self, _observer: &dyn MemberPathObserver, error: &ObserverError) {
            self.log.lock().unwrap().push(format!("error: {error}"));
            if self.panic_on_error {
                panic!("error boom");
            }
        }
    }

    fn arc(recorder: &Arc<Recorder>) -> Arc<dyn PathObserverListener> {
        Arc::clone(recorder) as Arc<dyn PathObserverListener>
    }

    #[test]
    fn registry_grows_and_collapses() {
        let a = arc(&Arc::new(Recorder::default()));
        let b = arc(&Arc::new(Recorder::default()));
        let mut registry = ListenerRegistry::default();
        assert!(registry.add(Arc::clone(&a)));
        assert!(matches!(registry, ListenerRegistry::One(_)));
        assert!(!registry.add(Arc::clone(&b)));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&a));
        assert!(matches!(registry, ListenerRegistry::One(_)));
        assert!(!registry.remove(&a));
        assert!(registry.remove(&b));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_registrations_are_removed_one_at_a_time() {
        let a = arc(&Arc::new(Recorder::default()));
        let mut registry = ListenerRegistry::default();
        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&a));
        assert!(registry.remove(&a));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.clear().len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_listener_is_reported_to_the_others() {
        let observer = StubObserver(MemberPath::parse("A").unwrap());
        let first = Arc::new(Recorder::default());
        let bad = Arc::new(Recorder {
            panic_on_change: true,
            ..Recorder::default()
        });
        let last = Arc::new(Recorder::default());
        let listeners = [arc(&first), arc(&bad), arc(&last)];

        dispatch(&observer, &listeners, Notification::LastMemberChanged, || false, |_| true);

        assert_eq!(
            first.entries(),
            vec!["last".to_owned(), "error: path listener panicked: last boom".to_owned()]
        );
        assert_eq!(bad.entries(), vec!["last".to_owned()]);
        assert_eq!(
            last.entries(),
            vec!["error: path listener panicked: last boom".to_owned(), "last".to_owned()]
        );
    }

    #[test]
    fn panics_inside_on_error_are_swallowed() {
        let observer = StubObserver(MemberPath::parse("A").unwrap());
        let bad = Arc::new(Recorder {
            panic_on_change: true,
            ..Recorder::default()
        });
        let grumpy = Arc::new(Recorder {
            panic_on_error: true,
            ..Recorder::default()
        });
        let listeners = [arc(&bad), arc(&grumpy)];
        dispatch(&observer, &listeners, Notification::PathMembersChanged, || false, |_| true);
        assert_eq!(grumpy.entries().len(), 2);

        let error = ObserverError::Unavailable { path: "A".into() };
        dispatch(&observer, &listeners, Notification::Error(&error), || false, |_| true);
        assert_eq!(grumpy.entries().len(), 3);
    }

    #[test]
    fn cancellation_stops_dispatch() {
        let observer = StubObserver(MemberPath::parse("A").unwrap());
        let stop = AtomicBool::new(false);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let listeners = [arc(&first), arc(&second)];
        dispatch(
            &observer,
            &listeners,
            Notification::PathMembersChanged,
            || stop.swap(true, Ordering::SeqCst),
            |_| true,
        );
        assert_eq!(first.entries().len(), 1);
        assert!(second.entries().is_empty());
    }

    #[test]
    fn unregistered_listeners_are_passed_over() {
        let observer = StubObserver(MemberPath::parse("A").unwrap());
        let bad = Arc::new(Recorder {
            panic_on_change: true,
            ..Recorder::default()
        });
        let gone = Arc::new(Recorder::default());
        let kept = Arc::new(Recorder::default());
        let gone_handle = arc(&gone);
        let listeners = [arc(&bad), Arc::clone(&gone_handle), arc(&kept)];

        dispatch(
            &observer,
            &listeners,
            Notification::LastMemberChanged,
            || false,
            |listener| !same_listener(listener, &gone_handle),
        );

        assert!(gone.entries().is_empty());
        assert_eq!(
            kept.entries(),
            vec!["error: path listener panicked: last boom".to_owned(), "last".to_owned()]
        );
    }

    #[test]
    fn registry_contains_by_identity() {
        let a = arc(&Arc::new(Recorder::default()));
        let b = arc(&Arc::new(Recorder::default()));
        let mut registry = ListenerRegistry::default();
        assert!(!registry.contains(&a));
        registry.add(Arc::clone(&a));
        assert!(registry.contains(&a));
        assert!(!registry.contains(&b));
        registry.add(Arc::clone(&b));
        registry.remove(&a);
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
    }
}
