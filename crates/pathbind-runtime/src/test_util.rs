//! Shared helpers for unit tests.

use std::sync::{Arc, Mutex};

use crate::error::ObserverError;
use crate::listener::PathObserverListener;
use crate::observer::MemberPathObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    PathMembersChanged,
    LastMemberChanged,
    Error(ObserverError),
}

/// Listener that records every notification it receives.
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn handle(self: &Arc<Self>) -> Arc<dyn PathObserverListener> {
        Arc::clone(self) as Arc<dyn PathObserverListener>
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PathObserverListener for RecordingListener {
    fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {
        self.push(Event::PathMembersChanged);
    }

    fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {
        self.push(Event::LastMemberChanged);
    }

    fn on_error(&self, _observer: &dyn MemberPathObserver, error: &ObserverError) {
        self.push(Event::Error(error.clone()));
    }
}
