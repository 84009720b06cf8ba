//! The empty path: the observed value is the root itself.

use pathbind_core::{IdentityMember, Object};

use super::walk::{ChainHops, Published, WalkContext};
use super::{ObserverKind, PathWalker};
use crate::config::ObserverOptions;

/// Reports `(root, IdentityMember)` and never subscribes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWalker;

impl PathWalker for EmptyWalker {
    fn kind(&self, _options: &ObserverOptions) -> ObserverKind {
        ObserverKind::Empty
    }

    fn walk(&self, _cx: &WalkContext<'_>, root: &Object, hops: &mut ChainHops) -> Published {
        hops.truncate(0);
        Published::complete(vec![IdentityMember::shared()], root)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pathbind_core::test_support::{Model, ModelResolver};
    use pathbind_core::{MemberKind, MemberPath, Object};

    use super::*;
    use crate::observer::{EmptyPathObserver, MemberPathObserver, ObserverState};
    use crate::test_util::RecordingListener;

    fn observer(root: &Object) -> Arc<EmptyPathObserver> {
        EmptyPathObserver::new(
            root,
            MemberPath::empty(),
            ObserverOptions::default(),
            Arc::new(ModelResolver::new()),
            EmptyWalker,
        )
    }

    #[test]
    fn last_member_is_the_root() {
        let root = Object::new(Model::new());
        let observer = observer(&root);
        let last = observer.last_member(None);
        assert!(last.is_available());
        assert!(last.owner().unwrap().ptr_eq(&root));
        assert_eq!(last.member().unwrap().kind(), MemberKind::Identity);
        assert!(last.get_value(None).unwrap().as_object().unwrap().ptr_eq(&root));
    }

    #[test]
    fn first_listener_settles_without_subscribing() {
        let root = Object::new(Model::new());
        let observer = observer(&root);
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert_eq!(observer.state(), ObserverState::Settled { available: true });
        assert_eq!(observer.subscription_count(), 0);
        assert!(listener.events().is_empty());

        let members = observer.members(None);
        assert!(members.all_members_available());
        assert!(members.source().unwrap().ptr_eq(&root));
    }

    #[test]
    fn weak_root_going_away_makes_path_unavailable() {
        let root = Object::new(Model::new());
        let observer = observer(&root);
        assert!(observer.is_alive());
        drop(root);
        assert!(!observer.is_alive());
        assert!(observer.target().is_none());
        let members = observer.members(None);
        assert!(!members.all_members_available());
        assert!(members.error().is_none());
    }
}
