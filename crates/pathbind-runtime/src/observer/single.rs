//! One-segment paths: a single member resolved on the root.

use pathbind_core::Object;

use super::walk::{ChainHops, Published, WalkContext};
use super::{ObserverKind, PathWalker};
use crate::config::ObserverOptions;

/// Resolves the only segment on the root and subscribes slot 0 as the
/// terminal hop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWalker;

impl PathWalker for SingleWalker {
    fn kind(&self, options: &ObserverOptions) -> ObserverKind {
        if options.method_terminal {
            ObserverKind::MethodSingle
        } else {
            ObserverKind::Single
        }
    }

    fn walk(&self, cx: &WalkContext<'_>, root: &Object, hops: &mut ChainHops) -> Published {
        cx.terminal(root, hops, Vec::with_capacity(1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pathbind_core::test_support::{Model, ModelResolver};
    use pathbind_core::{MemberPath, Object, Value};

    use super::*;
    use crate::error::ObserverError;
    use crate::observer::{MemberPathObserver, ObserverState, SinglePathObserver};
    use crate::test_util::{Event, RecordingListener};

    fn observer(
        root: &Object,
        path: &str,
        options: ObserverOptions,
        resolver: ModelResolver,
    ) -> Arc<SinglePathObserver> {
        SinglePathObserver::new(
            root,
            MemberPath::parse(path).unwrap(),
            options,
            Arc::new(resolver),
            SingleWalker,
        )
    }

    #[test]
    fn terminal_change_notifies_last_member_without_rewalk() {
        let resolver = ModelResolver::new().property::<Model>("Name");
        let root = Object::new(Model::new().with("Name", Value::of(String::from("Ann"))));
        let observer = observer(&root, "Name", ObserverOptions::default(), resolver);
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert_eq!(observer.subscription_count(), 1);
        assert_eq!(Model::props(&root).listener_count_for("Name"), 1);

        Model::props(&root).set("Name", Value::of(String::from("Bob")));
        assert_eq!(listener.events(), vec![Event::LastMemberChanged]);
        let value = observer.last_member(None).get_value(None).unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "Bob");
    }

    #[test]
    fn removing_last_listener_releases_subscription() {
        let resolver = ModelResolver::new().property::<Model>("Name");
        let root = Object::new(Model::new());
        let observer = observer(&root, "Name", ObserverOptions::default(), resolver);
        let listener = RecordingListener::new();
        let handle = listener.handle();
        observer.add_listener(Arc::clone(&handle));
        observer.remove_listener(&handle);
        assert_eq!(observer.subscription_count(), 0);
        assert_eq!(Model::props(&root).listener_count(), 0);
        assert_eq!(observer.state(), ObserverState::Uninitialized);
    }

    #[test]
    fn missing_required_member_is_reported_on_first_listener() {
        let root = Object::new(Model::new());
        let observer = observer(&root, "Missing", ObserverOptions::default(), ModelResolver::new());
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());

        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::Error(ObserverError::MemberNotFound { member, .. }) if member == "Missing"
        ));
        assert_eq!(observer.state(), ObserverState::Settled { available: false });
    }

    #[test]
    fn missing_optional_member_is_silent() {
        let root = Object::new(Model::new());
        let observer = observer(
            &root,
            "Missing",
            ObserverOptions::default().with_optional(true),
            ModelResolver::new(),
        );
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert!(listener.events().is_empty());
        let members = observer.members(None);
        assert!(!members.all_members_available());
        assert!(members.error().is_none());
    }

    #[test]
    fn unobservable_member_still_reads() {
        let resolver = ModelResolver::new().unobservable_property::<Model>("Id");
        let root = Object::new(Model::new().with("Id", Value::of(7u32)));
        let observer = observer(&root, "Id", ObserverOptions::default(), resolver);
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert_eq!(observer.subscription_count(), 0);
        let value = observer.last_member(None).get_value(None).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn method_terminal_follows_companion_event() {
        let resolver = ModelResolver::new()
            .method::<Model>("Total", |m| m.props_total())
            .event::<Model>("TotalChanged");
        let root = Object::new(Model::new().with("N", Value::of(2u32)));
        let observer = observer(
            &root,
            "Total",
            ObserverOptions::default().with_method_terminal("Changed"),
            resolver,
        );
        assert_eq!(observer.kind(), ObserverKind::MethodSingle);
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert_eq!(Model::props(&root).listener_count_for("TotalChanged"), 1);

        Model::props(&root).set_silently("N", Value::of(5u32));
        Model::props(&root).notify("TotalChanged");
        assert_eq!(listener.events(), vec![Event::LastMemberChanged]);
        let value = observer.last_member(None).get_value(None).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&10));
    }

    #[test]
    fn method_without_companion_event_is_available_but_unobserved() {
        let resolver = ModelResolver::new().method::<Model>("Total", |m| m.props_total());
        let root = Object::new(Model::new().with("N", Value::of(1u32)));
        let observer = observer(
            &root,
            "Total",
            ObserverOptions::default().with_method_terminal("Changed"),
            resolver,
        );
        let listener = RecordingListener::new();
        observer.add_listener(listener.handle());
        assert!(listener.events().is_empty());
        assert_eq!(observer.subscription_count(), 0);
        assert!(observer.last_member(None).is_available());
    }

    trait Total {
        fn props_total(&self) -> Value;
    }

    impl Total for Model {
        fn props_total(&self) -> Value {
            use pathbind_core::test_support::HasProperties;
            let n = self.properties().get("N").downcast_ref::<u32>().copied().unwrap_or(0);
            Value::of(n * 2)
        }
    }
}
