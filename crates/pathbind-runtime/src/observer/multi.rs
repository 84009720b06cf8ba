//! Paths of two or more segments.

use pathbind_core::Object;

use super::walk::{ChainHops, Published, Step, WalkContext};
use super::{ObserverKind, PathWalker};
use crate::config::ObserverOptions;

/// Walks hops `0..N-1` reading each value, then finishes on the terminal
/// segment. A missing value stops the walk; slots past it are released.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiWalker;

impl PathWalker for MultiWalker {
    fn kind(&self, options: &ObserverOptions) -> ObserverKind {
        if options.method_terminal {
            ObserverKind::MethodMulti
        } else {
            ObserverKind::Multi
        }
    }

    fn walk(&self, cx: &WalkContext<'_>, root: &Object, hops: &mut ChainHops) -> Published {
        let terminal = cx.path().len() - 1;
        let mut members = Vec::with_capacity(cx.path().len());
        let mut owner = root.clone();
        for index in 0..terminal {
            match cx.step(index, &owner, hops, &mut members) {
                Step::Next(next) => owner = next,
                Step::Broken => return Published::unavailable(members, None),
                Step::Failed(error) => return Published::unavailable(members, Some(error)),
            }
        }
        cx.terminal(&owner, hops, members)
    }
}
