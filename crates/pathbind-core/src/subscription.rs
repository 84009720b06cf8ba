#![forbid(unsafe_code)]

//! Disposable subscription tokens.
//!
//! A [`Subscription`] is returned by
//! [`MemberDescriptor::try_observe`](crate::member::MemberDescriptor::try_observe).
//! Dropping it (or calling [`Subscription::dispose`]) runs the unsubscribe
//! action exactly once.

use std::fmt;

type DisposeFn = Box<dyn FnOnce() + Send>;

/// RAII guard for a member change subscription.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Option<DisposeFn>,
}

impl Subscription {
    /// A token that runs `dispose` when released.
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A token with nothing to release (source keeps no listener state).
    pub fn noop() -> Self {
        Self { dispose: None }
    }

    /// Release now. Equivalent to dropping the token.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("armed", &self.dispose.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn drop_runs_dispose_once() {
        let (count, sub) = counting();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_dispose_does_not_double_run() {
        let (count, sub) = counting();
        sub.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_token_is_inert() {
        let sub = Subscription::noop();
        assert_eq!(format!("{sub:?}"), "Subscription { armed: false }");
    }
}
