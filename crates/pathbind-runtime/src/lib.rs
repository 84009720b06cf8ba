#![forbid(unsafe_code)]

//! Runtime: member path observers for data binding.
//!
//! # Role in pathbind
//! `pathbind-runtime` tracks a member path such as `Order.Customer.Name`
//! from a live root object. It walks the path through a
//! [`MemberResolver`](pathbind_core::MemberResolver), keeps a change
//! subscription on every hop while anyone listens, re-walks when an
//! intermediate hop changes, and tells its listeners what happened.
//!
//! # Primary responsibilities
//! - **ObserverProvider**: parses paths and picks the observer shape.
//! - **MemberPathObserver**: the observer surface (listeners, snapshots,
//!   disposal) shared by the empty, single, multi, and method shapes.
//! - **PathObserverListener**: notification contract with panic containment.
//! - **MemberPathMembers / MemberPathLastMember**: walk snapshots.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pathbind_core::test_support::{Model, ModelResolver};
//! use pathbind_core::{Object, Value};
//! use pathbind_runtime::ObserverProvider;
//!
//! let resolver = ModelResolver::new()
//!     .property::<Model>("Customer")
//!     .property::<Model>("Name");
//! let customer = Object::new(Model::new().with("Name", Value::of(String::from("Ann"))));
//! let order = Object::new(Model::new().with("Customer", Value::Object(customer)));
//!
//! let provider = ObserverProvider::new(Arc::new(resolver));
//! let observer = provider.observe(&order, "Customer.Name").unwrap();
//! let name = observer.last_member(None).get_value(None).unwrap();
//! assert_eq!(name.downcast_ref::<String>().unwrap(), "Ann");
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod observer;
pub mod provider;
pub mod snapshot;

#[cfg(test)]
mod test_util;

pub use config::{ObserverOptions, ProviderConfig};
pub use error::ObserverError;
pub use listener::PathObserverListener;
pub use observer::{
    EmptyPathObserver, MemberPathObserver, MultiPathObserver, ObserverKind, ObserverState,
    PathObserver, SinglePathObserver,
};
pub use provider::{ObserverProvider, ObserverRequest, PathSource};
pub use snapshot::{MemberPathLastMember, MemberPathMembers};
