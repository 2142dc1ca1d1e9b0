//! Scoped context domain: frame model and the scoped resolution engine.
//! Collaborators read configuration and request-scoped objects through
//! [`ScopedContext`]; per-unit-of-work concurrency goes through
//! [`ScopedContext::fork`].

pub mod frame;
pub mod scope;

pub use frame::{Factory, ResourceFactory, ResourceGuard, Value};
pub use scope::{Scope, ScopeHandle, ScopedContext};
