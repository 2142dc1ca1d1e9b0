//! Context Frames
//!
//! One frame per nested scope. A frame aggregates everything that used to be
//! a parallel set of state stacks in earlier designs: the resolved value
//! cache, factory and resource registrations, name visibility sets, and the
//! release stack for resources acquired while the frame was the defining one.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A value stored in a context. Type erasure keeps the registry open to any
/// `Send + Sync` payload; use [`crate::context::ScopedContext::get_as`] to
/// recover the concrete type.
pub type Value = Arc<dyn Any + Send + Sync>;

/// A lazy value factory, invoked at most once per defining frame.
pub type Factory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A scoped-resource factory. Produces the resource value together with the
/// release callback that must run when the defining frame exits.
pub type ResourceFactory = Arc<dyn Fn() -> ResourceGuard + Send + Sync>;

type Release = Box<dyn FnOnce() + Send>;

/// The result of acquiring a scoped resource: the value handed to callers
/// plus the release callback tied to the defining frame's lifetime.
pub struct ResourceGuard {
    pub(crate) value: Value,
    pub(crate) release: Release,
}

impl ResourceGuard {
    pub fn new<T, F>(value: T, release: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce() + Send + 'static,
    {
        ResourceGuard {
            value: Arc::new(value),
            release: Box::new(release),
        }
    }
}

/// Where a cached value came from. Forking copies only `Explicit` entries,
/// so factory and resource results are recomputed per fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Explicit,
    Factory,
    Resource,
}

#[derive(Clone)]
pub(crate) struct CachedValue {
    pub value: Value,
    pub origin: Origin,
}

/// One level of a [`crate::context::ScopedContext`] stack.
pub(crate) struct Frame {
    /// Values resolved or set while this frame (or an ancestor it copied
    /// from) was current, tagged with provenance.
    pub values: HashMap<String, CachedValue>,
    /// Factories registered in this exact frame. Not copied on scope entry;
    /// the outward scan in `get` finds them, so caching stays anchored here.
    pub factories: HashMap<String, Factory>,
    /// Resource factories registered in this exact frame.
    pub resources: HashMap<String, ResourceFactory>,
    /// Names first defined in this exact frame. Guards local re-registration.
    pub local_names: HashSet<String>,
    /// All names visible in this frame, own and inherited.
    pub all_names: HashSet<String>,
    /// Release callbacks for resources acquired at this frame, pushed in
    /// acquisition order and run in reverse on exit.
    pub releases: Vec<(String, Release)>,
}

impl Frame {
    /// Root frame of a fresh context.
    pub fn root() -> Self {
        Frame {
            values: HashMap::new(),
            factories: HashMap::new(),
            resources: HashMap::new(),
            local_names: HashSet::new(),
            all_names: HashSet::new(),
            releases: Vec::new(),
        }
    }

    /// Frame pushed on scope entry: snapshots the parent frame's cache and
    /// name visibility, starts with no local registrations of its own.
    pub fn child_of(parent: &Frame) -> Self {
        Frame {
            values: parent.values.clone(),
            factories: HashMap::new(),
            resources: HashMap::new(),
            local_names: HashSet::new(),
            all_names: parent.all_names.clone(),
            releases: Vec::new(),
        }
    }

    /// Register `name` as local to this frame. Inherited names may be
    /// shadowed; a second local registration is an error caught by the caller.
    pub fn define_local(&mut self, name: &str) -> bool {
        if self.local_names.contains(name) {
            return false;
        }
        self.local_names.insert(name.to_string());
        self.all_names.insert(name.to_string());
        true
    }
}
