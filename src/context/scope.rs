//! Scoped Context
//!
//! A hierarchical, stack-based registry resolving named values through three
//! strategies: direct values, lazy factories, and scoped resources whose
//! release is tied to the defining frame's lifetime. Concurrent units of work
//! fork the context instead of sharing it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::frame::{CachedValue, Factory, Frame, Origin, ResourceFactory, ResourceGuard, Value};
use crate::error::ContextError;

/// Proof that a scope was entered; must be handed back to [`ScopedContext::exit_scope`].
#[must_use = "exiting the scope requires the handle"]
#[derive(Debug)]
pub struct ScopeHandle {
    depth: usize,
}

/// Hierarchical registry of named values with scoped lifetimes.
///
/// Values are resolved against a stack of [`Frame`]s. Entering a scope pushes
/// a frame that snapshots the current value cache; leaving it pops the frame
/// and releases every scoped resource acquired there, in reverse acquisition
/// order. Factory and resource registrations stay anchored in the frame that
/// defined them, so a lazy value is computed at most once per defining frame
/// and reused by descendant frames.
///
/// A context is single-owner: concurrent work must [`ScopedContext::fork`]
/// first, after which the fork's frame stack is private.
pub struct ScopedContext {
    name: String,
    /// Rendered ancestry chain captured at fork time, diagnostics only.
    parent_lineage: Option<String>,
    frames: Vec<Frame>,
    /// Resource registrations inherited from the fork parent, installed into
    /// the first entered scope (acquisition needs a live frame to release on).
    deferred_resources: Option<HashMap<String, ResourceFactory>>,
}

impl ScopedContext {
    /// Create a standalone root context.
    pub fn new(name: impl Into<String>) -> Self {
        ScopedContext {
            name: name.into(),
            parent_lineage: None,
            frames: vec![Frame::root()],
            deferred_resources: None,
        }
    }

    /// Context name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current nesting depth; `0` for a root with no entered scopes.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Enter a new scope. Prefer [`ScopedContext::with_scope`] or
    /// [`ScopedContext::scope`], which guarantee the matching exit.
    pub fn enter_scope(&mut self) -> ScopeHandle {
        self.push_frame();
        ScopeHandle {
            depth: self.depth(),
        }
    }

    /// Exit the scope identified by `handle`. Scopes follow a strict LIFO
    /// discipline; exiting out of order or twice is rejected.
    pub fn exit_scope(&mut self, handle: ScopeHandle) -> Result<(), ContextError> {
        let current = self.depth();
        if handle.depth != current || current == 0 {
            return Err(ContextError::ScopeOrder {
                handle: handle.depth,
                current,
            });
        }
        self.pop_frame();
        Ok(())
    }

    /// Enter a scope and return a guard that exits it on drop, releasing
    /// scoped resources on every exit path, including unwinding.
    pub fn scope(&mut self) -> Scope<'_> {
        self.push_frame();
        let restore_len = self.frames.len() - 1;
        Scope {
            ctx: self,
            restore_len,
        }
    }

    /// Run `f` inside a freshly entered scope.
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut ScopedContext) -> T) -> T {
        let mut scope = self.scope();
        f(&mut scope)
    }

    fn push_frame(&mut self) {
        let mut frame = Frame::child_of(self.top());
        if let Some(deferred) = self.deferred_resources.take() {
            frame.resources = deferred;
        }
        self.frames.push(frame);
        trace!(context = %self, "entered scope");
    }

    fn pop_frame(&mut self) {
        if let Some(mut frame) = self.frames.pop() {
            for (name, release) in frame.releases.drain(..).rev() {
                trace!(name = %name, "releasing scoped resource");
                release();
            }
        }
    }

    /// Store `value` directly under `name` in the current frame.
    ///
    /// Fails if `name` was already registered locally in this frame;
    /// inherited names may be shadowed.
    pub fn set<T>(&mut self, name: &str, value: T) -> Result<(), ContextError>
    where
        T: Any + Send + Sync,
    {
        self.define_local(name)?;
        self.top_mut().values.insert(
            name.to_string(),
            CachedValue {
                value: Arc::new(value),
                origin: Origin::Explicit,
            },
        );
        Ok(())
    }

    /// Register a factory invoked at most once, the first time `name` is
    /// resolved. The result is cached at this frame and reused by descendant
    /// frames for as long as this frame is on the stack.
    pub fn bind<F, T>(&mut self, name: &str, factory: F) -> Result<(), ContextError>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        self.define_local(name)?;
        let factory: Factory = Arc::new(move || Arc::new(factory()) as Value);
        self.top_mut().factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Register a scoped resource. Acquisition is lazy; the release callback
    /// runs when the frame the resource was registered in exits. Only valid
    /// inside an entered scope.
    pub fn attach<F>(&mut self, name: &str, factory: F) -> Result<(), ContextError>
    where
        F: Fn() -> ResourceGuard + Send + Sync + 'static,
    {
        if self.depth() == 0 {
            return Err(ContextError::AttachOutsideScope);
        }
        self.define_local(name)?;
        let factory: ResourceFactory = Arc::new(factory);
        self.top_mut().resources.insert(name.to_string(), factory);
        Ok(())
    }

    fn define_local(&mut self, name: &str) -> Result<(), ContextError> {
        if !self.top_mut().define_local(name) {
            return Err(ContextError::AlreadyDefined(name.to_string()));
        }
        Ok(())
    }

    /// Resolve `name`.
    ///
    /// Resolution order: the current frame's cache, then factory
    /// registrations scanned from the innermost frame outward, then resource
    /// registrations the same way. The resolved value is cached at the frame
    /// that defined the registration and copied into the current frame, so
    /// popping back past the current frame keeps the cache at the defining
    /// frame and no factory runs twice there.
    pub fn get(&mut self, name: &str) -> Result<Value, ContextError> {
        if let Some(cached) = self.top().values.get(name) {
            return Ok(Arc::clone(&cached.value));
        }

        for idx in (0..self.frames.len()).rev() {
            let Some(factory) = self.frames[idx].factories.get(name).map(Arc::clone) else {
                continue;
            };
            let cached = match self.frames[idx].values.get(name) {
                Some(existing) => existing.clone(),
                None => {
                    debug!(context = %self, name, frame = idx, "resolving factory binding");
                    let cached = CachedValue {
                        value: factory(),
                        origin: Origin::Factory,
                    };
                    self.frames[idx]
                        .values
                        .insert(name.to_string(), cached.clone());
                    cached
                }
            };
            return Ok(self.adopt(idx, name, cached));
        }

        for idx in (0..self.frames.len()).rev() {
            let Some(factory) = self.frames[idx].resources.get(name).map(Arc::clone) else {
                continue;
            };
            let cached = match self.frames[idx].values.get(name) {
                Some(existing) => existing.clone(),
                None => {
                    debug!(context = %self, name, frame = idx, "acquiring scoped resource");
                    let guard = factory();
                    let cached = CachedValue {
                        value: guard.value,
                        origin: Origin::Resource,
                    };
                    self.frames[idx]
                        .values
                        .insert(name.to_string(), cached.clone());
                    self.frames[idx].releases.push((name.to_string(), guard.release));
                    cached
                }
            };
            return Ok(self.adopt(idx, name, cached));
        }

        Err(ContextError::UnknownVariable(name.to_string()))
    }

    /// Copy a value resolved at frame `idx` into the current frame's cache.
    fn adopt(&mut self, idx: usize, name: &str, cached: CachedValue) -> Value {
        if idx < self.frames.len() - 1 {
            self.top_mut().values.insert(name.to_string(), cached.clone());
        }
        cached.value
    }

    /// Resolve `name` and downcast to `T`.
    pub fn get_as<T>(&mut self, name: &str) -> Result<Arc<T>, ContextError>
    where
        T: Any + Send + Sync,
    {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| ContextError::TypeMismatch(name.to_string()))
    }

    /// Whether `name` is visible, including unresolved bindings.
    pub fn has(&self, name: &str) -> bool {
        self.top().all_names.contains(name)
    }

    /// Whether `name` was defined in the current frame itself.
    pub fn has_local(&self, name: &str) -> bool {
        self.top().local_names.contains(name)
    }

    /// Whether `name` has an already-materialized value in the current frame.
    pub fn has_value(&self, name: &str) -> bool {
        self.top().values.contains_key(name)
    }

    /// Whether `name` was defined in the current frame and is materialized.
    pub fn has_local_value(&self, name: &str) -> bool {
        self.has_local(name) && self.has_value(name)
    }

    /// Create an independent context seeded from this one.
    ///
    /// The fork's root frame copies only explicitly-set values from the
    /// current frame; values cached from a factory or resource are excluded
    /// regardless of whether they were already resolved, so forks never share
    /// a lazy result. Factory registrations are shared (the closures
    /// themselves, not their cached results); resource registrations are
    /// carried over and installed when the fork enters its first scope.
    pub fn fork(&self, name: impl Into<String>) -> ScopedContext {
        let top = self.top();

        let mut root = Frame::root();
        root.all_names = top.all_names.clone();
        for (key, cached) in &top.values {
            if cached.origin == Origin::Explicit {
                root.values.insert(key.clone(), cached.clone());
            }
        }
        // Effective registrations across the whole stack, innermost winning.
        for frame in &self.frames {
            for (key, factory) in &frame.factories {
                root.factories.insert(key.clone(), Arc::clone(factory));
            }
        }
        let mut deferred = HashMap::new();
        for frame in &self.frames {
            for (key, factory) in &frame.resources {
                deferred.insert(key.clone(), Arc::clone(factory));
            }
        }

        ScopedContext {
            name: name.into(),
            parent_lineage: Some(self.to_string()),
            frames: vec![root],
            deferred_resources: (!deferred.is_empty()).then_some(deferred),
        }
    }
}

impl fmt::Display for ScopedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent_lineage {
            write!(f, "{} < ", parent)?;
        }
        write!(f, "{}:{}", self.name, self.depth())
    }
}

impl fmt::Debug for ScopedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContext")
            .field("lineage", &self.to_string())
            .field("frames", &self.frames.len())
            .finish()
    }
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        // Scopes left entered (e.g. a leaked handle) still get their
        // resources released, outermost last.
        while !self.frames.is_empty() {
            self.pop_frame();
        }
    }
}

/// RAII guard for an entered scope; exits the scope on drop.
pub struct Scope<'a> {
    ctx: &'a mut ScopedContext,
    restore_len: usize,
}

impl Deref for Scope<'_> {
    type Target = ScopedContext;

    fn deref(&self) -> &ScopedContext {
        self.ctx
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut ScopedContext {
        self.ctx
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        while self.ctx.frames.len() > self.restore_len {
            self.ctx.pop_frame();
        }
    }
}
