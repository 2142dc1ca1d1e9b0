//! Strata: Scoped Context Resolution and Keyset Pagination
//!
//! Runtime plumbing for catalog and query services: a hierarchical,
//! stack-based registry for scoped configuration and request state
//! ([`context::ScopedContext`]), and a keyset pagination cursor with an
//! opaque continuation token ([`cursor::PageCursor`]).

pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod logging;
