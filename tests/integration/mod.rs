//! Integration tests for the scoped context and pagination components

mod context_scopes;
mod page_cursor;
