//! Keyset Pagination Cursor
//!
//! A [`PageCursor`] carries the ordered sort-key bindings of a paged query.
//! The query executor reads the bindings to build its ordering and seek
//! predicates, writes advanced values back as rows are consumed, and
//! exchanges the state with external callers as an opaque continuation token.
//!
//! Binding insertion order is significant: it defines the tie-break order of
//! the keyset and the on-the-wire encoding order of the token.

pub mod token;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::PaginationConfig;
use crate::error::CursorError;

/// One column of the keyset tuple: the property it reads from and the value
/// the last consumed row had for it. `Value::Null` means "unset".
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBinding {
    pub property: String,
    pub value: Value,
}

/// Model-declared pagination defaults used to seed a [`PageCursor`]:
/// the declared page keys (sort-key name to property), the page size, and
/// whether pagination applies to the model at all.
#[derive(Debug, Clone, Default)]
pub struct PageInfo {
    pub enabled: bool,
    pub size: Option<u64>,
    pub keys: Vec<(String, String)>,
}

/// Pagination state threaded between a paged query and the continuation
/// token returned to the caller.
///
/// Sort-key names may carry a leading `-` direction marker for descending
/// order. A plain mutable value object: one cursor per in-flight request, no
/// sharing across concurrent queries.
#[derive(Debug, Clone, Default)]
pub struct PageCursor {
    by: Vec<(String, KeyBinding)>,
    pub size: Option<u64>,
    pub enabled: bool,
}

impl PageCursor {
    pub fn new() -> Self {
        PageCursor {
            by: Vec::new(),
            size: None,
            enabled: true,
        }
    }

    /// Build a cursor from a model's declared page keys, all values unset.
    pub fn from_info(info: &PageInfo) -> Self {
        let mut cursor = PageCursor {
            by: Vec::new(),
            size: info.size,
            enabled: info.enabled,
        };
        for (key, property) in &info.keys {
            cursor.add_binding(key, property, Value::Null);
        }
        cursor
    }

    /// Bindings in insertion order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &KeyBinding)> {
        self.by.iter().map(|(key, binding)| (key.as_str(), binding))
    }

    pub fn len(&self) -> usize {
        self.by.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.by.iter().position(|(k, _)| k == key)
    }

    /// Insert or overwrite the binding at `key`.
    pub fn add_binding(&mut self, key: &str, property: &str, value: Value) {
        let binding = KeyBinding {
            property: property.to_string(),
            value,
        };
        match self.position(key) {
            Some(idx) => self.by[idx].1 = binding,
            None => self.by.push((key.to_string(), binding)),
        }
    }

    /// Set the current value for `key`.
    ///
    /// If `key` carries a leading `-` direction marker and a binding exists
    /// under the un-prefixed name, that binding is renamed to the prefixed
    /// key first. The rename changes key identity in place; this is part of
    /// the wire contract for descending sort keys. A missing key gets a new
    /// binding with `property` before assignment.
    pub fn update_value(&mut self, key: &str, property: &str, value: Value) {
        let cleaned = key.strip_prefix('-').unwrap_or(key);
        if cleaned != key {
            if let Some(idx) = self.position(cleaned) {
                self.by[idx].0 = key.to_string();
            }
        }
        match self.position(key) {
            Some(idx) => self.by[idx].1.value = value,
            None => self.add_binding(key, property, value),
        }
    }

    /// Forget every binding's value, keeping the key/property pairs.
    pub fn clear(&mut self) {
        for (_, binding) in &mut self.by {
            binding.value = Value::Null;
        }
    }

    /// Forget the values of the trailing `depth` bindings in insertion
    /// order, leaving earlier bindings untouched. Used when a partial cursor
    /// advance only invalidates the tail of the sort key tuple.
    pub fn clear_beyond_depth(&mut self, depth: usize) {
        for (_, binding) in self.by.iter_mut().rev().take(depth) {
            binding.value = Value::Null;
        }
    }

    /// Decode a continuation token and assign its values to the bindings in
    /// insertion order. A token whose decoded length does not match the
    /// binding count is corrupt or stale.
    pub fn load_from_token(&mut self, token: &str) -> Result<(), CursorError> {
        let values = token::decode_values(token)?;
        if values.len() != self.by.len() {
            debug!(
                expected = self.by.len(),
                got = values.len(),
                "page token length mismatch"
            );
            return Err(CursorError::InvalidToken {
                token: token.to_string(),
            });
        }
        self.assign_in_order(values);
        Ok(())
    }

    /// Assign an already-decoded ordered value list to the bindings.
    pub fn load_from_values(&mut self, values: Vec<Value>) -> Result<(), CursorError> {
        if values.len() != self.by.len() {
            return Err(CursorError::ParameterCount {
                properties: self.by.iter().map(|(key, _)| key.clone()).collect(),
            });
        }
        self.assign_in_order(values);
        Ok(())
    }

    fn assign_in_order(&mut self, values: Vec<Value>) {
        let pairs: Vec<(String, String)> = self
            .by
            .iter()
            .map(|(key, binding)| (key.clone(), binding.property.clone()))
            .collect();
        for ((key, property), value) in pairs.into_iter().zip(values) {
            self.update_value(&key, &property, value);
        }
    }

    /// Reset this cursor and copy every binding value from `other`; used to
    /// snapshot one page's end state into the next page's start state.
    pub fn load_from_cursor(&mut self, other: &PageCursor) {
        self.clear();
        for (key, binding) in &other.by {
            self.update_value(key, &binding.property, binding.value.clone());
        }
    }

    /// True iff every binding's value is unset: first page, no cursor yet.
    pub fn all_values_unset(&self) -> bool {
        self.by.iter().all(|(_, binding)| binding.value.is_null())
    }

    /// Encode the current binding values into a continuation token.
    pub fn token(&self) -> String {
        let values: Vec<Value> = self
            .by
            .iter()
            .map(|(_, binding)| binding.value.clone())
            .collect();
        token::encode_values(&values)
    }

    /// Diagnostic payload for error reporting: the current token, the raw
    /// key values, and the user-visible page size. Queries fetch `size + 1`
    /// rows to detect a further page, so the stored size is reported minus
    /// the over-fetch row.
    pub fn error_context(&self) -> Value {
        let mut key_values = Map::new();
        for (key, binding) in &self.by {
            key_values.insert(key.clone(), binding.value.clone());
        }
        json!({
            "key": self.token(),
            "key_values": Value::Object(key_values),
            "size": self.size.map(|size| size.saturating_sub(1)),
        })
    }
}

/// Effective page size for a request: explicit per-request size, else the
/// model-declared size, else the configured process-wide default.
pub fn effective_page_size(
    requested: Option<u64>,
    info: &PageInfo,
    config: &PaginationConfig,
) -> u64 {
    requested
        .or(info.size)
        .unwrap_or(config.default_page_size)
}
