//! Integration tests for keyset pagination: token exchange between
//! requests and page-size resolution against configuration.

use serde_json::{json, Value};
use strata::config::{PaginationConfig, StrataConfig};
use strata::cursor::{effective_page_size, PageCursor, PageInfo};
use strata::error::CursorError;

fn model_info() -> PageInfo {
    PageInfo {
        enabled: true,
        size: Some(2),
        keys: vec![
            ("id".to_string(), "id".to_string()),
            ("name".to_string(), "name".to_string()),
        ],
    }
}

/// Simulates the executor loop: rows advance the cursor, the token goes out
/// with the response, and the next request reconstructs the cursor from it.
#[test]
fn test_token_exchange_across_requests() {
    let rows = vec![
        (json!(1), json!("ann")),
        (json!(2), json!("bob")),
        (json!(3), json!("cid")),
    ];

    // First request: fresh cursor, no token.
    let mut cursor = PageCursor::from_info(&model_info());
    assert!(cursor.all_values_unset());

    for (id, name) in rows.iter().take(2) {
        cursor.update_value("id", "id", id.clone());
        cursor.update_value("name", "name", name.clone());
    }
    let token = cursor.token();

    // Second request: a fresh cursor seeded from the model picks up exactly
    // where the first left off.
    let mut next = PageCursor::from_info(&model_info());
    next.load_from_token(&token).unwrap();

    let resumed: Vec<&Value> = next.bindings().map(|(_, b)| &b.value).collect();
    assert_eq!(resumed, vec![&json!(2), &json!("bob")]);
}

#[test]
fn test_spec_end_to_end_two_key_cursor() {
    let mut cursor = PageCursor::new();
    cursor.add_binding("id", "id", json!(10));
    cursor.add_binding("name", "name", json!("foo"));
    let token = cursor.token();

    let mut fresh = PageCursor::new();
    fresh.add_binding("id", "id", Value::Null);
    fresh.add_binding("name", "name", Value::Null);
    fresh.load_from_token(&token).unwrap();

    let values: Vec<&Value> = fresh.bindings().map(|(_, b)| &b.value).collect();
    assert_eq!(values, vec![&json!(10), &json!("foo")]);
}

#[test]
fn test_stale_token_from_changed_sort_keys() {
    // A token minted when the model had one page key.
    let mut old = PageCursor::new();
    old.add_binding("id", "id", json!(7));
    let token = old.token();

    // The model now declares two keys; the old token no longer fits.
    let mut current = PageCursor::from_info(&model_info());
    assert!(matches!(
        current.load_from_token(&token),
        Err(CursorError::InvalidToken { .. })
    ));
}

#[test]
fn test_descending_key_round_trip() {
    let mut cursor = PageCursor::new();
    cursor.add_binding("created", "created", Value::Null);
    // The executor reports values under the descending marker; the binding
    // is renamed and the token reflects the new identity.
    cursor.update_value("-created", "created", json!("2026-01-01"));

    let keys: Vec<&str> = cursor.bindings().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["-created"]);

    let mut next = PageCursor::new();
    next.add_binding("-created", "created", Value::Null);
    next.load_from_token(&cursor.token()).unwrap();
    assert!(!next.all_values_unset());
}

#[test]
fn test_partial_advance_resets_tail_keys() {
    let mut cursor = PageCursor::from_info(&model_info());
    cursor.update_value("id", "id", json!(5));
    cursor.update_value("name", "name", json!("mid"));

    // Only the trailing key is invalidated by a partial advance.
    cursor.clear_beyond_depth(1);
    let values: Vec<&Value> = cursor.bindings().map(|(_, b)| &b.value).collect();
    assert_eq!(values, vec![&json!(5), &Value::Null]);
    assert!(!cursor.all_values_unset());
}

#[test]
fn test_page_size_resolution_with_config() {
    let config = StrataConfig::default();
    let info = model_info();

    // Model declares 2; request override wins; without either, the
    // configured default applies.
    assert_eq!(effective_page_size(Some(7), &info, &config.pagination), 7);
    assert_eq!(effective_page_size(None, &info, &config.pagination), 2);

    let bare = PageInfo::default();
    assert_eq!(
        effective_page_size(None, &bare, &config.pagination),
        PaginationConfig::default().default_page_size
    );
}

#[test]
fn test_error_context_payload_shape() {
    let mut cursor = PageCursor::from_info(&model_info());
    cursor.size = Some(3); // size 2 requested, +1 over-fetch row
    cursor.update_value("id", "id", json!(9));

    let payload = cursor.error_context();
    assert_eq!(payload["size"], json!(2));
    assert_eq!(payload["key_values"]["id"], json!(9));
    assert_eq!(payload["key_values"]["name"], Value::Null);

    // The embedded token is itself loadable.
    let token = payload["key"].as_str().unwrap().to_string();
    let mut check = PageCursor::from_info(&model_info());
    check.load_from_token(&token).unwrap();
}
