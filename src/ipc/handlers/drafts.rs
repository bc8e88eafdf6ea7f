use crate::activity;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, log_activity, optional_u64, required_str, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const DRAFT_PREFIX: &str = "drafts.";
const MAX_KEY_LEN: usize = 64;

fn draft_key(req: &Request) -> Result<String, serde_json::Value> {
    let key = required_str(req, "key")?;
    let valid = key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !valid {
        return Err(bad_params(
            req,
            format!(
                "key must be 1..={} characters of A-Z, a-z, 0-9, '.', '_' or '-'",
                MAX_KEY_LEN
            ),
            Some(json!({ "key": key })),
        ));
    }
    Ok(key)
}

fn handle_drafts_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match draft_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(payload) = req.params.get("payload").cloned() else {
        return bad_params(req, "missing payload", None);
    };

    let saved_at = chrono::Utc::now().to_rfc3339();
    let value = json!({ "savedAt": saved_at, "payload": payload });
    if let Err(e) = state.store.save(&format!("{}{}", DRAFT_PREFIX, key), &value) {
        return store_err(req, "db_update_failed", e);
    }
    log_activity(state, "drafts.save", json!({ "key": key }));
    ok(&req.id, json!({ "key": key, "savedAt": saved_at }))
}

fn handle_drafts_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match draft_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.store.load(&format!("{}{}", DRAFT_PREFIX, key)) {
        Ok(Some(v)) => ok(
            &req.id,
            json!({
                "key": key,
                "savedAt": v.get("savedAt").cloned().unwrap_or(serde_json::Value::Null),
                "payload": v.get("payload").cloned().unwrap_or(serde_json::Value::Null),
            }),
        ),
        Ok(None) => err(
            &req.id,
            "not_found",
            "draft not found",
            Some(json!({ "key": key })),
        ),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_drafts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let keys = match state.store.keys(DRAFT_PREFIX) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    let mut drafts = Vec::with_capacity(keys.len());
    for full in keys {
        let saved_at = match state.store.load(&full) {
            Ok(v) => v
                .and_then(|v| v.get("savedAt").cloned())
                .unwrap_or(serde_json::Value::Null),
            Err(e) => return store_err(req, "db_query_failed", e),
        };
        let key = full.trim_start_matches(DRAFT_PREFIX).to_string();
        drafts.push(json!({ "key": key, "savedAt": saved_at }));
    }
    ok(&req.id, json!({ "drafts": drafts }))
}

fn handle_drafts_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match draft_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let removed = match state.store.clear(&format!("{}{}", DRAFT_PREFIX, key)) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_update_failed", e),
    };
    if removed {
        log_activity(state, "drafts.clear", json!({ "key": key }));
    }
    ok(&req.id, json!({ "key": key, "removed": removed }))
}

fn handle_activity_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let limit = match optional_u64(req, "limit") {
        Ok(v) => v.map(|n| n as usize),
        Err(e) => return e,
    };
    match activity::list(state.store.as_ref(), limit) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_activity_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    match activity::clear(state.store.as_mut()) {
        Ok(n) => ok(&req.id, json!({ "removed": n })),
        Err(e) => store_err(req, "db_update_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "drafts.save" => Some(handle_drafts_save(state, req)),
        "drafts.load" => Some(handle_drafts_load(state, req)),
        "drafts.list" => Some(handle_drafts_list(state, req)),
        "drafts.clear" => Some(handle_drafts_clear(state, req)),
        "activity.list" => Some(handle_activity_list(state, req)),
        "activity.clear" => Some(handle_activity_clear(state, req)),
        _ => None,
    }
}
