use crate::config::{self, EngineConfig};
use crate::ipc::error::ok;
use crate::ipc::helpers::{bad_params, log_activity, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match config::load_config(state.store.as_ref()) {
        Ok(cfg) => ok(&req.id, json!({ "config": cfg })),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return bad_params(req, "patch must be an object", None);
    };

    let current = match config::load_config(state.store.as_ref()) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    let next = match current.apply_patch(patch) {
        Ok(v) => v,
        Err(msg) => return bad_params(req, msg, None),
    };
    if let Err(e) = config::save_config(state.store.as_mut(), &next) {
        return store_err(req, "db_update_failed", e);
    }

    let fields: Vec<&String> = patch.keys().collect();
    log_activity(state, "config.update", json!({ "fields": fields }));
    ok(&req.id, json!({ "config": next }))
}

fn handle_config_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.store.clear(config::CONFIG_KEY) {
        return store_err(req, "db_update_failed", e);
    }
    log_activity(state, "config.reset", json!({}));
    ok(&req.id, json!({ "config": EngineConfig::default() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(handle_config_get(state, req)),
        "config.update" => Some(handle_config_update(state, req)),
        "config.reset" => Some(handle_config_reset(state, req)),
        _ => None,
    }
}
