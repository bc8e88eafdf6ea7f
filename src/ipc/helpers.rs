use crate::activity;
use crate::calc::CalcError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use serde::de::DeserializeOwned;

pub fn bad_params(
    req: &Request,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let message = message.into();
    log::warn!("{} bad_params: {}", req.method, message);
    err(&req.id, "bad_params", message, details)
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_params(req, format!("missing {}", key), None))
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    match req.params.get(key) {
        None => Err(bad_params(req, format!("missing {}", key), None)),
        Some(v) => v.as_f64().ok_or_else(|| {
            bad_params(
                req,
                format!("{} must be a number", key),
                None,
            )
        }),
    }
}

pub fn optional_u64(req: &Request, key: &str) -> Result<Option<u64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            bad_params(
                req,
                format!("{} must be a non-negative integer", key),
                None,
            )
        }),
    }
}

pub fn bool_or(req: &Request, key: &str, default: bool) -> Result<bool, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or_else(|| {
            bad_params(
                req,
                format!("{} must be boolean", key),
                None,
            )
        }),
    }
}

/// Deserialize `params.<key>`; `None` when absent or null.
pub fn optional_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            bad_params(
                req,
                format!("invalid {}: {}", key, e),
                None,
            )
        }),
    }
}

pub fn required_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    optional_param(req, key)?
        .ok_or_else(|| bad_params(req, format!("missing {}", key), None))
}

pub fn calc_err(req: &Request, e: CalcError) -> serde_json::Value {
    log::warn!("{} {}: {}", req.method, e.code(), e);
    err(&req.id, e.code(), e.to_string(), e.details())
}

pub fn store_err(req: &Request, code: &str, e: anyhow::Error) -> serde_json::Value {
    log::warn!("{} {}: {:#}", req.method, code, e);
    err(&req.id, code, format!("{:#}", e), None)
}

pub fn require_workspace(
    state: &AppState,
    req: &Request,
) -> Result<std::path::PathBuf, serde_json::Value> {
    state
        .workspace
        .clone()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Best-effort: a failed log write never fails the request that caused it.
pub fn log_activity(state: &mut AppState, action: &str, detail: serde_json::Value) {
    if let Err(e) = activity::record(state.store.as_mut(), action, detail) {
        log::warn!("failed to record activity {}: {:#}", action, e);
    }
}
