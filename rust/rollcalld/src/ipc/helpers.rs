use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_number, AttendanceStatus};
use crate::store::Store;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_optional_usize(params: &serde_json::Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

/// Number or numeric string.
pub fn get_optional_number(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => parse_number(v)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be numeric", key))),
    }
}

pub fn parse_status(v: Option<&serde_json::Value>) -> Result<AttendanceStatus, HandlerErr> {
    v.and_then(|v| v.as_str())
        .and_then(AttendanceStatus::parse)
        .ok_or_else(|| HandlerErr::bad_params("status must be \"present\" or \"absent\""))
}

/// Run a handler body against the selected workspace store.
pub fn with_store<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&dyn Store, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store: &dyn Store = store;
    match f(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}
