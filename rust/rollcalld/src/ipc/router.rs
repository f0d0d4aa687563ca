use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use crate::roster;
use serde_json::json;
use tracing::{debug, warn};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::teachers::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::analytics::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::marks::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::predict::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// Push events for subscriptions whose student changed since the last call.
/// A subscription on a deleted student emits one final `removed` event and is dropped.
pub fn drain_events(state: &mut AppState) -> Vec<serde_json::Value> {
    let Some(store) = state.store.as_ref() else {
        return Vec::new();
    };
    let mut events = Vec::new();
    let mut closed: Vec<String> = Vec::new();
    for active in &state.watches {
        let snapshot = match active.watch.poll(store) {
            Ok(Some(s)) => s,
            Ok(None) => continue,
            Err(e) => {
                warn!(subscription = %active.id, error = %e, "subscription refresh failed");
                continue;
            }
        };
        let student_id = active.watch.student_id();
        let removed = matches!(roster::load_student_doc(store, student_id), Ok(None));
        if removed {
            closed.push(active.id.clone());
        }
        events.push(json!({
            "event": "attendance.changed",
            "subscriptionId": active.id,
            "studentId": student_id,
            "removed": removed,
            "attendance": snapshot
        }));
    }
    if !closed.is_empty() {
        state.watches.retain(|w| !closed.contains(&w.id));
    }
    events
}
