use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, parse_status, with_store};
use crate::ipc::types::{ActiveWatch, AppState, Request};
use crate::ledger::{Ledger, YearMonth};
use crate::model::AttendanceStatus;
use crate::store::Store;
use serde_json::json;
use tracing::info;

fn attendance_mark(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = get_required_str(params, "date")?;
    let status = parse_status(params.get("status"))?;
    let teacher_id = get_required_str(params, "teacherId")?;
    Ledger::new(store).mark_attendance(&student_id, &date, status, &teacher_id)?;
    Ok(json!({ "ok": true }))
}

fn attendance_mark_class(
    store: &dyn Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_str(params, "date")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let Some(entries_json) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let mut entries: Vec<(String, AttendanceStatus)> = Vec::with_capacity(entries_json.len());
    for (i, e) in entries_json.iter().enumerate() {
        let student_id = e
            .get("studentId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerErr::bad_params(format!("entries[{}].studentId missing", i)))?;
        let status = parse_status(e.get("status"))
            .map_err(|_| HandlerErr::bad_params(format!("entries[{}].status invalid", i)))?;
        entries.push((student_id.to_string(), status));
    }
    let report = Ledger::new(store).mark_class(&date, &entries, &teacher_id)?;
    Ok(serde_json::to_value(report)?)
}

fn attendance_month(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let month = YearMonth::parse(&get_required_str(params, "month")?)?;
    let days = Ledger::new(store).get_month(&student_id, month)?;
    Ok(json!({
        "month": month.key(),
        "daysInMonth": month.days(),
        "days": days
    }))
}

fn attendance_history(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let history = Ledger::new(store).history(&student_id)?;
    let rows: Vec<serde_json::Value> = history
        .iter()
        .map(|(date, status)| json!({ "date": date, "status": status }))
        .collect();
    Ok(json!({ "entries": rows }))
}

fn attendance_absences(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let absences = Ledger::new(store).count_absences(&student_id)?;
    Ok(json!({ "studentId": student_id, "absences": absences }))
}

fn handle_attendance_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let watch = match Ledger::new(store).watch(&student_id) {
        Ok(w) => w,
        Err(e) => return HandlerErr::from(e).response(&req.id),
    };
    state.next_watch_id += 1;
    let id = format!("sub-{}", state.next_watch_id);
    info!(subscription = %id, student_id = %student_id, "attendance subscription opened");
    state.watches.push(ActiveWatch {
        id: id.clone(),
        watch,
    });
    ok(&req.id, json!({ "subscriptionId": id }))
}

fn handle_attendance_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sub_id = match get_required_str(&req.params, "subscriptionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let before = state.watches.len();
    state.watches.retain(|w| w.id != sub_id);
    if state.watches.len() == before {
        return err(&req.id, "not_found", "subscription not found", None);
    }
    info!(subscription = %sub_id, "attendance subscription closed");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_store(state, req, attendance_mark)),
        "attendance.markClass" => Some(with_store(state, req, attendance_mark_class)),
        "attendance.month" => Some(with_store(state, req, attendance_month)),
        "attendance.history" => Some(with_store(state, req, attendance_history)),
        "attendance.absences" => Some(with_store(state, req, attendance_absences)),
        "attendance.subscribe" => Some(handle_attendance_subscribe(state, req)),
        "attendance.unsubscribe" => Some(handle_attendance_unsubscribe(state, req)),
        _ => None,
    }
}
