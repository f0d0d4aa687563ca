use crate::analytics::{self, DEFAULT_HIGHLIGHT_THRESHOLD};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_optional_usize, get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger::YearMonth;
use crate::model::Student;
use crate::roster::Roster;
use crate::store::Store;
use serde_json::json;

/// Students the requesting teacher can see, optionally narrowed to one class
/// and one subject.
fn class_students(store: &dyn Store, params: &serde_json::Value) -> Result<Vec<Student>, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let class_id = get_optional_str(params, "classId");
    let subject_id = get_optional_str(params, "subjectId");
    let mut students = Roster::new(store).list_visible(&teacher_id, class_id.as_deref())?;
    if let Some(subject_id) = subject_id {
        students.retain(|s| s.subject_id == subject_id);
    }
    Ok(students)
}

fn analytics_frequent_absentees(
    store: &dyn Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let min_absences = get_optional_usize(params, "minAbsences")?.unwrap_or(1);
    let highlight = get_optional_usize(params, "highlightThreshold")?.unwrap_or(DEFAULT_HIGHLIGHT_THRESHOLD);
    let students = class_students(store, params)?;
    let ranked = analytics::rank_frequent_absentees(&students, min_absences);
    let rows: Vec<serde_json::Value> = ranked
        .iter()
        .map(|r| {
            json!({
                "studentId": r.student.id,
                "name": r.student.name,
                "classId": r.student.class_id,
                "absences": r.absences,
                "highlight": r.absences >= highlight
            })
        })
        .collect();
    Ok(json!({
        "minAbsences": min_absences,
        "highlightThreshold": highlight,
        "rows": rows
    }))
}

fn analytics_monthly_summary(
    store: &dyn Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let month = YearMonth::parse(&get_required_str(params, "month")?)?;
    let students = class_students(store, params)?;
    let summary = analytics::monthly_class_summary(&students, month);
    Ok(serde_json::to_value(summary)?)
}

fn analytics_class_history(
    store: &dyn Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let limit = get_optional_usize(params, "limit")?;
    let students = class_students(store, params)?;
    let rows = analytics::class_history(&students, limit);
    Ok(json!({ "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.frequentAbsentees" => Some(with_store(state, req, analytics_frequent_absentees)),
        "analytics.monthlySummary" => Some(with_store(state, req, analytics_monthly_summary)),
        "analytics.classHistory" => Some(with_store(state, req, analytics_class_history)),
        _ => None,
    }
}
