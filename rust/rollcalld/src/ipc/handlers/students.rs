use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;
use crate::store::Store;
use serde_json::json;

fn students_create(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let class_id = get_required_str(params, "classId")?;
    let subject_id = get_optional_str(params, "subjectId").unwrap_or_default();
    let teacher_id = get_required_str(params, "teacherId")?;
    let student_id = Roster::new(store).add_student(&name, &class_id, &subject_id, &teacher_id)?;
    Ok(json!({ "studentId": student_id }))
}

fn students_import_unowned(
    store: &dyn Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(rows) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing students"));
    };
    let report = Roster::new(store).import_unowned(rows);
    Ok(serde_json::to_value(report)?)
}

fn students_claim(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    Roster::new(store).claim(&student_id, &teacher_id)?;
    Ok(json!({ "ok": true }))
}

fn students_rename(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let name = get_required_str(params, "name")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    Roster::new(store).rename(&student_id, &name, &teacher_id)?;
    Ok(json!({ "ok": true }))
}

fn students_delete(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    Roster::new(store).remove(&student_id, &teacher_id)?;
    Ok(json!({ "ok": true }))
}

fn students_get(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = Roster::new(store).get_student(&student_id)?;
    Ok(json!({ "student": student }))
}

fn students_list(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let class_id = get_optional_str(params, "classId");
    let students = Roster::new(store).list_visible(&teacher_id, class_id.as_deref())?;
    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "classId": s.class_id,
                "subjectId": s.subject_id,
                "ownerId": s.owner_id,
                "absences": s.absence_count(),
                "claimable": s.owner_id.is_none(),
                "editable": s.is_owned_by(&teacher_id)
            })
        })
        .collect();
    Ok(json!({ "students": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(with_store(state, req, students_create)),
        "students.importUnowned" => Some(with_store(state, req, students_import_unowned)),
        "students.claim" => Some(with_store(state, req, students_claim)),
        "students.rename" => Some(with_store(state, req, students_rename)),
        "students.delete" => Some(with_store(state, req, students_delete)),
        "students.get" => Some(with_store(state, req, students_get)),
        "students.list" => Some(with_store(state, req, students_list)),
        _ => None,
    }
}
