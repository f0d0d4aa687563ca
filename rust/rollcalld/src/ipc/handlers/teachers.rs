use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::model::{class_list, Teacher};
use crate::roster::Roster;
use crate::store::Store;
use serde_json::json;

fn teachers_register(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = Teacher {
        id: get_required_str(params, "teacherId")?,
        name: get_required_str(params, "name")?,
        subject: params
            .get("subject")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        class_ids: params.get("classIds").map(class_list).unwrap_or_default(),
    };
    let roster = Roster::new(store);
    roster.register_teacher(&teacher)?;
    let saved = roster.get_teacher(&teacher.id)?;
    Ok(json!({ "teacher": saved }))
}

fn teachers_get(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let teacher = Roster::new(store).get_teacher(&teacher_id)?;
    Ok(json!({ "teacher": teacher }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.register" => Some(with_store(state, req, teachers_register)),
        "teachers.get" => Some(with_store(state, req, teachers_get)),
        _ => None,
    }
}
