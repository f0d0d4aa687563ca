use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::marks::ExamBook;
use crate::model::ExamLabel;
use crate::store::Store;
use serde_json::json;

fn marks_set(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let label_raw = get_required_str(params, "label")?;
    let label = ExamLabel::parse(&label_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown exam label: {}", label_raw)))?;
    let score = params
        .get("score")
        .ok_or_else(|| HandlerErr::bad_params("missing score"))?;
    let max = params
        .get("max")
        .ok_or_else(|| HandlerErr::bad_params("missing max"))?;
    let record = ExamBook::new(store).set_record(&student_id, label, score, max, &teacher_id)?;
    Ok(json!({ "record": record }))
}

fn marks_get(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let records = ExamBook::new(store).records(&student_id)?;
    let records: Vec<_> = records.into_values().collect();
    Ok(json!({ "studentId": student_id, "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.set" => Some(with_store(state, req, marks_set)),
        "marks.get" => Some(with_store(state, req, marks_get)),
        _ => None,
    }
}
