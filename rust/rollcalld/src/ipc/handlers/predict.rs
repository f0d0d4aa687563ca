use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_number, get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::marks::ExamBook;
use crate::predict::{self, TermScore, DEFAULT_FINAL_MAX, DEFAULT_LATE_MAX};
use crate::store::Store;

fn parse_term(params: &serde_json::Value, key: &str) -> Result<Option<TermScore>, HandlerErr> {
    let Some(v) = params.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let score = get_optional_number(v, "score")?;
    let max = get_optional_number(v, "max")?;
    match (score, max) {
        (Some(score), Some(max)) => Ok(Some(TermScore::new(score, max))),
        (None, None) => Ok(None),
        _ => Err(HandlerErr::bad_params(format!("{} needs both score and max", key))),
    }
}

fn positive_or(params: &serde_json::Value, key: &str, default: f64) -> Result<f64, HandlerErr> {
    let v = get_optional_number(params, key)?.unwrap_or(default);
    if v <= 0.0 {
        return Err(HandlerErr::bad_params(format!("{} must be positive", key)));
    }
    Ok(v)
}

fn predict_run(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let early = parse_term(params, "early")?;
    let mid = parse_term(params, "mid")?;
    let late_max = positive_or(params, "lateMax", DEFAULT_LATE_MAX)?;
    let final_max = positive_or(params, "finalMax", DEFAULT_FINAL_MAX)?;
    let prediction = predict::predict(early, mid, late_max, final_max);
    Ok(serde_json::to_value(prediction)?)
}

fn predict_student(store: &dyn Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let result = ExamBook::new(store).predict_for_student(&student_id)?;
    Ok(serde_json::to_value(predict::Prediction::Predicted(result))?)
}

fn predict_study_hours(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let hours = get_optional_number(params, "hours")?
        .ok_or_else(|| HandlerErr::bad_params("missing hours"))?;
    let estimate = predict::study_hours_estimate(hours)?;
    Ok(serde_json::to_value(estimate)?)
}

/// Pure computations need no workspace.
fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "predict.run" => Some(respond(req, predict_run(&req.params))),
        "predict.student" => Some(with_store(state, req, predict_student)),
        "predict.studyHours" => Some(respond(req, predict_study_hours(&req.params))),
        _ => None,
    }
}
