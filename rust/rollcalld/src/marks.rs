use crate::error::{CoreError, CoreResult};
use crate::model::{parse_number, ExamLabel, ExamRecord};
use crate::predict::{self, PredictionResult, TermScore, DEFAULT_FINAL_MAX, DEFAULT_LATE_MAX};
use crate::roster::{self, student_path};
use crate::store::{segment, Store};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub fn marks_path(student_id: &str) -> String {
    format!("{}/marks", student_path(student_id))
}

fn non_negative(what: &str, v: &Value) -> CoreResult<f64> {
    let n = parse_number(v).ok_or_else(|| CoreError::validation(format!("{} must be numeric", what)))?;
    if n < 0.0 {
        return Err(CoreError::validation(format!("{} must not be negative", what)));
    }
    Ok(n)
}

/// Exam records per student at `students/{id}/marks/{label}`.
pub struct ExamBook<'a> {
    store: &'a dyn Store,
}

impl<'a> ExamBook<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Owner-only upsert. `score`/`max` may be numbers or numeric strings.
    pub fn set_record(
        &self,
        student_id: &str,
        label: ExamLabel,
        score: &Value,
        max: &Value,
        requester_id: &str,
    ) -> CoreResult<ExamRecord> {
        let score = non_negative("score", score)?;
        let max = non_negative("max", max)?;
        roster::require_owner(self.store, student_id, requester_id)?;
        let student_id = student_id.trim();
        self.store.set(
            &format!("{}/{}", marks_path(student_id), label.as_str()),
            &json!({ "score": score, "max": max }),
        )?;
        info!(student_id, label = label.as_str(), "exam record saved");
        Ok(ExamRecord {
            exam_label: label,
            score,
            max_score: max,
        })
    }

    /// Stored records, normalized to numbers. Entries that cannot be read as
    /// numbers are skipped.
    pub fn records(&self, student_id: &str) -> CoreResult<BTreeMap<ExamLabel, ExamRecord>> {
        let student_id = segment("studentId", student_id)?;
        if roster::load_student_doc(self.store, student_id)?.is_none() {
            return Err(CoreError::student_not_found(student_id));
        }
        let mut out = BTreeMap::new();
        for (key, value) in self.store.children(&marks_path(student_id))? {
            let Some(label) = ExamLabel::parse(&key) else {
                warn!(student_id, key = %key, "skipping unknown exam label");
                continue;
            };
            let score = value.get("score").and_then(parse_number);
            let max = value.get("max").and_then(parse_number);
            match (score, max) {
                (Some(score), Some(max)) => {
                    out.insert(
                        label,
                        ExamRecord {
                            exam_label: label,
                            score,
                            max_score: max,
                        },
                    );
                }
                _ => warn!(student_id, label = label.as_str(), "skipping non-numeric exam record"),
            }
        }
        Ok(out)
    }

    /// Predict late/final scores from the stored early and mid records. The
    /// late and final maxima come from their stored records when present.
    /// A student with neither record fails with `InsufficientData`.
    pub fn predict_for_student(&self, student_id: &str) -> CoreResult<PredictionResult> {
        let records = self.records(student_id)?;
        let term = |label: ExamLabel| {
            records
                .get(&label)
                .map(|r| TermScore::new(r.score, r.max_score))
        };
        let max_or = |label: ExamLabel, default: f64| {
            records
                .get(&label)
                .map(|r| r.max_score)
                .filter(|m| *m > 0.0)
                .unwrap_or(default)
        };
        let prediction = predict::predict(
            term(ExamLabel::EarlyTerm),
            term(ExamLabel::MidTerm),
            max_or(ExamLabel::LateTerm, DEFAULT_LATE_MAX),
            max_or(ExamLabel::FinalTerm, DEFAULT_FINAL_MAX),
        );
        debug!(student_id, "prediction computed");
        prediction.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::store::SqliteStore;

    fn setup() -> (SqliteStore, String) {
        let s = SqliteStore::in_memory().expect("store");
        let id = Roster::new(&s)
            .add_student("Asha", "8A", "maths", "t1")
            .expect("add");
        (s, id)
    }

    #[test]
    fn string_scores_are_normalized_on_write_and_read() {
        let (s, id) = setup();
        let book = ExamBook::new(&s);
        let rec = book
            .set_record(&id, ExamLabel::EarlyTerm, &json!("18"), &json!("25"), "t1")
            .unwrap();
        assert_eq!(rec.score, 18.0);

        // Older writers stored strings directly.
        s.set(
            &format!("{}/midTerm", marks_path(&id)),
            &json!({ "score": "70", "max": "100" }),
        )
        .unwrap();
        let records = book.records(&id).unwrap();
        assert_eq!(records[&ExamLabel::MidTerm].max_score, 100.0);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn junk_records_are_skipped() {
        let (s, id) = setup();
        s.set(
            &format!("{}/lateTerm", marks_path(&id)),
            &json!({ "score": "", "max": "25" }),
        )
        .unwrap();
        s.set(&format!("{}/bonus", marks_path(&id)), &json!({ "score": 1, "max": 1 }))
            .unwrap();
        assert!(ExamBook::new(&s).records(&id).unwrap().is_empty());
    }

    #[test]
    fn only_owner_may_write_and_values_must_be_numeric() {
        let (s, id) = setup();
        let book = ExamBook::new(&s);
        assert!(matches!(
            book.set_record(&id, ExamLabel::MidTerm, &json!(50), &json!(100), "t2"),
            Err(CoreError::NotOwner { .. })
        ));
        assert!(matches!(
            book.set_record(&id, ExamLabel::MidTerm, &json!("fifty"), &json!(100), "t1"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            book.set_record(&id, ExamLabel::MidTerm, &json!(-1), &json!(100), "t1"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn predict_for_student_uses_stored_terms() {
        let (s, id) = setup();
        let book = ExamBook::new(&s);
        assert!(matches!(
            book.predict_for_student(&id),
            Err(CoreError::InsufficientData)
        ));

        book.set_record(&id, ExamLabel::EarlyTerm, &json!(18), &json!(25), "t1")
            .unwrap();
        book.set_record(&id, ExamLabel::MidTerm, &json!(70), &json!(100), "t1")
            .unwrap();
        let r = book.predict_for_student(&id).unwrap();
        assert_eq!(r.predicted_late_score, 17);
        assert_eq!(r.predicted_final_score, 70);

        book.set_record(&id, ExamLabel::LateTerm, &json!(0), &json!(50), "t1")
            .unwrap();
        let r = book.predict_for_student(&id).unwrap();
        assert_eq!(r.predicted_late_score, 34);
    }
}
