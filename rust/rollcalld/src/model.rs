use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    /// Older writers stored "Present"/"Absent"; accept any case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

/// Date (`YYYY-MM-DD`) to status. Lexicographic order is chronological order.
pub type AttendanceMap = BTreeMap<String, AttendanceStatus>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_id: String,
    pub subject_id: String,
    pub owner_id: Option<String>,
    pub attendance: AttendanceMap,
}

impl Student {
    pub fn is_owned_by(&self, teacher_id: &str) -> bool {
        self.owner_id.as_deref() == Some(teacher_id)
    }

    pub fn visible_to(&self, teacher_id: &str) -> bool {
        self.owner_id.is_none() || self.is_owned_by(teacher_id)
    }

    pub fn absence_count(&self) -> usize {
        self.attendance
            .values()
            .filter(|s| **s == AttendanceStatus::Absent)
            .count()
    }
}

/// Stored shape of `students/{id}`. Attendance and marks live in child paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "class")]
    pub class_id: String,
    #[serde(default, alias = "subject")]
    pub subject_id: String,
    #[serde(default, alias = "teacher", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl StudentDoc {
    pub fn into_student(self, id: String, attendance: AttendanceMap) -> Student {
        Student {
            id,
            name: self.name,
            class_id: self.class_id,
            subject_id: self.subject_id,
            owner_id: self.owner_id.filter(|o| !o.trim().is_empty()),
            attendance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub class_ids: Vec<String>,
}

/// Stored shape of `teachers/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeacherDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub classes: Value,
}

impl TeacherDoc {
    pub fn into_teacher(self, id: String) -> Teacher {
        Teacher {
            id,
            name: self.name,
            subject: self.subject,
            class_ids: class_list(&self.classes),
        }
    }
}

/// `classes` has been written both as a list and as a keyed object.
pub fn class_list(v: &Value) -> Vec<String> {
    let items: Vec<&Value> = match v {
        Value::Array(a) => a.iter().collect(),
        Value::Object(m) => m.values().collect(),
        Value::String(_) => vec![v],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExamLabel {
    EarlyTerm,
    MidTerm,
    LateTerm,
    FinalTerm,
}

impl ExamLabel {
    pub const ALL: [ExamLabel; 4] = [
        ExamLabel::EarlyTerm,
        ExamLabel::MidTerm,
        ExamLabel::LateTerm,
        ExamLabel::FinalTerm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExamLabel::EarlyTerm => "earlyTerm",
            ExamLabel::MidTerm => "midTerm",
            ExamLabel::LateTerm => "lateTerm",
            ExamLabel::FinalTerm => "finalTerm",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub exam_label: ExamLabel,
    pub score: f64,
    pub max_score: f64,
}

/// Scores arrive as numbers or numeric strings; anything else is unusable.
pub fn parse_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                t.parse::<f64>().ok()
            }
        }
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            AttendanceStatus::parse("Absent"),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(
            AttendanceStatus::parse(" present "),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(AttendanceStatus::parse("late"), None);
        assert_eq!(
            serde_json::to_value(AttendanceStatus::Absent).unwrap(),
            json!("absent")
        );
    }

    #[test]
    fn student_doc_accepts_legacy_field_names() {
        let doc: StudentDoc =
            serde_json::from_value(json!({ "name": "Asha", "class": "8A", "teacher": "t1" }))
                .unwrap();
        assert_eq!(doc.class_id, "8A");
        assert_eq!(doc.owner_id.as_deref(), Some("t1"));
    }

    #[test]
    fn blank_owner_counts_as_unclaimed() {
        let doc = StudentDoc {
            owner_id: Some("".into()),
            ..Default::default()
        };
        let s = doc.into_student("s1".into(), AttendanceMap::new());
        assert!(s.owner_id.is_none());
        assert!(s.visible_to("anyone"));
    }

    #[test]
    fn class_list_handles_array_and_object() {
        assert_eq!(class_list(&json!(["8A", " 9B "])), vec!["8A", "9B"]);
        assert_eq!(class_list(&json!({ "k1": "10C" })), vec!["10C"]);
        assert_eq!(class_list(&json!("7D")), vec!["7D"]);
        assert!(class_list(&Value::Null).is_empty());
    }

    #[test]
    fn parse_number_normalizes_strings() {
        assert_eq!(parse_number(&json!("18")), Some(18.0));
        assert_eq!(parse_number(&json!(" 24.5 ")), Some(24.5));
        assert_eq!(parse_number(&json!(70)), Some(70.0));
        assert_eq!(parse_number(&json!("")), None);
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!("NaN")), None);
        assert_eq!(parse_number(&Value::Null), None);
    }

    #[test]
    fn exam_label_round_trips_names() {
        assert_eq!(ExamLabel::parse("MIDTERM"), Some(ExamLabel::MidTerm));
        assert_eq!(ExamLabel::parse("annual"), None);
    }
}
