//! Student roster with exclusive teacher ownership.
//!
//! A student is either unclaimed (`ownerId` unset) or owned by exactly one
//! teacher. Only the owner may rename, delete, or write attendance and marks.
//! Any teacher may claim an unclaimed student.
//!
//! `claim` is a plain read-then-write. Two teachers claiming the same student
//! at the same moment can both observe it unclaimed; the later write wins and
//! the earlier claimant silently loses ownership. The store offers no
//! conditional write, so this is accepted rather than guarded.

use crate::error::{CoreError, CoreResult};
use crate::ledger;
use crate::model::{Student, StudentDoc, Teacher, TeacherDoc};
use crate::store::{segment, Store};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const STUDENTS_ROOT: &str = "students";
pub const TEACHERS_ROOT: &str = "teachers";

pub fn student_path(student_id: &str) -> String {
    format!("{}/{}", STUDENTS_ROOT, student_id)
}

pub fn teacher_path(teacher_id: &str) -> String {
    format!("{}/{}", TEACHERS_ROOT, teacher_id)
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, v: Value) -> CoreResult<T> {
    serde_json::from_value(v).map_err(|source| CoreError::Malformed {
        path: path.to_string(),
        source,
    })
}

pub fn load_student_doc(store: &dyn Store, student_id: &str) -> CoreResult<Option<StudentDoc>> {
    let path = student_path(student_id);
    store
        .get(&path)?
        .map(|v| decode::<StudentDoc>(&path, v))
        .transpose()
}

pub fn load_student(store: &dyn Store, student_id: &str) -> CoreResult<Option<Student>> {
    let Some(doc) = load_student_doc(store, student_id)? else {
        return Ok(None);
    };
    let attendance = ledger::read_attendance(store, student_id)?;
    Ok(Some(doc.into_student(student_id.to_string(), attendance)))
}

/// Fetch the student and check that `requester_id` owns it.
pub fn require_owner(
    store: &dyn Store,
    student_id: &str,
    requester_id: &str,
) -> CoreResult<StudentDoc> {
    let student_id = segment("studentId", student_id)?;
    let doc = load_student_doc(store, student_id)?
        .ok_or_else(|| CoreError::student_not_found(student_id))?;
    let owned = doc
        .owner_id
        .as_deref()
        .map(|o| !o.trim().is_empty() && o == requester_id.trim())
        .unwrap_or(false);
    if !owned {
        return Err(CoreError::NotOwner {
            student_id: student_id.to_string(),
        });
    }
    Ok(doc)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "class")]
    pub class_id: String,
    #[serde(default)]
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub index: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created: Vec<String>,
    pub failed: Vec<RowFailure>,
}

pub struct Roster<'a> {
    store: &'a dyn Store,
}

impl<'a> Roster<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn insert(&self, row: &NewStudent, owner_id: Option<&str>) -> CoreResult<String> {
        let name = row.name.trim();
        let class_id = row.class_id.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        if class_id.is_empty() {
            return Err(CoreError::validation("classId must not be empty"));
        }
        let doc = StudentDoc {
            name: name.to_string(),
            class_id: class_id.to_string(),
            subject_id: row.subject_id.trim().to_string(),
            owner_id: owner_id.map(|o| o.to_string()),
        };
        let id = Uuid::new_v4().to_string();
        let value = serde_json::to_value(&doc).map_err(|source| CoreError::Malformed {
            path: student_path(&id),
            source,
        })?;
        self.store.set(&student_path(&id), &value)?;
        Ok(id)
    }

    pub fn add_student(
        &self,
        name: &str,
        class_id: &str,
        subject_id: &str,
        creator_id: &str,
    ) -> CoreResult<String> {
        let creator_id = segment("teacherId", creator_id)?;
        if let Some(teacher) = self.find_teacher(creator_id)? {
            let subject = subject_id.trim();
            if !teacher.subject.is_empty() && !subject.is_empty() && teacher.subject != subject {
                return Err(CoreError::validation(format!(
                    "teacher may only add students for their subject: {}",
                    teacher.subject
                )));
            }
        }
        let id = self.insert(
            &NewStudent {
                name: name.to_string(),
                class_id: class_id.to_string(),
                subject_id: subject_id.to_string(),
            },
            Some(creator_id),
        )?;
        info!(student_id = %id, teacher_id = %creator_id, "student created");
        Ok(id)
    }

    /// Bulk path for ownerless students. Rows are decoded and written one at a
    /// time; a bad row is reported and skipped, earlier rows stay written.
    pub fn import_unowned(&self, rows: &[Value]) -> ImportReport {
        let mut report = ImportReport::default();
        for (index, raw) in rows.iter().enumerate() {
            let row = serde_json::from_value::<NewStudent>(raw.clone())
                .map_err(|e| CoreError::validation(format!("unreadable row: {}", e)));
            match row.and_then(|row| self.insert(&row, None)) {
                Ok(id) => report.created.push(id),
                Err(e) => {
                    warn!(index, error = %e, "import row skipped");
                    report.failed.push(RowFailure {
                        index,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            created = report.created.len(),
            failed = report.failed.len(),
            "unowned import finished"
        );
        report
    }

    pub fn claim(&self, student_id: &str, teacher_id: &str) -> CoreResult<()> {
        let student_id = segment("studentId", student_id)?;
        let teacher_id = segment("teacherId", teacher_id)?;
        let doc = load_student_doc(self.store, student_id)?
            .ok_or_else(|| CoreError::student_not_found(student_id))?;
        if let Some(owner) = doc.owner_id.filter(|o| !o.trim().is_empty()) {
            return Err(CoreError::AlreadyOwned {
                student_id: student_id.to_string(),
                owner_id: owner,
            });
        }
        let mut patch = Map::new();
        patch.insert("ownerId".to_string(), json!(teacher_id));
        // Legacy records carry the owner as `teacher`; both keys decode to one field.
        patch.insert("teacher".to_string(), Value::Null);
        self.store.update(&student_path(student_id), &patch)?;
        info!(student_id, teacher_id, "student claimed");
        Ok(())
    }

    pub fn rename(&self, student_id: &str, new_name: &str, requester_id: &str) -> CoreResult<()> {
        require_owner(self.store, student_id, requester_id)?;
        let name = new_name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        let mut patch = Map::new();
        patch.insert("name".to_string(), json!(name));
        self.store.update(&student_path(student_id.trim()), &patch)?;
        info!(student_id, "student renamed");
        Ok(())
    }

    /// Hard delete, attendance history and marks included.
    pub fn remove(&self, student_id: &str, requester_id: &str) -> CoreResult<()> {
        require_owner(self.store, student_id, requester_id)?;
        self.store.remove(&student_path(student_id.trim()))?;
        info!(student_id, "student removed");
        Ok(())
    }

    pub fn get_student(&self, student_id: &str) -> CoreResult<Student> {
        let student_id = segment("studentId", student_id)?;
        load_student(self.store, student_id)?.ok_or_else(|| CoreError::student_not_found(student_id))
    }

    /// Students in `class_filter` (if any) that are unclaimed or owned by
    /// `teacher_id`, in store insertion order.
    pub fn list_visible(
        &self,
        teacher_id: &str,
        class_filter: Option<&str>,
    ) -> CoreResult<Vec<Student>> {
        let teacher_id = teacher_id.trim();
        let class_filter = class_filter.map(str::trim).filter(|c| !c.is_empty());
        let mut out = Vec::new();
        for (id, value) in self.store.children(STUDENTS_ROOT)? {
            let doc: StudentDoc = decode(&student_path(&id), value)?;
            if let Some(class_id) = class_filter {
                if doc.class_id != class_id {
                    continue;
                }
            }
            let attendance = ledger::read_attendance(self.store, &id)?;
            let student = doc.into_student(id, attendance);
            if student.visible_to(teacher_id) {
                out.push(student);
            }
        }
        debug!(teacher_id, count = out.len(), "listed visible students");
        Ok(out)
    }

    pub fn register_teacher(&self, teacher: &Teacher) -> CoreResult<()> {
        let id = segment("teacherId", &teacher.id)?;
        let name = teacher.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        let classes: Vec<String> = teacher
            .class_ids
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let value = json!({
            "name": name,
            "subject": teacher.subject.trim(),
            "classes": classes,
        });
        self.store.set(&teacher_path(id), &value)?;
        info!(teacher_id = id, "teacher profile saved");
        Ok(())
    }

    fn find_teacher(&self, teacher_id: &str) -> CoreResult<Option<Teacher>> {
        let path = teacher_path(teacher_id);
        match self.store.get(&path)? {
            Some(v) => Ok(Some(
                decode::<TeacherDoc>(&path, v)?.into_teacher(teacher_id.to_string()),
            )),
            None => Ok(None),
        }
    }

    pub fn get_teacher(&self, teacher_id: &str) -> CoreResult<Teacher> {
        let teacher_id = segment("teacherId", teacher_id)?;
        self.find_teacher(teacher_id)?.ok_or_else(|| CoreError::NotFound {
            what: "teacher",
            id: teacher_id.to_string(),
        })
    }
}
