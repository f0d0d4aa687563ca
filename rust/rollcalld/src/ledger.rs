//! Per-student attendance ledger: `students/{id}/attendance/{date}`.

use crate::error::{CoreError, CoreResult};
use crate::model::{AttendanceMap, AttendanceStatus};
use crate::roster::{self, student_path};
use crate::store::{segment, Store, Subscription};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

pub fn attendance_path(student_id: &str) -> String {
    format!("{}/attendance", student_path(student_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let t = raw.trim();
        let Some((y, m)) = t.split_once('-') else {
            return Err(CoreError::validation("month must be YYYY-MM"));
        };
        if y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::validation("month year must have four digits"));
        }
        if !(1..=2).contains(&m.len()) || !m.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::validation("month must be YYYY-MM"));
        }
        let year = y
            .parse::<i32>()
            .map_err(|_| CoreError::validation("month year must be numeric"))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| CoreError::validation("month must be YYYY-MM"))?;
        if !(1..=12).contains(&month) {
            return Err(CoreError::validation("month must be between 01 and 12"));
        }
        Ok(Self { year, month })
    }

    pub fn days(&self) -> usize {
        days_in_month(self.year, self.month)
    }

    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn date_key(&self, day: usize) -> String {
        format!("{}-{:02}", self.key(), day)
    }

    /// `day` (1-based) of this month for a stored `YYYY-MM-DD` key.
    pub fn day_of(&self, date: &str) -> Option<usize> {
        let rest = date.strip_prefix(&self.key())?.strip_prefix('-')?;
        let day = rest.parse::<usize>().ok()?;
        (1..=self.days()).contains(&day).then_some(day)
    }
}

pub fn days_in_month(year: i32, month: u32) -> usize {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 30,
    }
}

/// Validate a calendar date and return its canonical `YYYY-MM-DD` key.
pub fn date_key(raw: &str) -> CoreResult<String> {
    let d = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("invalid date: {}", raw.trim())))?;
    Ok(d.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayEntry {
    pub date: String,
    /// `None` means nothing was recorded for the day.
    pub status: Option<AttendanceStatus>,
}

/// Every day of `month`, paired with its recorded status if any.
pub fn month_view(attendance: &AttendanceMap, month: YearMonth) -> Vec<DayEntry> {
    (1..=month.days())
        .map(|day| {
            let date = month.date_key(day);
            let status = attendance.get(&date).copied();
            DayEntry { date, status }
        })
        .collect()
}

/// Read the stored attendance for a student. Unknown status strings are skipped.
pub fn read_attendance(store: &dyn Store, student_id: &str) -> CoreResult<AttendanceMap> {
    let mut out = AttendanceMap::new();
    for (date, value) in store.children(&attendance_path(student_id))? {
        match value.as_str().and_then(AttendanceStatus::parse) {
            Some(status) => {
                out.insert(date, status);
            }
            None => warn!(student_id, date = %date, "skipping unrecognized attendance value"),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFailure {
    pub student_id: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSaveReport {
    pub date: String,
    pub saved: Vec<String>,
    pub failed: Vec<SaveFailure>,
}

pub struct Ledger<'a> {
    store: &'a dyn Store,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn existing(&self, student_id: &str) -> CoreResult<String> {
        let student_id = segment("studentId", student_id)?;
        if roster::load_student_doc(self.store, student_id)?.is_none() {
            return Err(CoreError::student_not_found(student_id));
        }
        Ok(student_id.to_string())
    }

    /// Upsert one day. Writing the same value twice leaves identical state.
    pub fn mark_attendance(
        &self,
        student_id: &str,
        date: &str,
        status: AttendanceStatus,
        requester_id: &str,
    ) -> CoreResult<()> {
        let date = date_key(date)?;
        roster::require_owner(self.store, student_id, requester_id)?;
        let student_id = student_id.trim();
        self.store.set(
            &format!("{}/{}", attendance_path(student_id), date),
            &json!(status.as_str()),
        )?;
        debug!(student_id, date = %date, status = status.as_str(), "attendance marked");
        Ok(())
    }

    pub fn get_month(&self, student_id: &str, month: YearMonth) -> CoreResult<Vec<DayEntry>> {
        let student_id = self.existing(student_id)?;
        let attendance = read_attendance(self.store, &student_id)?;
        Ok(month_view(&attendance, month))
    }

    pub fn count_absences(&self, student_id: &str) -> CoreResult<usize> {
        let student_id = self.existing(student_id)?;
        let attendance = read_attendance(self.store, &student_id)?;
        Ok(attendance
            .values()
            .filter(|s| **s == AttendanceStatus::Absent)
            .count())
    }

    /// Every recorded day, oldest first.
    pub fn history(&self, student_id: &str) -> CoreResult<AttendanceMap> {
        let student_id = self.existing(student_id)?;
        read_attendance(self.store, &student_id)
    }

    /// Save one date for many students as independent writes. A failing
    /// student is recorded and skipped; re-running completes the class.
    pub fn mark_class(
        &self,
        date: &str,
        entries: &[(String, AttendanceStatus)],
        requester_id: &str,
    ) -> CoreResult<ClassSaveReport> {
        let date = date_key(date)?;
        let mut report = ClassSaveReport {
            date: date.clone(),
            ..Default::default()
        };
        for (student_id, status) in entries {
            match self.mark_attendance(student_id, &date, *status, requester_id) {
                Ok(()) => report.saved.push(student_id.clone()),
                Err(e) => {
                    warn!(student_id = %student_id, error = %e, "class save skipped student");
                    report.failed.push(SaveFailure {
                        student_id: student_id.clone(),
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            date = %date,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "class attendance saved"
        );
        Ok(report)
    }

    /// Push-style read: the returned watch yields a fresh snapshot after each
    /// change to the student's record or attendance.
    pub fn watch(&self, student_id: &str) -> CoreResult<LedgerWatch> {
        let student_id = self.existing(student_id)?;
        let subscription = self.store.subscribe(&student_path(&student_id));
        Ok(LedgerWatch {
            student_id,
            subscription,
        })
    }
}

pub struct LedgerWatch {
    student_id: String,
    subscription: Subscription,
}

impl LedgerWatch {
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// `Some(snapshot)` if anything changed since the last poll. A removed
    /// student yields an empty snapshot.
    pub fn poll(&self, store: &dyn Store) -> CoreResult<Option<AttendanceMap>> {
        let changes = self.subscription.drain();
        if changes.is_empty() {
            return Ok(None);
        }
        debug!(
            path = self.subscription.path(),
            changes = changes.len(),
            last = changes.last().map(|c| c.path.as_str()).unwrap_or_default(),
            "ledger watch fired"
        );
        read_attendance(store, &self.student_id).map(Some)
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
    fn february_has_28_or_29_entries() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        ledger
            .mark_attendance(&id, "2025-02-03", AttendanceStatus::Absent, "t1")
            .unwrap();
        let feb = ledger
            .get_month(&id, YearMonth::parse("2025-02").unwrap())
            .unwrap();
        assert_eq!(feb.len(), 28);
        assert_eq!(feb[2].status, Some(AttendanceStatus::Absent));
        assert_eq!(feb[0].status, None);
        assert_eq!(feb[27].date, "2025-02-28");
        assert_eq!(YearMonth::parse("2024-02").unwrap().days(), 29);
    }

    #[test]
    fn marking_twice_is_idempotent() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        let month = YearMonth::parse("2025-03").unwrap();
        ledger
            .mark_attendance(&id, "2025-03-10", AttendanceStatus::Present, "t1")
            .unwrap();
        let once = ledger.get_month(&id, month).unwrap();
        ledger
            .mark_attendance(&id, "2025-03-10", AttendanceStatus::Present, "t1")
            .unwrap();
        assert_eq!(ledger.get_month(&id, month).unwrap(), once);
    }

    #[test]
    fn last_write_wins_for_same_date() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        ledger
            .mark_attendance(&id, "2025-03-10", AttendanceStatus::Absent, "t1")
            .unwrap();
        ledger
            .mark_attendance(&id, "2025-03-10", AttendanceStatus::Present, "t1")
            .unwrap();
        assert_eq!(ledger.count_absences(&id).unwrap(), 0);
        assert_eq!(ledger.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn five_marks_three_absent() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        let marks = [
            ("2025-01-06", AttendanceStatus::Absent),
            ("2025-01-07", AttendanceStatus::Present),
            ("2025-01-08", AttendanceStatus::Absent),
            ("2025-02-03", AttendanceStatus::Present),
            ("2025-02-04", AttendanceStatus::Absent),
        ];
        for (d, st) in marks {
            ledger.mark_attendance(&id, d, st, "t1").unwrap();
        }
        assert_eq!(ledger.count_absences(&id).unwrap(), 3);
        let jan = ledger
            .get_month(&id, YearMonth::parse("2025-01").unwrap())
            .unwrap();
        assert_eq!(jan.iter().filter(|d| d.status.is_some()).count(), 3);
    }

    #[test]
    fn non_owner_and_bad_dates_are_rejected() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        assert!(matches!(
            ledger.mark_attendance(&id, "2025-03-10", AttendanceStatus::Absent, "t2"),
            Err(CoreError::NotOwner { .. })
        ));
        assert!(matches!(
            ledger.mark_attendance(&id, "2025-02-30", AttendanceStatus::Absent, "t1"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            ledger.count_absences("nope"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn month_parse_rejects_garbage() {
        assert!(YearMonth::parse("2025-13").is_err());
        assert!(YearMonth::parse("03").is_err());
        assert!(YearMonth::parse("25-03").is_err());
        assert!(YearMonth::parse("2025-+3").is_err());
        assert!(YearMonth::parse("+025-03").is_err());
        assert!(YearMonth::parse("2025-003").is_err());
        let m = YearMonth::parse("2025-3").unwrap();
        assert_eq!(m.key(), "2025-03");
        assert_eq!(m.day_of("2025-03-09"), Some(9));
        assert_eq!(m.day_of("2025-04-09"), None);
    }

    #[test]
    fn mark_class_keeps_going_past_failures() {
        let (s, id) = setup();
        let other = Roster::new(&s)
            .add_student("Ben", "8A", "maths", "t2")
            .unwrap();
        let ledger = Ledger::new(&s);
        let report = ledger
            .mark_class(
                "2025-03-11",
                &[
                    (other.clone(), AttendanceStatus::Present),
                    (id.clone(), AttendanceStatus::Absent),
                    ("missing".to_string(), AttendanceStatus::Present),
                ],
                "t1",
            )
            .unwrap();
        assert_eq!(report.saved, vec![id.clone()]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].code, "not_owner");
        assert_eq!(report.failed[1].code, "not_found");
        assert_eq!(ledger.count_absences(&id).unwrap(), 1);
    }

    #[test]
    fn watch_fires_after_mark_and_remove() {
        let (s, id) = setup();
        let ledger = Ledger::new(&s);
        let watch = ledger.watch(&id).unwrap();
        assert_eq!(watch.poll(&s).unwrap(), None);

        ledger
            .mark_attendance(&id, "2025-03-10", AttendanceStatus::Absent, "t1")
            .unwrap();
        let snap = watch.poll(&s).unwrap().expect("change");
        assert_eq!(snap.get("2025-03-10"), Some(&AttendanceStatus::Absent));
        assert_eq!(watch.poll(&s).unwrap(), None);

        Roster::new(&s).remove(&id, "t1").unwrap();
        assert_eq!(watch.poll(&s).unwrap(), Some(AttendanceMap::new()));
    }
}
