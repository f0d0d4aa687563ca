use crate::ledger::YearMonth;
use crate::model::{AttendanceStatus, Student};
use serde::Serialize;
use std::collections::BTreeMap;

/// Class-screen highlight threshold for frequent absentees.
pub const DEFAULT_HIGHLIGHT_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedAbsentee<'a> {
    pub student: &'a Student,
    pub absences: usize,
}

/// Students with at least `min_absences` absences, most absences first.
/// Ties keep their input order.
pub fn rank_frequent_absentees(students: &[Student], min_absences: usize) -> Vec<RankedAbsentee<'_>> {
    let mut ranked: Vec<RankedAbsentee<'_>> = students
        .iter()
        .map(|student| RankedAbsentee {
            student,
            absences: student.absence_count(),
        })
        .filter(|r| r.absences >= min_absences)
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.absences.cmp(&a.absences));
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: String,
    pub days_in_month: usize,
    pub present_total: usize,
    pub absent_total: usize,
    pub per_day_present_count: Vec<usize>,
    /// Present days over every calendar day of the month, as a percentage.
    /// Unrecorded days stay in the denominator.
    pub per_student_percent: BTreeMap<String, f64>,
}

pub fn monthly_class_summary(students: &[Student], month: YearMonth) -> MonthlySummary {
    let days = month.days();
    let mut per_day_present_count = vec![0usize; days];
    let mut per_student_percent = BTreeMap::new();
    let mut present_total = 0usize;
    let mut absent_total = 0usize;

    for student in students {
        let mut present_days = 0usize;
        for (date, status) in &student.attendance {
            let Some(day) = month.day_of(date) else {
                continue;
            };
            match status {
                AttendanceStatus::Present => {
                    present_days += 1;
                    per_day_present_count[day - 1] += 1;
                }
                AttendanceStatus::Absent => absent_total += 1,
            }
        }
        present_total += present_days;
        let percent = if days > 0 {
            100.0 * present_days as f64 / days as f64
        } else {
            0.0
        };
        per_student_percent.insert(student.id.clone(), percent);
    }

    MonthlySummary {
        month: month.key(),
        days_in_month: days,
        present_total,
        absent_total,
        per_day_present_count,
        per_student_percent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub date: String,
    pub student_id: String,
    pub student_name: String,
    pub status: AttendanceStatus,
}

/// Flattened attendance rows for a class, newest date first. Within a date the
/// input student order is kept.
pub fn class_history(students: &[Student], limit: Option<usize>) -> Vec<HistoryRow> {
    let mut rows: Vec<HistoryRow> = students
        .iter()
        .flat_map(|s| {
            s.attendance.iter().map(move |(date, status)| HistoryRow {
                date: date.clone(),
                student_id: s.id.clone(),
                student_name: s.name.clone(),
                status: *status,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(n) = limit {
        rows.truncate(n);
    }
    rows
}
