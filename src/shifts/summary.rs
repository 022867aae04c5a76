use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, FieldErrors};
use crate::model::identity::Worker;
use crate::model::shift::{Shift, ShiftStatus};

/// Calendar bounds of one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub year: i32,
    pub month: u32,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthSpan {
    pub fn new(year: i32, month: u32) -> Result<Self, AppError> {
        let mut errors = FieldErrors::new();
        if !(1..=9999).contains(&year) {
            errors.add("year", "Invalid year");
        }
        if !(1..=12).contains(&month) {
            errors.add("month", "Invalid month");
        }
        errors.into_result()?;

        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::invalid("month", "Invalid year or month"))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last = next
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| AppError::invalid("year", "Invalid year or month"))?;

        Ok(Self { year, month, first, last })
    }

    pub fn days_in_month(&self) -> u32 {
        self.last.day()
    }

    pub fn day_numbers(&self) -> Vec<u32> {
        (1..=self.days_in_month()).collect()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkerSummaryRow {
    pub worker_id: u64,
    pub employee_code: String,
    pub employee_name: String,
    /// Day of month → status, blank when nothing was recorded.
    #[schema(value_type = Object)]
    pub days: BTreeMap<u32, String>,
    #[schema(value_type = Object)]
    pub absence_reasons: BTreeMap<u32, String>,
    pub total_present: u32,
    pub total_absent: u32,
}

impl WorkerSummaryRow {
    fn blank(worker: &Worker, span: &MonthSpan) -> Self {
        let empty: BTreeMap<u32, String> = span
            .day_numbers()
            .into_iter()
            .map(|day| (day, String::new()))
            .collect();

        Self {
            worker_id: worker.id,
            employee_code: worker.employee_code.clone(),
            employee_name: worker.full_name.clone(),
            days: empty.clone(),
            absence_reasons: empty,
            total_present: 0,
            total_absent: 0,
        }
    }

    fn record(&mut self, shift: &Shift) {
        let day = shift.attendance_date.day();
        self.days.insert(day, shift.status.to_string());
        self.absence_reasons.insert(
            day,
            shift
                .absence_reason
                .map(|r| r.to_string())
                .unwrap_or_default(),
        );

        if shift.status == ShiftStatus::Present {
            self.total_present += 1;
        } else if shift.status == ShiftStatus::Absent || shift.absence_reason.is_some() {
            self.total_absent += 1;
        }
    }
}

/// One row per roster worker, sorted by display name. `shifts` must be the
/// worker-owned records inside `span`; anything else is skipped.
pub fn build_rows(span: &MonthSpan, roster: &[Worker], shifts: &[Shift]) -> Vec<WorkerSummaryRow> {
    let mut rows: HashMap<u64, WorkerSummaryRow> = roster
        .iter()
        .map(|w| (w.id, WorkerSummaryRow::blank(w, span)))
        .collect();

    for shift in shifts {
        if shift.attendance_date < span.first || shift.attendance_date > span.last {
            continue;
        }
        let Some(worker_id) = shift.recorded_by_worker_id else {
            continue;
        };
        match rows.get_mut(&worker_id) {
            Some(row) => row.record(shift),
            None => tracing::debug!(worker_id, shift_id = shift.id, "Shift for unknown worker"),
        }
    }

    let mut rows: Vec<WorkerSummaryRow> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        a.employee_name
            .cmp(&b.employee_name)
            .then_with(|| a.employee_code.cmp(&b.employee_code))
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });
    rows
}

/// A 1-based page cut from an in-memory list.
#[derive(Debug)]
pub struct PageSlice<T> {
    pub count: usize,
    pub page: u32,
    pub page_size: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

pub fn paginate<T>(items: Vec<T>, page: u32, page_size: u32) -> Result<PageSlice<T>, AppError> {
    if page == 0 {
        return Err(AppError::invalid("page", "Page numbers start at 1"));
    }
    if page_size == 0 {
        return Err(AppError::invalid("page_size", "Page size must be positive"));
    }

    let count = items.len();
    let size = page_size as usize;
    let pages = count.div_ceil(size).max(1);
    if page as usize > pages {
        return Err(AppError::NotFound("Invalid page.".to_string()));
    }

    let results: Vec<T> = items
        .into_iter()
        .skip((page as usize - 1) * size)
        .take(size)
        .collect();

    Ok(PageSlice {
        count,
        page,
        page_size,
        next: ((page as usize) < pages).then_some(page + 1),
        previous: (page > 1).then(|| page - 1),
        results,
    })
}
