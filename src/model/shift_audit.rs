use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::model::shift::{AbsenceReason, Shift, ShiftStatus, ShiftType};

/// Immutable copy of what a shift said before one edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShiftAudit {
    pub id: u64,
    pub shift_id: u64,
    pub recorded_by_worker_id: Option<u64>,
    pub recorded_by_staff_id: Option<u64>,
    #[schema(format = "date", value_type = String)]
    pub attendance_date: NaiveDate,
    pub shift_type: Option<ShiftType>,
    pub status: ShiftStatus,
    pub absence_reason: Option<AbsenceReason>,
    #[schema(value_type = Option<String>)]
    pub hours: Option<Decimal>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub start_date_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub end_date_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub worker_start_date_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub worker_end_date_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub staff_start_date_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub staff_end_date_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub worker_start_location: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub worker_end_location: Option<Value>,
    #[schema(format = "date-time", value_type = String)]
    pub created: DateTime<Utc>,
}

impl ShiftAudit {
    /// Audit row holding `previous` verbatim. `id` is assigned on insert.
    pub fn of_previous(previous: &Shift, at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            shift_id: previous.id,
            recorded_by_worker_id: previous.recorded_by_worker_id,
            recorded_by_staff_id: previous.recorded_by_staff_id,
            attendance_date: previous.attendance_date,
            shift_type: previous.shift_type,
            status: previous.status,
            absence_reason: previous.absence_reason,
            hours: previous.hours,
            start_date_time: previous.start_date_time,
            end_date_time: previous.end_date_time,
            worker_start_date_time: previous.worker_start_date_time,
            worker_end_date_time: previous.worker_end_date_time,
            staff_start_date_time: previous.staff_start_date_time,
            staff_end_date_time: previous.staff_end_date_time,
            worker_start_location: previous.worker_start_location.clone(),
            worker_end_location: previous.worker_end_location.clone(),
            created: at,
        }
    }
}
