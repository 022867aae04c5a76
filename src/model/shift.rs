use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::identity::ShiftOwner;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftType {
    Day,
    Night,
    #[serde(alias = "ot")]
    Overtime,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftStatus {
    Present,
    Absent,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceReason {
    Sick,
    SiteOut,
    NoWork,
    Safety,
    Training,
}

/// One attendance record for a single (owner, attendance_date) pair.
///
/// `id` is 0 until the record is first inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Shift {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub attendance_date: NaiveDate,
    #[schema(example = "day")]
    pub shift_type: Option<ShiftType>,
    #[schema(example = "present")]
    pub status: ShiftStatus,
    #[schema(example = "sick")]
    pub absence_reason: Option<AbsenceReason>,
    #[schema(example = "8.50", value_type = Option<String>)]
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
    pub recorded_by_worker_id: Option<u64>,
    pub recorded_by_staff_id: Option<u64>,
    #[schema(format = "date-time", value_type = String)]
    pub created: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub modified: DateTime<Utc>,
}

/// Fields whose change is captured by the audit ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFields {
    pub attendance_date: NaiveDate,
    pub shift_type: Option<ShiftType>,
    pub status: ShiftStatus,
    pub absence_reason: Option<AbsenceReason>,
    pub hours: Option<Decimal>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub worker_start_date_time: Option<DateTime<Utc>>,
    pub worker_end_date_time: Option<DateTime<Utc>>,
    pub staff_start_date_time: Option<DateTime<Utc>>,
    pub staff_end_date_time: Option<DateTime<Utc>>,
    pub worker_start_location: Option<Value>,
    pub worker_end_location: Option<Value>,
}

impl Shift {
    /// Unsaved record scoped to `owner` and `date`, status present.
    pub fn new_for(owner: ShiftOwner, date: NaiveDate, now: DateTime<Utc>) -> Self {
        let (recorded_by_worker_id, recorded_by_staff_id) = match owner {
            ShiftOwner::Worker(id) => (Some(id), None),
            ShiftOwner::Staff(id) => (None, Some(id)),
        };

        Self {
            id: 0,
            attendance_date: date,
            shift_type: None,
            status: ShiftStatus::Present,
            absence_reason: None,
            hours: None,
            start_date_time: None,
            end_date_time: None,
            worker_start_date_time: None,
            worker_end_date_time: None,
            staff_start_date_time: None,
            staff_end_date_time: None,
            worker_start_location: None,
            worker_end_location: None,
            recorded_by_worker_id,
            recorded_by_staff_id,
            created: now,
            modified: now,
        }
    }

    /// The owner reference, or `None` when the exclusivity rule is broken.
    pub fn owner(&self) -> Option<ShiftOwner> {
        match (self.recorded_by_worker_id, self.recorded_by_staff_id) {
            (Some(worker), None) => Some(ShiftOwner::Worker(worker)),
            (None, Some(staff)) => Some(ShiftOwner::Staff(staff)),
            _ => None,
        }
    }

    pub fn tracked(&self) -> TrackedFields {
        TrackedFields {
            attendance_date: self.attendance_date,
            shift_type: self.shift_type,
            status: self.status,
            absence_reason: self.absence_reason,
            hours: self.hours,
            start_date_time: self.start_date_time,
            end_date_time: self.end_date_time,
            worker_start_date_time: self.worker_start_date_time,
            worker_end_date_time: self.worker_end_date_time,
            staff_start_date_time: self.staff_start_date_time,
            staff_end_date_time: self.staff_end_date_time,
            worker_start_location: self.worker_start_location.clone(),
            worker_end_location: self.worker_end_location.clone(),
        }
    }

    /// Staff may only delete records they recorded themselves; worker
    /// records are never deletable through this path.
    pub fn ensure_deletable_by(&self, staff_id: u64) -> Result<(), AppError> {
        if self.recorded_by_worker_id.is_some() {
            return Err(AppError::forbidden("Cannot delete worker-recorded shift"));
        }
        if self.recorded_by_staff_id != Some(staff_id) {
            return Err(AppError::forbidden("Cannot delete another staff's shift"));
        }
        Ok(())
    }
}
