use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::api::extract::FieldJson;
use crate::api::ok_json;
use crate::auth::auth::AuthUser;
use crate::auth::identity::{require_staff, require_supervisor};
use crate::error::AppError;
use crate::model::identity::ShiftOwner;
use crate::model::shift::{AbsenceReason, Shift, ShiftStatus, ShiftType};
use crate::shifts::command::{ShiftCommand, ShiftEdit};
use crate::storage::AppState;

/// Present-but-null becomes `Some(None)`; absent stays `None` via `default`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Direct edit of the caller's own shift for a date. Sending `null` clears
/// a field; leaving it out keeps the stored value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffShiftEdit {
    #[schema(example = "2026-01-05", value_type = Option<String>, format = "date")]
    pub attendance_date: Option<NaiveDate>,

    #[schema(example = "day")]
    pub shift_type: Option<ShiftType>,
    #[schema(example = "present")]
    pub status: Option<ShiftStatus>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AbsenceReason>)]
    pub absence_reason: Option<Option<AbsenceReason>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(example = "8.50", value_type = Option<String>)]
    pub hours: Option<Option<Decimal>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub start_date_time: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub end_date_time: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub staff_start_date_time: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub staff_end_date_time: Option<Option<DateTime<Utc>>>,
}

impl StaffShiftEdit {
    fn into_command(self, now: DateTime<Utc>) -> ShiftCommand {
        ShiftCommand::Edit(ShiftEdit {
            now,
            shift_type: self.shift_type,
            status: self.status,
            absence_reason: self.absence_reason,
            hours: self.hours,
            start_date_time: self.start_date_time,
            end_date_time: self.end_date_time,
            staff_start_date_time: self.staff_start_date_time,
            staff_end_date_time: self.staff_end_date_time,
        })
    }
}

async fn load_shift(state: &AppState, shift_id: u64) -> Result<Shift, AppError> {
    state
        .shifts
        .find_by_id(shift_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Shift not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/shifts",
    responses(
        (status = 200, description = "All shifts, newest date first", body = [Shift]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff or owner only")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn list_shifts(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_supervisor(state.accounts.as_ref(), &auth).await?;
    let shifts = state.shifts.list_all().await?;
    Ok(ok_json("Shifts fetched", shifts))
}

#[utoipa::path(
    patch,
    path = "/api/v1/staff/shifts",
    request_body = StaffShiftEdit,
    responses(
        (status = 200, description = "Shift updated", body = Object, example = json!({
            "ok": true,
            "message": "Shift saved",
            "created": false,
            "data": { "id": 3, "attendance_date": "2026-01-05", "status": "absent", "absence_reason": "sick" }
        })),
        (status = 201, description = "Shift created"),
        (status = 400, description = "Invalid data"),
        (status = 403, description = "Staff only")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn edit_shift(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: FieldJson<StaffShiftEdit>,
) -> Result<HttpResponse, AppError> {
    let staff = require_staff(state.accounts.as_ref(), &auth).await?;
    let now = Utc::now();
    let body = body.into_inner();
    let date = body.attendance_date.unwrap_or_else(|| now.date_naive());
    let owner = ShiftOwner::Staff(staff.id);

    let outcome = state
        .shifts
        .upsert(owner, date, &body.into_command(now))
        .await?;
    info!(
        shift_id = outcome.shift.id,
        %owner,
        attendance_date = %date,
        created = outcome.created,
        "Shift edited by staff"
    );

    let mut response = if outcome.created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(response.json(json!({
        "ok": true,
        "message": "Shift saved",
        "created": outcome.created,
        "data": outcome.shift,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/shifts/{shift_id}",
    params(
        ("shift_id", description = "Shift ID")
    ),
    responses(
        (status = 200, body = Shift),
        (status = 403, description = "Staff or owner only"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn get_shift(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    require_supervisor(state.accounts.as_ref(), &auth).await?;
    let shift = load_shift(&state, path.into_inner()).await?;
    Ok(ok_json("Shift fetched", shift))
}

#[utoipa::path(
    delete,
    path = "/api/v1/staff/shifts/{shift_id}",
    params(
        ("shift_id", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Shift deleted"),
        (status = 403, description = "Worker-recorded or another staff's shift"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn delete_shift(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let staff = require_staff(state.accounts.as_ref(), &auth).await?;
    let shift_id = path.into_inner();
    let shift = load_shift(&state, shift_id).await?;

    if let Err(e) = shift.ensure_deletable_by(staff.id) {
        warn!(shift_id, staff_id = staff.id, "Shift delete refused");
        return Err(e);
    }

    // Gone between the read and the delete.
    if !state
        .shifts
        .delete_owned(shift_id, ShiftOwner::Staff(staff.id))
        .await?
    {
        return Err(AppError::NotFound("Shift not found".to_string()));
    }

    info!(shift_id, staff_id = staff.id, "Shift deleted");
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "message": "Shift deleted",
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/shifts/{shift_id}/audits",
    params(
        ("shift_id", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Pre-edit snapshots, newest first", body = [crate::model::shift_audit::ShiftAudit]),
        (status = 403, description = "Staff or owner only"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn shift_audits(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    require_supervisor(state.accounts.as_ref(), &auth).await?;
    let shift = load_shift(&state, path.into_inner()).await?;
    let audits = state.shifts.audits_for(shift.id).await?;
    Ok(ok_json("Shift audits fetched", audits))
}
