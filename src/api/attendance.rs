use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::extract::{FieldJson, FieldQuery};
use crate::api::ok_json;
use crate::auth::auth::AuthUser;
use crate::auth::identity::resolve_actor;
use crate::error::AppError;
use crate::model::shift::{AbsenceReason, Shift, ShiftStatus, ShiftType};
use crate::shifts::command::{ClockAction, ClockCommand, ShiftCommand};
use crate::storage::AppState;

/// Clock-in, clock-out or location ping for the caller's own shift.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceRequest {
    /// Defaults to today (UTC).
    #[schema(example = "2026-01-05", value_type = Option<String>, format = "date")]
    pub attendance_date: Option<NaiveDate>,

    #[serde(default)]
    pub action: ClockAction,

    #[schema(example = "day")]
    pub shift_type: Option<ShiftType>,
    pub status: Option<ShiftStatus>,
    pub absence_reason: Option<AbsenceReason>,

    #[serde(alias = "worker_start_date_time", alias = "staff_start_date_time")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub start_date_time: Option<DateTime<Utc>>,

    #[serde(alias = "worker_end_date_time", alias = "staff_end_date_time")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub end_date_time: Option<DateTime<Utc>>,

    #[serde(alias = "worker_start_location")]
    #[schema(value_type = Option<Object>)]
    pub start_location: Option<Value>,

    #[serde(alias = "worker_end_location")]
    #[schema(value_type = Option<Object>)]
    pub end_location: Option<Value>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Defaults to today (UTC).
    #[schema(example = "2026-01-05", value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>, format = "date")]
    pub attendance_date: Option<NaiveDate>,
}

#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = AttendanceRequest,
    responses(
        (status = 201, description = "Shift created", body = Object, example = json!({
            "ok": true,
            "message": "Attendance recorded",
            "created": true,
            "data": { "id": 1, "attendance_date": "2026-01-05", "status": "present" }
        })),
        (status = 200, description = "Shift updated"),
        (status = 400, description = "Invalid data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No active worker or staff profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn upsert_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: FieldJson<AttendanceRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = resolve_actor(state.accounts.as_ref(), &auth).await?;
    let body = body.into_inner();
    let now = Utc::now();
    let date = body.attendance_date.unwrap_or_else(|| now.date_naive());

    let command = ShiftCommand::Clock(ClockCommand {
        actor: actor.kind,
        action: body.action,
        now,
        shift_type: body.shift_type,
        status: body.status,
        absence_reason: body.absence_reason,
        start_at: body.start_date_time,
        end_at: body.end_date_time,
        start_location: body.start_location,
        end_location: body.end_location,
    });

    let outcome = state.shifts.upsert(actor.owner(), date, &command).await?;
    info!(
        shift_id = outcome.shift.id,
        owner = %actor.owner(),
        actor = %actor.display_name,
        attendance_date = %date,
        action = ?body.action,
        created = outcome.created,
        "Attendance recorded"
    );

    let mut response = if outcome.created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(response.json(json!({
        "ok": true,
        "message": "Attendance recorded",
        "created": outcome.created,
        "data": outcome.shift,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "The caller's shift for the date, or null", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No active worker or staff profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: FieldQuery<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let actor = resolve_actor(state.accounts.as_ref(), &auth).await?;
    let date = query
        .attendance_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let shift: Option<Shift> = state.shifts.find_actor_day(actor.owner(), date).await?;
    Ok(ok_json("Attendance fetched", shift))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/history",
    responses(
        (status = 200, description = "The caller's shifts, newest date first", body = [Shift]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No active worker or staff profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_history(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let actor = resolve_actor(state.accounts.as_ref(), &auth).await?;
    let shifts = state.shifts.list_for_owner(actor.owner()).await?;
    Ok(ok_json("Attendance history fetched", shifts))
}
