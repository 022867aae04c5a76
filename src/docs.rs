use crate::api::attendance::{AttendanceQuery, AttendanceRequest};
use crate::api::attendance_summary::{MonthlySummary, SummaryQuery};
use crate::api::staff_shift::StaffShiftEdit;
use crate::auth::handlers::RefreshRequest;
use crate::model::role::Role;
use crate::model::shift::{AbsenceReason, Shift, ShiftStatus, ShiftType};
use crate::model::shift_audit::ShiftAudit;
use crate::models::{LoginReqDto, LoginResponse, TokenPair};
use crate::shifts::command::ClockAction;
use crate::shifts::summary::WorkerSummaryRow;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shiftdesk API",
        version = "1.0.0",
        description = r#"
## Attendance & Shift Tracking

Daily attendance for field **workers** and company **staff**.

### Key Features
- **Attendance**
  - Clock in, clock out and location pings against one record per person per day
- **Staff shift management**
  - Direct edits of a staff member's own shifts, with a change audit for every edit
  - Shift listing, detail and deletion
- **Monthly summary**
  - Worker-by-day attendance matrix, paginated

### Security
Endpoints under `/api/v1` require a **JWT Bearer** access token issued by
`/auth/{role}/login`.

### Response Format
`{"ok": bool, "message": str, "data": ..., "errors": {field: [msg]}}`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::upsert_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::attendance_history,

        crate::api::staff_shift::list_shifts,
        crate::api::staff_shift::edit_shift,
        crate::api::staff_shift::get_shift,
        crate::api::staff_shift::delete_shift,
        crate::api::staff_shift::shift_audits,

        crate::api::attendance_summary::monthly_summary
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            TokenPair,
            RefreshRequest,
            Role,
            ClockAction,
            AttendanceRequest,
            AttendanceQuery,
            StaffShiftEdit,
            Shift,
            ShiftType,
            ShiftStatus,
            AbsenceReason,
            ShiftAudit,
            SummaryQuery,
            MonthlySummary,
            WorkerSummaryRow
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Role-scoped login and token rotation"),
        (name = "Attendance", description = "Worker and staff attendance APIs"),
        (name = "Staff Shifts", description = "Staff shift management and reporting APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/auth/{role}/login",
            "/api/v1/attendance",
            "/api/v1/attendance/history",
            "/api/v1/staff/shifts",
            "/api/v1/staff/shifts/{shift_id}",
            "/api/v1/staff/shifts/{shift_id}/audits",
            "/api/v1/staff/attendance-summary",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "{expected} missing");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer_auth"));
    }
}
