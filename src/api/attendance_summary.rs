use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::api::extract::FieldQuery;
use crate::api::ok_json;
use crate::auth::auth::AuthUser;
use crate::auth::identity::require_supervisor;
use crate::config::Config;
use crate::error::AppError;
use crate::shifts::summary::{MonthSpan, WorkerSummaryRow, build_rows, paginate};
use crate::storage::AppState;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SummaryQuery {
    /// Defaults to the current year.
    #[schema(example = 2024)]
    pub year: Option<i32>,
    /// 1-12, defaults to the current month.
    #[schema(example = 2)]
    pub month: Option<u32>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 25)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    /// Day numbers of the month, 1..=n.
    pub days: Vec<u32>,
    pub count: usize,
    pub page: u32,
    pub page_size: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<WorkerSummaryRow>,
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/attendance-summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Worker-by-day attendance matrix", body = MonthlySummary),
        (status = 400, description = "Invalid year, month or paging"),
        (status = 403, description = "Staff or owner only"),
        (status = 404, description = "Invalid page")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff Shifts"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    query: FieldQuery<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    require_supervisor(state.accounts.as_ref(), &auth).await?;

    let today = Utc::now().date_naive();
    let span = MonthSpan::new(
        query.year.unwrap_or_else(|| today.year()),
        query.month.unwrap_or_else(|| today.month()),
    )?;
    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or(config.summary_page_size)
        .min(config.max_page_size);

    let roster = state.accounts.list_workers().await?;
    let shifts = state
        .shifts
        .list_worker_shifts_between(span.first, span.last)
        .await?;
    debug!(
        year = span.year,
        month = span.month,
        workers = roster.len(),
        shifts = shifts.len(),
        "Building monthly summary"
    );

    let rows = build_rows(&span, &roster, &shifts);
    let slice = paginate(rows, page, page_size)?;

    Ok(ok_json(
        "Attendance summary fetched",
        MonthlySummary {
            year: span.year,
            month: span.month,
            days: span.day_numbers(),
            count: slice.count,
            page: slice.page,
            page_size: slice.page_size,
            next: slice.next,
            previous: slice.previous,
            results: slice.results,
        },
    ))
}
