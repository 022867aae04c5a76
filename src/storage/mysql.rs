use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, MySql, MySqlPool};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::model::identity::{Owner, ShiftOwner, Staff, Worker};
use crate::model::shift::Shift;
use crate::model::shift_audit::ShiftAudit;
use crate::model::user::User;
use crate::shifts::command::ShiftCommand;
use crate::shifts::upsert::prepare_save;
use crate::storage::{AccountStore, ShiftStore, UpsertOutcome};

/// Race losers on the (owner, date) key are retried this many times in total.
const MAX_UPSERT_ATTEMPTS: usize = 3;

const SHIFT_COLUMNS: &str = "id, attendance_date, shift_type, status, absence_reason, hours, \
     start_date_time, end_date_time, worker_start_date_time, worker_end_date_time, \
     staff_start_date_time, staff_end_date_time, worker_start_location, worker_end_location, \
     recorded_by_worker_id, recorded_by_staff_id, created, modified";

const AUDIT_COLUMNS: &str = "id, shift_id, attendance_date, shift_type, status, absence_reason, hours, \
     start_date_time, end_date_time, worker_start_date_time, worker_end_date_time, \
     staff_start_date_time, staff_end_date_time, worker_start_location, worker_end_location, \
     recorded_by_worker_id, recorded_by_staff_id, created";

const USER_COLUMNS: &str =
    "id, username, email, password, first_name, last_name, is_active, is_removed";

/// Soft-deleted users never match a read.
const LIVE_USERS: &str = "is_removed = FALSE";

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

#[derive(FromRow)]
struct ShiftRow {
    id: u64,
    attendance_date: NaiveDate,
    shift_type: String,
    status: String,
    absence_reason: Option<String>,
    hours: Option<Decimal>,
    start_date_time: Option<DateTime<Utc>>,
    end_date_time: Option<DateTime<Utc>>,
    worker_start_date_time: Option<DateTime<Utc>>,
    worker_end_date_time: Option<DateTime<Utc>>,
    staff_start_date_time: Option<DateTime<Utc>>,
    staff_end_date_time: Option<DateTime<Utc>>,
    worker_start_location: Option<Json<Value>>,
    worker_end_location: Option<Json<Value>>,
    recorded_by_worker_id: Option<u64>,
    recorded_by_staff_id: Option<u64>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

#[derive(FromRow)]
struct AuditRow {
    id: u64,
    shift_id: u64,
    attendance_date: NaiveDate,
    shift_type: String,
    status: String,
    absence_reason: Option<String>,
    hours: Option<Decimal>,
    start_date_time: Option<DateTime<Utc>>,
    end_date_time: Option<DateTime<Utc>>,
    worker_start_date_time: Option<DateTime<Utc>>,
    worker_end_date_time: Option<DateTime<Utc>>,
    staff_start_date_time: Option<DateTime<Utc>>,
    staff_end_date_time: Option<DateTime<Utc>>,
    worker_start_location: Option<Json<Value>>,
    worker_end_location: Option<Json<Value>>,
    recorded_by_worker_id: Option<u64>,
    recorded_by_staff_id: Option<u64>,
    created: DateTime<Utc>,
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Internal(format!("unexpected {column} value {value:?}")))
}

fn parse_optional<T: FromStr>(column: &str, value: Option<&str>) -> Result<Option<T>, AppError> {
    value.map(|v| parse_column(column, v)).transpose()
}

impl TryFrom<ShiftRow> for Shift {
    type Error = AppError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        Ok(Shift {
            id: row.id,
            attendance_date: row.attendance_date,
            shift_type: Some(parse_column("shift_type", &row.shift_type)?),
            status: parse_column("status", &row.status)?,
            absence_reason: parse_optional("absence_reason", row.absence_reason.as_deref())?,
            hours: row.hours,
            start_date_time: row.start_date_time,
            end_date_time: row.end_date_time,
            worker_start_date_time: row.worker_start_date_time,
            worker_end_date_time: row.worker_end_date_time,
            staff_start_date_time: row.staff_start_date_time,
            staff_end_date_time: row.staff_end_date_time,
            worker_start_location: row.worker_start_location.map(|j| j.0),
            worker_end_location: row.worker_end_location.map(|j| j.0),
            recorded_by_worker_id: row.recorded_by_worker_id,
            recorded_by_staff_id: row.recorded_by_staff_id,
            created: row.created,
            modified: row.modified,
        })
    }
}

impl TryFrom<AuditRow> for ShiftAudit {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(ShiftAudit {
            id: row.id,
            shift_id: row.shift_id,
            recorded_by_worker_id: row.recorded_by_worker_id,
            recorded_by_staff_id: row.recorded_by_staff_id,
            attendance_date: row.attendance_date,
            shift_type: Some(parse_column("shift_type", &row.shift_type)?),
            status: parse_column("status", &row.status)?,
            absence_reason: parse_optional("absence_reason", row.absence_reason.as_deref())?,
            hours: row.hours,
            start_date_time: row.start_date_time,
            end_date_time: row.end_date_time,
            worker_start_date_time: row.worker_start_date_time,
            worker_end_date_time: row.worker_end_date_time,
            staff_start_date_time: row.staff_start_date_time,
            staff_end_date_time: row.staff_end_date_time,
            worker_start_location: row.worker_start_location.map(|j| j.0),
            worker_end_location: row.worker_end_location.map(|j| j.0),
            created: row.created,
        })
    }
}

fn into_shifts(rows: Vec<ShiftRow>) -> Result<Vec<Shift>, AppError> {
    rows.into_iter().map(Shift::try_from).collect()
}

/// Binds the thirteen tracked columns in `SHIFT_COLUMNS` order.
fn bind_tracked<'q>(
    query: MySqlQuery<'q>,
    attendance_date: NaiveDate,
    fields: TrackedBinds,
) -> MySqlQuery<'q> {
    query
        .bind(attendance_date)
        .bind(fields.shift_type)
        .bind(fields.status)
        .bind(fields.absence_reason)
        .bind(fields.hours)
        .bind(fields.start_date_time)
        .bind(fields.end_date_time)
        .bind(fields.worker_start_date_time)
        .bind(fields.worker_end_date_time)
        .bind(fields.staff_start_date_time)
        .bind(fields.staff_end_date_time)
        .bind(fields.worker_start_location)
        .bind(fields.worker_end_location)
}

/// Owned, database-ready copies of the tracked values.
struct TrackedBinds {
    shift_type: Option<String>,
    status: String,
    absence_reason: Option<String>,
    hours: Option<Decimal>,
    start_date_time: Option<DateTime<Utc>>,
    end_date_time: Option<DateTime<Utc>>,
    worker_start_date_time: Option<DateTime<Utc>>,
    worker_end_date_time: Option<DateTime<Utc>>,
    staff_start_date_time: Option<DateTime<Utc>>,
    staff_end_date_time: Option<DateTime<Utc>>,
    worker_start_location: Option<Json<Value>>,
    worker_end_location: Option<Json<Value>>,
}

impl From<&Shift> for TrackedBinds {
    fn from(s: &Shift) -> Self {
        Self {
            shift_type: s.shift_type.map(|t| t.to_string()),
            status: s.status.to_string(),
            absence_reason: s.absence_reason.map(|r| r.to_string()),
            hours: s.hours,
            start_date_time: s.start_date_time,
            end_date_time: s.end_date_time,
            worker_start_date_time: s.worker_start_date_time,
            worker_end_date_time: s.worker_end_date_time,
            staff_start_date_time: s.staff_start_date_time,
            staff_end_date_time: s.staff_end_date_time,
            worker_start_location: s.worker_start_location.clone().map(Json),
            worker_end_location: s.worker_end_location.clone().map(Json),
        }
    }
}

impl From<&ShiftAudit> for TrackedBinds {
    fn from(a: &ShiftAudit) -> Self {
        Self {
            shift_type: a.shift_type.map(|t| t.to_string()),
            status: a.status.to_string(),
            absence_reason: a.absence_reason.map(|r| r.to_string()),
            hours: a.hours,
            start_date_time: a.start_date_time,
            end_date_time: a.end_date_time,
            worker_start_date_time: a.worker_start_date_time,
            worker_end_date_time: a.worker_end_date_time,
            staff_start_date_time: a.staff_start_date_time,
            staff_end_date_time: a.staff_end_date_time,
            worker_start_location: a.worker_start_location.clone().map(Json),
            worker_end_location: a.worker_end_location.clone().map(Json),
        }
    }
}

/// Duplicate key on the (owner, date) index, or an InnoDB deadlock between
/// two writers of the same key.
fn is_retryable(error: &AppError) -> bool {
    match error {
        AppError::Storage(sqlx::Error::Database(db_err)) => {
            matches!(db_err.code().as_deref(), Some("23000") | Some("40001"))
        }
        _ => false,
    }
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` runs have been made.
async fn retry_lost_races<T, F, Fut>(max_attempts: usize, mut attempt: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if tries < max_attempts && is_retryable(&e) => {
                warn!(attempt = tries, error = %e, "Shift upsert lost a race, retrying");
                tries += 1;
            }
            outcome => return outcome,
        }
    }
}

/// Production backend for both stores.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn try_upsert(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
        command: &ShiftCommand,
    ) -> Result<UpsertOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE {} = ? AND attendance_date = ? FOR UPDATE",
            owner.column()
        );
        let existing = sqlx::query_as::<_, ShiftRow>(&select)
            .bind(owner.id())
            .bind(date)
            .fetch_optional(&mut *tx)
            .await?
            .map(Shift::try_from)
            .transpose()?;

        let prepared = prepare_save(existing, owner, date, command)?;
        let created = prepared.is_creation();
        let mut shift = prepared.next;

        if created {
            let result = bind_tracked(
                sqlx::query(
                    r#"
                    INSERT INTO shifts
                        (attendance_date, shift_type, status, absence_reason, hours,
                         start_date_time, end_date_time, worker_start_date_time, worker_end_date_time,
                         staff_start_date_time, staff_end_date_time,
                         worker_start_location, worker_end_location,
                         recorded_by_worker_id, recorded_by_staff_id, created, modified)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                ),
                shift.attendance_date,
                TrackedBinds::from(&shift),
            )
            .bind(shift.recorded_by_worker_id)
            .bind(shift.recorded_by_staff_id)
            .bind(shift.created)
            .bind(shift.modified)
            .execute(&mut *tx)
            .await?;
            shift.id = result.last_insert_id();
        } else {
            bind_tracked(
                sqlx::query(
                    r#"
                    UPDATE shifts SET
                        attendance_date = ?, shift_type = ?, status = ?, absence_reason = ?, hours = ?,
                        start_date_time = ?, end_date_time = ?,
                        worker_start_date_time = ?, worker_end_date_time = ?,
                        staff_start_date_time = ?, staff_end_date_time = ?,
                        worker_start_location = ?, worker_end_location = ?,
                        modified = ?
                    WHERE id = ?
                    "#,
                ),
                shift.attendance_date,
                TrackedBinds::from(&shift),
            )
            .bind(shift.modified)
            .bind(shift.id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(audit) = &prepared.audit {
            bind_tracked(
                sqlx::query(
                    r#"
                    INSERT INTO shift_audits
                        (attendance_date, shift_type, status, absence_reason, hours,
                         start_date_time, end_date_time, worker_start_date_time, worker_end_date_time,
                         staff_start_date_time, staff_end_date_time,
                         worker_start_location, worker_end_location,
                         shift_id, recorded_by_worker_id, recorded_by_staff_id, created)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                ),
                audit.attendance_date,
                TrackedBinds::from(audit),
            )
            .bind(audit.shift_id)
            .bind(audit.recorded_by_worker_id)
            .bind(audit.recorded_by_staff_id)
            .bind(audit.created)
            .execute(&mut *tx)
            .await?;
            debug!(shift_id = shift.id, "Shift audit recorded");
        }

        tx.commit().await?;

        Ok(UpsertOutcome { shift, created })
    }
}

#[async_trait]
impl ShiftStore for MySqlStore {
    async fn find_actor_day(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
    ) -> Result<Option<Shift>, AppError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE {} = ? AND attendance_date = ?",
            owner.column()
        );
        sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(owner.id())
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(Shift::try_from)
            .transpose()
    }

    async fn find_by_id(&self, shift_id: u64) -> Result<Option<Shift>, AppError> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
        sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(shift_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Shift::try_from)
            .transpose()
    }

    async fn list_for_owner(&self, owner: ShiftOwner) -> Result<Vec<Shift>, AppError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE {} = ? ORDER BY attendance_date DESC, id DESC",
            owner.column()
        );
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(owner.id())
            .fetch_all(&self.pool)
            .await?;
        into_shifts(rows)
    }

    async fn list_all(&self) -> Result<Vec<Shift>, AppError> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY attendance_date DESC, id DESC");
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_shifts(rows)
    }

    async fn list_worker_shifts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, AppError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts \
             WHERE recorded_by_worker_id IS NOT NULL AND attendance_date BETWEEN ? AND ? \
             ORDER BY attendance_date"
        );
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        into_shifts(rows)
    }

    async fn upsert(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
        command: &ShiftCommand,
    ) -> Result<UpsertOutcome, AppError> {
        debug!(%owner, %date, "Upserting shift");
        retry_lost_races(MAX_UPSERT_ATTEMPTS, || self.try_upsert(owner, date, command)).await
    }

    async fn delete_owned(&self, shift_id: u64, owner: ShiftOwner) -> Result<bool, AppError> {
        let other = match owner {
            ShiftOwner::Worker(_) => "recorded_by_staff_id",
            ShiftOwner::Staff(_) => "recorded_by_worker_id",
        };
        let sql = format!(
            "DELETE FROM shifts WHERE id = ? AND {} = ? AND {other} IS NULL",
            owner.column()
        );
        let result = sqlx::query(&sql)
            .bind(shift_id)
            .bind(owner.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn audits_for(&self, shift_id: u64) -> Result<Vec<ShiftAudit>, AppError> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM shift_audits WHERE shift_id = ? ORDER BY created DESC, id DESC"
        );
        sqlx::query_as::<_, AuditRow>(&sql)
            .bind(shift_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ShiftAudit::try_from)
            .collect()
    }
}

#[async_trait]
impl AccountStore for MySqlStore {
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE (username = ? OR email = ?) AND {LIVE_USERS} LIMIT 1"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_id(&self, user_id: u64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND {LIVE_USERS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn worker_for_user(&self, user_id: u64) -> Result<Option<Worker>, AppError> {
        Ok(sqlx::query_as::<_, Worker>(
            "SELECT id, user_id, full_name, employee_code, is_active FROM workers WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn staff_for_user(&self, user_id: u64) -> Result<Option<Staff>, AppError> {
        Ok(sqlx::query_as::<_, Staff>(
            "SELECT id, user_id, full_name, employee_code, is_active FROM staff WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn owner_for_user(&self, user_id: u64) -> Result<Option<Owner>, AppError> {
        Ok(
            sqlx::query_as::<_, Owner>("SELECT id, user_id FROM owners WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_workers(&self) -> Result<Vec<Worker>, AppError> {
        Ok(sqlx::query_as::<_, Worker>(
            r#"
            SELECT id, user_id, full_name, employee_code, is_active
            FROM workers
            ORDER BY full_name, employee_code, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ?
            AND revoked = FALSE
            AND expires_at > ?
            "#,
        )
        .bind(jti)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
