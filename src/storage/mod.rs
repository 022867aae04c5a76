use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppError;
use crate::model::identity::{Owner, ShiftOwner, Staff, Worker};
use crate::model::shift::Shift;
use crate::model::shift_audit::ShiftAudit;
use crate::model::user::User;
use crate::shifts::command::ShiftCommand;

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub shift: Shift,
    pub created: bool,
}

/// Shift records and their audit ledger.
#[async_trait]
pub trait ShiftStore: Send + Sync {
    async fn find_actor_day(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
    ) -> Result<Option<Shift>, AppError>;

    async fn find_by_id(&self, shift_id: u64) -> Result<Option<Shift>, AppError>;

    /// Newest attendance date first.
    async fn list_for_owner(&self, owner: ShiftOwner) -> Result<Vec<Shift>, AppError>;

    /// Newest attendance date first.
    async fn list_all(&self) -> Result<Vec<Shift>, AppError>;

    /// Worker-owned shifts with `from <= attendance_date <= to`.
    async fn list_worker_shifts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, AppError>;

    /// Atomic create-or-update of the (owner, date) record. The audit row,
    /// when one is due, is written in the same transaction.
    async fn upsert(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
        command: &ShiftCommand,
    ) -> Result<UpsertOutcome, AppError>;

    /// Deletes the shift only if `owner` owns it. Audit rows go with it.
    async fn delete_owned(&self, shift_id: u64, owner: ShiftOwner) -> Result<bool, AppError>;

    /// Newest first.
    async fn audits_for(&self, shift_id: u64) -> Result<Vec<ShiftAudit>, AppError>;
}

/// Login accounts, identity linkage and refresh tokens.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Matches username or email among users that are not removed.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError>;

    /// `None` for removed users.
    async fn find_user_by_id(&self, user_id: u64) -> Result<Option<User>, AppError>;

    async fn worker_for_user(&self, user_id: u64) -> Result<Option<Worker>, AppError>;

    async fn staff_for_user(&self, user_id: u64) -> Result<Option<Staff>, AppError>;

    async fn owner_for_user(&self, user_id: u64) -> Result<Option<Owner>, AppError>;

    /// Full worker roster ordered by display name.
    async fn list_workers(&self) -> Result<Vec<Worker>, AppError>;

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Revokes an unexpired, unrevoked token. `false` if there was none.
    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}

/// Storage handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub shifts: Arc<dyn ShiftStore>,
    pub accounts: Arc<dyn AccountStore>,
}
