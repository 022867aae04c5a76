use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::model::identity::{Owner, ShiftOwner, Staff, Worker};
use crate::model::shift::Shift;
use crate::model::shift_audit::ShiftAudit;
use crate::model::user::User;
use crate::shifts::command::ShiftCommand;
use crate::shifts::upsert::prepare_save;
use crate::storage::{AccountStore, ShiftStore, UpsertOutcome};

#[derive(Default)]
struct RefreshToken {
    expires_at: Option<DateTime<Utc>>,
    revoked: bool,
}

#[derive(Default)]
struct MemoryState {
    shifts: BTreeMap<u64, Shift>,
    by_owner_day: HashMap<(ShiftOwner, NaiveDate), u64>,
    audits: Vec<ShiftAudit>,
    next_shift_id: u64,
    next_audit_id: u64,

    users: Vec<User>,
    workers: Vec<Worker>,
    staff: Vec<Staff>,
    owners: Vec<Owner>,
    refresh_tokens: HashMap<String, RefreshToken>,

    fail_audit_writes: bool,
}

/// In-process store with the same contract as the MySQL backend. One lock
/// covers the read-modify-write of an upsert, so it is atomic per key.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn add_user(&self, username: &str, password: &str, first_name: &str, last_name: &str) -> u64 {
        let mut state = self.lock();
        let id = state.users.len() as u64 + 1;
        state.users.push(User {
            id,
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            password: hash_password(password).expect("hash"),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            is_active: true,
            is_removed: false,
        });
        id
    }

    pub fn add_worker(&self, user_id: Option<u64>, full_name: &str, code: &str) -> u64 {
        let mut state = self.lock();
        let id = state.workers.len() as u64 + 1;
        state.workers.push(Worker {
            id,
            user_id,
            full_name: full_name.to_string(),
            employee_code: code.to_string(),
            is_active: true,
        });
        id
    }

    pub fn add_staff(&self, user_id: Option<u64>, full_name: &str, code: &str) -> u64 {
        let mut state = self.lock();
        let id = state.staff.len() as u64 + 1;
        state.staff.push(Staff {
            id,
            user_id,
            full_name: full_name.to_string(),
            employee_code: code.to_string(),
            is_active: true,
        });
        id
    }

    pub fn add_owner(&self, user_id: u64) -> u64 {
        let mut state = self.lock();
        let id = state.owners.len() as u64 + 1;
        state.owners.push(Owner { id, user_id });
        id
    }

    pub fn set_user_active(&self, user_id: u64, active: bool) {
        let mut state = self.lock();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = active;
        }
    }

    pub fn remove_user(&self, user_id: u64) {
        let mut state = self.lock();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.is_removed = true;
        }
    }

    pub fn set_worker_active(&self, worker_id: u64, active: bool) {
        let mut state = self.lock();
        if let Some(worker) = state.workers.iter_mut().find(|w| w.id == worker_id) {
            worker.is_active = active;
        }
    }

    /// Makes the next audit insert fail, to exercise rollback.
    pub fn fail_audit_writes(&self) {
        self.lock().fail_audit_writes = true;
    }

    pub fn shift_count(&self) -> usize {
        self.lock().shifts.len()
    }

    pub fn audit_count(&self) -> usize {
        self.lock().audits.len()
    }
}

fn newest_first(shifts: &mut [Shift]) {
    shifts.sort_by(|a, b| {
        b.attendance_date
            .cmp(&a.attendance_date)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl ShiftStore for MemoryStore {
    async fn find_actor_day(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
    ) -> Result<Option<Shift>, AppError> {
        let state = self.lock();
        Ok(state
            .by_owner_day
            .get(&(owner, date))
            .and_then(|id| state.shifts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, shift_id: u64) -> Result<Option<Shift>, AppError> {
        Ok(self.lock().shifts.get(&shift_id).cloned())
    }

    async fn list_for_owner(&self, owner: ShiftOwner) -> Result<Vec<Shift>, AppError> {
        let mut shifts: Vec<Shift> = self
            .lock()
            .shifts
            .values()
            .filter(|s| s.owner() == Some(owner))
            .cloned()
            .collect();
        newest_first(&mut shifts);
        Ok(shifts)
    }

    async fn list_all(&self) -> Result<Vec<Shift>, AppError> {
        let mut shifts: Vec<Shift> = self.lock().shifts.values().cloned().collect();
        newest_first(&mut shifts);
        Ok(shifts)
    }

    async fn list_worker_shifts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, AppError> {
        Ok(self
            .lock()
            .shifts
            .values()
            .filter(|s| s.recorded_by_worker_id.is_some())
            .filter(|s| s.attendance_date >= from && s.attendance_date <= to)
            .cloned()
            .collect())
    }

    async fn upsert(
        &self,
        owner: ShiftOwner,
        date: NaiveDate,
        command: &ShiftCommand,
    ) -> Result<UpsertOutcome, AppError> {
        let mut state = self.lock();

        let existing = state
            .by_owner_day
            .get(&(owner, date))
            .and_then(|id| state.shifts.get(id))
            .cloned();
        let prepared = prepare_save(existing, owner, date, command)?;

        if prepared.audit.is_some() && state.fail_audit_writes {
            state.fail_audit_writes = false;
            return Err(AppError::Internal("audit insert failed".to_string()));
        }

        let created = prepared.is_creation();
        let mut shift = prepared.next;
        if created {
            state.next_shift_id += 1;
            shift.id = state.next_shift_id;
            state.by_owner_day.insert((owner, date), shift.id);
        }
        state.shifts.insert(shift.id, shift.clone());

        if let Some(mut audit) = prepared.audit {
            state.next_audit_id += 1;
            audit.id = state.next_audit_id;
            state.audits.push(audit);
        }

        Ok(UpsertOutcome { shift, created })
    }

    async fn delete_owned(&self, shift_id: u64, owner: ShiftOwner) -> Result<bool, AppError> {
        let mut state = self.lock();
        let owned = state
            .shifts
            .get(&shift_id)
            .is_some_and(|s| s.owner() == Some(owner));
        if !owned {
            return Ok(false);
        }

        if let Some(shift) = state.shifts.remove(&shift_id) {
            state.by_owner_day.remove(&(owner, shift.attendance_date));
        }
        state.audits.retain(|a| a.shift_id != shift_id);
        Ok(true)
    }

    async fn audits_for(&self, shift_id: u64) -> Result<Vec<ShiftAudit>, AppError> {
        let mut audits: Vec<ShiftAudit> = self
            .lock()
            .audits
            .iter()
            .filter(|a| a.shift_id == shift_id)
            .cloned()
            .collect();
        audits.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(audits)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| !u.is_removed)
            .find(|u| u.username == login || u.email.as_deref() == Some(login))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: u64) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id && !u.is_removed)
            .cloned())
    }

    async fn worker_for_user(&self, user_id: u64) -> Result<Option<Worker>, AppError> {
        Ok(self
            .lock()
            .workers
            .iter()
            .find(|w| w.user_id == Some(user_id))
            .cloned())
    }

    async fn staff_for_user(&self, user_id: u64) -> Result<Option<Staff>, AppError> {
        Ok(self
            .lock()
            .staff
            .iter()
            .find(|s| s.user_id == Some(user_id))
            .cloned())
    }

    async fn owner_for_user(&self, user_id: u64) -> Result<Option<Owner>, AppError> {
        Ok(self
            .lock()
            .owners
            .iter()
            .find(|o| o.user_id == user_id)
            .cloned())
    }

    async fn list_workers(&self) -> Result<Vec<Worker>, AppError> {
        let mut workers = self.lock().workers.clone();
        workers.sort_by(|a, b| {
            a.full_name
                .cmp(&b.full_name)
                .then_with(|| a.employee_code.cmp(&b.employee_code))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(workers)
    }

    async fn store_refresh_token(
        &self,
        _user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.lock().refresh_tokens.insert(
            jti.to_string(),
            RefreshToken {
                expires_at: Some(expires_at),
                revoked: false,
            },
        );
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut state = self.lock();
        match state.refresh_tokens.get_mut(jti) {
            Some(token) if !token.revoked && token.expires_at.is_some_and(|at| at > now) => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::ActorKind;
    use crate::model::shift::{ShiftStatus, ShiftType};
    use crate::shifts::command::{ClockAction, ClockCommand, ShiftEdit};
    use chrono::TimeZone;
    use futures::executor::block_on;
    use std::sync::Barrier;
    use std::thread;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 8).unwrap()
    }

    fn clock(action: ClockAction, hour: u32) -> ShiftCommand {
        ShiftCommand::Clock(ClockCommand {
            actor: ActorKind::Worker,
            action,
            now: Utc.with_ymd_and_hms(2026, 6, 8, hour, 0, 0).unwrap(),
            shift_type: Some(ShiftType::Day),
            status: None,
            absence_reason: None,
            start_at: None,
            end_at: None,
            start_location: None,
            end_location: None,
        })
    }

    #[test]
    fn concurrent_starts_share_one_record() {
        const THREADS: usize = 8;
        let store = MemoryStore::new();
        let owner = ShiftOwner::Worker(1);
        let start = clock(ClockAction::Start, 7);
        let barrier = Barrier::new(THREADS);

        let outcomes: Vec<UpsertOutcome> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        block_on(store.upsert(owner, day(), &start))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
        assert!(outcomes.iter().all(|o| o.shift.id == outcomes[0].shift.id));
        assert_eq!(store.shift_count(), 1);
        assert_eq!(store.audit_count(), 0);
    }

    #[actix_web::test]
    async fn audits_only_real_changes() {
        let store = MemoryStore::new();
        let owner = ShiftOwner::Worker(1);

        let first = store.upsert(owner, day(), &clock(ClockAction::Start, 7)).await.unwrap();
        assert!(first.created);
        assert_eq!(store.audit_count(), 0);

        let same = store.upsert(owner, day(), &clock(ClockAction::Start, 7)).await.unwrap();
        assert!(!same.created);
        assert_eq!(store.audit_count(), 0);

        let ended = store.upsert(owner, day(), &clock(ClockAction::End, 15)).await.unwrap();
        assert_eq!(ended.shift.hours.unwrap().to_string(), "8.00");

        let audits = store.audits_for(first.shift.id).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].hours, None);
        assert_eq!(audits[0].end_date_time, None);
    }

    #[actix_web::test]
    async fn rejected_save_changes_nothing() {
        let store = MemoryStore::new();
        let owner = ShiftOwner::Staff(3);
        let mut edit = ShiftEdit::at(Utc::now());
        edit.shift_type = Some(ShiftType::Night);
        edit.status = Some(ShiftStatus::Present);
        let saved = store.upsert(owner, day(), &ShiftCommand::Edit(edit)).await.unwrap();

        let mut bad = ShiftEdit::at(Utc::now());
        bad.status = Some(ShiftStatus::Absent);
        let err = store.upsert(owner, day(), &ShiftCommand::Edit(bad)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = store.find_by_id(saved.shift.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ShiftStatus::Present);
        assert_eq!(store.audit_count(), 0);
    }

    #[actix_web::test]
    async fn failed_audit_write_rolls_back_the_update() {
        let store = MemoryStore::new();
        let owner = ShiftOwner::Worker(1);
        let saved = store.upsert(owner, day(), &clock(ClockAction::Start, 7)).await.unwrap();

        store.fail_audit_writes();
        assert!(store.upsert(owner, day(), &clock(ClockAction::End, 15)).await.is_err());

        let stored = store.find_by_id(saved.shift.id).await.unwrap().unwrap();
        assert_eq!(stored.end_date_time, None);
        assert_eq!(store.audit_count(), 0);
    }

    #[actix_web::test]
    async fn delete_requires_ownership_and_drops_audits() {
        let store = MemoryStore::new();
        let owner = ShiftOwner::Worker(1);
        let saved = store.upsert(owner, day(), &clock(ClockAction::Start, 7)).await.unwrap();
        store.upsert(owner, day(), &clock(ClockAction::End, 15)).await.unwrap();

        assert!(!store.delete_owned(saved.shift.id, ShiftOwner::Staff(1)).await.unwrap());
        assert!(store.delete_owned(saved.shift.id, owner).await.unwrap());
        assert_eq!(store.shift_count(), 0);
        assert_eq!(store.audit_count(), 0);
        assert!(store.find_actor_day(owner, day()).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn refresh_tokens_are_single_use() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .store_refresh_token(1, "jti-1", now + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(store.consume_refresh_token("jti-1", now).await.unwrap());
        assert!(!store.consume_refresh_token("jti-1", now).await.unwrap());
        assert!(!store.consume_refresh_token("missing", now).await.unwrap());
    }

    #[actix_web::test]
    async fn removed_users_cannot_be_found() {
        let store = MemoryStore::new();
        let id = store.add_user("maya", "pw", "Maya", "Lin");
        assert!(store.find_user_by_login("maya@example.com").await.unwrap().is_some());
        assert!(store.find_user_by_id(id).await.unwrap().is_some());
        store.remove_user(id);
        assert!(store.find_user_by_login("maya").await.unwrap().is_none());
        assert!(store.find_user_by_id(id).await.unwrap().is_none());
    }
}
