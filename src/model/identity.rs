use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Worker {
    pub id: u64,
    pub user_id: Option<u64>,
    pub full_name: String,
    pub employee_code: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Staff {
    pub id: u64,
    pub user_id: Option<u64>,
    pub full_name: String,
    pub employee_code: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Owner {
    pub id: u64,
    pub user_id: u64,
}

/// Which kind of identity is acting on a shift.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Worker,
    Staff,
}

/// A resolved, active identity allowed to record attendance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: u64,
    pub display_name: String,
}

impl Actor {
    pub fn owner(&self) -> ShiftOwner {
        match self.kind {
            ActorKind::Worker => ShiftOwner::Worker(self.id),
            ActorKind::Staff => ShiftOwner::Staff(self.id),
        }
    }
}

/// Owner reference of a shift: exactly one worker or one staff member.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ShiftOwner {
    Worker(u64),
    Staff(u64),
}

impl ShiftOwner {
    pub fn id(&self) -> u64 {
        match self {
            ShiftOwner::Worker(id) | ShiftOwner::Staff(id) => *id,
        }
    }

    /// Column holding this owner's foreign key on `shifts`.
    pub fn column(&self) -> &'static str {
        match self {
            ShiftOwner::Worker(_) => "recorded_by_worker_id",
            ShiftOwner::Staff(_) => "recorded_by_staff_id",
        }
    }
}

impl std::fmt::Display for ShiftOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShiftOwner::Worker(id) => write!(f, "worker:{id}"),
            ShiftOwner::Staff(id) => write!(f, "staff:{id}"),
        }
    }
}
