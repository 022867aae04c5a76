use tracing::info;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::identity::{Actor, ActorKind, Staff};
use crate::model::role::Role;
use crate::model::user::User;
use crate::storage::AccountStore;

/// Who may read the staff-side reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Supervisor {
    Staff,
    Owner,
}

/// The account behind a token, if it is still active and not removed.
pub async fn live_user(accounts: &dyn AccountStore, user_id: u64) -> Result<User, AppError> {
    accounts
        .find_user_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            info!(user_id, "Token presented for an inactive or removed account");
            AppError::Unauthenticated("Account is inactive or removed".into())
        })
}

/// Looks up the worker or staff identity behind `user`. Runs on every
/// request, so a deactivated identity is refused immediately.
pub async fn resolve_actor(accounts: &dyn AccountStore, user: &AuthUser) -> Result<Actor, AppError> {
    live_user(accounts, user.user_id).await?;

    let actor = match user.role {
        Role::Worker => accounts
            .worker_for_user(user.user_id)
            .await?
            .filter(|w| w.is_active)
            .map(|w| Actor {
                kind: ActorKind::Worker,
                id: w.id,
                display_name: w.full_name,
            }),
        Role::Staff => accounts
            .staff_for_user(user.user_id)
            .await?
            .filter(|s| s.is_active)
            .map(|s| Actor {
                kind: ActorKind::Staff,
                id: s.id,
                display_name: s.full_name,
            }),
        Role::Owner => None,
    };

    actor.ok_or_else(|| {
        info!(user_id = user.user_id, role = %user.role, "No active attendance identity");
        AppError::forbidden("No active worker or staff profile")
    })
}

pub async fn require_staff(accounts: &dyn AccountStore, user: &AuthUser) -> Result<Staff, AppError> {
    if user.role != Role::Staff {
        return Err(AppError::forbidden("Staff only"));
    }
    live_user(accounts, user.user_id).await?;

    accounts
        .staff_for_user(user.user_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::forbidden("No active staff profile"))
}

pub async fn require_supervisor(
    accounts: &dyn AccountStore,
    user: &AuthUser,
) -> Result<Supervisor, AppError> {
    match user.role {
        Role::Staff => require_staff(accounts, user).await.map(|_| Supervisor::Staff),
        Role::Owner => {
            live_user(accounts, user.user_id).await?;
            accounts
                .owner_for_user(user.user_id)
                .await?
                .map(|_| Supervisor::Owner)
                .ok_or_else(|| AppError::forbidden("No owner profile"))
        }
        Role::Worker => Err(AppError::forbidden("Staff or owner only")),
    }
}
