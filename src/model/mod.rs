pub mod identity;
pub mod role;
pub mod shift;
pub mod shift_audit;
pub mod user;
