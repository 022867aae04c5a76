pub mod audit;
pub mod command;
pub mod summary;
pub mod upsert;
pub mod validation;
