pub mod command;
pub mod resource;
pub mod sqlx_transaction;
