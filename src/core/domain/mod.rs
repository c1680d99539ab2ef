pub mod barrier;
pub mod command;
pub mod context;
pub mod entity;
pub mod resource;
pub mod transaction;
pub mod transaction_manager;
pub mod transaction_operation;
pub mod unit_of_work;
