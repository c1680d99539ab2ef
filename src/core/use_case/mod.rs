pub mod create_user;
pub mod saga_user;
