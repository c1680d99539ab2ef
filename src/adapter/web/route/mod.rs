pub mod saga;
pub mod users;
