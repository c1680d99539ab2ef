pub mod user;

use async_trait::async_trait;

use crate::core::domain::command::CommandError;
use crate::core::domain::context::Context;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
}

/// Writes users through the transaction bound on the ambient unit of work.
#[async_trait]
pub trait UserCommand: Send + Sync {
    async fn insert(&self, ctx: &Context, user: User) -> Result<(), CommandError>;
    async fn delete(&self, ctx: &Context, id: i32) -> Result<(), CommandError>;
}
