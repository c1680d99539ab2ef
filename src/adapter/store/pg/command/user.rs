use async_trait::async_trait;

use crate::core::domain::command::CommandError;
use crate::core::domain::context::Context;
use crate::core::domain::entity::user::{User, UserCommand};
use crate::core::domain::resource::ResourceKey;
use crate::core::domain::transaction::{ToSql, TransactionError};

pub struct PgUserRepository {
    key: ResourceKey,
}

impl PgUserRepository {
    pub fn new(key: ResourceKey) -> Self {
        Self { key }
    }
}

fn to_command_error(e: TransactionError, id: i32) -> CommandError {
    let message = e.to_string();
    if message.contains("unique constraint") {
        CommandError::user_already_exists(id)
    } else if message.contains("deadlock") {
        CommandError::ConcurrencyError {
            entity_type: "User".to_string(),
        }
    } else {
        CommandError::DatabaseError(message)
    }
}

#[async_trait]
impl UserCommand for PgUserRepository {
    async fn insert(&self, ctx: &Context, user: User) -> Result<(), CommandError> {
        let transaction = ctx.get_tx_db(&self.key).await?;
        let query = "INSERT INTO users (id, name, email) VALUES ($1, $2, $3)";
        let params: Vec<Box<dyn ToSql>> = vec![
            Box::new(user.id) as Box<dyn ToSql>,
            Box::new(user.name) as Box<dyn ToSql>,
            Box::new(user.email) as Box<dyn ToSql>,
        ];
        transaction
            .execute(query, params)
            .await
            .map_err(|e| to_command_error(e, user.id))?;
        Ok(())
    }

    async fn delete(&self, ctx: &Context, id: i32) -> Result<(), CommandError> {
        let transaction = ctx.get_tx_db(&self.key).await?;
        let affected = transaction
            .execute("DELETE FROM users WHERE id = $1", vec![Box::new(id) as Box<dyn ToSql>])
            .await
            .map_err(|e| to_command_error(e, id))?;
        if affected == 0 {
            return Err(CommandError::user_not_found(id));
        }
        Ok(())
    }
}
