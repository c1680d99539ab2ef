use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::adapter::store::pg::sqlx_transaction::SqlxTransaction;
use crate::core::domain::context::Context;
use crate::core::domain::transaction::{
    TransactionError, TransactionHandle, TransactionOptions, TransactionalResource,
};

/// A Postgres pool as a transactional resource.
pub struct PgResource {
    pool: PgPool,
}

impl PgResource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionalResource for PgResource {
    async fn begin(
        &self,
        ctx: &Context,
        options: &TransactionOptions,
    ) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        let mut transaction = tokio::select! {
            _ = ctx.cancellation_token().cancelled() => return Err(TransactionError::Cancelled),
            begun = self.pool.begin() => begun.map_err(|e| TransactionError::ConnectionError(e.to_string()))?,
        };

        if let Some(isolation) = options.isolation {
            sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()))
                .execute(&mut *transaction)
                .await
                .map_err(|e| TransactionError::ExecutionError(e.to_string()))?;
        }
        if options.read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *transaction)
                .await
                .map_err(|e| TransactionError::ExecutionError(e.to_string()))?;
        }

        debug!(?options, "began postgres transaction");
        Ok(Arc::new(SqlxTransaction::new(transaction)))
    }
}
