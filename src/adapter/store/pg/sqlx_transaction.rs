use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;

use crate::core::domain::transaction::{ToSql, TransactionError, TransactionHandle};

type Slot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// A Postgres transaction owned by a unit of work. Taken out of the slot on
/// commit or rollback; any later use reports [`TransactionError::Finished`].
pub struct SqlxTransaction {
    transaction: Slot,
}

impl SqlxTransaction {
    pub fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self {
            transaction: Arc::new(Mutex::new(Some(transaction))),
        }
    }
}

async fn execute(
    slot: &Slot,
    query: &str,
    params: Vec<Box<dyn ToSql>>,
) -> Result<u64, TransactionError> {
    let mut sqlx_query = sqlx::query(query);

    for param in params {
        if let Some(value) = param.as_i32() {
            sqlx_query = sqlx_query.bind(value);
        } else if let Some(value) = param.as_string() {
            sqlx_query = sqlx_query.bind(value);
        } else {
            return Err(TransactionError::BindError(format!(
                "Unsupported parameter type: {:?}",
                param
            )));
        }
    }

    let mut slot = slot.lock().await;
    let transaction = slot.as_mut().ok_or(TransactionError::Finished)?;
    let result = sqlx_query.execute(&mut **transaction).await.map_err(|e| {
        TransactionError::ExecutionError(format!(
            "Failed to execute query: {:?}, error: {:?}",
            query, e
        ))
    })?;
    Ok(result.rows_affected())
}

async fn open_savepoint(
    slot: &Slot,
    name: &str,
) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
    execute(slot, &format!("SAVEPOINT {name}"), Vec::new()).await?;
    Ok(Some(Arc::new(SqlxSavepoint {
        transaction: slot.clone(),
        name: name.to_string(),
    })))
}

#[async_trait]
impl TransactionHandle for SqlxTransaction {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        execute(&self.transaction, query, params).await
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        let transaction = self
            .transaction
            .lock()
            .await
            .take()
            .ok_or(TransactionError::Finished)?;
        transaction.commit().await.map_err(|e| {
            TransactionError::CommitError(format!("Failed to commit transaction: {:?}", e))
        })
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        let transaction = self
            .transaction
            .lock()
            .await
            .take()
            .ok_or(TransactionError::Finished)?;
        transaction
            .rollback()
            .await
            .map_err(|e| TransactionError::RollbackError(e.to_string()))
    }

    async fn savepoint(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
        open_savepoint(&self.transaction, name).await
    }
}

/// A savepoint inside a [`SqlxTransaction`]. Its work is committed with the
/// enclosing transaction.
pub struct SqlxSavepoint {
    transaction: Slot,
    name: String,
}

#[async_trait]
impl TransactionHandle for SqlxSavepoint {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        execute(&self.transaction, query, params).await
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        execute(
            &self.transaction,
            &format!("ROLLBACK TO SAVEPOINT {}", self.name),
            Vec::new(),
        )
        .await
        .map(|_| ())
        .map_err(|e| TransactionError::RollbackError(e.to_string()))
    }

    async fn savepoint(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
        open_savepoint(&self.transaction, name).await
    }
}
