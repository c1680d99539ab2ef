use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::domain::context::Context;

/// A live transaction opened on one resource.
///
/// The unit of work calls `commit` or `rollback` at most once per handle.
#[async_trait]
pub trait TransactionHandle: Send + Sync {
    /// Runs a statement inside the transaction and returns the affected row count.
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError>;
    async fn commit(&self) -> Result<(), TransactionError>;
    async fn rollback(&self) -> Result<(), TransactionError>;

    /// Marks a savepoint named `name` inside this transaction. The returned
    /// handle commits as a no-op and rolls back only to the savepoint.
    ///
    /// `None` means the resource has no savepoints; nested scopes then share
    /// this handle as is.
    async fn savepoint(
        &self,
        _name: &str,
    ) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
        Ok(None)
    }
}

#[async_trait]
pub trait TransactionalResource: Send + Sync {
    async fn begin(
        &self,
        ctx: &Context,
        options: &TransactionOptions,
    ) -> Result<Arc<dyn TransactionHandle>, TransactionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

pub trait ToSql: Send + Sync + fmt::Debug {
    fn as_i32(&self) -> Option<i32> {
        None
    }
    fn as_string(&self) -> Option<String> {
        None
    }
}

impl ToSql for i32 {
    fn as_i32(&self) -> Option<i32> {
        Some(*self)
    }
}

impl ToSql for String {
    fn as_string(&self) -> Option<String> {
        Some(self.clone())
    }
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Failed to execute query: {0}")]
    ExecutionError(String),
    #[error("Failed to commit transaction: {0}")]
    CommitError(String),
    #[error("Failed to rollback transaction: {0}")]
    RollbackError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Parameter binding error: {0}")]
    BindError(String),
    #[error("Transaction already finished")]
    Finished,
    #[error("Operation cancelled")]
    Cancelled,
}
