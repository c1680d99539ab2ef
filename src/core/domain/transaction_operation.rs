use async_trait::async_trait;
use thiserror::Error;

use crate::core::domain::command::CommandError;
use crate::core::domain::context::Context;
use crate::core::domain::transaction::TransactionError;
use crate::core::domain::unit_of_work::UnitOfWorkError;

/// Failure reported by work running inside a unit of work.
#[derive(Debug, Error)]
pub enum TransactionOperationError {
    #[error(transparent)]
    TransactionError(#[from] TransactionError),

    #[error(transparent)]
    UnitOfWorkError(#[from] UnitOfWorkError),

    #[error(transparent)]
    CommandError(#[from] CommandError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type-erased unit of work body, for callers that hold the manager as a
/// trait object.
#[async_trait]
pub trait BoxedTransactionOperation: Send + Sync {
    async fn execute(&self, ctx: &Context) -> Result<(), TransactionOperationError>;
}
