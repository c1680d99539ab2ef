use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::domain::context::Context;
use crate::core::domain::resource::{default_key_formatter, KeyFormatter, Resolver};
use crate::core::domain::transaction::TransactionOptions;
use crate::core::domain::transaction_operation::{
    BoxedTransactionOperation, TransactionOperationError,
};
use crate::core::domain::unit_of_work::{UnitOfWork, UnitOfWorkError};

#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Runs `operation` in a new unit of work bound on a context derived from `ctx`.
    async fn execute(
        &self,
        ctx: &Context,
        operation: Box<dyn BoxedTransactionOperation>,
    ) -> Result<(), TransactionManagerError>;
}

#[derive(Debug, Error)]
pub enum TransactionManagerError {
    #[error(transparent)]
    OperationError(#[from] TransactionOperationError),

    #[error("{operation}; rolling back transaction: {rollback}")]
    RollbackFailed {
        operation: TransactionOperationError,
        #[source]
        rollback: UnitOfWorkError,
    },

    #[error("committing transaction: {0}")]
    CommitFailed(#[source] UnitOfWorkError),
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub support_nested_transaction: bool,
    pub default_options: TransactionOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            support_nested_transaction: true,
            default_options: TransactionOptions::default(),
        }
    }
}

pub struct UnitOfWorkManager {
    resolver: Arc<dyn Resolver>,
    formatter: KeyFormatter,
    config: ManagerConfig,
}

impl UnitOfWorkManager {
    pub fn new(resolver: Arc<dyn Resolver>, config: ManagerConfig) -> Self {
        Self {
            resolver,
            formatter: Arc::new(default_key_formatter),
            config,
        }
    }

    pub fn with_key_formatter(mut self, formatter: KeyFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Creates a unit of work without binding or finishing it. With nesting
    /// enabled it is parented to the unit of work bound on `ctx`, if any.
    pub fn create_new(&self, ctx: &Context, options: Option<TransactionOptions>) -> Arc<UnitOfWork> {
        let parent = if self.config.support_nested_transaction {
            ctx.unit_of_work()
        } else {
            None
        };
        let options = options.unwrap_or_else(|| self.config.default_options.clone());
        let unit_of_work = Arc::new(UnitOfWork::new(
            self.resolver.clone(),
            self.formatter.clone(),
            options,
            parent,
        ));
        debug!(
            unit_of_work = %unit_of_work.id(),
            parent = ?unit_of_work.parent().map(|p| p.id()),
            "created unit of work"
        );
        unit_of_work
    }

    /// Runs `operation` inside a fresh unit of work, committing on success and
    /// rolling back on error or panic.
    pub async fn with_new<T, F, Fut>(
        &self,
        ctx: &Context,
        options: Option<TransactionOptions>,
        operation: F,
    ) -> Result<T, TransactionManagerError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, TransactionOperationError>>,
    {
        let unit_of_work = self.create_new(ctx, options);
        self.run(ctx, unit_of_work, operation).await
    }

    /// Binds `unit_of_work` on a context derived from `ctx`, runs `operation`
    /// and finishes the unit of work according to the outcome.
    ///
    /// A panic rolls back first and then resumes unwinding with the original
    /// payload. If this future is dropped before finishing, the unit of work is
    /// rolled back on a spawned task.
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &Context,
        unit_of_work: Arc<UnitOfWork>,
        operation: F,
    ) -> Result<T, TransactionManagerError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, TransactionOperationError>>,
    {
        let scoped = ctx.with_unit_of_work(unit_of_work.clone());
        let guard = RollbackGuard::new(unit_of_work.clone());
        let outcome = AssertUnwindSafe(async move { operation(scoped).await })
            .catch_unwind()
            .await;

        match outcome {
            Err(panic) => {
                if let Err(e) = unit_of_work.rollback().await {
                    warn!(unit_of_work = %unit_of_work.id(), error = %e, "rollback after panic failed");
                }
                guard.disarm();
                std::panic::resume_unwind(panic)
            }
            Ok(Err(operation)) => {
                let rolled_back = unit_of_work.rollback().await;
                guard.disarm();
                match rolled_back {
                    Ok(()) => Err(TransactionManagerError::OperationError(operation)),
                    Err(rollback) => Err(TransactionManagerError::RollbackFailed {
                        operation,
                        rollback,
                    }),
                }
            }
            Ok(Ok(value)) => {
                let committed = unit_of_work.commit().await;
                guard.disarm();
                committed.map_err(TransactionManagerError::CommitFailed)?;
                Ok(value)
            }
        }
    }
}

#[async_trait]
impl TransactionManager for UnitOfWorkManager {
    async fn execute(
        &self,
        ctx: &Context,
        operation: Box<dyn BoxedTransactionOperation>,
    ) -> Result<(), TransactionManagerError> {
        self.with_new(ctx, None, move |ctx| async move { operation.execute(&ctx).await })
            .await
    }
}

/// Rolls back a unit of work whose driving future was dropped mid-flight.
struct RollbackGuard {
    unit_of_work: Arc<UnitOfWork>,
    armed: bool,
}

impl RollbackGuard {
    fn new(unit_of_work: Arc<UnitOfWork>) -> Self {
        Self {
            unit_of_work,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let unit_of_work = self.unit_of_work.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(unit_of_work = %unit_of_work.id(), "unit of work abandoned, rolling back");
                runtime.spawn(async move {
                    match unit_of_work.rollback().await {
                        Ok(()) | Err(UnitOfWorkError::Finished { .. }) => {}
                        Err(e) => {
                            warn!(unit_of_work = %unit_of_work.id(), error = %e, "rollback of abandoned unit of work failed")
                        }
                    }
                });
            }
            Err(_) => {
                warn!(unit_of_work = %unit_of_work.id(), "unit of work abandoned outside a runtime, resources left to their own drop handling");
            }
        }
    }
}
