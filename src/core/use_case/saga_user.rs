use async_trait::async_trait;
use std::sync::Arc;

use crate::core::domain::barrier::{BarrierOutcome, BranchBarrier};
use crate::core::domain::context::Context;
use crate::core::domain::entity::user::user::UnvalidatedCreateUserInput;
use crate::core::domain::entity::user::{User, UserCommand};
use crate::core::domain::resource::ResourceKey;
use crate::core::domain::transaction_manager::UnitOfWorkManager;
use crate::core::domain::transaction_operation::TransactionOperationError;
use crate::core::port::saga_user::{SagaUserError, SagaUserInputBoundary};

/// Runs user writes behind a branch barrier stored on `barrier_key`, so the
/// barrier rows and the user rows commit in the same transaction.
pub struct SagaUserUseCase {
    repository: Arc<dyn UserCommand>,
    manager: Arc<UnitOfWorkManager>,
    barrier_key: ResourceKey,
}

impl SagaUserUseCase {
    pub fn new(
        repository: Arc<dyn UserCommand>,
        manager: Arc<UnitOfWorkManager>,
        barrier_key: ResourceKey,
    ) -> Self {
        Self {
            repository,
            manager,
            barrier_key,
        }
    }
}

#[async_trait]
impl SagaUserInputBoundary for SagaUserUseCase {
    async fn action(
        &self,
        ctx: &Context,
        mut barrier: BranchBarrier,
        input: UnvalidatedCreateUserInput,
    ) -> Result<BarrierOutcome, SagaUserError> {
        let user = User::try_from(input)?;
        let repository = self.repository.clone();
        let outcome = barrier
            .call(ctx, &self.manager, &self.barrier_key, |ctx| async move {
                repository.insert(&ctx, user).await?;
                Ok::<_, TransactionOperationError>(())
            })
            .await?;
        Ok(outcome)
    }

    async fn compensate(
        &self,
        ctx: &Context,
        mut barrier: BranchBarrier,
        id: i32,
    ) -> Result<BarrierOutcome, SagaUserError> {
        let repository = self.repository.clone();
        let outcome = barrier
            .call(ctx, &self.manager, &self.barrier_key, |ctx| async move {
                repository.delete(&ctx, id).await?;
                Ok::<_, TransactionOperationError>(())
            })
            .await?;
        Ok(outcome)
    }
}
