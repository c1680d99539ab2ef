use async_trait::async_trait;
use thiserror::Error;

use crate::core::domain::barrier::{BarrierError, BarrierOutcome, BranchBarrier};
use crate::core::domain::context::Context;
use crate::core::domain::entity::user::user::{
    CreateUserValidationError, UnvalidatedCreateUserInput,
};

/// User registration as a saga branch: `action` creates the user,
/// `compensate` removes it again.
#[async_trait]
pub trait SagaUserInputBoundary: Send + Sync {
    async fn action(
        &self,
        ctx: &Context,
        barrier: BranchBarrier,
        input: UnvalidatedCreateUserInput,
    ) -> Result<BarrierOutcome, SagaUserError>;

    async fn compensate(
        &self,
        ctx: &Context,
        barrier: BranchBarrier,
        id: i32,
    ) -> Result<BarrierOutcome, SagaUserError>;
}

#[derive(Debug, Error)]
pub enum SagaUserError {
    #[error(transparent)]
    ValidationError(#[from] CreateUserValidationError),

    #[error(transparent)]
    BarrierError(#[from] BarrierError),
}
