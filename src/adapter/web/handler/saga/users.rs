use axum::http::StatusCode;
use std::sync::Arc;

use crate::core::domain::barrier::{BarrierDialect, BarrierOp};
use crate::core::domain::context::Context;
use crate::core::domain::entity::user::user::UnvalidatedCreateUserInput;
use crate::core::port::saga_user::{SagaUserError, SagaUserInputBoundary};

use crate::adapter::web::dto::branch_query::BranchQuery;
use crate::adapter::web::dto::create_user_web_input::{CreateUserWebInput, UserIdWebInput};
use crate::adapter::web::presenter::saga_user::SagaUserPresenter;

pub struct SagaUserHandler {
    use_case: Arc<dyn SagaUserInputBoundary>,
    dialect: BarrierDialect,
    table: String,
}

impl SagaUserHandler {
    pub fn new(
        use_case: Arc<dyn SagaUserInputBoundary>,
        dialect: BarrierDialect,
        table: impl Into<String>,
    ) -> Self {
        Self {
            use_case,
            dialect,
            table: table.into(),
        }
    }

    pub async fn action(
        &self,
        ctx: &Context,
        query: BranchQuery,
        user: CreateUserWebInput,
    ) -> Result<StatusCode, (StatusCode, String)> {
        let result = match query.into_barrier(BarrierOp::Action, self.dialect, &self.table) {
            Ok(barrier) => {
                self.use_case
                    .action(ctx, barrier, UnvalidatedCreateUserInput::from(user))
                    .await
            }
            Err(e) => Err(SagaUserError::from(e)),
        };
        SagaUserPresenter::present(result)
    }

    pub async fn compensate(
        &self,
        ctx: &Context,
        query: BranchQuery,
        user: UserIdWebInput,
    ) -> Result<StatusCode, (StatusCode, String)> {
        let result = match query.into_barrier(BarrierOp::Compensate, self.dialect, &self.table) {
            Ok(barrier) => self.use_case.compensate(ctx, barrier, user.id).await,
            Err(e) => Err(SagaUserError::from(e)),
        };
        SagaUserPresenter::present(result)
    }
}
