use axum::http::StatusCode;
use tracing::{info, warn};

use crate::core::domain::barrier::{BarrierError, BarrierOutcome};
use crate::core::domain::command::CommandError;
use crate::core::domain::transaction_manager::TransactionManagerError;
use crate::core::domain::transaction_operation::TransactionOperationError;
use crate::core::port::saga_user::SagaUserError;

/// Maps branch results onto the status codes a saga coordinator acts on:
/// 200 to move on, 409 to abort the global transaction, anything else to retry.
pub struct SagaUserPresenter;

impl SagaUserPresenter {
    pub fn present(
        result: Result<BarrierOutcome, SagaUserError>,
    ) -> Result<StatusCode, (StatusCode, String)> {
        match result {
            Ok(outcome) => {
                if outcome != BarrierOutcome::Executed {
                    info!(?outcome, "branch call skipped");
                }
                Ok(StatusCode::OK)
            }
            Err(SagaUserError::ValidationError(e)) => Err((StatusCode::CONFLICT, e.to_string())),
            Err(SagaUserError::BarrierError(BarrierError::Duplicated)) => {
                Err((StatusCode::CONFLICT, BarrierError::Duplicated.to_string()))
            }
            Err(SagaUserError::BarrierError(e @ BarrierError::InvalidQuery(_))) => {
                Err((StatusCode::BAD_REQUEST, e.to_string()))
            }
            Err(e) if rejected_by_command(&e) => Err((StatusCode::CONFLICT, e.to_string())),
            Err(e) => {
                warn!(error = %e, "branch call failed");
                Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        }
    }
}

// Retrying cannot change these outcomes.
fn rejected_by_command(error: &SagaUserError) -> bool {
    matches!(
        error,
        SagaUserError::BarrierError(BarrierError::TransactionManagerError(
            TransactionManagerError::OperationError(TransactionOperationError::CommandError(
                CommandError::AlreadyExists { .. } | CommandError::NotFound { .. }
            ))
        ))
    )
}
