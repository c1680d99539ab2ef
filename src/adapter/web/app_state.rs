use std::sync::Arc;

use crate::core::domain::barrier::BarrierDialect;
use crate::core::domain::transaction_manager::UnitOfWorkManager;
use crate::core::port::create_user::CreateUserInputBoundary;
use crate::core::port::saga_user::SagaUserInputBoundary;

pub struct AppState {
    pub manager: Arc<UnitOfWorkManager>,
    pub create_user_use_case: Arc<dyn CreateUserInputBoundary>,
    pub saga_user_use_case: Arc<dyn SagaUserInputBoundary>,
    pub barrier_dialect: BarrierDialect,
    pub barrier_table: String,
}
