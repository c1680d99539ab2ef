use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::adapter::config::AppConfig;
use crate::adapter::store::pg::command::user::PgUserRepository;
use crate::adapter::store::pg::resource::PgResource;
use crate::adapter::web::app_state::AppState;
use crate::core::domain::entity::user::UserCommand;
use crate::core::domain::resource::{RegistryError, ResourceKey, ResourceRegistry};
use crate::core::domain::transaction_manager::{ManagerConfig, UnitOfWorkManager};
use crate::core::use_case::create_user::CreateUserUseCase;
use crate::core::use_case::saga_user::SagaUserUseCase;

/// Key the application database is registered under.
pub fn default_db_key() -> ResourceKey {
    ResourceKey::new("pg", "default")
}

pub struct AppInitializer;

impl AppInitializer {
    pub async fn initialize(config: AppConfig) -> Result<Arc<AppState>, AppInitializerError> {
        let pool = PgPool::connect(config.db_url())
            .await
            .map_err(|e| AppInitializerError::DatabaseInitError(e.to_string()))?;
        info!("connected to database");

        let mut registry = ResourceRegistry::new();
        registry.register(default_db_key(), Arc::new(PgResource::new(pool)))?;
        let repository = Arc::new(PgUserRepository::new(default_db_key()));

        Ok(Self::assemble(&config, registry, repository))
    }

    /// Wires use cases on top of already registered resources.
    pub fn assemble(
        config: &AppConfig,
        registry: ResourceRegistry,
        repository: Arc<dyn UserCommand>,
    ) -> Arc<AppState> {
        let manager = Arc::new(UnitOfWorkManager::new(
            Arc::new(registry),
            ManagerConfig {
                support_nested_transaction: config.nested_transactions(),
                ..ManagerConfig::default()
            },
        ));
        let create_user_use_case = Arc::new(CreateUserUseCase::new(
            repository.clone(),
            manager.clone(),
        ));
        let saga_user_use_case = Arc::new(SagaUserUseCase::new(
            repository,
            manager.clone(),
            default_db_key(),
        ));

        Arc::new(AppState {
            manager,
            create_user_use_case,
            saga_user_use_case,
            barrier_dialect: config.barrier_dialect(),
            barrier_table: config.barrier_table().to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum AppInitializerError {
    #[error("Failed to initialize database: {0}")]
    DatabaseInitError(String),
    #[error(transparent)]
    RegistryError(#[from] RegistryError),
}
