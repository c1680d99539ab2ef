use async_trait::async_trait;
use std::sync::Arc;

use crate::core::domain::context::Context;
use crate::core::domain::entity::user::user::UnvalidatedCreateUserInput;
use crate::core::domain::entity::user::{User, UserCommand};
use crate::core::domain::transaction_manager::TransactionManager;
use crate::core::domain::transaction_operation::{
    BoxedTransactionOperation, TransactionOperationError,
};

use crate::core::port::create_user::{
    CreateUserError, CreateUserInputBoundary, CreateUserOutputBoundary,
};

pub struct InsertUserOperation {
    user: User,
    user_repository: Arc<dyn UserCommand>,
}

impl InsertUserOperation {
    pub fn new(user: User, user_repository: Arc<dyn UserCommand>) -> Self {
        Self {
            user,
            user_repository,
        }
    }
}

#[async_trait]
impl BoxedTransactionOperation for InsertUserOperation {
    async fn execute(&self, ctx: &Context) -> Result<(), TransactionOperationError> {
        self.user_repository.insert(ctx, self.user.clone()).await?;
        Ok(())
    }
}

pub struct CreateUserUseCase {
    repository: Arc<dyn UserCommand>,
    transaction_manager: Arc<dyn TransactionManager>,
}

impl CreateUserUseCase {
    pub fn new(
        repository: Arc<dyn UserCommand>,
        transaction_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            repository,
            transaction_manager,
        }
    }
}

#[async_trait]
impl CreateUserInputBoundary for CreateUserUseCase {
    async fn execute(
        &self,
        ctx: &Context,
        input: UnvalidatedCreateUserInput,
        output_boundary: &mut dyn CreateUserOutputBoundary,
    ) -> Result<(), CreateUserError> {
        let user = User::try_from(input)?;
        let id = user.id;
        let operation = Box::new(InsertUserOperation::new(user, self.repository.clone()));
        // Joins the caller's unit of work when one is bound on `ctx`.
        self.transaction_manager.execute(ctx, operation).await?;

        output_boundary.execute(id)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::resource::{ResourceKey, ResourceRegistry};
    use crate::core::domain::transaction_manager::{ManagerConfig, UnitOfWorkManager};
    use crate::core::port::create_user::CreateUserOutputError;
    use crate::core::testing::{MemoryUserCommand, RecordingResource};

    #[derive(Default)]
    struct Output(Option<i32>);

    impl CreateUserOutputBoundary for Output {
        fn execute(&mut self, output: i32) -> Result<(), CreateUserOutputError> {
            self.0 = Some(output);
            Ok(())
        }
    }

    fn setup() -> (RecordingResource, Arc<MemoryUserCommand>, Arc<UnitOfWorkManager>) {
        let db = RecordingResource::new();
        let key = ResourceKey::new("pg", "default");
        let mut registry = ResourceRegistry::new();
        registry.register(key.clone(), db.clone().into_arc()).unwrap();
        let manager = Arc::new(UnitOfWorkManager::new(Arc::new(registry), ManagerConfig::default()));
        let users = Arc::new(MemoryUserCommand::new(key, &db));
        (db, users, manager)
    }

    fn input(id: i32) -> UnvalidatedCreateUserInput {
        UnvalidatedCreateUserInput {
            id,
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_user_in_its_own_unit_of_work() {
        let (db, users, manager) = setup();
        let use_case = CreateUserUseCase::new(users.clone(), manager);
        let mut output = Output::default();

        use_case
            .execute(&Context::new(), input(7), &mut output)
            .await
            .unwrap();

        assert_eq!(output.0, Some(7));
        assert!(users.contains(7));
        assert_eq!((db.begins(), db.commits()), (1, 1));
    }

    #[tokio::test]
    async fn joins_an_enclosing_unit_of_work() {
        let (db, users, manager) = setup();
        let use_case = CreateUserUseCase::new(users.clone(), manager.clone());

        manager
            .with_new(&Context::new(), None, |ctx| async move {
                let mut output = Output::default();
                use_case
                    .execute(&ctx, input(1), &mut output)
                    .await
                    .map_err(anyhow::Error::from)?;
                use_case
                    .execute(&ctx, input(2), &mut output)
                    .await
                    .map_err(anyhow::Error::from)?;
                Ok::<_, TransactionOperationError>(())
            })
            .await
            .unwrap();

        assert_eq!(db.begins(), 1);
        assert_eq!(db.commits(), 1);
        assert_eq!(db.savepoints(), 2);
        assert!(users.contains(1) && users.contains(2));
    }

    #[tokio::test]
    async fn duplicate_user_rolls_back() {
        let (db, users, manager) = setup();
        let use_case = CreateUserUseCase::new(users.clone(), manager);
        let mut output = Output::default();
        use_case
            .execute(&Context::new(), input(3), &mut output)
            .await
            .unwrap();

        let err = use_case
            .execute(&Context::new(), input(3), &mut Output::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CreateUserError::TransactionError(_)));
        assert_eq!(db.rollbacks(), 1);
        assert!(users.contains(3));
    }

    #[tokio::test]
    async fn invalid_input_never_opens_a_transaction() {
        let (db, users, manager) = setup();
        let use_case = CreateUserUseCase::new(users, manager);
        let mut bad = input(4);
        bad.email = "nope".to_string();

        let err = use_case
            .execute(&Context::new(), bad, &mut Output::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CreateUserError::ValidationError(_)));
        assert_eq!(db.begins(), 0);
    }
}
