//! Request-scoped carrier for the active unit of work.
//!
//! A [`Context`] is immutable: binding a unit of work produces a new value and
//! leaves the original untouched, so copies can be handed to concurrent tasks.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::domain::resource::ResourceKey;
use crate::core::domain::transaction::TransactionHandle;
use crate::core::domain::unit_of_work::{UnitOfWork, UnitOfWorkError};

#[derive(Clone, Default)]
pub struct Context {
    unit_of_work: Option<Arc<UnitOfWork>>,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root context that observes `token` for cancellation.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            unit_of_work: None,
            cancellation: token,
        }
    }

    /// Derives a context that resolves to `unit_of_work`.
    pub fn with_unit_of_work(&self, unit_of_work: Arc<UnitOfWork>) -> Self {
        Self {
            unit_of_work: Some(unit_of_work),
            cancellation: self.cancellation.clone(),
        }
    }

    pub fn unit_of_work(&self) -> Option<Arc<UnitOfWork>> {
        self.unit_of_work.clone()
    }

    pub fn require_unit_of_work(&self) -> Result<Arc<UnitOfWork>, UnitOfWorkError> {
        self.unit_of_work.clone().ok_or(UnitOfWorkError::Missing)
    }

    /// Opens (or reuses) the transaction for `key` on the ambient unit of work.
    pub async fn get_tx_db(
        &self,
        key: &ResourceKey,
    ) -> Result<Arc<dyn TransactionHandle>, UnitOfWorkError> {
        let unit_of_work = self.require_unit_of_work()?;
        unit_of_work.get_tx_db(self, key).await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("unit_of_work", &self.unit_of_work.as_ref().map(|u| u.id()))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
