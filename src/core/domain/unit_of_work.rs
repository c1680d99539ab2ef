//! Lazily opened, scope-owned set of transactions.
//!
//! A [`UnitOfWork`] opens at most one transaction per formatted resource key
//! and finishes all of them together. A unit of work created inside another
//! one (a nested scope) never begins a transaction itself: lookups go up the
//! parent chain, so the whole chain shares one physical transaction per key
//! and only the owner commits it. Where the resource supports savepoints the
//! nested scope keeps a savepoint on the shared transaction, so its rollback
//! undoes only its own writes.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::domain::context::Context;
use crate::core::domain::resource::{KeyFormatter, ResolveError, ResourceKey, Resolver};
use crate::core::domain::transaction::{TransactionError, TransactionHandle, TransactionOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkStatus {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for UnitOfWorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOfWorkStatus::Open => f.write_str("open"),
            UnitOfWorkStatus::Committed => f.write_str("committed"),
            UnitOfWorkStatus::RolledBack => f.write_str("rolled back"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to begin transaction on {key}: {source}")]
    Begin {
        key: String,
        #[source]
        source: TransactionError,
    },

    #[error("Failed to commit transaction on {key}: {source}")]
    Commit {
        key: String,
        #[source]
        source: TransactionError,
    },

    #[error("Failed to roll back transactions: {}", .failures.join("; "))]
    Rollback { failures: Vec<String> },

    #[error("Unit of work {id} is already {status}")]
    Finished { id: Uuid, status: UnitOfWorkStatus },

    #[error("No unit of work bound on the current context")]
    Missing,

    #[error("Operation cancelled")]
    Cancelled,
}

struct Inner {
    status: UnitOfWorkStatus,
    // Kept in open order so commit and rollback walk resources the way they were acquired.
    resources: Vec<(String, Arc<dyn TransactionHandle>)>,
}

impl Inner {
    fn find(&self, key: &str) -> Option<Arc<dyn TransactionHandle>> {
        self.resources
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, handle)| handle.clone())
    }
}

pub struct UnitOfWork {
    id: Uuid,
    parent: Option<Arc<UnitOfWork>>,
    resolver: Arc<dyn Resolver>,
    formatter: KeyFormatter,
    options: TransactionOptions,
    inner: Mutex<Inner>,
}

impl UnitOfWork {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        formatter: KeyFormatter,
        options: TransactionOptions,
        parent: Option<Arc<UnitOfWork>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent,
            resolver,
            formatter,
            options,
            inner: Mutex::new(Inner {
                status: UnitOfWorkStatus::Open,
                resources: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<UnitOfWork>> {
        self.parent.as_ref()
    }

    /// Savepoint name used when this unit of work is nested.
    pub fn savepoint_name(&self) -> String {
        format!("sp_{}", self.id.simple())
    }

    pub async fn status(&self) -> UnitOfWorkStatus {
        self.inner.lock().await.status
    }

    /// Number of transactions and savepoints this unit of work holds itself.
    pub async fn opened(&self) -> usize {
        self.inner.lock().await.resources.len()
    }

    /// Returns the transaction for `key`, opening it on first use.
    ///
    /// Nested units of work take the parent's transaction and keep a savepoint
    /// on it when the resource offers one; otherwise they return the parent's
    /// handle without caching it.
    pub fn get_tx_db<'a>(
        &'a self,
        ctx: &'a Context,
        key: &'a ResourceKey,
    ) -> BoxFuture<'a, Result<Arc<dyn TransactionHandle>, UnitOfWorkError>> {
        async move {
            let formatted = (self.formatter)(key.parts());
            let mut inner = self.inner.lock().await;
            self.ensure_open(&inner)?;

            if let Some(handle) = inner.find(&formatted) {
                return Ok(handle);
            }

            if let Some(parent) = &self.parent {
                let shared = parent.get_tx_db(ctx, key).await?;
                let savepoint = shared
                    .savepoint(&self.savepoint_name())
                    .await
                    .map_err(|source| UnitOfWorkError::Begin {
                        key: formatted.clone(),
                        source,
                    })?;
                return match savepoint {
                    Some(savepoint) => {
                        debug!(unit_of_work = %self.id, parent = %parent.id, key = %formatted, "opened savepoint");
                        inner.resources.push((formatted, savepoint.clone()));
                        Ok(savepoint)
                    }
                    None => {
                        debug!(unit_of_work = %self.id, parent = %parent.id, key = %formatted, "delegating to parent unit of work");
                        Ok(shared)
                    }
                };
            }

            if ctx.is_cancelled() {
                return Err(UnitOfWorkError::Cancelled);
            }

            let resource = self.resolver.resolve(ctx, key)?;
            let handle = resource
                .begin(ctx, &self.options)
                .await
                .map_err(|source| UnitOfWorkError::Begin {
                    key: formatted.clone(),
                    source,
                })?;
            debug!(unit_of_work = %self.id, key = %formatted, "opened transaction");
            inner.resources.push((formatted, handle.clone()));
            Ok(handle)
        }
        .boxed()
    }

    /// Commits every transaction this unit of work owns.
    ///
    /// Stops at the first failure: transactions after it are left
    /// uncommitted and dropped. Resources are independent, so there is no
    /// atomicity across them.
    pub async fn commit(&self) -> Result<(), UnitOfWorkError> {
        let mut inner = self.inner.lock().await;
        self.ensure_open(&inner)?;
        inner.status = UnitOfWorkStatus::Committed;
        let resources = std::mem::take(&mut inner.resources);

        debug!(unit_of_work = %self.id, resources = resources.len(), "committing");
        for (key, handle) in resources {
            handle
                .commit()
                .await
                .map_err(|source| UnitOfWorkError::Commit { key, source })?;
        }
        Ok(())
    }

    /// Rolls back every transaction this unit of work owns, attempting all of
    /// them and reporting every failure together.
    pub async fn rollback(&self) -> Result<(), UnitOfWorkError> {
        let mut inner = self.inner.lock().await;
        self.ensure_open(&inner)?;
        inner.status = UnitOfWorkStatus::RolledBack;
        let resources = std::mem::take(&mut inner.resources);

        debug!(unit_of_work = %self.id, resources = resources.len(), "rolling back");
        let mut failures = Vec::new();
        for (key, handle) in resources {
            if let Err(e) = handle.rollback().await {
                warn!(unit_of_work = %self.id, key = %key, error = %e, "rollback failed");
                failures.push(format!("{key}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(UnitOfWorkError::Rollback { failures })
        }
    }

    fn ensure_open(&self, inner: &Inner) -> Result<(), UnitOfWorkError> {
        match inner.status {
            UnitOfWorkStatus::Open => Ok(()),
            status => Err(UnitOfWorkError::Finished {
                id: self.id,
                status,
            }),
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
