//! Idempotent execution of a single distributed-transaction branch.
//!
//! Every branch call first records two rows in a barrier table inside its own
//! unit of work: one for the forward operation it would undo (the origin) and
//! one for itself. The affected-row counts of those inserts tell apart a first
//! call, a repeated or dangling call, and a compensation whose forward action
//! never ran. The table must carry a unique key over
//! `(trans_type, gid, branch_id, op, barrier_id)`.

mod dialect;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::core::domain::context::Context;
use crate::core::domain::resource::ResourceKey;
use crate::core::domain::transaction::{ToSql, TransactionError, TransactionHandle};
use crate::core::domain::transaction_manager::{TransactionManagerError, UnitOfWorkManager};
use crate::core::domain::transaction_operation::TransactionOperationError;

pub use dialect::{BarrierDialect, DEFAULT_BARRIER_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierOp {
    Try,
    Confirm,
    Cancel,
    Action,
    Compensate,
    Rollback,
    Msg,
}

impl BarrierOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierOp::Try => "try",
            BarrierOp::Confirm => "confirm",
            BarrierOp::Cancel => "cancel",
            BarrierOp::Action => "action",
            BarrierOp::Compensate => "compensate",
            BarrierOp::Rollback => "rollback",
            BarrierOp::Msg => "msg",
        }
    }

    /// The forward operation a compensating operation undoes.
    pub fn origin(&self) -> Option<BarrierOp> {
        match self {
            BarrierOp::Cancel => Some(BarrierOp::Try),
            BarrierOp::Compensate | BarrierOp::Rollback => Some(BarrierOp::Action),
            _ => None,
        }
    }

    pub fn is_compensation(&self) -> bool {
        self.origin().is_some()
    }
}

impl fmt::Display for BarrierOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarrierOp {
    type Err = BarrierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "try" => Ok(BarrierOp::Try),
            "confirm" => Ok(BarrierOp::Confirm),
            "cancel" => Ok(BarrierOp::Cancel),
            "action" => Ok(BarrierOp::Action),
            "compensate" => Ok(BarrierOp::Compensate),
            "rollback" => Ok(BarrierOp::Rollback),
            "msg" => Ok(BarrierOp::Msg),
            other => Err(BarrierError::InvalidQuery(format!("unknown op: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    Executed,
    NullCompensation,
    Repeated,
}

#[derive(Debug, Error)]
pub enum BarrierError {
    #[error("Duplicated request")]
    Duplicated,

    #[error("Invalid barrier query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    TransactionManagerError(#[from] TransactionManagerError),
}

enum Decision {
    Duplicated,
    Done(BarrierOutcome),
}

/// Identifies one branch of a global transaction.
///
/// `barrier_id` counts calls made through this value, so several barrier
/// protected calls inside one branch get distinct rows.
#[derive(Debug, Clone)]
pub struct BranchBarrier {
    pub trans_type: String,
    pub gid: String,
    pub branch_id: String,
    pub op: BarrierOp,
    pub barrier_id: u32,
    dialect: BarrierDialect,
    table: String,
}

impl BranchBarrier {
    pub fn new(
        trans_type: impl Into<String>,
        gid: impl Into<String>,
        branch_id: impl Into<String>,
        op: BarrierOp,
    ) -> Self {
        Self {
            trans_type: trans_type.into(),
            gid: gid.into(),
            branch_id: branch_id.into(),
            op,
            barrier_id: 0,
            dialect: BarrierDialect::default(),
            table: DEFAULT_BARRIER_TABLE.to_string(),
        }
    }

    /// Builds a barrier from the identifiers a coordinator sends with a branch
    /// request. All four must be present.
    pub fn from_query(
        trans_type: &str,
        gid: &str,
        branch_id: &str,
        op: &str,
    ) -> Result<Self, BarrierError> {
        if trans_type.is_empty() || gid.is_empty() || branch_id.is_empty() || op.is_empty() {
            return Err(BarrierError::InvalidQuery(format!(
                "missing trans_type, gid, branch_id or op: trans_type={trans_type} gid={gid} branch_id={branch_id} op={op}"
            )));
        }
        Ok(Self::new(trans_type, gid, branch_id, op.parse()?))
    }

    pub fn with_dialect(mut self, dialect: BarrierDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn next_barrier_id(&mut self) -> String {
        self.barrier_id += 1;
        format!("{:02}", self.barrier_id)
    }

    /// Runs `operation` at most once for this branch call.
    ///
    /// The barrier rows and the work of `operation` share one unit of work,
    /// opened through `barrier_key`. Repeated calls and null compensations
    /// succeed without running `operation`; a repeated `msg` call fails with
    /// [`BarrierError::Duplicated`] after its bookkeeping is committed.
    pub async fn call<F, Fut>(
        &mut self,
        ctx: &Context,
        manager: &UnitOfWorkManager,
        barrier_key: &ResourceKey,
        operation: F,
    ) -> Result<BarrierOutcome, BarrierError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<(), TransactionOperationError>>,
    {
        let bid = self.next_barrier_id();
        let insert = self.dialect.insert_ignore(&self.table);
        let this = &*self;
        let unit_of_work = manager.create_new(ctx, None);

        let decision = manager
            .run(ctx, unit_of_work, |ctx| async move {
                let barrier = ctx.get_tx_db(barrier_key).await?;
                let origin_affected = match this.op.origin() {
                    Some(origin) => this.insert(&*barrier, &insert, origin, &bid).await,
                    None => Ok(0),
                };
                let current_affected = this.insert(&*barrier, &insert, this.op, &bid).await;
                debug!(
                    gid = %this.gid,
                    branch_id = %this.branch_id,
                    op = %this.op,
                    barrier_id = %bid,
                    origin_affected = ?origin_affected.as_ref().ok(),
                    current_affected = ?current_affected.as_ref().ok(),
                    "barrier inserted"
                );

                if this.op == BarrierOp::Msg && matches!(current_affected, Ok(0)) {
                    return Ok(Decision::Duplicated);
                }
                let current_affected = current_affected?;
                let origin_affected = origin_affected?;

                if this.op.is_compensation() && origin_affected > 0 {
                    return Ok(Decision::Done(BarrierOutcome::NullCompensation));
                }
                if current_affected == 0 {
                    return Ok(Decision::Done(BarrierOutcome::Repeated));
                }
                operation(ctx).await?;
                Ok::<_, TransactionOperationError>(Decision::Done(BarrierOutcome::Executed))
            })
            .await?;

        match decision {
            Decision::Duplicated => Err(BarrierError::Duplicated),
            Decision::Done(outcome) => {
                debug!(gid = %self.gid, branch_id = %self.branch_id, op = %self.op, outcome = ?outcome, "barrier finished");
                Ok(outcome)
            }
        }
    }

    async fn insert(
        &self,
        barrier: &dyn TransactionHandle,
        statement: &str,
        op: BarrierOp,
        barrier_id: &str,
    ) -> Result<u64, TransactionError> {
        let params: Vec<Box<dyn ToSql>> = vec![
            Box::new(self.trans_type.clone()),
            Box::new(self.gid.clone()),
            Box::new(self.branch_id.clone()),
            Box::new(op.as_str().to_string()),
            Box::new(barrier_id.to_string()),
            Box::new(self.op.as_str().to_string()),
        ];
        barrier.execute(statement, params).await
    }
}
