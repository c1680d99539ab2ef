//! Unit of work coordination across heterogeneous transactional resources,
//! plus an idempotent branch barrier for saga / TCC / workflow transactions.

pub mod adapter;
pub mod core;
pub mod error;

pub use crate::core::domain::barrier::{BarrierDialect, BarrierError, BarrierOp, BarrierOutcome, BranchBarrier};
pub use crate::core::domain::context::Context;
pub use crate::core::domain::resource::{ResourceKey, ResourceRegistry, Resolver};
pub use crate::core::domain::transaction::{TransactionHandle, TransactionOptions, TransactionalResource};
pub use crate::core::domain::transaction_manager::{ManagerConfig, TransactionManager, UnitOfWorkManager};
pub use crate::core::domain::unit_of_work::UnitOfWork;
