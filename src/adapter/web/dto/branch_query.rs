use serde::Deserialize;

use crate::core::domain::barrier::{BarrierDialect, BarrierError, BarrierOp, BranchBarrier};

/// Branch identifiers a coordinator appends to every branch request.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct BranchQuery {
    #[serde(default)]
    pub trans_type: String,
    #[serde(default)]
    pub gid: String,
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub op: String,
}

impl BranchQuery {
    /// Builds the barrier for a route serving `expected`; any other op is
    /// rejected.
    pub fn into_barrier(
        self,
        expected: BarrierOp,
        dialect: BarrierDialect,
        table: &str,
    ) -> Result<BranchBarrier, BarrierError> {
        let barrier =
            BranchBarrier::from_query(&self.trans_type, &self.gid, &self.branch_id, &self.op)?;
        if barrier.op != expected {
            return Err(BarrierError::InvalidQuery(format!(
                "op {} does not match route op {expected}",
                barrier.op
            )));
        }
        Ok(barrier.with_dialect(dialect).with_table(table))
    }
}
