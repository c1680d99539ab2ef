/// Default barrier table, `schema.table`.
pub const DEFAULT_BARRIER_TABLE: &str = "dtm_barrier.barrier";

const BARRIER_COLUMNS: &str = "(trans_type, gid, branch_id, op, barrier_id, reason)";

/// SQL flavour used to build the insert-ignore statement for barrier rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarrierDialect {
    #[default]
    Postgres,
    Mysql,
}

impl BarrierDialect {
    /// Insert that affects zero rows when the barrier key already exists.
    pub fn insert_ignore(&self, table: &str) -> String {
        match self {
            BarrierDialect::Postgres => format!(
                "insert into {table}{BARRIER_COLUMNS} values($1,$2,$3,$4,$5,$6) on conflict ON CONSTRAINT uniq_barrier do nothing"
            ),
            BarrierDialect::Mysql => {
                format!("insert ignore into {table}{BARRIER_COLUMNS} values(?,?,?,?,?,?)")
            }
        }
    }
}

impl std::str::FromStr for BarrierDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BarrierDialect::Postgres),
            "mysql" => Ok(BarrierDialect::Mysql),
            other => Err(format!("unsupported barrier dialect: {other}")),
        }
    }
}
