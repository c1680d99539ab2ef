//! Test doubles for transactional resources.
//!
//! A [`RecordingResource`] keeps committed rows per table and buffers every
//! write of an open transaction until commit, so tests can observe what a
//! rollback (or a savepoint rollback) discarded.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::core::domain::barrier::DEFAULT_BARRIER_TABLE;
use crate::core::domain::command::CommandError;
use crate::core::domain::context::Context;
use crate::core::domain::entity::user::{User, UserCommand};
use crate::core::domain::resource::ResourceKey;
use crate::core::domain::transaction::{
    ToSql, TransactionError, TransactionHandle, TransactionOptions, TransactionalResource,
};

// Rows are unique on their leading values, as the barrier table's unique key is.
const KEY_COLUMNS: usize = 5;

type Row = Vec<String>;

#[derive(Debug, Clone)]
enum Write {
    Insert(String, Row),
    Delete(String, Row),
}

#[derive(Default)]
pub struct MemoryTables {
    rows: Mutex<HashMap<String, HashSet<Row>>>,
}

impl MemoryTables {
    pub fn contains(&self, table: &str, key: &[&str]) -> bool {
        let key: Row = key.iter().map(|v| v.to_string()).collect();
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .is_some_and(|rows| rows.contains(&key))
    }

    pub fn len(&self, table: &str) -> usize {
        self.rows.lock().unwrap().get(table).map_or(0, HashSet::len)
    }

    fn apply(&self, writes: Vec<Write>) {
        let mut rows = self.rows.lock().unwrap();
        for write in writes {
            match write {
                Write::Insert(table, row) => {
                    rows.entry(table).or_default().insert(row);
                }
                Write::Delete(table, row) => {
                    if let Some(rows) = rows.get_mut(&table) {
                        rows.remove(&row);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct State {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    executions: AtomicUsize,
    savepoints: AtomicUsize,
    savepoint_rollbacks: AtomicUsize,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    fail_execute: AtomicBool,
    no_savepoints: AtomicBool,
    last_options: Mutex<Option<TransactionOptions>>,
    tables: Arc<MemoryTables>,
    rolled_back: Notify,
}

#[derive(Clone, Default)]
pub struct RecordingResource {
    state: Arc<State>,
}

impl RecordingResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_arc(self) -> Arc<dyn TransactionalResource> {
        Arc::new(self)
    }

    pub fn fail_begin(self) -> Self {
        self.state.fail_begin.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_commit(self) -> Self {
        self.state.fail_commit.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_rollback(self) -> Self {
        self.state.fail_rollback.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_execute(self) -> Self {
        self.state.fail_execute.store(true, Ordering::SeqCst);
        self
    }

    /// Handles report no savepoint support, like a cache or queue client.
    pub fn without_savepoints(self) -> Self {
        self.state.no_savepoints.store(true, Ordering::SeqCst);
        self
    }

    pub fn begins(&self) -> usize {
        self.state.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.state.executions.load(Ordering::SeqCst)
    }

    pub fn savepoints(&self) -> usize {
        self.state.savepoints.load(Ordering::SeqCst)
    }

    pub fn savepoint_rollbacks(&self) -> usize {
        self.state.savepoint_rollbacks.load(Ordering::SeqCst)
    }

    /// Resolves once a transaction on this resource has been rolled back.
    pub async fn rolled_back(&self) {
        self.state.rolled_back.notified().await
    }

    pub fn last_options(&self) -> Option<TransactionOptions> {
        self.state.last_options.lock().unwrap().clone()
    }

    pub fn tables(&self) -> Arc<MemoryTables> {
        self.state.tables.clone()
    }

    pub fn has_barrier(&self, trans_type: &str, gid: &str, branch_id: &str, op: &str, barrier_id: &str) -> bool {
        self.state
            .tables
            .contains(DEFAULT_BARRIER_TABLE, &[trans_type, gid, branch_id, op, barrier_id])
    }

    pub fn barrier_rows(&self) -> usize {
        self.state.tables.len(DEFAULT_BARRIER_TABLE)
    }
}

#[async_trait]
impl TransactionalResource for RecordingResource {
    async fn begin(
        &self,
        _ctx: &Context,
        options: &TransactionOptions,
    ) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        self.state.begins.fetch_add(1, Ordering::SeqCst);
        *self.state.last_options.lock().unwrap() = Some(options.clone());
        if self.state.fail_begin.load(Ordering::SeqCst) {
            return Err(TransactionError::ConnectionError("pool exhausted".to_string()));
        }
        Ok(Arc::new(RecordingHandle {
            session: Session {
                state: self.state.clone(),
                pending: Arc::new(Mutex::new(Vec::new())),
            },
        }))
    }
}

#[derive(Clone)]
struct Session {
    state: Arc<State>,
    pending: Arc<Mutex<Vec<Write>>>,
}

impl Session {
    fn execute(&self, query: &str, params: &[Box<dyn ToSql>]) -> Result<u64, TransactionError> {
        self.state.executions.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(TransactionError::ExecutionError("deadlock detected".to_string()));
        }

        let values: Row = params
            .iter()
            .filter_map(|p| p.as_string().or_else(|| p.as_i32().map(|v| v.to_string())))
            .collect();
        let sql = query.trim().to_ascii_lowercase();
        let words: Vec<&str> = sql.split_whitespace().collect();

        match words.as_slice() {
            ["insert", "into", target, ..] | ["insert", "ignore", "into", target, ..] => {
                let table = table_name(target);
                let key: Row = values.into_iter().take(KEY_COLUMNS).collect();
                if self.visible(&table, &key) {
                    return Ok(0);
                }
                self.pending.lock().unwrap().push(Write::Insert(table, key));
                Ok(1)
            }
            ["delete", "from", target, ..] => {
                let table = table_name(target);
                if !self.visible(&table, &values) {
                    return Ok(0);
                }
                self.pending.lock().unwrap().push(Write::Delete(table, values));
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn visible(&self, table: &str, key: &Row) -> bool {
        let mut present = self
            .state
            .tables
            .rows
            .lock()
            .unwrap()
            .get(table)
            .is_some_and(|rows| rows.contains(key));
        for write in self.pending.lock().unwrap().iter() {
            match write {
                Write::Insert(t, row) if t == table && row == key => present = true,
                Write::Delete(t, row) if t == table && row == key => present = false,
                _ => {}
            }
        }
        present
    }

    fn savepoint(&self) -> Option<Arc<dyn TransactionHandle>> {
        if self.state.no_savepoints.load(Ordering::SeqCst) {
            return None;
        }
        self.state.savepoints.fetch_add(1, Ordering::SeqCst);
        let mark = self.pending.lock().unwrap().len();
        Some(Arc::new(RecordingSavepoint {
            session: self.clone(),
            mark,
        }))
    }
}

fn table_name(target: &str) -> String {
    target.split('(').next().unwrap_or_default().to_string()
}

struct RecordingHandle {
    session: Session,
}

#[async_trait]
impl TransactionHandle for RecordingHandle {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        self.session.execute(query, &params)
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        let state = &self.session.state;
        state.commits.fetch_add(1, Ordering::SeqCst);
        if state.fail_commit.load(Ordering::SeqCst) {
            return Err(TransactionError::CommitError("connection reset".to_string()));
        }
        let pending = std::mem::take(&mut *self.session.pending.lock().unwrap());
        state.tables.apply(pending);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        let state = &self.session.state;
        state.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.session.pending.lock().unwrap().clear();
        state.rolled_back.notify_one();
        if state.fail_rollback.load(Ordering::SeqCst) {
            return Err(TransactionError::RollbackError("connection reset".to_string()));
        }
        Ok(())
    }

    async fn savepoint(
        &self,
        _name: &str,
    ) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
        Ok(self.session.savepoint())
    }
}

/// Rolling back drops the writes buffered since the savepoint was marked.
struct RecordingSavepoint {
    session: Session,
    mark: usize,
}

#[async_trait]
impl TransactionHandle for RecordingSavepoint {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        self.session.execute(query, &params)
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        self.session
            .state
            .savepoint_rollbacks
            .fetch_add(1, Ordering::SeqCst);
        self.session.pending.lock().unwrap().truncate(self.mark);
        Ok(())
    }

    async fn savepoint(
        &self,
        _name: &str,
    ) -> Result<Option<Arc<dyn TransactionHandle>>, TransactionError> {
        Ok(self.session.savepoint())
    }
}

/// Users kept as rows of the `users` table of a [`RecordingResource`], written
/// through the ambient unit of work so they commit and roll back with it.
pub struct MemoryUserCommand {
    key: ResourceKey,
    tables: Arc<MemoryTables>,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryUserCommand {
    pub fn new(key: ResourceKey, db: &RecordingResource) -> Self {
        Self {
            key,
            tables: db.tables(),
            inserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn contains(&self, id: i32) -> bool {
        self.tables.contains("users", &[&id.to_string()])
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserCommand for MemoryUserCommand {
    async fn insert(&self, ctx: &Context, user: User) -> Result<(), CommandError> {
        let transaction = ctx.get_tx_db(&self.key).await?;
        let affected = transaction
            .execute(
                "INSERT INTO users (id) VALUES ($1)",
                vec![Box::new(user.id) as Box<dyn ToSql>],
            )
            .await
            .map_err(|e| CommandError::DatabaseError(e.to_string()))?;
        if affected == 0 {
            return Err(CommandError::user_already_exists(user.id));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, id: i32) -> Result<(), CommandError> {
        let transaction = ctx.get_tx_db(&self.key).await?;
        let affected = transaction
            .execute(
                "DELETE FROM users WHERE id = $1",
                vec![Box::new(id) as Box<dyn ToSql>],
            )
            .await
            .map_err(|e| CommandError::DatabaseError(e.to_string()))?;
        if affected == 0 {
            return Err(CommandError::user_not_found(id));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
