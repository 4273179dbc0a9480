//! In-memory transactional store used by the unit tests.
//!
//! A transaction works on a private copy of the table; commit publishes the
//! copy, rollback throws it away. Faults can be injected at begin, commit,
//! rollback, or on a named repository operation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::users::repo::{not_found_email, not_found_id, UserRepository};
use crate::users::repo_types::User;

#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: BTreeMap<i64, User>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    begin: bool,
    commit: bool,
    rollback: bool,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<Table>,
    faults: Mutex<Faults>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub struct MemoryTx {
    staged: Table,
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {what} failure"))
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(&self) {
        self.shared.faults.lock().unwrap().begin = true;
    }

    pub fn fail_commit(&self) {
        self.shared.faults.lock().unwrap().commit = true;
    }

    pub fn fail_rollback(&self) {
        self.shared.faults.lock().unwrap().rollback = true;
    }

    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> usize {
        self.shared.committed.lock().unwrap().rows.len()
    }

    pub fn committed_row(&self, id: i64) -> Option<User> {
        self.shared.committed.lock().unwrap().rows.get(&id).cloned()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        if self.shared.faults.lock().unwrap().begin {
            return Err(AppError::transaction("begin")(injected("begin")));
        }
        let staged = self.shared.committed.lock().unwrap().clone();
        Ok(MemoryTx { staged })
    }

    async fn commit(&self, tx: MemoryTx) -> AppResult<()> {
        if self.shared.faults.lock().unwrap().commit {
            return Err(AppError::transaction("commit")(injected("commit")));
        }
        *self.shared.committed.lock().unwrap() = tx.staged;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> AppResult<()> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().unwrap().rollback {
            return Err(AppError::transaction("rollback")(injected("rollback")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RepoControl {
    failing_op: Option<&'static str>,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    control: Arc<Mutex<RepoControl>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation fail with a query error.
    pub fn fail_on(&self, op: &'static str) {
        self.control.lock().unwrap().failing_op = Some(op);
    }

    /// Sleep before every operation.
    pub fn delay(&self, by: Duration) {
        self.control.lock().unwrap().delay = Some(by);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: &'static str) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (failing, delay) = {
            let control = self.control.lock().unwrap();
            (control.failing_op == Some(op), control.delay)
        };
        if let Some(by) = delay {
            tokio::time::sleep(by).await;
        }
        if failing {
            return Err(AppError::query(op)(injected(op)));
        }
        Ok(())
    }
}

fn update(tx: &mut MemoryTx, id: i64, apply: impl FnOnce(&mut User)) -> AppResult<()> {
    let row = tx.staged.rows.get_mut(&id).ok_or_else(|| not_found_id(id))?;
    apply(row);
    Ok(())
}

#[async_trait]
impl UserRepository<MemoryTx> for MemoryUserRepository {
    async fn create(&self, tx: &mut MemoryTx, user: User) -> AppResult<User> {
        self.enter("create").await?;
        tx.staged.next_id += 1;
        let user = User {
            id: tx.staged.next_id,
            ..user
        };
        tx.staged.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, tx: &mut MemoryTx, id: i64) -> AppResult<User> {
        self.enter("find_by_id").await?;
        tx.staged.rows.get(&id).cloned().ok_or_else(|| not_found_id(id))
    }

    async fn find_by_email(&self, tx: &mut MemoryTx, email: &str) -> AppResult<User> {
        self.enter("find_by_email").await?;
        tx.staged
            .rows
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found_email(email))
    }

    async fn find_by_all(&self, tx: &mut MemoryTx) -> AppResult<Vec<User>> {
        self.enter("find_by_all").await?;
        Ok(tx.staged.rows.values().cloned().collect())
    }

    async fn update_username(&self, tx: &mut MemoryTx, id: i64, username: &str) -> AppResult<()> {
        self.enter("update_username").await?;
        update(tx, id, |u| u.username = username.to_string())
    }

    async fn update_email(&self, tx: &mut MemoryTx, id: i64, email: &str) -> AppResult<()> {
        self.enter("update_email").await?;
        update(tx, id, |u| u.email = email.to_string())
    }

    async fn update_password(
        &self,
        tx: &mut MemoryTx,
        id: i64,
        password_hash: &str,
    ) -> AppResult<()> {
        self.enter("update_password").await?;
        update(tx, id, |u| u.password = password_hash.to_string())
    }

    async fn delete(&self, tx: &mut MemoryTx, id: i64) -> AppResult<()> {
        self.enter("delete").await?;
        tx.staged
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found_id(id))
    }
}
