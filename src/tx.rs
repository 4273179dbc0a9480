use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::AppResult;

/// One transaction scoped to one use-case.
///
/// `finish` is the only place the commit/rollback decision is made. A unit of
/// work that is dropped without `finish` drops its transaction handle, which
/// for Postgres rolls it back.
pub struct UnitOfWork<'a, D: Database> {
    db: &'a D,
    tx: D::Tx,
    use_case: &'static str,
}

impl<'a, D: Database> UnitOfWork<'a, D> {
    pub async fn begin(db: &'a D, use_case: &'static str) -> AppResult<Self> {
        let tx = db.begin().await.map_err(|e| {
            error!(use_case, error = %e, "failed to start transaction");
            e
        })?;
        debug!(use_case, "transaction started");
        Ok(Self { db, tx, use_case })
    }

    pub fn tx(&mut self) -> &mut D::Tx {
        &mut self.tx
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// A rollback failure is logged and the use-case error is returned as-is.
    /// A commit failure replaces the `Ok` value since the work did not land.
    pub async fn finish<T>(self, result: AppResult<T>) -> AppResult<T> {
        let Self { db, tx, use_case } = self;
        match result {
            Ok(value) => match db.commit(tx).await {
                Ok(()) => {
                    info!(use_case, "transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    error!(use_case, error = %e, "transaction commit failed");
                    Err(e)
                }
            },
            Err(err) => {
                match db.rollback(tx).await {
                    Ok(()) => warn!(use_case, error = %err, "transaction rolled back"),
                    Err(e) => {
                        error!(use_case, error = %e, cause = %err, "transaction rollback failed")
                    }
                }
                Err(err)
            }
        }
    }
}
