//! Transaction guard
//!
//! Wraps any [`SqlExecutor`] in `BEGIN` / `COMMIT`. A transaction that is
//! dropped without being committed issues `ROLLBACK`, so an early `?` return
//! leaves the database exactly as it was before `begin`.

use crate::executor::{ExecutorError, PlaceholderStyle, SqlExecutor, SqlRow, SqlValue};

/// A database transaction
///
/// All statements routed through the transaction are either committed together
/// or rolled back together. The transaction itself implements [`SqlExecutor`],
/// so code that only needs an executor does not care whether it runs inside one.
///
/// # Examples
///
/// ```no_run
/// # use migrator::executor::{ExecutorError, SqlExecutor};
/// # use migrator::transaction::Transaction;
/// # fn example(executor: &dyn SqlExecutor) -> Result<(), ExecutorError> {
/// let transaction = Transaction::begin(executor)?;
/// transaction.batch_execute("CREATE TABLE users (id BIGINT PRIMARY KEY)")?;
/// transaction.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'a> {
    executor: &'a dyn SqlExecutor,
    closed: bool,
}

impl<'a> Transaction<'a> {
    /// Start a new transaction on `executor`
    pub fn begin(executor: &'a dyn SqlExecutor) -> Result<Self, ExecutorError> {
        executor.batch_execute("BEGIN")?;
        log::debug!("transaction started");
        Ok(Self {
            executor,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// A failed `COMMIT` can leave the transaction open (SQLite does this for
    /// deferred constraint violations); the guard then still rolls back on drop.
    pub fn commit(mut self) -> Result<(), ExecutorError> {
        self.executor.batch_execute("COMMIT")?;
        self.closed = true;
        log::debug!("transaction committed");
        Ok(())
    }

    /// Roll the transaction back explicitly
    pub fn rollback(mut self) -> Result<(), ExecutorError> {
        self.closed = true;
        self.executor.batch_execute("ROLLBACK")?;
        log::debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            // Errors cannot be propagated from drop; the connection will refuse
            // further work if the rollback really failed.
            if let Err(e) = self.executor.batch_execute("ROLLBACK") {
                log::warn!("rollback on drop failed: {e}");
            } else {
                log::debug!("transaction rolled back on drop");
            }
        }
    }
}

impl SqlExecutor for Transaction<'_> {
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError> {
        self.executor.batch_execute(sql)
    }

    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError> {
        self.executor.execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError> {
        self.executor.query_all(query, params)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.executor.placeholder_style()
    }
}
