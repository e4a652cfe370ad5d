//! Periodic-commit write staging.
//!
//! Rows are written inside one open transaction that is committed every
//! `batch_size` accepted rows. Each row gets its own savepoint so a rejected
//! row is undone alone and the rest of the batch still commits.
//!
//! Staging a row and flushing the batch are separate steps: a failed
//! `stage` means that row was rejected, a failed `commit_if_full` means the
//! batch could not be written and the load cannot continue.

use rusqlite::Connection;

const ROW_SAVEPOINT: &str = "staged_row";

pub struct BatchCommitter<'c> {
    conn: &'c Connection,
    batch_size: usize,
    staged: usize,
    committed: usize,
    in_tx: bool,
}

impl<'c> BatchCommitter<'c> {
    pub fn new(conn: &'c Connection, batch_size: usize) -> Self {
        Self {
            conn,
            batch_size: batch_size.max(1),
            staged: 0,
            committed: 0,
            in_tx: false,
        }
    }

    /// Run one row's writes. On error only this row's changes are rolled back.
    ///
    /// A row staged successfully stays in the open transaction; call
    /// `commit_if_full` afterwards to flush a complete batch.
    pub fn stage<F>(&mut self, write: F) -> rusqlite::Result<()>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<()>,
    {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }

        self.conn
            .execute_batch(&format!("SAVEPOINT {}", ROW_SAVEPOINT))?;

        match write(self.conn) {
            Ok(()) => {
                self.conn
                    .execute_batch(&format!("RELEASE {}", ROW_SAVEPOINT))?;
                self.staged += 1;
                Ok(())
            }
            Err(e) => {
                self.conn.execute_batch(&format!(
                    "ROLLBACK TO {0}; RELEASE {0}",
                    ROW_SAVEPOINT
                ))?;
                Err(e)
            }
        }
    }

    /// Commit once `batch_size` rows are staged
    pub fn commit_if_full(&mut self) -> rusqlite::Result<()> {
        if self.staged >= self.batch_size {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> rusqlite::Result<()> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
            self.committed += self.staged;
            tracing::debug!(rows = self.staged, total = self.committed, "Committed batch");
            self.staged = 0;
        }
        Ok(())
    }

    /// Commit the trailing partial batch
    pub fn finish(mut self) -> rusqlite::Result<usize> {
        self.commit()?;
        Ok(self.committed)
    }
}

impl Drop for BatchCommitter<'_> {
    // An abandoned committer keeps what was already accepted
    fn drop(&mut self) {
        if !self.in_tx {
            return;
        }
        if let Err(e) = self.commit() {
            tracing::warn!("Failed to commit staged rows: {}", e);
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back staged rows: {}", e);
            }
        }
    }
}
