use crate::{Connection, Error, Result};
use std::ops::Deref;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionBehavior {
    fn begin_sql(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED TRANSACTION",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE TRANSACTION",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE TRANSACTION",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Resolved,
}

/// A transaction that commits when it goes out of scope.
///
/// [`Transaction::commit`] and [`Transaction::rollback`] resolve it explicitly and report
/// failures. When the transaction is dropped while still active it is committed, retrying
/// while the database is busy. A failure of that implicit commit cannot be reported: it is
/// logged, the transaction is rolled back and its changes are lost.
///
/// Nested transactions are not supported, starting a transaction on a connection that is
/// already inside one fails.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    state: TransactionState,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn begin(conn: &'conn Connection, behavior: TransactionBehavior) -> Result<Self> {
        if !conn.is_autocommit() {
            return Err(Error::Transaction {
                code: libsqlite3_sys::SQLITE_MISUSE,
                message: "nested transactions are not supported".to_string(),
            });
        }

        run(conn, behavior.begin_sql()).map_err(|err| Error::Transaction {
            code: err.code(),
            message: format!("can't begin transaction: {}", err.message()),
        })?;

        log::debug!("Transaction started ({behavior:?})");
        Ok(Self {
            conn,
            state: TransactionState::Active,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Commits, retrying while the database is busy as configured for the connection.
    ///
    /// On failure the transaction is still active and is handled like a dropped transaction.
    pub fn commit(mut self) -> Result<()> {
        commit_with_retry(self.conn)?;
        self.state = TransactionState::Resolved;
        log::debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back once, the transaction counts as resolved even when this fails.
    pub fn rollback(mut self) -> Result<()> {
        self.state = TransactionState::Resolved;
        run(self.conn, "ROLLBACK").map_err(|err| Error::Rollback {
            code: err.code(),
            message: format!("rollback failed: {}", err.message()),
        })?;

        log::debug!("Transaction rolled back");
        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }

        self.state = TransactionState::Resolved;
        if let Err(err) = commit_with_retry(self.conn) {
            log::warn!("Implicit commit failed, changes are discarded: {err}");
            if !self.conn.is_autocommit() {
                if let Err(err) = run(self.conn, "ROLLBACK") {
                    log::warn!("Rollback after failed commit failed: {err}");
                }
            }
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("state", &self.state).finish()
    }
}

fn run(conn: &Connection, sql: &str) -> Result<()> {
    let mut stmt = conn.prepare(sql)?;
    while stmt.step()? {}
    Ok(())
}

fn commit_with_retry(conn: &Connection) -> Result<()> {
    let retry = conn.commit_retry();
    let mut attempt = 1;
    loop {
        let err = match run(conn, "COMMIT") {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match retry.next_attempt(attempt) {
            Some(next) if err.is_busy() => {
                log::debug!("Commit attempt {attempt} failed, database is busy");
                attempt = next;
                std::thread::sleep(retry.delay);
            }
            _ => {
                return Err(Error::Commit {
                    code: err.code(),
                    message: format!("commit failed after {attempt} attempt(s): {}", err.message()),
                });
            }
        }
    }
}
