use crate::{
    AccessMode, CommitRetry, ConnectionConfig, Error, Result, Statement, Transaction, TransactionBehavior, Value,
    handle::{DbHandle, StmtHandle},
};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;

/// Path that opens a private in-memory database instead of a file.
pub const MEMORY_PATH: &str = ":memory:";

/// An open database connection, closed when dropped.
///
/// Statements and transactions borrow the connection, so they are always released
/// before it. The connection is meant for use from a single thread.
pub struct Connection {
    db: DbHandle,
    commit_retry: CommitRetry,
}

impl Connection {
    /// Opens the database at `db_path`, creating it when it does not exist.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        Connection::new(db_path.as_ref(), AccessMode::Create)
    }

    pub fn open_in_memory() -> Result<Self> {
        Connection::new(Path::new(MEMORY_PATH), AccessMode::Create)
    }

    pub fn new(db_path: &Path, mode: AccessMode) -> Result<Self> {
        Connection::with_config(db_path, &ConnectionConfig::builder().mode(mode).build())
    }

    pub fn with_config(db_path: &Path, config: &ConnectionConfig) -> Result<Self> {
        let db = DbHandle::open(db_path, config.mode.open_flags())?;

        if let Some(timeout) = config.busy_timeout {
            let ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
            let rc = unsafe { libsqlite3_sys::sqlite3_busy_timeout(db.as_ptr(), ms) };
            if rc != libsqlite3_sys::SQLITE_OK {
                return Err(Error::Connection {
                    code: rc,
                    message: db.last_error(),
                });
            }
        }

        log::debug!("Opened database {} ({:?})", db_path.display(), config.mode);
        Ok(Self {
            db,
            commit_retry: config.commit_retry,
        })
    }

    /// File name of the main database, `None` for in-memory databases.
    pub fn path(&self) -> Option<String> {
        let filename = unsafe { libsqlite3_sys::sqlite3_db_filename(self.db.as_ptr(), c"main".as_ptr()) };
        if !filename.is_null() {
            let c_str = unsafe { CStr::from_ptr(filename.cast::<c_char>()) };
            let path = c_str.to_string_lossy().to_string();
            if !path.is_empty() {
                return Some(path);
            }
        }
        None
    }

    /// Compiles the first SQL statement in `sql`.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        log::debug!("Prepare: {sql}");
        Ok(Statement::new(StmtHandle::prepare(&self.db, sql)?))
    }

    /// Compiles `sql` and binds `params` to the positions 1..=N.
    pub fn prepare_with(&self, sql: &str, params: &[Value]) -> Result<Statement<'_>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_all(params)?;
        Ok(stmt)
    }

    /// Runs a single statement to completion and returns the number of changed rows.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let mut stmt = self.prepare_with(sql, params)?;
        while stmt.step()? {}
        Ok(self.changes())
    }

    /// Runs all statements in `sql`, result rows are discarded.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let c_sql = CString::new(sql)?;
        let mut error_message: *mut c_char = std::ptr::null_mut();
        let rc = unsafe {
            libsqlite3_sys::sqlite3_exec(self.db.as_ptr(), c_sql.as_ptr(), None, std::ptr::null_mut(), &mut error_message)
        };

        if rc != libsqlite3_sys::SQLITE_OK {
            let message = if error_message.is_null() {
                self.last_error()
            } else {
                let msg = unsafe { CStr::from_ptr(error_message) }.to_string_lossy().into_owned();
                unsafe { libsqlite3_sys::sqlite3_free(error_message.cast()) };
                msg
            };

            return Err(Error::Exec { code: rc, message });
        }

        Ok(())
    }

    pub fn execute_sql_file(&self, sql_path: &Path) -> Result<()> {
        let sql_contents = std::fs::read_to_string(sql_path)?;
        self.execute_batch(&sql_contents)
    }

    /// Begins a deferred transaction, nested transactions are rejected.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    pub fn transaction_with_behavior(&self, behavior: TransactionBehavior) -> Result<Transaction<'_>> {
        Transaction::begin(self, behavior)
    }

    /// False while a transaction is open on this connection.
    pub fn is_autocommit(&self) -> bool {
        unsafe { libsqlite3_sys::sqlite3_get_autocommit(self.db.as_ptr()) != 0 }
    }

    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { libsqlite3_sys::sqlite3_last_insert_rowid(self.db.as_ptr()) }
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> usize {
        let changes = unsafe { libsqlite3_sys::sqlite3_changes(self.db.as_ptr()) };
        usize::try_from(changes).unwrap_or(0)
    }

    pub fn commit_retry(&self) -> CommitRetry {
        self.commit_retry
    }

    pub fn last_error(&self) -> String {
        self.db.last_error()
    }

    /// Closes the connection, unlike dropping it a failure is reported.
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path())
            .field("commit_retry", &self.commit_retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test_log::test]
    fn in_memory_database_has_no_path() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        assert_eq!(conn.path(), None);
        assert!(conn.is_autocommit());
        Ok(())
    }

    #[test_log::test]
    fn file_database_is_created() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("created.db");

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
        assert!(db_path.exists());
        assert!(conn.path().is_some_and(|p| p.ends_with("created.db")));
        conn.close()?;
        Ok(())
    }

    #[test_log::test]
    fn missing_database_without_create_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("missing.db");

        let err = Connection::new(&db_path, AccessMode::ReadWrite).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(err.code(), libsqlite3_sys::SQLITE_CANTOPEN);
        assert!(!db_path.exists());
        Ok(())
    }

    #[test_log::test]
    fn path_with_nul_byte_is_rejected() {
        let err = Connection::open("in\0valid.db").unwrap_err();
        assert!(matches!(err, Error::InvalidString(_)));
    }

    #[cfg(unix)]
    #[test_log::test]
    fn non_utf8_path_is_opened_unchanged() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join(OsStr::from_bytes(b"db_\xff.sqlite"));

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
        assert!(db_path.exists());
        assert!(!dir.path().join("db_\u{fffd}.sqlite").exists());
        Ok(())
    }

    #[test_log::test]
    fn read_only_connection_cannot_write() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("readonly.db");
        Connection::open(&db_path)?.execute_batch("CREATE TABLE t (v INTEGER)")?;

        let conn = Connection::new(&db_path, AccessMode::ReadOnly)?;
        let err = conn.execute("INSERT INTO t VALUES (1)", params![]).unwrap_err();
        assert!(matches!(err, Error::Exec { .. }));
        assert_eq!(err.code(), libsqlite3_sys::SQLITE_READONLY);
        Ok(())
    }

    #[test_log::test]
    fn prepare_errors() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        assert!(matches!(conn.prepare("SELEC 1"), Err(Error::Prepare { .. })));
        assert!(matches!(conn.prepare("SELECT * FROM missing_table"), Err(Error::Prepare { .. })));
        assert!(matches!(conn.prepare(""), Err(Error::Prepare { .. })));
        assert!(matches!(conn.prepare("-- only a comment"), Err(Error::Prepare { .. })));

        let err = conn.prepare("SELECT * FROM missing_table").unwrap_err();
        assert!(err.message().contains("missing_table"));
        Ok(())
    }

    #[test_log::test]
    fn prepare_with_binds_in_order() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        let mut stmt = conn.prepare_with("SELECT ?1 || '-' || ?2", params!["a", 2])?;
        assert_eq!(stmt.exec()?, "a-2");

        let err = conn.prepare_with("SELECT ?1", params!["a", "b"]).unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
        Ok(())
    }

    #[test_log::test]
    fn execute_reports_changes() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")?;
        assert_eq!(conn.execute("INSERT INTO t (v) VALUES (?), (?), (?)", params![1, 2, 3])?, 3);
        assert_eq!(conn.last_insert_rowid(), 3);
        assert_eq!(conn.execute("UPDATE t SET v = v * 10 WHERE v > ?", params![1])?, 2);
        assert_eq!(conn.prepare("SELECT sum(v) FROM t")?.exec()?, "51");
        Ok(())
    }

    #[test_log::test]
    fn execute_batch_reports_failure() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        let err = conn
            .execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO nope VALUES (1);")
            .unwrap_err();
        assert!(matches!(err, Error::Exec { .. }));
        assert!(err.message().contains("nope"));
        Ok(())
    }

    #[test_log::test]
    fn execute_sql_file_runs_script() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("schema.sql");
        std::fs::write(
            &script,
            "CREATE TABLE metadata (name TEXT, value TEXT);\nINSERT INTO metadata VALUES ('format', 'a;b');\n",
        )?;

        let conn = Connection::open_in_memory()?;
        conn.execute_sql_file(&script)?;
        assert_eq!(conn.prepare("SELECT value FROM metadata")?.exec()?, "a;b");

        let err = conn.execute_sql_file(&dir.path().join("missing.sql")).unwrap_err();
        assert!(matches!(err, Error::IOError(_)));
        Ok(())
    }

    #[test_log::test]
    fn busy_timeout_is_applied() -> Result<()> {
        let config = ConnectionConfig::builder()
            .busy_timeout(std::time::Duration::from_millis(250))
            .build();
        let conn = Connection::with_config(Path::new(MEMORY_PATH), &config)?;
        assert_eq!(conn.prepare("PRAGMA busy_timeout")?.exec()?, "250");
        Ok(())
    }
}
