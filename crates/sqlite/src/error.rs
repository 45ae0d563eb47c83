use std::os::raw::c_int;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error ({code}): {message}")]
    Connection { code: c_int, message: String },
    #[error("Prepare error ({code}): {message}")]
    Prepare { code: c_int, message: String },
    #[error("Bind error ({code}): {message}")]
    Bind { code: c_int, message: String },
    #[error("Execution error ({code}): {message}")]
    Exec { code: c_int, message: String },
    #[error("Index error: {message}")]
    Index { code: c_int, message: String },
    #[error("Transaction error ({code}): {message}")]
    Transaction { code: c_int, message: String },
    #[error("Commit error ({code}): {message}")]
    Commit { code: c_int, message: String },
    #[error("Rollback error ({code}): {message}")]
    Rollback { code: c_int, message: String },
    #[error("Invalid string: {0}")]
    InvalidString(#[from] std::ffi::NulError),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    /// The engine result code that caused this error.
    pub fn code(&self) -> c_int {
        match self {
            Error::Connection { code, .. }
            | Error::Prepare { code, .. }
            | Error::Bind { code, .. }
            | Error::Exec { code, .. }
            | Error::Index { code, .. }
            | Error::Transaction { code, .. }
            | Error::Commit { code, .. }
            | Error::Rollback { code, .. } => *code,
            Error::InvalidString(_) => libsqlite3_sys::SQLITE_MISUSE,
            Error::IOError(_) => libsqlite3_sys::SQLITE_IOERR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Connection { message, .. }
            | Error::Prepare { message, .. }
            | Error::Bind { message, .. }
            | Error::Exec { message, .. }
            | Error::Index { message, .. }
            | Error::Transaction { message, .. }
            | Error::Commit { message, .. }
            | Error::Rollback { message, .. } => message.clone(),
            Error::InvalidString(err) => err.to_string(),
            Error::IOError(err) => err.to_string(),
        }
    }

    /// True for lock contention results (`SQLITE_BUSY` and its extended codes).
    pub fn is_busy(&self) -> bool {
        self.code() & 0xff == libsqlite3_sys::SQLITE_BUSY
    }
}

/// Textual description of an engine result code, usable without a connection handle.
pub(crate) fn error_string(code: c_int) -> String {
    let msg = unsafe { libsqlite3_sys::sqlite3_errstr(code) };
    if msg.is_null() {
        return format!("sqlite result code {code}");
    }

    unsafe { std::ffi::CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_detection_includes_extended_codes() {
        let err = Error::Commit {
            code: libsqlite3_sys::SQLITE_BUSY_SNAPSHOT,
            message: "database is locked".to_string(),
        };
        assert!(err.is_busy());
        assert_eq!(err.code(), libsqlite3_sys::SQLITE_BUSY_SNAPSHOT);

        let err = Error::Commit {
            code: libsqlite3_sys::SQLITE_CONSTRAINT,
            message: "constraint failed".to_string(),
        };
        assert!(!err.is_busy());
    }

    #[test]
    fn display_contains_code_and_message() {
        let err = Error::Bind {
            code: libsqlite3_sys::SQLITE_RANGE,
            message: "column index out of range".to_string(),
        };
        assert_eq!(err.to_string(), format!("Bind error ({}): column index out of range", libsqlite3_sys::SQLITE_RANGE));
        assert_eq!(err.message(), "column index out of range");
    }

    #[test]
    fn error_string_describes_code() {
        assert_eq!(error_string(libsqlite3_sys::SQLITE_BUSY), "database is locked");
    }
}
