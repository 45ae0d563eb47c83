//! Exclusive owners of the raw engine handles.
//!
//! `DbHandle` and `StmtHandle` are the only places where a native handle is released,
//! each exactly once, in `Drop` (or in the consuming `close`).

use crate::{Error, Result, error::error_string};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr::NonNull;

pub(crate) struct DbHandle {
    db: NonNull<libsqlite3_sys::sqlite3>,
}

impl DbHandle {
    pub fn open(path: &Path, flags: c_int) -> Result<Self> {
        let c_path = path_to_cstring(path)?;
        let path = path.display();
        let mut db: *mut libsqlite3_sys::sqlite3 = std::ptr::null_mut();
        let rc = unsafe { libsqlite3_sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, std::ptr::null()) };

        match NonNull::new(db) {
            Some(db) if rc == libsqlite3_sys::SQLITE_OK => Ok(Self { db }),
            Some(db) => {
                // the engine allocates a handle even when opening fails, it still has to be closed
                let message = last_error_message(db.as_ptr());
                unsafe { libsqlite3_sys::sqlite3_close(db.as_ptr()) };
                Err(Error::Connection {
                    code: rc,
                    message: format!("Failed to open '{path}': {message}"),
                })
            }
            None => Err(Error::Connection {
                code: if rc == libsqlite3_sys::SQLITE_OK { libsqlite3_sys::SQLITE_NOMEM } else { rc },
                message: format!("Failed to open '{path}': {}", error_string(rc)),
            }),
        }
    }

    pub fn as_ptr(&self) -> *mut libsqlite3_sys::sqlite3 {
        self.db.as_ptr()
    }

    pub fn last_error(&self) -> String {
        last_error_message(self.db.as_ptr())
    }

    /// Closes the handle, reporting a failure instead of only logging it.
    pub fn close(self) -> Result<()> {
        let db = std::mem::ManuallyDrop::new(self).db;
        let rc = unsafe { libsqlite3_sys::sqlite3_close(db.as_ptr()) };
        if rc != libsqlite3_sys::SQLITE_OK {
            return Err(Error::Connection {
                code: rc,
                message: last_error_message(db.as_ptr()),
            });
        }

        Ok(())
    }
}

impl Drop for DbHandle {
    fn drop(&mut self) {
        let rc = unsafe { libsqlite3_sys::sqlite3_close(self.db.as_ptr()) };
        if rc != libsqlite3_sys::SQLITE_OK {
            log::warn!("Failed to close database: {}", last_error_message(self.db.as_ptr()));
        }
    }
}

pub(crate) struct StmtHandle {
    stmt: NonNull<libsqlite3_sys::sqlite3_stmt>,
}

impl StmtHandle {
    /// Compiles the first statement in `sql`, remaining text is ignored.
    pub fn prepare(db: &DbHandle, sql: &str) -> Result<Self> {
        let len = c_int::try_from(sql.len()).map_err(|_| Error::Prepare {
            code: libsqlite3_sys::SQLITE_TOOBIG,
            message: format!("SQL text of {} bytes is too long", sql.len()),
        })?;

        let mut stmt: *mut libsqlite3_sys::sqlite3_stmt = std::ptr::null_mut();
        let rc = unsafe {
            libsqlite3_sys::sqlite3_prepare_v2(
                db.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                std::ptr::null_mut(),
            )
        };

        if rc != libsqlite3_sys::SQLITE_OK {
            if !stmt.is_null() {
                unsafe { libsqlite3_sys::sqlite3_finalize(stmt) };
            }

            return Err(Error::Prepare {
                code: rc,
                message: db.last_error(),
            });
        }

        NonNull::new(stmt).map(|stmt| Self { stmt }).ok_or_else(|| Error::Prepare {
            code: libsqlite3_sys::SQLITE_MISUSE,
            message: format!("No SQL statement found in '{sql}'"),
        })
    }

    pub fn as_ptr(&self) -> *mut libsqlite3_sys::sqlite3_stmt {
        self.stmt.as_ptr()
    }

    /// Error message of the connection this statement belongs to.
    pub fn last_error(&self) -> String {
        let db = unsafe { libsqlite3_sys::sqlite3_db_handle(self.stmt.as_ptr()) };
        last_error_message(db)
    }
}

impl Drop for StmtHandle {
    fn drop(&mut self) {
        // the return code repeats the error of the last step, which was already reported
        unsafe { libsqlite3_sys::sqlite3_finalize(self.stmt.as_ptr()) };
    }
}

/// The engine expects the path bytes unchanged, a lossy conversion would open another file.
#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(CString::new(path.as_os_str().as_bytes())?)
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString> {
    let utf8 = path.to_str().ok_or_else(|| Error::Connection {
        code: libsqlite3_sys::SQLITE_CANTOPEN,
        message: format!("Database path '{}' is not valid UTF-8", path.display()),
    })?;
    Ok(CString::new(utf8)?)
}

fn last_error_message(db: *mut libsqlite3_sys::sqlite3) -> String {
    let error_message = unsafe { libsqlite3_sys::sqlite3_errmsg(db) };
    if error_message.is_null() {
        return String::new();
    }

    let c_str = unsafe { CStr::from_ptr(error_message) };
    c_str.to_string_lossy().into_owned()
}
