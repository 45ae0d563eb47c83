use crate::{Connection, Error, Result, Row, Value, ValueRef, handle::StmtHandle};
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::marker::PhantomData;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StepState {
    Ready,
    Row,
    Done,
}

/// A prepared statement, finalized when dropped.
///
/// Created by [`Connection::prepare`], it cannot outlive that connection.
pub struct Statement<'conn> {
    handle: StmtHandle,
    state: StepState,
    _conn: PhantomData<&'conn Connection>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(handle: StmtHandle) -> Self {
        Self {
            handle,
            state: StepState::Ready,
            _conn: PhantomData,
        }
    }

    /// Binds `value` to the 1-based parameter `position`.
    pub fn bind(&mut self, position: usize, value: impl Into<Value>) -> Result<()> {
        let index = c_int::try_from(position).map_err(|_| Error::Bind {
            code: libsqlite3_sys::SQLITE_RANGE,
            message: format!("parameter position {position} is out of range"),
        })?;

        self.bind_value(index, &value.into())
    }

    /// Binds `value` to a named parameter, the name includes its prefix (`:id`, `@id`, `$id`).
    pub fn bind_name(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let unknown_parameter = || Error::Bind {
            code: libsqlite3_sys::SQLITE_ERROR,
            message: format!("unknown parameter name '{name}'"),
        };

        let c_name = CString::new(name).map_err(|_| unknown_parameter())?;
        let index = unsafe { libsqlite3_sys::sqlite3_bind_parameter_index(self.handle.as_ptr(), c_name.as_ptr()) };
        if index == 0 {
            return Err(unknown_parameter());
        }

        self.bind_value(index, &value.into())
    }

    /// Binds `values` to the positions 1..=N, nothing is bound when there are more values than parameters.
    pub fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        let parameter_count = self.parameter_count();
        if values.len() > parameter_count {
            return Err(Error::Bind {
                code: libsqlite3_sys::SQLITE_RANGE,
                message: format!(
                    "{} arguments supplied for a statement with {parameter_count} parameters",
                    values.len()
                ),
            });
        }

        for (i, value) in values.iter().enumerate() {
            // bounded by the parameter count, which is a c_int
            self.bind_value((i + 1) as c_int, value)?;
        }

        Ok(())
    }

    fn bind_value(&mut self, index: c_int, value: &Value) -> Result<()> {
        let stmt = self.handle.as_ptr();
        let rc = match value {
            Value::Null => unsafe { libsqlite3_sys::sqlite3_bind_null(stmt, index) },
            Value::Bool(v) => unsafe { libsqlite3_sys::sqlite3_bind_int(stmt, index, c_int::from(*v)) },
            Value::Int(v) => unsafe { libsqlite3_sys::sqlite3_bind_int(stmt, index, *v) },
            Value::Int64(v) => unsafe { libsqlite3_sys::sqlite3_bind_int64(stmt, index, *v) },
            Value::Double(v) => unsafe { libsqlite3_sys::sqlite3_bind_double(stmt, index, *v) },
            Value::Text(v) => {
                let len = bind_length(v.len())?;
                unsafe {
                    libsqlite3_sys::sqlite3_bind_text(
                        stmt,
                        index,
                        v.as_ptr().cast::<c_char>(),
                        len,
                        libsqlite3_sys::SQLITE_TRANSIENT(),
                    )
                }
            }
            Value::Blob(v) => {
                let len = bind_length(v.len())?;
                unsafe {
                    libsqlite3_sys::sqlite3_bind_blob(
                        stmt,
                        index,
                        v.as_ptr().cast::<c_void>(),
                        len,
                        libsqlite3_sys::SQLITE_TRANSIENT(),
                    )
                }
            }
        };

        if rc != libsqlite3_sys::SQLITE_OK {
            return Err(Error::Bind {
                code: rc,
                message: format!("bind of parameter {index} failed: {}", self.handle.last_error()),
            });
        }

        Ok(())
    }

    /// Advances to the next row, returns false once the statement has completed.
    ///
    /// A completed statement stays completed, use [`Statement::reset`] to run it again.
    pub fn step(&mut self) -> Result<bool> {
        if self.state == StepState::Done {
            return Ok(false);
        }

        let rc = unsafe { libsqlite3_sys::sqlite3_step(self.handle.as_ptr()) };
        match rc {
            libsqlite3_sys::SQLITE_ROW => {
                self.state = StepState::Row;
                Ok(true)
            }
            libsqlite3_sys::SQLITE_DONE => {
                self.state = StepState::Done;
                Ok(false)
            }
            _ => {
                self.state = StepState::Done;
                Err(Error::Exec {
                    code: rc,
                    message: self.handle.last_error(),
                })
            }
        }
    }

    /// Executes a single step and returns the text of the first column of the produced
    /// row, or an empty string when no row was produced.
    pub fn exec(&mut self) -> Result<String> {
        if self.step()? && self.column_count() > 0 {
            return Ok(self.column(0)?.as_text());
        }

        Ok(String::new())
    }

    /// Accessor for a column of the current row.
    pub fn column(&self, index: usize) -> Result<ValueRef<'_>> {
        if self.state != StepState::Row {
            return Err(Error::Index {
                code: libsqlite3_sys::SQLITE_MISUSE,
                message: format!("column {index} requested while no row is available"),
            });
        }

        let count = self.column_count();
        if index >= count {
            return Err(Error::Index {
                code: libsqlite3_sys::SQLITE_RANGE,
                message: format!("column index {index} is out of range (column count {count})"),
            });
        }

        Ok(ValueRef::new(self.handle.as_ptr(), index as c_int))
    }

    pub fn column_count(&self) -> usize {
        let count = unsafe { libsqlite3_sys::sqlite3_column_count(self.handle.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    pub fn column_name(&self, index: usize) -> Option<String> {
        if index >= self.column_count() {
            return None;
        }

        let name = unsafe { libsqlite3_sys::sqlite3_column_name(self.handle.as_ptr(), index as c_int) };
        if name.is_null() {
            return None;
        }

        Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }

    pub fn parameter_count(&self) -> usize {
        let count = unsafe { libsqlite3_sys::sqlite3_bind_parameter_count(self.handle.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    /// The SQL text the statement was compiled from.
    pub fn sql(&self) -> String {
        let sql = unsafe { libsqlite3_sys::sqlite3_sql(self.handle.as_ptr()) };
        if sql.is_null() {
            return String::new();
        }

        unsafe { CStr::from_ptr(sql) }.to_string_lossy().into_owned()
    }

    /// Rewinds the statement so it can be executed again, bindings are kept.
    pub fn reset(&mut self) {
        // a non-ok code repeats the error of the last step, which was already reported
        unsafe { libsqlite3_sys::sqlite3_reset(self.handle.as_ptr()) };
        self.state = StepState::Ready;
    }

    pub fn clear_bindings(&mut self) -> Result<()> {
        let rc = unsafe { libsqlite3_sys::sqlite3_clear_bindings(self.handle.as_ptr()) };
        if rc != libsqlite3_sys::SQLITE_OK {
            return Err(Error::Bind {
                code: rc,
                message: self.handle.last_error(),
            });
        }

        Ok(())
    }

    /// Forward only sequence over the result rows, each call to `next` steps the statement.
    pub fn rows(&mut self) -> Rows<'_, 'conn> {
        Rows { stmt: self }
    }

    /// Maps every result row through `f`.
    pub fn query_map<T, F>(&mut self, f: F) -> MappedRows<'_, 'conn, F>
    where
        F: FnMut(&Row<'_>) -> Result<T>,
    {
        MappedRows { stmt: self, f }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql())
            .field("state", &self.state)
            .finish()
    }
}

fn bind_length(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| Error::Bind {
        code: libsqlite3_sys::SQLITE_TOOBIG,
        message: format!("value of {len} bytes is too large to bind"),
    })
}

/// Lending row sequence of a statement.
///
/// ```ignore
/// let mut rows = stmt.rows();
/// while let Some(row) = rows.next()? {
///     println!("{}", row.get(0)?.as_text());
/// }
/// ```
pub struct Rows<'stmt, 'conn> {
    stmt: &'stmt mut Statement<'conn>,
}

impl<'stmt, 'conn> Rows<'stmt, 'conn> {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row<'_>>> {
        if self.stmt.step()? {
            Ok(Some(Row::new(&*self.stmt)))
        } else {
            Ok(None)
        }
    }
}

/// Iterator returned by [`Statement::query_map`].
pub struct MappedRows<'stmt, 'conn, F> {
    stmt: &'stmt mut Statement<'conn>,
    f: F,
}

impl<T, F> Iterator for MappedRows<'_, '_, F>
where
    F: FnMut(&Row<'_>) -> Result<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stmt.step() {
            Ok(true) => Some((self.f)(&Row::new(&*self.stmt))),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<T, F> std::iter::FusedIterator for MappedRows<'_, '_, F> where F: FnMut(&Row<'_>) -> Result<T> {}
