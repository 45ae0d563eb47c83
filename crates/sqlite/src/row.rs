use crate::{Result, Statement, Value};
use std::{
    ffi::{CStr, c_char, c_int},
    marker::PhantomData,
    slice,
};

/// Storage class of a cell as reported by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Blob,
    Null,
    Text,
}

/// Read-only view of one column of the current row.
///
/// The view borrows the statement it was read from, so the row cannot be advanced while
/// it is alive. No bounds or type checks are done here: values are coerced by the engine,
/// check [`ValueRef::kind`] first when the storage class matters.
#[derive(Clone, Copy)]
pub struct ValueRef<'stmt> {
    stmt: *mut libsqlite3_sys::sqlite3_stmt,
    index: c_int,
    _row: PhantomData<&'stmt ()>,
}

impl<'stmt> ValueRef<'stmt> {
    pub(crate) fn new(stmt: *mut libsqlite3_sys::sqlite3_stmt, index: c_int) -> Self {
        Self {
            stmt,
            index,
            _row: PhantomData,
        }
    }

    pub fn kind(&self) -> ColumnType {
        let column_type = unsafe { libsqlite3_sys::sqlite3_column_type(self.stmt, self.index) };
        match column_type {
            libsqlite3_sys::SQLITE_INTEGER => ColumnType::Integer,
            libsqlite3_sys::SQLITE_FLOAT => ColumnType::Float,
            libsqlite3_sys::SQLITE_BLOB => ColumnType::Blob,
            libsqlite3_sys::SQLITE_TEXT => ColumnType::Text,
            _ => ColumnType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        self.kind() == ColumnType::Null
    }

    pub fn as_integer(&self) -> i64 {
        unsafe { libsqlite3_sys::sqlite3_column_int64(self.stmt, self.index) }
    }

    pub fn as_float(&self) -> f64 {
        unsafe { libsqlite3_sys::sqlite3_column_double(self.stmt, self.index) }
    }

    /// Text of the cell.
    ///
    /// Text and blob cells use the byte length reported by the engine so embedded zero
    /// bytes survive. Other storage classes are converted by the engine and read up to the
    /// terminating zero byte. Invalid UTF-8 is replaced.
    pub fn as_text(&self) -> String {
        // the storage class has to be read before the text conversion changes it
        let kind = self.kind();
        let data = unsafe { libsqlite3_sys::sqlite3_column_text(self.stmt, self.index) };
        if data.is_null() {
            return String::new();
        }

        match kind {
            ColumnType::Text | ColumnType::Blob => {
                String::from_utf8_lossy(unsafe { self.column_bytes(data) }).into_owned()
            }
            _ => unsafe { CStr::from_ptr(data.cast::<c_char>()) }.to_string_lossy().into_owned(),
        }
    }

    pub fn as_blob(&self) -> Vec<u8> {
        let data = unsafe { libsqlite3_sys::sqlite3_column_blob(self.stmt, self.index) };
        if data.is_null() {
            return Vec::new();
        }

        unsafe { self.column_bytes(data.cast::<u8>()) }.to_vec()
    }

    /// Owned copy of the cell, keeping its storage class.
    pub fn to_value(&self) -> Value {
        match self.kind() {
            ColumnType::Integer => Value::Int64(self.as_integer()),
            ColumnType::Float => Value::Double(self.as_float()),
            ColumnType::Text => Value::Text(self.as_text()),
            ColumnType::Blob => Value::Blob(self.as_blob()),
            ColumnType::Null => Value::Null,
        }
    }

    /// # Safety
    /// `data` must be the pointer just returned by the engine for this cell.
    unsafe fn column_bytes(&self, data: *const u8) -> &[u8] {
        let size = unsafe { libsqlite3_sys::sqlite3_column_bytes(self.stmt, self.index) };
        if size <= 0 {
            return &[];
        }

        unsafe { slice::from_raw_parts(data, size as usize) }
    }
}

impl std::fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueRef").field("index", &self.index).field("kind", &self.kind()).finish()
    }
}

impl From<ValueRef<'_>> for i64 {
    fn from(value: ValueRef<'_>) -> Self {
        value.as_integer()
    }
}

impl From<ValueRef<'_>> for f64 {
    fn from(value: ValueRef<'_>) -> Self {
        value.as_float()
    }
}

impl From<ValueRef<'_>> for String {
    fn from(value: ValueRef<'_>) -> Self {
        value.as_text()
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        value.to_value()
    }
}

/// The row a statement is currently positioned on.
#[derive(Clone, Copy)]
pub struct Row<'stmt> {
    stmt: &'stmt Statement<'stmt>,
}

impl<'stmt> Row<'stmt> {
    pub(crate) fn new(stmt: &'stmt Statement<'stmt>) -> Self {
        Self { stmt }
    }

    pub fn get(&self, index: usize) -> Result<ValueRef<'stmt>> {
        self.stmt.column(index)
    }

    pub fn column_count(&self) -> usize {
        self.stmt.column_count()
    }

    pub fn column_name(&self, index: usize) -> Option<String> {
        self.stmt.column_name(index)
    }

    /// All cells of the row as owned values.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|i| self.get(i).map(|v| v.to_value())).collect()
    }
}
