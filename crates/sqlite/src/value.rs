/// A value that can be bound to a statement parameter.
///
/// Each variant maps onto one engine bind call, the conversion is picked at compile
/// time through the `From` implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Stored as the integer 0 or 1
    Bool(bool),
    Int(i32),
    Int64(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Builds a slice of [`Value`]s for positional binding.
///
/// `conn.prepare_with("INSERT INTO t VALUES (?, ?, ?)", params!["text", 1.5, 7])`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_matching_variant() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7), Value::Int(7));
        assert_eq!(Value::from(7_i64), Value::Int64(7));
        assert_eq!(Value::from(0.5), Value::Double(0.5));
        assert_eq!(Value::from("a"), Value::Text("a".to_string()));
        assert_eq!(Value::from(vec![0_u8, 1]), Value::Blob(vec![0, 1]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("b")), Value::Text("b".to_string()));
    }

    #[test]
    fn params_macro_keeps_order() {
        let params: &[Value] = crate::params!["t_1", 0.5, 1, Value::Null];
        assert_eq!(
            params,
            &[Value::Text("t_1".to_string()), Value::Double(0.5), Value::Int(1), Value::Null][..]
        );

        let empty: &[Value] = crate::params![];
        assert!(empty.is_empty());
    }
}
