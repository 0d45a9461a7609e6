use std::cmp::Ordering;
use std::fmt;

use super::DataType;

/// A typed runtime value, the unit the expression evaluator and the
/// executors trade in. `Null` is a value of any type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
    Timestamp(i64),
}

impl Value {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns this value as a bool; non-boolean values and NULL are false.
    /// Predicates treat an unknown outcome as "does not match".
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    /// Returns the DataType that matches this value, None for NULL.
    pub fn infer_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::TinyInt(_) => Some(DataType::TinyInt),
            Value::SmallInt(_) => Some(DataType::SmallInt),
            Value::Integer(_) => Some(DataType::Integer),
            Value::BigInt(_) => Some(DataType::BigInt),
            Value::Float(_) => Some(DataType::Float),
            Value::Double(_) => Some(DataType::Double),
            Value::String(s) => Some(DataType::VarChar(s.len() as u16)),
            Value::Timestamp(_) => Some(DataType::Timestamp),
        }
    }

    /// Compares two values, promoting across integer widths and float
    /// widths. Returns None for NULL operands or incomparable types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,

            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),

            (Float(a), Float(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Float(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), Float(b)) => a.partial_cmp(&(*b as f64)),

            // Integer families promote to i64.
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }

    /// Adds another value to this one, promoting like `compare`.
    /// Returns None for NULL operands or non-numeric types.
    pub fn add(&self, other: &Value) -> Option<Value> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Float(a), Float(b)) => Some(Float(a + b)),
            (Double(_), _) | (_, Double(_)) | (Float(_), _) | (_, Float(_)) => {
                Some(Double(self.as_f64()? + other.as_f64()?))
            }
            (BigInt(_), _) | (_, BigInt(_)) => {
                Some(BigInt(self.as_i64()?.checked_add(other.as_i64()?)?))
            }
            _ => Some(Integer(self.as_i64()?.checked_add(other.as_i64()?)? as i32)),
        }
    }

    /// Subtracts another value from this one, with `add`'s promotion rules.
    pub fn subtract(&self, other: &Value) -> Option<Value> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Float(a), Float(b)) => Some(Float(a - b)),
            (Double(_), _) | (_, Double(_)) | (Float(_), _) | (_, Float(_)) => {
                Some(Double(self.as_f64()? - other.as_f64()?))
            }
            (BigInt(_), _) | (_, BigInt(_)) => {
                Some(BigInt(self.as_i64()?.checked_sub(other.as_i64()?)?))
            }
            _ => Some(Integer(self.as_i64()?.checked_sub(other.as_i64()?)? as i32)),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Serializes this value to bytes according to the given DataType.
    /// Returns None if the value does not fit the type. NULLs serialize to
    /// nothing; the tuple layer encodes them in the null bitmap.
    pub fn serialize(&self, data_type: &DataType) -> Option<Vec<u8>> {
        match (self, data_type) {
            (Value::Null, _) => Some(Vec::new()),

            (Value::Boolean(b), DataType::Boolean) => Some(vec![u8::from(*b)]),
            (Value::TinyInt(v), DataType::TinyInt) => Some(v.to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::SmallInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::Integer) => Some(v.to_le_bytes().to_vec()),
            (Value::BigInt(v), DataType::BigInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Float) => Some(v.to_le_bytes().to_vec()),
            (Value::Double(v), DataType::Double) => Some(v.to_le_bytes().to_vec()),
            (Value::Timestamp(v), DataType::Timestamp) => Some(v.to_le_bytes().to_vec()),

            (Value::String(s), DataType::Char(n)) => {
                let n = *n as usize;
                if s.len() > n {
                    return None;
                }
                let mut result = s.as_bytes().to_vec();
                result.resize(n, b' ');
                Some(result)
            }

            (Value::String(s), DataType::VarChar(max_len)) => {
                if s.len() > *max_len as usize {
                    return None;
                }
                let mut result = (s.len() as u16).to_le_bytes().to_vec();
                result.extend_from_slice(s.as_bytes());
                Some(result)
            }

            // Narrow integers widen on the way to disk.
            (v, DataType::SmallInt) => Some((v.as_i64()? as i16).to_le_bytes().to_vec()),
            (v, DataType::Integer) => Some((v.as_i64()? as i32).to_le_bytes().to_vec()),
            (v, DataType::BigInt) => Some(v.as_i64()?.to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Double) => Some((*v as f64).to_le_bytes().to_vec()),

            _ => None,
        }
    }

    /// Deserializes a value of the given DataType from the front of `data`.
    /// Returns the value and the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<(Self, usize)> {
        fn take<const N: usize>(data: &[u8]) -> Option<[u8; N]> {
            data.get(..N)?.try_into().ok()
        }

        match data_type {
            DataType::Boolean => Some((Value::Boolean(*data.first()? != 0), 1)),
            DataType::TinyInt => Some((Value::TinyInt(*data.first()? as i8), 1)),
            DataType::SmallInt => Some((Value::SmallInt(i16::from_le_bytes(take(data)?)), 2)),
            DataType::Integer => Some((Value::Integer(i32::from_le_bytes(take(data)?)), 4)),
            DataType::BigInt => Some((Value::BigInt(i64::from_le_bytes(take(data)?)), 8)),
            DataType::Float => Some((Value::Float(f32::from_le_bytes(take(data)?)), 4)),
            DataType::Double => Some((Value::Double(f64::from_le_bytes(take(data)?)), 8)),
            DataType::Timestamp => Some((Value::Timestamp(i64::from_le_bytes(take(data)?)), 8)),

            DataType::Char(n) => {
                let n = *n as usize;
                let raw = data.get(..n)?;
                let s = String::from_utf8_lossy(raw).trim_end().to_string();
                Some((Value::String(s), n))
            }

            DataType::VarChar(_) => {
                let len = u16::from_le_bytes(take(data)?) as usize;
                let raw = data.get(2..2 + len)?;
                Some((Value::String(String::from_utf8_lossy(raw).to_string()), 2 + len))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Timestamp(v) => write!(f, "TIMESTAMP({})", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
