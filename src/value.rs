use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Dynamically typed property value.
///
/// Entities and view-models expose their properties as `Value`s so that
/// predicates and the view-model mapper can work with them without knowing
/// the concrete Rust types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Text(String),
}

/// Declared type of a property, used to check that two properties can be
/// mapped onto each other.
///
/// Integer widths are distinct kinds even though they share
/// [`Value::Int`] at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int32,
    Int64,
    UInt32,
    Float,
    Uuid,
    Text,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int32 => write!(f, "i32"),
            Self::Int64 => write!(f, "i64"),
            Self::UInt32 => write!(f, "u32"),
            Self::Float => write!(f, "float"),
            Self::Uuid => write!(f, "uuid"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Rust types with a declared [`ValueKind`].
///
/// Lets property metadata be derived from the field type instead of being
/// spelled out by hand, see [`PropertyInfo::field`](crate::reflect::PropertyInfo::field).
pub trait HasKind {
    const KIND: ValueKind;
    const NULLABLE: bool = false;
}

impl<T: HasKind> HasKind for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;
}

macro_rules! has_kind {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl HasKind for $ty {
                const KIND: ValueKind = ValueKind::$kind;
            }
        )*
    };
}

has_kind!(
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    f64 => Float,
    Uuid => Uuid,
    String => Text,
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Expected a {expected} value, got {actual}")]
    UnexpectedKind { expected: ValueKind, actual: String },
    #[error("Value {0} is out of range")]
    OutOfRange(i64),
    #[error("Unexpected null for a {0} value")]
    UnexpectedNull(ValueKind),
}

impl Value {
    /// Kind of the value, or `None` for `Null`. Integers report `Int64`,
    /// the width they are carried in.
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int64),
            Self::Float(_) => Some(ValueKind::Float),
            Self::Uuid(_) => Some(ValueKind::Uuid),
            Self::Text(_) => Some(ValueKind::Text),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn unexpected(&self, expected: ValueKind) -> ValueError {
        match self {
            Self::Null => ValueError::UnexpectedNull(expected),
            other => ValueError::UnexpectedKind {
                expected,
                actual: other.to_string(),
            },
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl TryFrom<Value> for bool {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.unexpected(ValueKind::Bool)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(other.unexpected(ValueKind::Int64)),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(wide) => i32::try_from(wide).map_err(|_| ValueError::OutOfRange(wide)),
            other => Err(other.unexpected(ValueKind::Int32)),
        }
    }
}

impl TryFrom<Value> for u32 {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(wide) => u32::try_from(wide).map_err(|_| ValueError::OutOfRange(wide)),
            other => Err(other.unexpected(ValueKind::UInt32)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(other.unexpected(ValueKind::Float)),
        }
    }
}

impl TryFrom<Value> for Uuid {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Uuid(u) => Ok(u),
            other => Err(other.unexpected(ValueKind::Uuid)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other.unexpected(ValueKind::Text)),
        }
    }
}

// Nullable properties map `None` to `Value::Null` and back.
macro_rules! nullable_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Option<$ty>> for Value {
                fn from(value: Option<$ty>) -> Self {
                    value.map_or(Value::Null, Value::from)
                }
            }

            impl TryFrom<Value> for Option<$ty> {
                type Error = ValueError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::Null => Ok(None),
                        other => <$ty>::try_from(other).map(Some),
                    }
                }
            }
        )*
    };
}

nullable_value!(bool, i64, i32, u32, f64, Uuid, String);
