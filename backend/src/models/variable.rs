//! Agent variable types
//!
//! Every agent variable holds one of eight scalar kinds. The kind is either
//! known at compile time through the [`AgentVariable`] trait (implemented for
//! the matching Rust primitives) or carried at runtime by the [`VariableType`]
//! and [`Value`] tagged unions.
//!
//! | Kind    | Rust type |
//! |---------|-----------|
//! | Float   | `f32`     |
//! | Double  | `f64`     |
//! | Int16   | `i16`     |
//! | Int32   | `i32`     |
//! | Int64   | `i64`     |
//! | UInt16  | `u16`     |
//! | UInt32  | `u32`     |
//! | UInt64  | `u64`     |

use crate::models::float_repr;
use crate::models::population::Column;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Runtime tag for the numeric kind of an agent variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableType {
    Float,
    Double,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
}

impl VariableType {
    /// Every supported kind, in declaration order
    pub const ALL: [VariableType; 8] = [
        VariableType::Float,
        VariableType::Double,
        VariableType::Int16,
        VariableType::Int32,
        VariableType::Int64,
        VariableType::UInt16,
        VariableType::UInt32,
        VariableType::UInt64,
    ];

    /// Lowercase name used in configuration and at the FFI boundary
    pub fn name(self) -> &'static str {
        match self {
            VariableType::Float => "float",
            VariableType::Double => "double",
            VariableType::Int16 => "int16",
            VariableType::Int32 => "int32",
            VariableType::Int64 => "int64",
            VariableType::UInt16 => "uint16",
            VariableType::UInt32 => "uint32",
            VariableType::UInt64 => "uint64",
        }
    }

    /// True for `Float` and `Double`
    pub fn is_floating(self) -> bool {
        matches!(self, VariableType::Float | VariableType::Double)
    }

    /// Zero value of this kind
    pub fn zero(self) -> Value {
        match self {
            VariableType::Float => Value::Float(0.0),
            VariableType::Double => Value::Double(0.0),
            VariableType::Int16 => Value::Int16(0),
            VariableType::Int32 => Value::Int32(0),
            VariableType::Int64 => Value::Int64(0),
            VariableType::UInt16 => Value::UInt16(0),
            VariableType::UInt32 => Value::UInt32(0),
            VariableType::UInt64 => Value::UInt64(0),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a type name cannot be mapped to a [`VariableType`]
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Unknown variable type '{0}'")]
pub struct UnknownVariableType(pub String);

impl FromStr for VariableType {
    type Err = UnknownVariableType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "f32" => Ok(VariableType::Float),
            "double" | "f64" => Ok(VariableType::Double),
            "int16" | "i16" => Ok(VariableType::Int16),
            "int" | "int32" | "i32" => Ok(VariableType::Int32),
            "int64" | "i64" => Ok(VariableType::Int64),
            "uint16" | "u16" => Ok(VariableType::UInt16),
            "uint" | "uint32" | "u32" => Ok(VariableType::UInt32),
            "uint64" | "u64" => Ok(VariableType::UInt64),
            _ => Err(UnknownVariableType(s.to_string())),
        }
    }
}

/// A single typed scalar held by an agent variable
///
/// Equality is by kind and bit pattern, so a NaN default equals itself and
/// `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Value {
    Float(#[serde(with = "float_repr::scalar")] f32),
    Double(#[serde(with = "float_repr::scalar")] f64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
}

impl Value {
    /// Kind tag of this value
    pub fn kind(&self) -> VariableType {
        match self {
            Value::Float(_) => VariableType::Float,
            Value::Double(_) => VariableType::Double,
            Value::Int16(_) => VariableType::Int16,
            Value::Int32(_) => VariableType::Int32,
            Value::Int64(_) => VariableType::Int64,
            Value::UInt16(_) => VariableType::UInt16,
            Value::UInt32(_) => VariableType::UInt32,
            Value::UInt64(_) => VariableType::UInt64,
        }
    }

    /// Extract the value as `T`, or `None` if the kinds differ
    ///
    /// # Example
    /// ```
    /// use agent_sim_core_rs::Value;
    ///
    /// let value = Value::from(7i32);
    /// assert_eq!(value.get::<i32>(), Some(7));
    /// assert_eq!(value.get::<f32>(), None);
    /// ```
    pub fn get<T: AgentVariable>(self) -> Option<T> {
        T::from_value(self)
    }

    /// Lossy conversion to `f64`, used by reductions
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Float(v) => v as f64,
            Value::Double(v) => v,
            Value::Int16(v) => v as f64,
            Value::Int32(v) => v as f64,
            Value::Int64(v) => v as f64,
            Value::UInt16(v) => v as f64,
            Value::UInt32(v) => v as f64,
            Value::UInt64(v) => v as f64,
        }
    }

    /// Total order between two values of the same kind
    ///
    /// Floating values use IEEE 754 total ordering. Returns `None` when the
    /// kinds differ; values are never coerced across kinds.
    pub fn total_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Double(a), Value::Double(b)) => Some(a.total_cmp(b)),
            (Value::Int16(a), Value::Int16(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::UInt16(a), Value::UInt16(b)) => Some(a.cmp(b)),
            (Value::UInt32(a), Value::UInt32(b)) => Some(a.cmp(b)),
            (Value::UInt64(a), Value::UInt64(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.total_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// Compile-time mapping between a Rust primitive and its variable kind
///
/// Sealed: implemented only for `f32`, `f64`, `i16`, `i32`, `i64`, `u16`,
/// `u32` and `u64`.
pub trait AgentVariable:
    Copy + PartialOrd + Default + fmt::Debug + fmt::Display + Send + Sync + 'static + private::Sealed
{
    /// Runtime tag for this type
    const KIND: VariableType;

    /// Wrap in the tagged union
    fn into_value(self) -> Value;

    /// Unwrap from the tagged union if the kinds match
    fn from_value(value: Value) -> Option<Self>;

    /// Borrow the typed storage of a column of this kind
    fn column(column: &Column) -> Option<&[Self]>;

    /// Mutably borrow the typed storage of a column of this kind
    fn column_mut(column: &mut Column) -> Option<&mut Vec<Self>>;

    /// Total order (IEEE total order for floating types)
    fn compare(&self, other: &Self) -> Ordering;

    /// Lossy widening used by reductions
    fn to_f64(self) -> f64;
}

macro_rules! impl_agent_variable {
    ($ty:ty, $variant:ident, |$a:ident, $b:ident| $cmp:expr) => {
        impl private::Sealed for $ty {}

        impl AgentVariable for $ty {
            const KIND: VariableType = VariableType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn column(column: &Column) -> Option<&[Self]> {
                match column {
                    Column::$variant(values) => Some(values.as_slice()),
                    _ => None,
                }
            }

            fn column_mut(column: &mut Column) -> Option<&mut Vec<Self>> {
                match column {
                    Column::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn compare(&self, other: &Self) -> Ordering {
                let ($a, $b) = (self, other);
                $cmp
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_agent_variable!(f32, Float, |a, b| a.total_cmp(b));
impl_agent_variable!(f64, Double, |a, b| a.total_cmp(b));
impl_agent_variable!(i16, Int16, |a, b| Ord::cmp(a, b));
impl_agent_variable!(i32, Int32, |a, b| Ord::cmp(a, b));
impl_agent_variable!(i64, Int64, |a, b| Ord::cmp(a, b));
impl_agent_variable!(u16, UInt16, |a, b| Ord::cmp(a, b));
impl_agent_variable!(u32, UInt32, |a, b| Ord::cmp(a, b));
impl_agent_variable!(u64, UInt64, |a, b| Ord::cmp(a, b));
