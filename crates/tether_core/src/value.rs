//! Host-side values.
//!
//! [`HostValue`] is what host routines read from and write to value
//! buffers. [`HostType`] connects ordinary Rust types to their descriptor
//! and to `HostValue`, so callers can marshal `Vec<Option<String>>` without
//! spelling out either.

use crate::error::{MarshalError, Result};
use crate::types::TypeDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Homogeneous array; `element` is the element descriptor it was
    /// allocated for.
    Array {
        element: TypeDescriptor,
        items: Vec<HostValue>,
    },
    /// Named fields in declaration order.
    Record {
        name: String,
        fields: Vec<(String, HostValue)>,
    },
    /// An engine object retained by the engine's handle table.
    Handle(u32),
}

impl HostValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Byte(_) => "byte",
            HostValue::Char(_) => "char",
            HostValue::Short(_) => "short",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Float(_) => "float",
            HostValue::Double(_) => "double",
            HostValue::String(_) => "String",
            HostValue::Array { .. } => "array",
            HostValue::Record { .. } => "record",
            HostValue::Handle(_) => "handle",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&HostValue> {
        match self {
            HostValue::Record { fields, .. } => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Remove a record field by name, for [`HostType::from_host`] impls.
    pub fn take_field(&mut self, name: &str) -> Result<HostValue> {
        match self {
            HostValue::Record { name: record, fields } => {
                match fields.iter().position(|(field, _)| field == name) {
                    Some(index) => Ok(fields.remove(index).1),
                    None => Err(MarshalError::MissingField {
                        record: record.clone(),
                        field: name.to_string(),
                    }),
                }
            }
            other => Err(MarshalError::HostMismatch {
                found: other.kind_name(),
                expected: "record",
            }),
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> MarshalError {
        MarshalError::HostMismatch {
            found: self.kind_name(),
            expected,
        }
    }
}

impl From<&HostValue> for serde_json::Value {
    fn from(value: &HostValue) -> Self {
        use serde_json::Value;

        match value {
            HostValue::Null => Value::Null,
            HostValue::Bool(b) => Value::Bool(*b),
            HostValue::Byte(n) => Value::from(*n),
            HostValue::Char(c) => Value::String(c.to_string()),
            HostValue::Short(n) => Value::from(*n),
            HostValue::Int(n) => Value::from(*n),
            HostValue::Long(n) => Value::from(*n),
            // NaN and infinities have no JSON form and become null
            HostValue::Float(n) => Value::from(*n),
            HostValue::Double(n) => Value::from(*n),
            HostValue::String(s) => Value::String(s.clone()),
            HostValue::Array { items, .. } => {
                Value::Array(items.iter().map(Value::from).collect())
            }
            HostValue::Record { fields, .. } => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::from(value)))
                    .collect(),
            ),
            HostValue::Handle(handle) => serde_json::json!({ "handle": handle }),
        }
    }
}

/// A Rust type with a fixed descriptor.
///
/// Implement this for host records by returning a
/// [`TypeDescriptor::Record`] and converting through
/// [`HostValue::Record`].
pub trait HostType: Sized {
    fn descriptor() -> TypeDescriptor;

    fn into_host(self) -> HostValue;

    fn from_host(value: HostValue) -> Result<Self>;
}

macro_rules! leaf_host_type {
    ($ty:ty, $descriptor:ident, $variant:ident, $name:literal) => {
        impl HostType for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::$descriptor
            }

            fn into_host(self) -> HostValue {
                HostValue::$variant(self)
            }

            fn from_host(value: HostValue) -> Result<Self> {
                match value {
                    HostValue::$variant(inner) => Ok(inner),
                    other => Err(other.mismatch($name)),
                }
            }
        }
    };
}

leaf_host_type!(bool, Boolean, Bool, "boolean");
leaf_host_type!(i8, Byte, Byte, "byte");
leaf_host_type!(char, Char, Char, "char");
leaf_host_type!(i16, Short, Short, "short");
leaf_host_type!(i32, Int, Int, "int");
leaf_host_type!(i64, Long, Long, "long");
leaf_host_type!(f32, Float, Float, "float");
leaf_host_type!(f64, Double, Double, "double");
leaf_host_type!(String, String, String, "String");

impl HostType for () {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Void
    }

    fn into_host(self) -> HostValue {
        HostValue::Null
    }

    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Null => Ok(()),
            other => Err(other.mismatch("void")),
        }
    }
}

impl<T: HostType> HostType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array_of(T::descriptor())
    }

    fn into_host(self) -> HostValue {
        HostValue::Array {
            element: T::descriptor(),
            items: self.into_iter().map(HostType::into_host).collect(),
        }
    }

    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Array { items, .. } => items.into_iter().map(T::from_host).collect(),
            other => Err(other.mismatch("array")),
        }
    }
}

impl<T: HostType> HostType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::nullable_of(T::descriptor())
    }

    fn into_host(self) -> HostValue {
        match self {
            Some(inner) => inner.into_host(),
            None => HostValue::Null,
        }
    }

    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Null => Ok(None),
            other => T::from_host(other).map(Some),
        }
    }
}
