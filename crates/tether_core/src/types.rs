//! Explicit type descriptors
//!
//! Host types are described by value instead of being discovered through
//! reflection. A descriptor is built once per distinct type, hashed and
//! compared structurally, and used as the depot cache key after
//! [`TypeDescriptor::canonicalize`].
//!
//! Descriptors are non-null unless wrapped in [`TypeDescriptor::Nullable`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Array(Box<TypeDescriptor>),
    Nullable(Box<TypeDescriptor>),
    Record(RecordType),
    /// An engine object passed by reference; the host calls its methods.
    Interface(InterfaceType),
    /// A user type resolved by a registered factory, e.g. `Pair<int, String>`.
    Named {
        name: String,
        args: Vec<TypeDescriptor>,
    },
    /// Upper-bounded wildcard (`? extends T`); canonicalizes to its bound.
    Wildcard(Box<TypeDescriptor>),
}

/// A structural object type: an engine object whose named properties map
/// onto the host record's fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// A set of methods an engine object is expected to implement.
///
/// Method names are unique; overloads are rejected when the translator is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceType {
    pub name: String,
    pub methods: Vec<MethodType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodType {
    pub name: String,
    pub params: Vec<TypeDescriptor>,
    pub returns: TypeDescriptor,
}

impl TypeDescriptor {
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    pub fn nullable_of(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable(Box::new(inner))
    }

    pub fn wildcard_of(bound: TypeDescriptor) -> Self {
        TypeDescriptor::Wildcard(Box::new(bound))
    }

    pub fn named(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            args,
        }
    }

    /// Start a record descriptor; add fields with [`RecordType::field`].
    pub fn record(name: impl Into<String>) -> RecordType {
        RecordType {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Start an interface descriptor; add methods with
    /// [`InterfaceType::method`].
    pub fn interface(name: impl Into<String>) -> InterfaceType {
        InterfaceType {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDescriptor::Nullable(_))
    }

    /// Normalize the descriptor so semantically identical types share one
    /// cache key.
    ///
    /// - wildcards are replaced by their upper bound
    /// - `Nullable(Nullable(T))` collapses to `Nullable(T)`
    /// - `Nullable(Void)` collapses to `Void`, which is already null-only
    /// - all of the above applies recursively to element, field, argument,
    ///   parameter and return types
    pub fn canonicalize(&self) -> TypeDescriptor {
        match self {
            TypeDescriptor::Wildcard(bound) => bound.canonicalize(),
            TypeDescriptor::Nullable(inner) => match inner.canonicalize() {
                TypeDescriptor::Void => TypeDescriptor::Void,
                nullable @ TypeDescriptor::Nullable(_) => nullable,
                non_null => TypeDescriptor::nullable_of(non_null),
            },
            TypeDescriptor::Array(element) => TypeDescriptor::array_of(element.canonicalize()),
            TypeDescriptor::Record(record) => TypeDescriptor::Record(RecordType {
                name: record.name.clone(),
                fields: record
                    .fields
                    .iter()
                    .map(|field| FieldType {
                        name: field.name.clone(),
                        ty: field.ty.canonicalize(),
                    })
                    .collect(),
            }),
            TypeDescriptor::Interface(interface) => TypeDescriptor::Interface(InterfaceType {
                name: interface.name.clone(),
                methods: interface
                    .methods
                    .iter()
                    .map(|method| MethodType {
                        name: method.name.clone(),
                        params: method.params.iter().map(TypeDescriptor::canonicalize).collect(),
                        returns: method.returns.canonicalize(),
                    })
                    .collect(),
            }),
            TypeDescriptor::Named { name, args } => TypeDescriptor::Named {
                name: name.clone(),
                args: args.iter().map(TypeDescriptor::canonicalize).collect(),
            },
            leaf => leaf.clone(),
        }
    }
}

impl RecordType {
    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldType {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::Record(self)
    }
}

impl From<RecordType> for TypeDescriptor {
    fn from(record: RecordType) -> Self {
        TypeDescriptor::Record(record)
    }
}

impl InterfaceType {
    pub fn method(
        mut self,
        name: impl Into<String>,
        params: Vec<TypeDescriptor>,
        returns: TypeDescriptor,
    ) -> Self {
        self.methods.push(MethodType {
            name: name.into(),
            params,
            returns,
        });
        self
    }

    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::Interface(self)
    }
}

impl From<InterfaceType> for TypeDescriptor {
    fn from(interface: InterfaceType) -> Self {
        TypeDescriptor::Interface(interface)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Void => write!(f, "void"),
            TypeDescriptor::Boolean => write!(f, "boolean"),
            TypeDescriptor::Byte => write!(f, "byte"),
            TypeDescriptor::Char => write!(f, "char"),
            TypeDescriptor::Short => write!(f, "short"),
            TypeDescriptor::Int => write!(f, "int"),
            TypeDescriptor::Long => write!(f, "long"),
            TypeDescriptor::Float => write!(f, "float"),
            TypeDescriptor::Double => write!(f, "double"),
            TypeDescriptor::String => write!(f, "String"),
            TypeDescriptor::Array(element) => write!(f, "{element}[]"),
            TypeDescriptor::Nullable(inner) => write!(f, "{inner}?"),
            TypeDescriptor::Record(record) => {
                write!(f, "{} {{", record.name)?;
                for (i, field) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", field.name, field.ty)?;
                }
                write!(f, " }}")
            }
            TypeDescriptor::Interface(interface) => {
                write!(f, "interface {} {{", interface.name)?;
                for (i, method) in interface.methods.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}(", method.name)?;
                    write_list(f, &method.params)?;
                    write!(f, "): {}", method.returns)?;
                }
                write!(f, " }}")
            }
            TypeDescriptor::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeDescriptor::Wildcard(bound) => write!(f, "? extends {bound}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_strips_to_bound() {
        let ty = TypeDescriptor::array_of(TypeDescriptor::wildcard_of(TypeDescriptor::String));
        assert_eq!(
            ty.canonicalize(),
            TypeDescriptor::array_of(TypeDescriptor::String)
        );
    }

    #[test]
    fn test_nested_nullable_collapses() {
        let ty = TypeDescriptor::nullable_of(TypeDescriptor::nullable_of(
            TypeDescriptor::wildcard_of(TypeDescriptor::nullable_of(TypeDescriptor::Int)),
        ));
        assert_eq!(
            ty.canonicalize(),
            TypeDescriptor::nullable_of(TypeDescriptor::Int)
        );
        assert_eq!(
            TypeDescriptor::nullable_of(TypeDescriptor::Void).canonicalize(),
            TypeDescriptor::Void
        );
    }

    #[test]
    fn test_canonicalize_reaches_fields_and_args() {
        let record = TypeDescriptor::record("Point")
            .field("x", TypeDescriptor::wildcard_of(TypeDescriptor::Int))
            .build();
        let named = TypeDescriptor::named("Box", vec![record]);

        let expected = TypeDescriptor::named(
            "Box",
            vec![TypeDescriptor::record("Point")
                .field("x", TypeDescriptor::Int)
                .build()],
        );
        assert_eq!(named.canonicalize(), expected);
    }

    #[test]
    fn test_display() {
        let ty = TypeDescriptor::named(
            "Pair",
            vec![
                TypeDescriptor::Int,
                TypeDescriptor::array_of(TypeDescriptor::nullable_of(TypeDescriptor::String)),
            ],
        );
        assert_eq!(ty.to_string(), "Pair<int, String?[]>");

        let point = TypeDescriptor::record("Point")
            .field("x", TypeDescriptor::Int)
            .field("y", TypeDescriptor::Int)
            .build();
        assert_eq!(point.to_string(), "Point { x: int, y: int }");
    }

    #[test]
    fn test_interface_canonicalizes_signatures() {
        let ty = TypeDescriptor::interface("Greeter")
            .method(
                "greet",
                vec![TypeDescriptor::wildcard_of(TypeDescriptor::String)],
                TypeDescriptor::nullable_of(TypeDescriptor::nullable_of(TypeDescriptor::String)),
            )
            .method("close", Vec::new(), TypeDescriptor::nullable_of(TypeDescriptor::Void))
            .build();

        let expected = TypeDescriptor::interface("Greeter")
            .method(
                "greet",
                vec![TypeDescriptor::String],
                TypeDescriptor::nullable_of(TypeDescriptor::String),
            )
            .method("close", Vec::new(), TypeDescriptor::Void)
            .build();
        assert_eq!(ty.canonicalize(), expected);
        assert_eq!(
            expected.to_string(),
            "interface Greeter { greet(String): String?, close(): void }"
        );
    }

    #[test]
    fn test_descriptor_serializes() {
        let ty = TypeDescriptor::array_of(TypeDescriptor::nullable_of(TypeDescriptor::Long));
        let json = serde_json::to_string(&ty).unwrap();
        let back: TypeDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }
}
