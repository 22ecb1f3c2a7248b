use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::{MarshalError, Result};
use crate::program::opcode::{pickle, unpickle};
use crate::program::Program;
use crate::translator::{HostRoutine, Translator, TranslatorFactory};
use crate::types::TypeDescriptor;
use crate::value::HostValue;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Scalar kinds with a one-opcode program in each dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
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
}

impl Leaf {
    const ALL: [Leaf; 10] = [
        Leaf::Void,
        Leaf::Boolean,
        Leaf::Byte,
        Leaf::Char,
        Leaf::Short,
        Leaf::Int,
        Leaf::Long,
        Leaf::Float,
        Leaf::Double,
        Leaf::String,
    ];

    fn of(descriptor: &TypeDescriptor) -> Option<Leaf> {
        Some(match descriptor {
            TypeDescriptor::Void => Leaf::Void,
            TypeDescriptor::Boolean => Leaf::Boolean,
            TypeDescriptor::Byte => Leaf::Byte,
            TypeDescriptor::Char => Leaf::Char,
            TypeDescriptor::Short => Leaf::Short,
            TypeDescriptor::Int => Leaf::Int,
            TypeDescriptor::Long => Leaf::Long,
            TypeDescriptor::Float => Leaf::Float,
            TypeDescriptor::Double => Leaf::Double,
            TypeDescriptor::String => Leaf::String,
            _ => return None,
        })
    }

    fn descriptor(self) -> TypeDescriptor {
        match self {
            Leaf::Void => TypeDescriptor::Void,
            Leaf::Boolean => TypeDescriptor::Boolean,
            Leaf::Byte => TypeDescriptor::Byte,
            Leaf::Char => TypeDescriptor::Char,
            Leaf::Short => TypeDescriptor::Short,
            Leaf::Int => TypeDescriptor::Int,
            Leaf::Long => TypeDescriptor::Long,
            Leaf::Float => TypeDescriptor::Float,
            Leaf::Double => TypeDescriptor::Double,
            Leaf::String => TypeDescriptor::String,
        }
    }

    fn pickle_op(self) -> u8 {
        match self {
            Leaf::Void => pickle::TYPE_NULL,
            Leaf::Boolean => pickle::TYPE_BOOLEAN,
            Leaf::Char | Leaf::String => pickle::TYPE_STRING,
            Leaf::Byte | Leaf::Short | Leaf::Int | Leaf::Long | Leaf::Float | Leaf::Double => {
                pickle::TYPE_NUMBER
            }
        }
    }

    fn unpickle_op(self) -> u8 {
        match self {
            Leaf::Void => unpickle::TYPE_NULL,
            Leaf::Boolean => unpickle::TYPE_BOOLEAN,
            Leaf::Byte => unpickle::TYPE_BYTE,
            Leaf::Short => unpickle::TYPE_SHORT,
            Leaf::Int => unpickle::TYPE_INT,
            Leaf::Float => unpickle::TYPE_FLOAT,
            // Script numbers are doubles; longs travel as doubles too
            Leaf::Long | Leaf::Double => unpickle::TYPE_DOUBLE,
            Leaf::Char | Leaf::String => unpickle::TYPE_STRING,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Leaf::Void => "void",
            Leaf::Boolean => "boolean",
            Leaf::Byte => "byte",
            Leaf::Char => "char",
            Leaf::Short => "short",
            Leaf::Int => "int",
            Leaf::Long => "long",
            Leaf::Float => "float",
            Leaf::Double => "double",
            Leaf::String => "String",
        }
    }

    fn translator(self) -> Translator {
        Translator::new(
            self.descriptor(),
            Program::new(vec![self.pickle_op()]),
            Program::new(vec![self.unpickle_op()]),
            Vec::new(),
            self,
        )
    }
}

impl HostRoutine for Leaf {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        Ok(match self {
            Leaf::Void => {
                source.read_null()?;
                HostValue::Null
            }
            Leaf::Boolean => HostValue::Bool(source.read_bool()?),
            Leaf::Byte => HostValue::Byte(source.read_byte()?),
            Leaf::Char => HostValue::Char(source.read_char()?),
            Leaf::Short => HostValue::Short(source.read_short()?),
            Leaf::Int => HostValue::Int(source.read_int()?),
            Leaf::Long => HostValue::Long(source.read_long()?),
            Leaf::Float => HostValue::Float(source.read_float()?),
            Leaf::Double => HostValue::Double(source.read_double()?),
            Leaf::String => HostValue::String(source.read_string()?.to_owned()),
        })
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        match (self, value) {
            (Leaf::Void, HostValue::Null) => sink.write_null(),
            (Leaf::Boolean, HostValue::Bool(b)) => sink.write_bool(*b),
            (Leaf::Byte, HostValue::Byte(n)) => sink.write_int(i32::from(*n)),
            (Leaf::Char, HostValue::Char(c)) => sink.write_string(c.encode_utf8(&mut [0; 4])),
            (Leaf::Short, HostValue::Short(n)) => sink.write_int(i32::from(*n)),
            (Leaf::Int, HostValue::Int(n)) => sink.write_int(*n),
            // Rounds to nearest beyond 2^53
            (Leaf::Long, HostValue::Long(n)) => sink.write_double(*n as f64),
            (Leaf::Float, HostValue::Float(n)) => sink.write_double(f64::from(*n)),
            (Leaf::Double, HostValue::Double(n)) => sink.write_double(*n),
            (Leaf::String, HostValue::String(s)) => sink.write_string(s),
            (leaf, other) => Err(MarshalError::HostMismatch {
                found: other.kind_name(),
                expected: leaf.name(),
            }),
        }
    }
}

static LEAVES: Lazy<Vec<Arc<Translator>>> =
    Lazy::new(|| Leaf::ALL.iter().map(|leaf| Arc::new(leaf.translator())).collect());

/// The shared translator for a scalar descriptor, if it is one.
pub fn leaf_translator(descriptor: &TypeDescriptor) -> Option<Arc<Translator>> {
    let leaf = Leaf::of(descriptor)?;
    let index = Leaf::ALL.iter().position(|candidate| *candidate == leaf)?;
    LEAVES.get(index).cloned()
}

/// Resolves the ten scalar descriptors to their shared translators.
#[derive(Debug, Default)]
pub struct LeafFactory;

impl TranslatorFactory for LeafFactory {
    fn create(&self, _depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
        Ok(leaf_translator(descriptor))
    }
}
