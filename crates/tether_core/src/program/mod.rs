//! Marshalling programs: opcodes, construction and traversal.

mod builder;
pub mod opcode;
mod placeholder;
mod reader;

pub use builder::{Assembler, Embedding, ProgramBuilder};
pub use placeholder::Placeholder;
pub use reader::ProgramReader;

use std::fmt;
use std::ops::Deref;

/// Which of a translator's two programs is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Executed by the engine over a live value; fills a value buffer.
    Pickle,
    /// Executed by the engine over a value buffer; builds a live value.
    Unpickle,
}

impl Dialect {
    /// The indirection opcode of this dialect.
    pub fn command_op(self) -> u8 {
        match self {
            Dialect::Pickle => opcode::pickle::TYPE_COMMAND,
            Dialect::Unpickle => opcode::unpickle::TYPE_COMMAND,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Pickle => write!(f, "pickle"),
            Dialect::Unpickle => write!(f, "unpickle"),
        }
    }
}

/// An immutable instruction stream.
#[derive(Clone, PartialEq, Eq)]
pub struct Program(Box<[u8]>);

impl Program {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Program(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Program {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program(")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}
