//! Translators: a type's pair of engine programs plus the host routine that
//! speaks the same value-buffer layout.
//!
//! Leaf translators are process-wide singletons. Composite translators are
//! assembled from already-resolved child translators, either by copying the
//! child programs in or by calling them through a `TYPE_COMMAND`.

mod array;
mod forward;
mod interface;
mod leaf;
mod nullable;
mod record;

pub use array::{array_translator, ArrayFactory};
pub(crate) use forward::ForwardSlot;
pub use interface::{interface_translator, InterfaceFactory, Method};
pub use leaf::{leaf_translator, LeafFactory};
pub use nullable::{nullable_translator, NullableFactory};
pub use record::{record_translator, RecordFactory};

use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::Result;
use crate::program::{Assembler, Dialect, Placeholder, Program};
use crate::types::TypeDescriptor;
use crate::value::HostValue;
use std::fmt;
use std::sync::Arc;

/// The host half of a translator.
///
/// `unpickle` consumes exactly the bytes the engine's pickle program wrote
/// for one value; `pickle` writes exactly what the engine's unpickle
/// program will read.
pub trait HostRoutine: Send + Sync {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue>;

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()>;
}

/// Produces a translator for the descriptors it recognises.
///
/// Factories return `Ok(None)` for descriptors they do not handle. They
/// resolve child types through `depot`, never by building them directly.
pub trait TranslatorFactory: Send + Sync {
    fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>>;
}

pub struct Translator {
    descriptor: TypeDescriptor,
    pickle: Program,
    unpickle: Program,
    placeholders: Vec<Placeholder>,
    routine: Box<dyn HostRoutine>,
    methods: Vec<Method>,
}

impl Translator {
    pub fn new(
        descriptor: TypeDescriptor,
        pickle: Program,
        unpickle: Program,
        placeholders: Vec<Placeholder>,
        routine: impl HostRoutine + 'static,
    ) -> Self {
        Self {
            descriptor,
            pickle,
            unpickle,
            placeholders,
            routine: Box::new(routine),
            methods: Vec::new(),
        }
    }

    /// Attach the method table of an interface translator.
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn from_assembler(
        descriptor: TypeDescriptor,
        assembler: Assembler,
        routine: impl HostRoutine + 'static,
    ) -> Self {
        let (pickle, unpickle, placeholders) = assembler.finish();
        Self::new(descriptor, pickle, unpickle, placeholders, routine)
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn pickle_program(&self) -> &Program {
        &self.pickle
    }

    pub fn unpickle_program(&self) -> &Program {
        &self.unpickle
    }

    pub fn program(&self, dialect: Dialect) -> &Program {
        match dialect {
            Dialect::Pickle => &self.pickle,
            Dialect::Unpickle => &self.unpickle,
        }
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// The placeholder whose `TYPE_COMMAND` sits at `offset` in the given
    /// program.
    pub fn placeholder_at(&self, dialect: Dialect, offset: usize) -> Option<&Placeholder> {
        self.placeholders.iter().find(|placeholder| {
            let at = match dialect {
                Dialect::Pickle => placeholder.pickle_offset,
                Dialect::Unpickle => placeholder.unpickle_offset,
            };
            at as usize == offset
        })
    }

    /// Methods the host may call on values of this type, empty unless the
    /// type is an interface.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name() == name)
    }

    /// Read one value written by this type's pickle program.
    pub fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        self.routine.unpickle(source)
    }

    /// Write `value` for this type's unpickle program.
    pub fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        self.routine.pickle(value, sink)
    }

    /// Read a whole value buffer, rejecting leftover bytes.
    pub fn unpickle_bytes(&self, bytes: &[u8]) -> Result<HostValue> {
        let mut source = BitSource::new(bytes);
        let value = self.unpickle(&mut source)?;
        source.check_eof()?;
        Ok(value)
    }

    pub fn pickle_value(&self, value: &HostValue) -> Result<Vec<u8>> {
        let mut sink = BitSink::new();
        self.pickle(value, &mut sink)?;
        Ok(sink.into_bytes())
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("descriptor", &self.descriptor.to_string())
            .field("pickle", &self.pickle)
            .field("unpickle", &self.unpickle)
            .field("placeholders", &self.placeholders)
            .field("methods", &self.methods.len())
            .finish()
    }
}
