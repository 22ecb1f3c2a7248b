//! Forward references for self-referential types.
//!
//! While the depot builds a type, a nested request for the same type on
//! the same thread gets a forward translator. Its programs are a bare
//! `TYPE_COMMAND`, so the engine reaches the real translator through the
//! depot at run time; its host routine follows a weak link that the depot
//! fills once the real translator is installed.

use crate::codec::{BitSink, BitSource};
use crate::error::{MarshalError, Result};
use crate::program::Assembler;
use crate::translator::{HostRoutine, Translator};
use crate::types::TypeDescriptor;
use crate::value::HostValue;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};

#[derive(Debug)]
pub(crate) struct ForwardSlot {
    descriptor: TypeDescriptor,
    target: OnceCell<Weak<Translator>>,
}

impl ForwardSlot {
    pub(crate) fn new(descriptor: TypeDescriptor) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            target: OnceCell::new(),
        })
    }

    /// Point every forward translator of this slot at `target`.
    ///
    /// The first fill wins.
    pub(crate) fn fill(&self, target: &Arc<Translator>) {
        if self.target.set(Arc::downgrade(target)).is_err() {
            tracing::trace!(ty = %self.descriptor, "forward slot already filled");
        }
    }

    fn target(&self) -> Result<Arc<Translator>> {
        self.target
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MarshalError::NoTranslator(self.descriptor.clone()))
    }

    pub(crate) fn translator(self: &Arc<Self>) -> Result<Translator> {
        let mut assembler = Assembler::new();
        assembler.invoke(&self.descriptor)?;
        Ok(Translator::from_assembler(
            self.descriptor.clone(),
            assembler,
            ForwardRoutine {
                slot: Arc::clone(self),
            },
        ))
    }
}

struct ForwardRoutine {
    slot: Arc<ForwardSlot>,
}

impl HostRoutine for ForwardRoutine {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        self.slot.target()?.unpickle(source)
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        self.slot.target()?.pickle(value, sink)
    }
}
