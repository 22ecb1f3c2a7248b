use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::Result;
use crate::program::opcode::{pickle, unpickle};
use crate::program::Assembler;
use crate::translator::{HostRoutine, Translator, TranslatorFactory};
use crate::types::TypeDescriptor;
use crate::value::HostValue;
use std::sync::Arc;

/// Build the translator for `element[]`.
///
/// Both programs are `[TYPE_ARRAY][len][element]`; the engine repeats the
/// element body once per item. The value buffer holds the item count
/// followed by each item.
pub fn array_translator(element: Arc<Translator>, inline_limit: usize) -> Result<Translator> {
    let descriptor = TypeDescriptor::array_of(element.descriptor().clone());
    let mut assembler = Assembler::new();
    assembler.block(pickle::TYPE_ARRAY, unpickle::TYPE_ARRAY, |a| {
        a.embed_or_invoke(&element, inline_limit).map(drop)
    })?;
    Ok(Translator::from_assembler(
        descriptor,
        assembler,
        ArrayRoutine { element },
    ))
}

struct ArrayRoutine {
    element: Arc<Translator>,
}

impl HostRoutine for ArrayRoutine {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        let length = source.read_length()?;
        // Every item takes at least one byte
        let mut items = Vec::with_capacity(length.min(source.remaining()));
        for _ in 0..length {
            items.push(self.element.unpickle(source)?);
        }
        Ok(HostValue::Array {
            element: self.element.descriptor().clone(),
            items,
        })
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        let HostValue::Array { items, .. } = value else {
            return Err(value.mismatch("array"));
        };
        sink.write_length(items.len())?;
        for item in items {
            self.element.pickle(item, sink)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ArrayFactory;

impl TranslatorFactory for ArrayFactory {
    fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
        let TypeDescriptor::Array(element) = descriptor else {
            return Ok(None);
        };
        let element = depot.resolve(element)?;
        array_translator(element, depot.inline_limit()).map(|t| Some(Arc::new(t)))
    }
}
