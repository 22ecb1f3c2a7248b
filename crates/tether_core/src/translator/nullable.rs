use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::Result;
use crate::program::opcode::ATTR_NULLABLE;
use crate::program::Assembler;
use crate::translator::{HostRoutine, Translator, TranslatorFactory};
use crate::types::TypeDescriptor;
use crate::value::HostValue;
use std::sync::Arc;

/// Build the translator for `inner?`.
///
/// The value buffer carries a presence byte; the inner value follows only
/// when it is `1`.
pub fn nullable_translator(inner: Arc<Translator>, inline_limit: usize) -> Result<Translator> {
    let descriptor = TypeDescriptor::nullable_of(inner.descriptor().clone());
    let mut assembler = Assembler::new();
    assembler.block(ATTR_NULLABLE, ATTR_NULLABLE, |a| {
        a.embed_or_invoke(&inner, inline_limit).map(drop)
    })?;
    Ok(Translator::from_assembler(
        descriptor,
        assembler,
        NullableRoutine { inner },
    ))
}

struct NullableRoutine {
    inner: Arc<Translator>,
}

impl HostRoutine for NullableRoutine {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        if source.read_presence()? {
            self.inner.unpickle(source)
        } else {
            Ok(HostValue::Null)
        }
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        if value.is_null() {
            sink.write_presence(false)
        } else {
            sink.write_presence(true)?;
            self.inner.pickle(value, sink)
        }
    }
}

#[derive(Debug, Default)]
pub struct NullableFactory;

impl TranslatorFactory for NullableFactory {
    fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
        let TypeDescriptor::Nullable(inner) = descriptor else {
            return Ok(None);
        };
        let inner = depot.resolve(inner)?;
        nullable_translator(inner, depot.inline_limit()).map(|t| Some(Arc::new(t)))
    }
}
