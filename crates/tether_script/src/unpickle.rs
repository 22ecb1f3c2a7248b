//! Engine-side unpickling: value buffer → script value.

use crate::error::Result;
use crate::handles::Handles;
use rquickjs::{Array, Ctx, Object, Value};
use std::sync::Arc;
use tether_core::program::opcode::{unpickle, ATTR_NULLABLE, OPT_POP, OPT_PUSH, PROP_INT, PROP_STR};
use tether_core::program::ProgramReader;
use tether_core::{BitSource, Depot, Dialect, MarshalError, Translator};

/// Run `translator`'s unpickle program over `bytes`, which must hold
/// exactly one value written by its host routine. Handles resolve against
/// `handles`.
pub fn unpickle<'js>(
    ctx: &Ctx<'js>,
    depot: &Depot,
    handles: &Handles,
    translator: &Translator,
    bytes: &[u8],
) -> Result<Value<'js>> {
    let mut unpickler = Unpickler {
        ctx: ctx.clone(),
        depot,
        handles,
        source: BitSource::new(bytes),
    };
    let value = unpickler.run(translator)?;
    unpickler.source.check_eof()?;
    Ok(value)
}

struct Unpickler<'js, 'd, 'b> {
    ctx: Ctx<'js>,
    depot: &'d Depot,
    handles: &'d Handles,
    source: BitSource<'b>,
}

impl<'js> Unpickler<'js, '_, '_> {
    fn run(&mut self, translator: &Translator) -> Result<Value<'js>> {
        let mut reader = ProgramReader::new(translator.unpickle_program());
        let value = self.value(translator, &mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    fn value(&mut self, translator: &Translator, reader: &mut ProgramReader<'_>) -> Result<Value<'js>> {
        let ctx = self.ctx.clone();
        let at = reader.offset();
        let value = match reader.next_op()? {
            unpickle::TYPE_NULL => {
                self.source.read_null()?;
                Value::new_null(ctx)
            }
            unpickle::TYPE_BOOLEAN => Value::new_bool(ctx, self.source.read_bool()?),
            unpickle::TYPE_BYTE => Value::new_int(ctx, i32::from(self.source.read_byte()?)),
            unpickle::TYPE_SHORT => Value::new_int(ctx, i32::from(self.source.read_short()?)),
            unpickle::TYPE_INT => Value::new_int(ctx, self.source.read_int()?),
            unpickle::TYPE_FLOAT => Value::new_float(ctx, f64::from(self.source.read_float()?)),
            unpickle::TYPE_DOUBLE => Value::new_float(ctx, self.source.read_double()?),
            unpickle::TYPE_STRING => {
                rquickjs::String::from_str(ctx, self.source.read_string()?)?.into_value()
            }
            unpickle::TYPE_ARRAY => {
                let len = reader.next_len()?;
                let count = self.source.read_length()?;
                let array = Array::new(ctx)?;
                for index in 0..count {
                    let mut body = reader.segment(len)?;
                    let item = self.value(translator, &mut body)?;
                    body.finish()?;
                    array.set(index, item)?;
                }
                reader.skip(len)?;
                array.into_value()
            }
            ATTR_NULLABLE => {
                let len = reader.next_len()?;
                let value = if self.source.read_presence()? {
                    let mut body = reader.segment(len)?;
                    let value = self.value(translator, &mut body)?;
                    body.finish()?;
                    value
                } else {
                    Value::new_null(ctx)
                };
                reader.skip(len)?;
                value
            }
            unpickle::TYPE_OBJECT => {
                let len = reader.next_len()?;
                if len == 0 {
                    let handle = self.source.read_handle()?;
                    return Ok(self.handles.restore(&ctx, handle)?.into_value());
                }
                let object = Object::new(ctx)?;
                let mut body = reader.segment(len)?;
                self.fields(translator, &mut body, &object)?;
                reader.skip(len)?;
                object.into_value()
            }
            unpickle::TYPE_COMMAND => {
                let len = reader.next_len()?;
                reader.skip(len)?;
                let child = self.subroutine(translator, at)?;
                self.run(&child)?
            }
            op => return Err(reader.unknown(op).into()),
        };
        Ok(value)
    }

    /// Object body: `OPT_PUSH`, value/selector pairs, `OPT_POP`.
    fn fields(
        &mut self,
        translator: &Translator,
        reader: &mut ProgramReader<'_>,
        object: &Object<'js>,
    ) -> Result<()> {
        reader.expect_op(OPT_PUSH)?;
        while reader.peek_op()? != OPT_POP {
            let field = self.value(translator, reader)?;
            match reader.next_op()? {
                PROP_STR => object.set(reader.next_name()?, field)?,
                PROP_INT => object.set(reader.next_u32()?, field)?,
                op => return Err(reader.unknown(op).into()),
            }
        }
        reader.expect_op(OPT_POP)?;
        reader.finish()?;
        Ok(())
    }

    fn subroutine(&self, translator: &Translator, at: usize) -> Result<Arc<Translator>> {
        let placeholder = translator
            .placeholder_at(Dialect::Unpickle, at)
            .ok_or_else(|| MarshalError::MalformedProgram {
                offset: at,
                reason: "command without placeholder".to_string(),
            })?;
        self.depot.counters().increment("engine.subroutine", 1);
        tracing::trace!(ty = %placeholder.descriptor, offset = at, "unpickle subroutine");
        Ok(self.depot.resolve(&placeholder.descriptor)?)
    }
}
