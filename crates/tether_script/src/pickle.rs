//! Engine-side pickling: script value → value buffer.

use crate::error::Result;
use crate::handles::Handles;
use rquickjs::{Object, Value};
use tether_core::program::opcode::{pickle, ATTR_NULLABLE, OPT_POP, OPT_PUSH, PROP_INT, PROP_STR};
use tether_core::program::ProgramReader;
use tether_core::{BitSink, Depot, Dialect, MarshalError, Translator};

/// Run `translator`'s pickle program over `value`, returning the value
/// buffer its host routine reads. Objects passed by reference are retained
/// in `handles`.
pub fn pickle<'js>(
    depot: &Depot,
    handles: &Handles,
    translator: &Translator,
    value: &Value<'js>,
) -> Result<Vec<u8>> {
    let mut pickler = Pickler {
        depot,
        handles,
        sink: BitSink::new(),
    };
    pickler.run(translator, value)?;
    Ok(pickler.sink.into_bytes())
}

fn unexpected(value: &Value<'_>, expected: &'static str) -> MarshalError {
    MarshalError::UnexpectedValue {
        found: value.type_name(),
        expected,
    }
}

fn is_absent(value: &Value<'_>) -> bool {
    value.is_null() || value.is_undefined()
}

struct Pickler<'d> {
    depot: &'d Depot,
    handles: &'d Handles,
    sink: BitSink,
}

impl Pickler<'_> {
    fn run<'js>(&mut self, translator: &Translator, value: &Value<'js>) -> Result<()> {
        let mut reader = ProgramReader::new(translator.pickle_program());
        self.value(translator, &mut reader, value)?;
        reader.finish()?;
        Ok(())
    }

    /// Execute one value instruction and whatever body it owns.
    fn value<'js>(
        &mut self,
        translator: &Translator,
        reader: &mut ProgramReader<'_>,
        value: &Value<'js>,
    ) -> Result<()> {
        let at = reader.offset();
        match reader.next_op()? {
            pickle::TYPE_NULL => {
                if !is_absent(value) {
                    return Err(unexpected(value, "null").into());
                }
                self.sink.write_null()?;
            }
            pickle::TYPE_BOOLEAN => {
                let b = value.as_bool().ok_or_else(|| unexpected(value, "boolean"))?;
                self.sink.write_bool(b)?;
            }
            pickle::TYPE_NUMBER => {
                if let Some(n) = value.as_int() {
                    self.sink.write_int(n)?;
                } else if let Some(n) = value.as_float() {
                    self.sink.write_double(n)?;
                } else {
                    return Err(unexpected(value, "number").into());
                }
            }
            pickle::TYPE_STRING => {
                let s = value.as_string().ok_or_else(|| unexpected(value, "string"))?;
                self.sink.write_string(&s.to_string()?)?;
            }
            pickle::TYPE_ARRAY => {
                let len = reader.next_len()?;
                let array = value.as_array().ok_or_else(|| unexpected(value, "array"))?;
                self.sink.write_length(array.len())?;
                for index in 0..array.len() {
                    let item: Value = array.get(index)?;
                    let mut body = reader.segment(len)?;
                    self.value(translator, &mut body, &item)?;
                    body.finish()?;
                }
                reader.skip(len)?;
            }
            ATTR_NULLABLE => {
                let len = reader.next_len()?;
                if is_absent(value) {
                    self.sink.write_presence(false)?;
                } else {
                    self.sink.write_presence(true)?;
                    let mut body = reader.segment(len)?;
                    self.value(translator, &mut body, value)?;
                    body.finish()?;
                }
                reader.skip(len)?;
            }
            pickle::TYPE_OBJECT => {
                let len = reader.next_len()?;
                let object = value.as_object().ok_or_else(|| unexpected(value, "object"))?;
                if len == 0 {
                    // No property selection: pass the object by reference
                    let handle = self.handles.retain(value.ctx(), object.clone())?;
                    self.sink.write_handle(handle)?;
                } else {
                    let mut body = reader.segment(len)?;
                    self.fields(translator, &mut body, object)?;
                    reader.skip(len)?;
                }
            }
            pickle::TYPE_COMMAND => {
                let len = reader.next_len()?;
                reader.skip(len)?;
                let child = self.subroutine(translator, at)?;
                self.run(&child, value)?;
            }
            op => return Err(reader.unknown(op).into()),
        }
        Ok(())
    }

    /// Object body: `OPT_PUSH`, selector/value pairs, `OPT_POP`.
    fn fields<'js>(
        &mut self,
        translator: &Translator,
        reader: &mut ProgramReader<'_>,
        object: &Object<'js>,
    ) -> Result<()> {
        reader.expect_op(OPT_PUSH)?;
        loop {
            let field: Value = match reader.next_op()? {
                PROP_STR => object.get(reader.next_name()?)?,
                PROP_INT => object.get(reader.next_u32()?)?,
                OPT_POP => break,
                op => return Err(reader.unknown(op).into()),
            };
            self.value(translator, reader, &field)?;
        }
        reader.finish()?;
        Ok(())
    }

    fn subroutine(&self, translator: &Translator, at: usize) -> Result<std::sync::Arc<Translator>> {
        let placeholder = translator
            .placeholder_at(Dialect::Pickle, at)
            .ok_or_else(|| MarshalError::MalformedProgram {
                offset: at,
                reason: "command without placeholder".to_string(),
            })?;
        self.depot.counters().increment("engine.subroutine", 1);
        tracing::trace!(ty = %placeholder.descriptor, offset = at, "pickle subroutine");
        Ok(self.depot.resolve(&placeholder.descriptor)?)
    }
}
