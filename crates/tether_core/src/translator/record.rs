use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::{MarshalError, Result};
use crate::program::opcode::{pickle, unpickle, OPT_POP, OPT_PUSH};
use crate::program::Assembler;
use crate::translator::{HostRoutine, Translator, TranslatorFactory};
use crate::types::{RecordType, TypeDescriptor};
use crate::value::HostValue;
use std::sync::Arc;

/// Build the translator for a structural record.
///
/// Pickle: `[TYPE_OBJECT][len][OPT_PUSH] ([PROP_STR name] field)* [OPT_POP]`,
/// selecting each property before reading it. Unpickle places the name
/// after the field, naming the property the value just built is stored
/// under. Fields travel in declaration order.
pub fn record_translator(
    record: &RecordType,
    fields: Vec<Arc<Translator>>,
    inline_limit: usize,
) -> Result<Translator> {
    let mut assembler = Assembler::new();
    assembler.block(pickle::TYPE_OBJECT, unpickle::TYPE_OBJECT, |a| {
        a.pickle().op(OPT_PUSH);
        a.unpickle().op(OPT_PUSH);
        for (field, translator) in record.fields.iter().zip(&fields) {
            a.pickle().prop_str(&field.name)?;
            a.embed_or_invoke(translator, inline_limit)?;
            a.unpickle().prop_str(&field.name)?;
        }
        a.pickle().op(OPT_POP);
        a.unpickle().op(OPT_POP);
        Ok(())
    })?;

    let routine = RecordRoutine {
        name: record.name.clone(),
        fields: record
            .fields
            .iter()
            .map(|field| field.name.clone())
            .zip(fields)
            .collect(),
    };
    Ok(Translator::from_assembler(
        TypeDescriptor::Record(record.clone()),
        assembler,
        routine,
    ))
}

struct RecordRoutine {
    name: String,
    fields: Vec<(String, Arc<Translator>)>,
}

impl HostRoutine for RecordRoutine {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        let fields = self
            .fields
            .iter()
            .map(|(name, translator)| Ok((name.clone(), translator.unpickle(source)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(HostValue::Record {
            name: self.name.clone(),
            fields,
        })
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        if !matches!(value, HostValue::Record { .. }) {
            return Err(value.mismatch("record"));
        }
        for (name, translator) in &self.fields {
            let field = value.field(name).ok_or_else(|| MarshalError::MissingField {
                record: self.name.clone(),
                field: name.clone(),
            })?;
            translator.pickle(field, sink)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordFactory;

impl TranslatorFactory for RecordFactory {
    fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
        let TypeDescriptor::Record(record) = descriptor else {
            return Ok(None);
        };
        let fields = record
            .fields
            .iter()
            .map(|field| depot.resolve(&field.ty))
            .collect::<Result<Vec<_>>>()?;
        record_translator(record, fields, depot.inline_limit()).map(|t| Some(Arc::new(t)))
    }
}
