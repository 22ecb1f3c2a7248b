//! Engine objects passed by reference.
//!
//! An interface value never crosses as data. The engine keeps the object
//! in its handle table and the value buffer carries only the handle, so the
//! host can call back into the same object later. The translator carries
//! the method table the host uses to marshal those calls.

use crate::codec::{BitSink, BitSource};
use crate::depot::Depot;
use crate::error::{MarshalError, Result};
use crate::program::opcode::{pickle, unpickle};
use crate::program::Assembler;
use crate::translator::{HostRoutine, Translator, TranslatorFactory};
use crate::types::{InterfaceType, TypeDescriptor};
use crate::value::HostValue;
use std::collections::HashSet;
use std::sync::Arc;

/// One callable member of an interface, with resolved argument and return
/// translators.
#[derive(Debug)]
pub struct Method {
    name: String,
    params: Vec<Arc<Translator>>,
    returns: Arc<Translator>,
}

impl Method {
    pub fn new(name: impl Into<String>, params: Vec<Arc<Translator>>, returns: Arc<Translator>) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Arc<Translator>] {
        &self.params
    }

    pub fn returns(&self) -> &Arc<Translator> {
        &self.returns
    }

    /// Fails unless `found` arguments were supplied.
    pub fn check_arity(&self, found: usize) -> Result<()> {
        if found == self.params.len() {
            Ok(())
        } else {
            Err(MarshalError::ArityMismatch {
                method: self.name.clone(),
                expected: self.params.len(),
                found,
            })
        }
    }
}

/// Build the translator for an interface.
///
/// Both programs are an empty `[TYPE_OBJECT][0u32]` block: an object with
/// no property selection is passed by reference. `methods` must follow the
/// declaration order of `interface.methods`.
pub fn interface_translator(interface: &InterfaceType, methods: Vec<Method>) -> Result<Translator> {
    let mut seen = HashSet::new();
    for method in &interface.methods {
        if !seen.insert(method.name.as_str()) {
            return Err(MarshalError::DuplicateMethod {
                interface: interface.name.clone(),
                method: method.name.clone(),
            });
        }
    }

    let mut assembler = Assembler::new();
    assembler.block(pickle::TYPE_OBJECT, unpickle::TYPE_OBJECT, |_| Ok(()))?;
    Ok(Translator::from_assembler(
        TypeDescriptor::Interface(interface.clone()),
        assembler,
        InterfaceRoutine,
    )
    .with_methods(methods))
}

struct InterfaceRoutine;

impl HostRoutine for InterfaceRoutine {
    fn unpickle(&self, source: &mut BitSource<'_>) -> Result<HostValue> {
        source.read_handle().map(HostValue::Handle)
    }

    fn pickle(&self, value: &HostValue, sink: &mut BitSink) -> Result<()> {
        match value {
            HostValue::Handle(handle) => sink.write_handle(*handle),
            other => Err(other.mismatch("handle")),
        }
    }
}

#[derive(Debug, Default)]
pub struct InterfaceFactory;

impl TranslatorFactory for InterfaceFactory {
    fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
        let TypeDescriptor::Interface(interface) = descriptor else {
            return Ok(None);
        };
        let methods = interface
            .methods
            .iter()
            .map(|method| {
                let params = method
                    .params
                    .iter()
                    .map(|param| depot.resolve(param))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Method::new(&method.name, params, depot.resolve(&method.returns)?))
            })
            .collect::<Result<Vec<_>>>()?;
        interface_translator(interface, methods).map(|t| Some(Arc::new(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeter() -> TypeDescriptor {
        TypeDescriptor::interface("Greeter")
            .method("greet", vec![TypeDescriptor::String], TypeDescriptor::String)
            .method("add", vec![TypeDescriptor::Int, TypeDescriptor::Int], TypeDescriptor::Int)
            .build()
    }

    #[test]
    fn test_interface_programs_pass_by_reference() {
        let depot = Depot::new();
        let translator = depot.resolve(&greeter()).unwrap();
        assert_eq!(
            translator.pickle_program().as_bytes(),
            &[pickle::TYPE_OBJECT, 0, 0, 0, 0]
        );
        assert_eq!(
            translator.unpickle_program().as_bytes(),
            &[unpickle::TYPE_OBJECT, 0, 0, 0, 0]
        );
        assert!(translator.placeholders().is_empty());
    }

    #[test]
    fn test_method_table_resolves_through_depot() {
        let depot = Depot::new();
        let translator = depot.resolve(&greeter()).unwrap();

        let names: Vec<_> = translator.methods().iter().map(Method::name).collect();
        assert_eq!(names, ["greet", "add"]);

        let add = translator.method("add").unwrap();
        let int = depot.resolve(&TypeDescriptor::Int).unwrap();
        assert!(Arc::ptr_eq(&add.params()[0], &int));
        assert!(Arc::ptr_eq(add.returns(), &int));
        assert!(translator.method("missing").is_none());

        assert_eq!(
            add.check_arity(1).unwrap_err().to_string(),
            "method 'add' takes 2 arguments, got 1"
        );
    }

    #[test]
    fn test_handles_round_trip() {
        let translator = Depot::new().resolve(&greeter()).unwrap();
        let bytes = translator.pickle_value(&HostValue::Handle(4)).unwrap();
        assert_eq!(translator.unpickle_bytes(&bytes).unwrap(), HostValue::Handle(4));

        let err = translator.pickle_value(&HostValue::Int(4)).unwrap_err();
        assert_eq!(err.to_string(), "host value int is not a handle");
    }

    #[test]
    fn test_overloads_are_rejected() {
        let ty = TypeDescriptor::interface("Shape")
            .method("scale", vec![TypeDescriptor::Int], TypeDescriptor::Void)
            .method("scale", vec![TypeDescriptor::Double], TypeDescriptor::Void)
            .build();
        let err = Depot::new().resolve(&ty).unwrap_err();
        assert_eq!(
            err,
            MarshalError::DuplicateMethod {
                interface: "Shape".into(),
                method: "scale".into()
            }
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Unresolvable);
    }

    /// Resolves `Builder` to an interface whose method returns a `Builder`.
    struct BuilderFactory;

    impl TranslatorFactory for BuilderFactory {
        fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
            match descriptor {
                TypeDescriptor::Named { name, .. } if name == "Builder" => {
                    let interface = TypeDescriptor::interface("Builder")
                        .method(
                            "with",
                            vec![TypeDescriptor::String],
                            TypeDescriptor::named("Builder", Vec::new()),
                        )
                        .build();
                    depot.resolve(&interface).map(Some)
                }
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_self_returning_method() {
        let depot = Depot::builder().factory(BuilderFactory).build();
        let translator = depot.resolve(&TypeDescriptor::named("Builder", Vec::new())).unwrap();

        let with = translator.method("with").unwrap();
        assert_eq!(with.returns().descriptor(), &TypeDescriptor::named("Builder", Vec::new()));
        let bytes = with.returns().pickle_value(&HostValue::Handle(9)).unwrap();
        assert_eq!(with.returns().unpickle_bytes(&bytes).unwrap(), HostValue::Handle(9));
    }
}
