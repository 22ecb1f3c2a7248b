//! Script runtime management
//!
//! Provides a JavaScript runtime whose values cross into the host only
//! through compiled translator programs.

use crate::error::Result;
use crate::handles::Handles;
use crate::object::ScriptObject;
use crate::{pickle, unpickle};
use rquickjs::function::{Rest, This};
use rquickjs::{Context, Function, Object, Runtime, Value};
use std::path::Path;
use std::sync::Arc;
use tether_core::{Depot, HostType, HostValue, MarshalError, Method, TypeDescriptor};

/// Script execution context
pub struct ScriptRuntime {
    // Retained objects must be freed before the context and runtime
    handles: Handles,
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    pub context: Context,
    depot: Arc<Depot>,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self> {
        Self::with_depot(Arc::new(Depot::new()))
    }

    /// Share `depot` with other runtimes.
    pub fn with_depot(depot: Arc<Depot>) -> Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;

        Ok(Self {
            handles: Handles::new(),
            runtime,
            context,
            depot,
        })
    }

    pub fn depot(&self) -> &Arc<Depot> {
        &self.depot
    }

    /// Objects currently passed to the host by reference.
    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    pub fn execute_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<()> {
        self.context.with(|ctx| -> Result<_> {
            ctx.eval::<(), _>(source)?;
            Ok(())
        })
    }

    /// Evaluate `source` and marshal its completion value as `descriptor`.
    pub fn evaluate_as(&self, source: &str, descriptor: &TypeDescriptor) -> Result<HostValue> {
        let translator = self.depot.resolve(descriptor)?;
        self.context.with(|ctx| -> Result<_> {
            let value: Value = ctx.eval(source)?;
            let bytes = pickle(&self.depot, &self.handles, &translator, &value)?;
            Ok(translator.unpickle_bytes(&bytes)?)
        })
    }

    pub fn evaluate<T: HostType>(&self, source: &str) -> Result<T> {
        let value = self.evaluate_as(source, &T::descriptor())?;
        Ok(T::from_host(value)?)
    }

    /// Marshal `value` as `descriptor` into the global `name`.
    pub fn set_as(&self, name: &str, descriptor: &TypeDescriptor, value: &HostValue) -> Result<()> {
        let translator = self.depot.resolve(descriptor)?;
        let bytes = translator.pickle_value(value)?;
        self.context.with(|ctx| -> Result<_> {
            let value = unpickle(&ctx, &self.depot, &self.handles, &translator, &bytes)?;
            ctx.globals().set(name, value)?;
            Ok(())
        })
    }

    pub fn set<T: HostType>(&self, name: &str, value: T) -> Result<()> {
        self.set_as(name, &T::descriptor(), &value.into_host())
    }

    /// Read the global `name` as `descriptor`.
    pub fn get_as(&self, name: &str, descriptor: &TypeDescriptor) -> Result<HostValue> {
        let translator = self.depot.resolve(descriptor)?;
        self.context.with(|ctx| -> Result<_> {
            let value: Value = ctx.globals().get(name)?;
            let bytes = pickle(&self.depot, &self.handles, &translator, &value)?;
            Ok(translator.unpickle_bytes(&bytes)?)
        })
    }

    pub fn get<T: HostType>(&self, name: &str) -> Result<T> {
        let value = self.get_as(name, &T::descriptor())?;
        Ok(T::from_host(value)?)
    }

    /// Call the global function `name`, marshalling each argument with its
    /// descriptor and the result as `returns`.
    pub fn call_function_as(
        &self,
        name: &str,
        args: &[(TypeDescriptor, HostValue)],
        returns: &TypeDescriptor,
    ) -> Result<HostValue> {
        let encoded = args
            .iter()
            .map(|(descriptor, value)| -> Result<_> {
                let translator = self.depot.resolve(descriptor)?;
                let bytes = translator.pickle_value(value)?;
                Ok((translator, bytes))
            })
            .collect::<Result<Vec<_>>>()?;
        let result = self.depot.resolve(returns)?;

        self.context.with(|ctx| -> Result<_> {
            let func: Function = ctx.globals().get(name)?;
            let values = encoded
                .iter()
                .map(|(translator, bytes)| unpickle(&ctx, &self.depot, &self.handles, translator, bytes))
                .collect::<Result<Vec<_>>>()?;
            let returned: Value = func.call((Rest(values),))?;
            let bytes = pickle(&self.depot, &self.handles, &result, &returned)?;
            Ok(result.unpickle_bytes(&bytes)?)
        })
    }

    /// Evaluate `source` to an object implementing the interface
    /// `descriptor`.
    pub fn evaluate_object(&self, source: &str, descriptor: &TypeDescriptor) -> Result<ScriptObject<'_>> {
        let value = self.evaluate_as(source, descriptor)?;
        self.adopt(descriptor, value)
    }

    /// Read the global `name` as an object implementing `descriptor`.
    pub fn get_object(&self, name: &str, descriptor: &TypeDescriptor) -> Result<ScriptObject<'_>> {
        let value = self.get_as(name, descriptor)?;
        self.adopt(descriptor, value)
    }

    /// Take ownership of a handle produced by an interface translator, for
    /// example one returned by a method call or nested in a record.
    pub fn adopt(&self, descriptor: &TypeDescriptor, value: HostValue) -> Result<ScriptObject<'_>> {
        let translator = self.depot.resolve(descriptor)?;
        match value {
            HostValue::Handle(handle) => Ok(ScriptObject::new(self, handle, translator)),
            other => Err(MarshalError::HostMismatch {
                found: other.kind_name(),
                expected: "handle",
            }
            .into()),
        }
    }

    /// Invoke `method` on the retained object `handle` with the object as
    /// `this`.
    pub(crate) fn call_method(&self, handle: u32, method: &Method, args: &[HostValue]) -> Result<HostValue> {
        let encoded = method
            .params()
            .iter()
            .zip(args)
            .map(|(translator, value)| translator.pickle_value(value))
            .collect::<Result<Vec<_>, _>>()?;
        let returns = method.returns();
        tracing::trace!(method = method.name(), handle, "calling script method");

        self.context.with(|ctx| -> Result<_> {
            let object: Object = self.handles.restore(&ctx, handle)?;
            let func: Function = object.get(method.name())?;
            let values = method
                .params()
                .iter()
                .zip(&encoded)
                .map(|(translator, bytes)| unpickle(&ctx, &self.depot, &self.handles, translator, bytes))
                .collect::<Result<Vec<_>>>()?;
            let returned: Value = func.call((This(object), Rest(values)))?;
            let bytes = pickle(&self.depot, &self.handles, returns, &returned)?;
            Ok(returns.unpickle_bytes(&bytes)?)
        })
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<()> {
        self.context.with(|ctx| -> Result<_> {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(())?;
            Ok(())
        })
    }
}
