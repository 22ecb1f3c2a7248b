//! Host handles on script objects.
//!
//! A [`ScriptObject`] pairs a retained engine object with its interface
//! translator. Calls look the method up in the translator's method table,
//! marshal the arguments and result through the method's translators, and
//! invoke the script function with the object as `this`.

use crate::error::Result;
use crate::runtime::ScriptRuntime;
use std::fmt;
use std::sync::Arc;
use tether_core::{HostValue, MarshalError, Method, Translator, TypeDescriptor};

pub struct ScriptObject<'r> {
    runtime: &'r ScriptRuntime,
    handle: u32,
    translator: Arc<Translator>,
}

impl<'r> ScriptObject<'r> {
    pub(crate) fn new(runtime: &'r ScriptRuntime, handle: u32, translator: Arc<Translator>) -> Self {
        Self {
            runtime,
            handle,
            translator,
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn translator(&self) -> &Arc<Translator> {
        &self.translator
    }

    /// Value that passes this object back into the script.
    pub fn to_host(&self) -> HostValue {
        HostValue::Handle(self.handle)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.translator.method(name).is_some()
    }

    /// Call the script method `name` with `args`, one per declared
    /// parameter.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        let method = self.method(name)?;
        method.check_arity(args.len())?;
        self.runtime.call_method(self.handle, method, args)
    }

    fn method(&self, name: &str) -> Result<&Method> {
        self.translator.method(name).ok_or_else(|| {
            let interface = match self.translator.descriptor() {
                TypeDescriptor::Interface(interface) => interface.name.clone(),
                other => other.to_string(),
            };
            MarshalError::NoMethod {
                interface,
                method: name.to_string(),
            }
            .into()
        })
    }

    /// Call the script's `close` method when the interface declares one,
    /// then release the handle.
    pub fn close(self) -> Result<()> {
        if self.has_method("close") {
            self.call("close", &[])?;
        }
        Ok(())
    }
}

impl Drop for ScriptObject<'_> {
    fn drop(&mut self) {
        if !self.runtime.handles().release(self.handle) {
            tracing::trace!(handle = self.handle, "script object already released");
        }
    }
}

impl fmt::Debug for ScriptObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptObject")
            .field("handle", &self.handle)
            .field("interface", &self.translator.descriptor().to_string())
            .finish()
    }
}
