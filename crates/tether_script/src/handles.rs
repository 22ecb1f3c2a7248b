//! Script objects retained on behalf of the host.
//!
//! Interface values cross the value buffer as small integer handles. The
//! table keeps each object alive until the host releases its handle or the
//! runtime is dropped. Freed slots are reused.

use crate::error::{Result, ScriptError};
use rquickjs::{Ctx, Object, Persistent};
use std::cell::RefCell;
use tether_core::MarshalError;

#[derive(Default)]
pub struct Handles {
    slots: RefCell<Vec<Option<Persistent<Object<'static>>>>>,
    free: RefCell<Vec<u32>>,
}

impl Handles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `object` alive and return its handle.
    pub fn retain<'js>(&self, ctx: &Ctx<'js>, object: Object<'js>) -> Result<u32> {
        let saved = Persistent::save(ctx, object);
        let mut slots = self.slots.borrow_mut();
        if let Some(handle) = self.free.borrow_mut().pop() {
            slots[handle as usize] = Some(saved);
            return Ok(handle);
        }
        let handle = u32::try_from(slots.len()).map_err(|_| MarshalError::OutOfMemory)?;
        slots.push(Some(saved));
        Ok(handle)
    }

    /// The object behind `handle`, which stays retained.
    pub fn restore<'js>(&self, ctx: &Ctx<'js>, handle: u32) -> Result<Object<'js>> {
        let saved = self
            .slots
            .borrow()
            .get(handle as usize)
            .and_then(Option::clone)
            .ok_or(ScriptError::UnknownHandle(handle))?;
        Ok(saved.restore(ctx)?)
    }

    /// Drop the table's reference to `handle`. Returns `false` if it was
    /// not live.
    pub fn release(&self, handle: u32) -> bool {
        let released = self
            .slots
            .borrow_mut()
            .get_mut(handle as usize)
            .and_then(Option::take);
        match released {
            Some(_) => {
                self.free.borrow_mut().push(handle);
                true
            }
            None => false,
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.slots.borrow().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every handle.
    pub fn clear(&self) {
        self.slots.borrow_mut().clear();
        self.free.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Handles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handles").field("live", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_retain_restore_release() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let handles = Handles::new();

        context.with(|ctx| {
            let object = Object::new(ctx.clone()).unwrap();
            object.set("tag", 7).unwrap();
            let a = handles.retain(&ctx, object.clone()).unwrap();
            let b = handles.retain(&ctx, Object::new(ctx.clone()).unwrap()).unwrap();
            assert_eq!((a, b), (0, 1));
            assert_eq!(handles.len(), 2);

            let restored = handles.restore(&ctx, a).unwrap();
            assert_eq!(restored.get::<_, i32>("tag").unwrap(), 7);

            assert!(handles.release(a));
            assert!(!handles.release(a));
            assert!(matches!(
                handles.restore(&ctx, a),
                Err(ScriptError::UnknownHandle(0))
            ));

            // The freed slot is handed out again
            let c = handles.retain(&ctx, object).unwrap();
            assert_eq!(c, a);
        });
        handles.clear();
        assert!(handles.is_empty());
    }
}
