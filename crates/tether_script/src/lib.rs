//! Tether Scripting System
//!
//! QuickJS side of the marshalling layer: a runtime wrapper plus the two
//! interpreters that execute translator programs against live script
//! values.
//!
//! ## Architecture
//!
//! - **Pickle:** walk a script value under a pickle program, filling a value buffer
//! - **Unpickle:** walk a value buffer under an unpickle program, building a script value
//! - **Host:** the translator's host routine reads or writes the same buffer
//! - **Objects:** interface values stay in the engine; the host holds a
//!   [`ScriptObject`] handle and calls their methods through the runtime

pub mod error;
pub mod handles;
pub mod object;
pub mod pickle;
pub mod runtime;
pub mod unpickle;

pub use error::{Result, ScriptError};
pub use handles::Handles;
pub use object::ScriptObject;
pub use pickle::pickle;
pub use runtime::ScriptRuntime;
pub use unpickle::unpickle;

pub use rquickjs;
pub use tether_core;
