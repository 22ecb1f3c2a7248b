//! Tether Core
//!
//! Compiled marshalling between host values and script-engine values:
//! - Value buffer codec ([`BitSink`], [`BitSource`])
//! - Engine programs and their builder ([`program`])
//! - Type descriptors and host values ([`TypeDescriptor`], [`HostValue`])
//! - Translators and the memoizing [`Depot`]

pub mod codec;
pub mod depot;
pub mod error;
pub mod program;
pub mod translator;
pub mod types;
pub mod value;

pub use codec::{BitSink, BitSource};
pub use depot::{Depot, DepotBuilder, DepotSettings};
pub use error::{ErrorKind, MarshalError, Result};
pub use program::{Dialect, Placeholder, Program};
pub use translator::{HostRoutine, Method, Translator, TranslatorFactory};
pub use types::{FieldType, InterfaceType, MethodType, RecordType, TypeDescriptor};
pub use value::{HostType, HostValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
