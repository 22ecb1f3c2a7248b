use crate::types::TypeDescriptor;
use serde::{Deserialize, Serialize};

/// Side-table entry locating a nested type's `TYPE_COMMAND` in both of a
/// translator's programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub descriptor: TypeDescriptor,
    pub pickle_offset: u32,
    pub unpickle_offset: u32,
}

impl Placeholder {
    pub fn new(descriptor: TypeDescriptor, pickle_offset: u32, unpickle_offset: u32) -> Self {
        Self {
            descriptor,
            pickle_offset,
            unpickle_offset,
        }
    }

    /// The same placeholder after its programs were spliced at the given
    /// base offsets of a larger program.
    pub fn rebased(&self, pickle_base: u32, unpickle_base: u32) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            pickle_offset: self.pickle_offset + pickle_base,
            unpickle_offset: self.unpickle_offset + unpickle_base,
        }
    }
}
