use crate::codec::{TAG_BOOLEAN, TAG_DOUBLE, TAG_HANDLE, TAG_INT, TAG_NULL, TAG_STRING};
use crate::error::{MarshalError, Result};

const DEFAULT_CAPACITY: usize = 16;
const MAX_CAPACITY: usize = isize::MAX as usize;

/// Growable writer for value buffers.
///
/// Writes are total for every value of the advertised type. They fail
/// only when a length does not fit its 4-byte frame or when growing runs
/// out of addressable memory.
#[derive(Debug)]
pub struct BitSink {
    bytes: Vec<u8>,
}

impl BitSink {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Make room for `additional` bytes, doubling the requested size.
    fn ensure(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .bytes
            .len()
            .checked_add(additional)
            .filter(|needed| *needed <= MAX_CAPACITY)
            .ok_or(MarshalError::OutOfMemory)?;
        if needed <= self.bytes.capacity() {
            return Ok(());
        }
        let target = needed.saturating_mul(2).min(MAX_CAPACITY);
        self.bytes
            .try_reserve_exact(target - self.bytes.len())
            .map_err(|_| MarshalError::OutOfMemory)
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.ensure(1)?;
        self.bytes.push(TAG_NULL);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.ensure(2)?;
        self.bytes.push(TAG_BOOLEAN);
        self.bytes.push(value as u8);
        Ok(())
    }

    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.ensure(1 + 4)?;
        self.bytes.push(TAG_INT);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.ensure(1 + 8)?;
        self.bytes.push(TAG_DOUBLE);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let size = frame_length(value.len().saturating_add(1))?;
        self.ensure(1 + 4 + size as usize)?;
        self.bytes.push(TAG_STRING);
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        Ok(())
    }

    /// Element count of the array that follows.
    pub fn write_length(&mut self, length: usize) -> Result<()> {
        let length = frame_length(length)?;
        self.ensure(4)?;
        self.bytes.extend_from_slice(&length.to_le_bytes());
        Ok(())
    }

    /// Reference to an object retained by the engine's handle table.
    pub fn write_handle(&mut self, handle: u32) -> Result<()> {
        self.ensure(1 + 4)?;
        self.bytes.push(TAG_HANDLE);
        self.bytes.extend_from_slice(&handle.to_le_bytes());
        Ok(())
    }

    /// Presence flag of a nullable value.
    pub fn write_presence(&mut self, present: bool) -> Result<()> {
        self.ensure(1)?;
        self.bytes.push(present as u8);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Frames are read back as non-negative `i32`s.
fn frame_length(length: usize) -> Result<u32> {
    i32::try_from(length)
        .map(|length| length as u32)
        .map_err(|_| MarshalError::LengthOverflow { length })
}

impl Default for BitSink {
    fn default() -> Self {
        Self::new()
    }
}
