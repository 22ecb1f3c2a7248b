use crate::error::{MarshalError, Result};

/// Bounds-checked cursor over a program.
///
/// Offsets are absolute within the whole program, also for readers
/// narrowed to a block body with [`ProgramReader::segment`], so they can be
/// matched against placeholder offsets.
#[derive(Debug, Clone)]
pub struct ProgramReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ProgramReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            end: bytes.len(),
        }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.end - self.pos < count {
            return Err(MarshalError::malformed_program(self.pos, "truncated instruction"));
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn peek_op(&self) -> Result<u8> {
        if self.is_at_end() {
            return Err(MarshalError::malformed_program(self.pos, "program ended early"));
        }
        Ok(self.bytes[self.pos])
    }

    pub fn next_op(&mut self) -> Result<u8> {
        let op = self.peek_op()?;
        self.pos += 1;
        Ok(op)
    }

    pub fn next_u32(&mut self) -> Result<u32> {
        let mut array = [0u8; 4];
        array.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(array))
    }

    /// Reads a body length and checks the body fits in this reader.
    pub fn next_len(&mut self) -> Result<usize> {
        let at = self.pos;
        let len = self.next_u32()? as usize;
        if self.end - self.pos < len {
            return Err(MarshalError::malformed_program(at, "block overruns its parent"));
        }
        Ok(len)
    }

    /// Reads a `PROP_STR` operand.
    pub fn next_name(&mut self) -> Result<&'a str> {
        let at = self.pos;
        let size = self.next_u32()? as usize;
        if size == 0 {
            return Err(MarshalError::malformed_program(at, "property name without terminator"));
        }
        let bytes = self.take(size)?;
        let (name, terminator) = bytes.split_at(size - 1);
        if terminator != [0] {
            return Err(MarshalError::malformed_program(at, "property name is not terminated"));
        }
        std::str::from_utf8(name)
            .map_err(|_| MarshalError::malformed_program(at, "property name is not UTF-8"))
    }

    pub fn expect_op(&mut self, expected: u8) -> Result<()> {
        let at = self.pos;
        let op = self.next_op()?;
        if op == expected {
            Ok(())
        } else {
            Err(MarshalError::malformed_program(
                at,
                format!("expected opcode {expected:#04x}, found {op:#04x}"),
            ))
        }
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// A reader over the next `len` bytes, leaving this reader in place.
    pub fn segment(&self, len: usize) -> Result<ProgramReader<'a>> {
        if self.end - self.pos < len {
            return Err(MarshalError::malformed_program(self.pos, "segment overruns its parent"));
        }
        Ok(ProgramReader {
            bytes: self.bytes,
            pos: self.pos,
            end: self.pos + len,
        })
    }

    /// Fails unless every byte of this reader was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(MarshalError::malformed_program(self.pos, "trailing instructions"))
        }
    }

    pub fn unknown(&self, op: u8) -> MarshalError {
        MarshalError::malformed_program(self.pos.saturating_sub(1), format!("unexpected opcode {op:#04x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::opcode::{pickle, PROP_STR};
    use crate::program::ProgramBuilder;

    #[test]
    fn test_segment_keeps_absolute_offsets() {
        let mut builder = ProgramBuilder::new();
        let start = builder.open_block(pickle::TYPE_ARRAY);
        builder.op(pickle::TYPE_STRING);
        builder.close_block(start).unwrap();
        let program = builder.finish();

        let mut reader = ProgramReader::new(&program);
        assert_eq!(reader.next_op().unwrap(), pickle::TYPE_ARRAY);
        let len = reader.next_len().unwrap();
        let mut body = reader.segment(len).unwrap();
        assert_eq!(body.offset(), 5);
        assert_eq!(body.next_op().unwrap(), pickle::TYPE_STRING);
        body.finish().unwrap();

        reader.skip(len).unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn test_reads_names() {
        let mut builder = ProgramBuilder::new();
        builder.prop_str("strings").unwrap();
        let program = builder.finish();

        let mut reader = ProgramReader::new(&program);
        assert_eq!(reader.next_op().unwrap(), PROP_STR);
        assert_eq!(reader.next_name().unwrap(), "strings");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_overrunning_block_is_malformed() {
        let bytes = [pickle::TYPE_ARRAY, 9, 0, 0, 0, pickle::TYPE_NUMBER];
        let mut reader = ProgramReader::new(&bytes);
        reader.next_op().unwrap();
        assert!(matches!(
            reader.next_len(),
            Err(MarshalError::MalformedProgram { offset: 1, .. })
        ));
    }
}
