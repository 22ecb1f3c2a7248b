use crate::codec::{TAG_BOOLEAN, TAG_DOUBLE, TAG_HANDLE, TAG_INT, TAG_NULL, TAG_STRING};
use crate::error::{MarshalError, Result};

/// Bounds-checked cursor over a value buffer.
///
/// Every `read_*` consumes one tagged leaf. Numeric reads accept both the
/// int and the double tag and narrow with range and integrality checks.
#[derive(Debug)]
pub struct BitSource<'a> {
    bytes: &'a [u8],
    offset: usize,
}

/// A decoded number before narrowing.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i32),
    Double(f64),
}

impl<'a> BitSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn next_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(MarshalError::Underflow {
                needed: count,
                offset: self.offset,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn next_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.next_bytes(N)?);
        Ok(array)
    }

    fn next_u8(&mut self) -> Result<u8> {
        Ok(self.next_bytes(1)?[0])
    }

    fn next_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.next_array()?))
    }

    fn next_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.next_array()?))
    }

    fn expect_tag(&mut self, expected: u8, kind: &'static str) -> Result<()> {
        let tag = self.next_u8()?;
        if tag == expected {
            Ok(())
        } else {
            Err(MarshalError::TypeMismatch { tag, kind })
        }
    }

    fn next_number(&mut self, kind: &'static str) -> Result<Number> {
        match self.next_u8()? {
            TAG_INT => Ok(Number::Int(self.next_i32()?)),
            TAG_DOUBLE => Ok(Number::Double(self.next_f64()?)),
            tag => Err(MarshalError::TypeMismatch { tag, kind }),
        }
    }

    fn next_str(&mut self) -> Result<&'a str> {
        let start = self.offset;
        let size = self.next_i32()?;
        if size < 1 {
            return Err(MarshalError::MalformedValue {
                offset: start,
                reason: "string length must count its terminator",
            });
        }
        let bytes = self.next_bytes(size as usize)?;
        let (text, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator != [0] {
            return Err(MarshalError::MalformedValue {
                offset: start,
                reason: "string is not terminated",
            });
        }
        std::str::from_utf8(text).map_err(|_| MarshalError::MalformedValue {
            offset: start,
            reason: "string is not valid UTF-8",
        })
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.expect_tag(TAG_NULL, "null")
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.expect_tag(TAG_BOOLEAN, "boolean")?;
        Ok(self.next_u8()? != 0)
    }

    fn read_int_as(&mut self, kind: &'static str) -> Result<i32> {
        match self.next_number(kind)? {
            Number::Int(value) => Ok(value),
            Number::Double(value) => {
                let result = value as i32;
                if result as f64 != value {
                    return Err(MarshalError::out_of_range(value, kind));
                }
                Ok(result)
            }
        }
    }

    fn read_int_in_range(&mut self, kind: &'static str, min: i32, max: i32) -> Result<i32> {
        let value = self.read_int_as(kind)?;
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(MarshalError::out_of_range(value, kind))
        }
    }

    pub fn read_byte(&mut self) -> Result<i8> {
        Ok(self.read_int_in_range("byte", i8::MIN as i32, i8::MAX as i32)? as i8)
    }

    pub fn read_short(&mut self) -> Result<i16> {
        Ok(self.read_int_in_range("short", i16::MIN as i32, i16::MAX as i32)? as i16)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        self.read_int_as("int")
    }

    /// Reads a long. Doubles saturate at the `i64` bounds, so a script
    /// number just past `i64::MAX` still reads as `i64::MAX`; fractional
    /// values and values that saturate to a different magnitude fail.
    pub fn read_long(&mut self) -> Result<i64> {
        match self.next_number("long")? {
            Number::Int(value) => Ok(value as i64),
            Number::Double(value) => {
                let result = value as i64;
                if result as f64 != value {
                    return Err(MarshalError::out_of_range(value, "long"));
                }
                Ok(result)
            }
        }
    }

    pub fn read_float(&mut self) -> Result<f32> {
        match self.next_number("float")? {
            Number::Int(value) => Ok(value as f32),
            Number::Double(value) => Ok(value as f32),
        }
    }

    pub fn read_double(&mut self) -> Result<f64> {
        match self.next_number("double")? {
            Number::Int(value) => Ok(value as f64),
            Number::Double(value) => Ok(value),
        }
    }

    pub fn read_string(&mut self) -> Result<&'a str> {
        self.expect_tag(TAG_STRING, "string")?;
        self.next_str()
    }

    /// Reads a one-character string.
    pub fn read_char(&mut self) -> Result<char> {
        self.expect_tag(TAG_STRING, "char")?;
        let text = self.next_str()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(MarshalError::out_of_range(format!("\"{text}\""), "char")),
        }
    }

    /// Element count written by [`BitSink::write_length`](crate::codec::BitSink::write_length).
    pub fn read_length(&mut self) -> Result<usize> {
        let start = self.offset;
        let length = self.next_i32()?;
        usize::try_from(length).map_err(|_| MarshalError::MalformedValue {
            offset: start,
            reason: "negative array length",
        })
    }

    /// Index written by [`BitSink::write_handle`](crate::codec::BitSink::write_handle).
    pub fn read_handle(&mut self) -> Result<u32> {
        self.expect_tag(TAG_HANDLE, "handle")?;
        Ok(u32::from_le_bytes(self.next_array()?))
    }

    pub fn read_presence(&mut self) -> Result<bool> {
        Ok(self.next_u8()? != 0)
    }

    /// Fails if the value did not consume the whole buffer.
    pub fn check_eof(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(MarshalError::TrailingBytes { remaining }),
        }
    }
}
