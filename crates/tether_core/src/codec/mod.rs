//! Linear value-buffer codec
//!
//! A value buffer is a depth-first run of `[tag][payload]` leaves:
//!
//! | tag | payload |
//! |-----|---------|
//! | `INT` | 4-byte LE `i32` |
//! | `DOUBLE` | 8-byte LE `f64` |
//! | `NULL` | nothing |
//! | `BOOLEAN` | 1 byte, `0` or `1` |
//! | `STRING` | 4-byte LE length, UTF-8 bytes, `0` terminator (length counts the terminator) |
//! | `HANDLE` | 4-byte LE index into the engine's table of retained objects |
//!
//! Two untagged frames carry structure: array element counts (4-byte LE)
//! and nullable presence flags (1 byte).

mod sink;
mod source;

pub use sink::BitSink;
pub use source::BitSource;

pub const TAG_INT: u8 = 0;
pub const TAG_DOUBLE: u8 = 1;
pub const TAG_NULL: u8 = 2;
pub const TAG_BOOLEAN: u8 = 3;
pub const TAG_STRING: u8 = 4;
pub const TAG_HANDLE: u8 = 5;
