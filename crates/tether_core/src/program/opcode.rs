//! Program opcodes.
//!
//! The high bit marks a type opcode; with the high bit clear the low bits
//! select a property of the current object. The two dialects share the
//! selector, attribute and option opcodes and differ in their type opcodes:
//! the unpickle dialect carries width-specific numeric reads.

// -- Shared --
pub const PROP_INT: u8 = 0b0000_0000; // select property by 4-byte index
pub const PROP_STR: u8 = 0b0000_0001; // select property by length-prefixed name
pub const ATTR_NULLABLE: u8 = 0b0100_0000; // body is skipped when the value is absent
pub const OPT_PUSH: u8 = 0b1100_0000; // open a property-selection bracket
pub const OPT_POP: u8 = 0b1100_0001; // close the bracket

/// Pickle dialect: engine value -> value buffer.
pub mod pickle {
    pub const TYPE_NULL: u8 = 0b1000_0000;
    pub const TYPE_BOOLEAN: u8 = 0b1000_0001;
    pub const TYPE_NUMBER: u8 = 0b1000_0010;
    pub const TYPE_STRING: u8 = 0b1000_0011;
    pub const TYPE_OBJECT: u8 = 0b1000_0100;
    pub const TYPE_ARRAY: u8 = 0b1000_0101;
    pub const TYPE_COMMAND: u8 = 0b1000_0110;
}

/// Unpickle dialect: value buffer -> engine value.
pub mod unpickle {
    pub const TYPE_NULL: u8 = 0b1000_0000;
    pub const TYPE_BOOLEAN: u8 = 0b1000_0001;
    pub const TYPE_BYTE: u8 = 0b1000_0010;
    pub const TYPE_SHORT: u8 = 0b1000_0011;
    pub const TYPE_INT: u8 = 0b1000_0100;
    pub const TYPE_FLOAT: u8 = 0b1000_0101;
    pub const TYPE_DOUBLE: u8 = 0b1000_0110;
    pub const TYPE_STRING: u8 = 0b1000_0111;
    pub const TYPE_OBJECT: u8 = 0b1000_1000;
    pub const TYPE_ARRAY: u8 = 0b1000_1001;
    pub const TYPE_COMMAND: u8 = 0b1000_1010;
}

/// Bytes taken by a structural opcode and its body length.
pub const BLOCK_HEADER_LEN: usize = 1 + 4;
