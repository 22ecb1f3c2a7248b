//! Program construction with centralized offset bookkeeping.
//!
//! [`ProgramBuilder`] appends to one program and patches block lengths;
//! [`Assembler`] drives both dialects at once together with the
//! placeholder table, so splicing a child translator and rebasing its
//! placeholders is a single operation.

use crate::error::{MarshalError, Result};
use crate::program::opcode;
use crate::program::{Dialect, Placeholder, Program};
use crate::translator::Translator;
use crate::types::TypeDescriptor;

/// Position of an open block's length field.
#[derive(Debug, Clone, Copy)]
#[must_use = "an open block must be closed"]
pub struct BlockStart(usize);

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
}

fn to_offset(value: usize, at: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| MarshalError::malformed_program(at, "program exceeds 4 GiB"))
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn op(&mut self, op: u8) -> &mut Self {
        self.bytes.push(op);
        self
    }

    pub fn prop_int(&mut self, index: u32) -> &mut Self {
        self.bytes.push(opcode::PROP_INT);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self
    }

    /// Property name operand: 4-byte length counting the terminator,
    /// UTF-8 bytes, `0`.
    pub fn prop_str(&mut self, name: &str) -> Result<&mut Self> {
        let size = to_offset(name.len() + 1, self.offset())?;
        self.bytes.push(opcode::PROP_STR);
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        Ok(self)
    }

    pub fn open_block(&mut self, op: u8) -> BlockStart {
        self.bytes.push(op);
        let start = BlockStart(self.bytes.len());
        self.bytes.extend_from_slice(&[0; 4]);
        start
    }

    pub fn close_block(&mut self, start: BlockStart) -> Result<()> {
        let body = self.bytes.len() - start.0 - 4;
        let body = to_offset(body, start.0)?;
        self.bytes[start.0..start.0 + 4].copy_from_slice(&body.to_le_bytes());
        Ok(())
    }

    /// Append `bytes` verbatim, returning the offset they start at.
    pub fn splice(&mut self, bytes: &[u8]) -> Result<u32> {
        let base = to_offset(self.offset(), self.offset())?;
        to_offset(self.offset() + bytes.len(), self.offset())?;
        self.bytes.extend_from_slice(bytes);
        Ok(base)
    }

    pub fn finish(self) -> Program {
        Program::new(self.bytes)
    }
}

/// How a child program ended up inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// Child bytes copied into the parent.
    Inline,
    /// Parent holds a `TYPE_COMMAND` that calls the child at run time.
    Invoke,
}

/// Builds a translator's pickle and unpickle programs side by side.
#[derive(Debug, Default)]
pub struct Assembler {
    pickle: ProgramBuilder,
    unpickle: ProgramBuilder,
    placeholders: Vec<Placeholder>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pickle(&mut self) -> &mut ProgramBuilder {
        &mut self.pickle
    }

    pub fn unpickle(&mut self) -> &mut ProgramBuilder {
        &mut self.unpickle
    }

    pub fn builder(&mut self, dialect: Dialect) -> &mut ProgramBuilder {
        match dialect {
            Dialect::Pickle => &mut self.pickle,
            Dialect::Unpickle => &mut self.unpickle,
        }
    }

    /// Wrap whatever `body` emits in a length-prefixed block in both
    /// dialects.
    pub fn block<F>(&mut self, pickle_op: u8, unpickle_op: u8, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let pickle_start = self.pickle.open_block(pickle_op);
        let unpickle_start = self.unpickle.open_block(unpickle_op);
        body(self)?;
        self.pickle.close_block(pickle_start)?;
        self.unpickle.close_block(unpickle_start)
    }

    /// Splice both of `child`'s programs at the current offsets and carry
    /// its placeholders over, rebased.
    pub fn embed(&mut self, child: &Translator) -> Result<()> {
        let pickle_base = self.pickle.splice(child.pickle_program())?;
        let unpickle_base = self.unpickle.splice(child.unpickle_program())?;
        self.placeholders.extend(
            child
                .placeholders()
                .iter()
                .map(|placeholder| placeholder.rebased(pickle_base, unpickle_base)),
        );
        Ok(())
    }

    /// Emit an empty `TYPE_COMMAND` block in both dialects and record the
    /// placeholder the interpreter resolves it through.
    pub fn invoke(&mut self, descriptor: &TypeDescriptor) -> Result<()> {
        let pickle_offset = to_offset(self.pickle.offset(), self.pickle.offset())?;
        let unpickle_offset = to_offset(self.unpickle.offset(), self.unpickle.offset())?;
        let start = self.pickle.open_block(Dialect::Pickle.command_op());
        self.pickle.close_block(start)?;
        let start = self.unpickle.open_block(Dialect::Unpickle.command_op());
        self.unpickle.close_block(start)?;
        self.placeholders.push(Placeholder::new(
            descriptor.clone(),
            pickle_offset,
            unpickle_offset,
        ));
        Ok(())
    }

    /// Inline `child` when both of its programs fit in `inline_limit`
    /// bytes, otherwise call it through a `TYPE_COMMAND`.
    pub fn embed_or_invoke(&mut self, child: &Translator, inline_limit: usize) -> Result<Embedding> {
        let size = child.pickle_program().len().max(child.unpickle_program().len());
        if size <= inline_limit {
            self.embed(child)?;
            Ok(Embedding::Inline)
        } else {
            tracing::debug!(
                child = %child.descriptor(),
                size,
                inline_limit,
                "child program over inline limit, emitting command"
            );
            self.invoke(child.descriptor())?;
            Ok(Embedding::Invoke)
        }
    }

    pub fn finish(self) -> (Program, Program, Vec<Placeholder>) {
        (self.pickle.finish(), self.unpickle.finish(), self.placeholders)
    }
}
