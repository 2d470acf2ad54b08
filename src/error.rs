use std::io;

use crate::instruction::Op;

/// A condition that stops the running machine. Raised by effects; the
/// interpreter wraps it in [`Error::Fault`] along with the PC and opcode.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// CALL with all 16 frames in use
    #[error("stack overflow")]
    StackOverflow,

    /// RET with no matching CALL
    #[error("stack underflow")]
    StackUnderflow,

    /// a block transfer ran off the end of memory
    #[error("memory access out of bounds at {addr:#06x} (+{len} bytes)")]
    MemoryOutOfBounds { addr: usize, len: usize },

    /// an instruction naming a register past VF
    #[error("no register V{0:X}")]
    NoSuchRegister(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// instruction text that isn't exactly four hex digits
    #[error("malformed instruction {0:?}: expected four hex digits")]
    MalformedInstruction(String),

    /// well-formed word that no template accepts
    #[error("unknown instruction {0:04X}")]
    UnknownInstruction(u16),

    #[error("invalid template {template:?}: {reason}")]
    InvalidTemplate {
        template: String,
        reason: &'static str,
    },

    /// the template's fields don't line up with what the opcode needs
    #[error("template {template:?} yields operands {found:?}, {op} expects {expected:?}")]
    OperandMismatch {
        template: String,
        op: Op,
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    /// two templates accept at least one common word
    #[error("templates {first:?} and {second:?} both match {example:04X}")]
    TemplateCollision {
        first: String,
        second: String,
        example: u16,
    },

    #[error("opcode {0} is bound to more than one template")]
    DuplicateOpcode(Op),

    #[error("{fault} at pc {pc:#06x} executing {opcode:04X}")]
    Fault { pc: u16, opcode: u16, fault: Fault },

    /// a program image that doesn't fit in memory
    #[error("cannot load {len} bytes at {addr:#06x}")]
    Load { addr: u16, len: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
