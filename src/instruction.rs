/// # instruction set
///
/// Each opcode is named by an [`Op`] tag and bound to exactly one
/// [`Template`]. The [`InstructionTable`] compiles those bindings at start-up,
/// refuses any two templates that could accept the same word, and then turns
/// words into typed [`Instruction`]s for the interpreter to apply.
use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::template::{Operands, Template};

/// Canonical opcode tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Ret,
    Call,
    SkipEqImm,
    SkipNeImm,
    SkipEqReg,
    LoadImm,
    AddImm,
    Move,
    Or,
    And,
    Xor,
    AddReg,
    Sub,
    ShiftRight,
    SubNeg,
    ShiftLeft,
    SkipNeReg,
    LoadIndex,
    JumpOffset,
    Random,
    AddIndex,
    StoreRegs,
    LoadRegs,
}

// operand widths in nibbles
const NONE: &[u8] = &[];
const ADDR: &[u8] = &[3];
const REG: &[u8] = &[1];
const REG_BYTE: &[u8] = &[1, 2];
const REG_REG: &[u8] = &[1, 1];

impl Op {
    /// nibble widths of the operands this opcode takes
    pub fn shape(&self) -> &'static [u8] {
        use Op::*;
        match self {
            Ret => NONE,
            Call | LoadIndex | JumpOffset => ADDR,
            AddIndex | StoreRegs | LoadRegs => REG,
            SkipEqImm | SkipNeImm | LoadImm | AddImm | Random => REG_BYTE,
            SkipEqReg | Move | Or | And | Xor | AddReg | Sub | ShiftRight | SubNeg
            | ShiftLeft | SkipNeReg => REG_REG,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        use Op::*;
        match self {
            Ret => "RET",
            Call => "CALL",
            SkipEqImm | SkipEqReg => "SE",
            SkipNeImm | SkipNeReg => "SNE",
            LoadImm | Move | LoadIndex | StoreRegs | LoadRegs => "LD",
            AddImm | AddReg | AddIndex => "ADD",
            Or => "OR",
            And => "AND",
            Xor => "XOR",
            Sub => "SUB",
            ShiftRight => "SHR",
            SubNeg => "SUBN",
            ShiftLeft => "SHL",
            JumpOffset => "JP",
            Random => "RND",
        }
    }

    /// build the typed instruction from operands laid out per [`Op::shape`]
    fn build(&self, operands: &[u16]) -> Option<Instruction> {
        use Instruction as I;
        let reg = |v: u16| v as u8 & 0xF;
        let byte = |v: u16| v as u8;
        let addr = |v: u16| v & 0x0FFF;

        let instruction = match (self, operands) {
            (Op::Ret, []) => I::Ret,
            (Op::Call, &[nnn]) => I::Call { nnn: addr(nnn) },
            (Op::LoadIndex, &[nnn]) => I::LoadIndex { nnn: addr(nnn) },
            (Op::JumpOffset, &[nnn]) => I::JumpOffset { nnn: addr(nnn) },
            (Op::AddIndex, &[x]) => I::AddIndex { x: reg(x) },
            (Op::StoreRegs, &[x]) => I::StoreRegs { x: reg(x) },
            (Op::LoadRegs, &[x]) => I::LoadRegs { x: reg(x) },
            (Op::SkipEqImm, &[x, kk]) => I::SkipEqImm { x: reg(x), kk: byte(kk) },
            (Op::SkipNeImm, &[x, kk]) => I::SkipNeImm { x: reg(x), kk: byte(kk) },
            (Op::LoadImm, &[x, kk]) => I::LoadImm { x: reg(x), kk: byte(kk) },
            (Op::AddImm, &[x, kk]) => I::AddImm { x: reg(x), kk: byte(kk) },
            (Op::Random, &[x, kk]) => I::Random { x: reg(x), kk: byte(kk) },
            (op, &[x, y]) => {
                let (x, y) = (reg(x), reg(y));
                match op {
                    Op::SkipEqReg => I::SkipEqReg { x, y },
                    Op::SkipNeReg => I::SkipNeReg { x, y },
                    Op::Move => I::Move { x, y },
                    Op::Or => I::Or { x, y },
                    Op::And => I::And { x, y },
                    Op::Xor => I::Xor { x, y },
                    Op::AddReg => I::AddReg { x, y },
                    Op::Sub => I::Sub { x, y },
                    Op::SubNeg => I::SubNeg { x, y },
                    Op::ShiftRight => I::ShiftRight { x, y },
                    Op::ShiftLeft => I::ShiftLeft { x, y },
                    _ => return None,
                }
            }
            _ => return None,
        };
        Some(instruction)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A decoded instruction with its operands named.
///
/// `x` and `y` are register indices (0..=15 when decoded), `kk` a byte immediate,
/// `nnn` a 12-bit address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    Ret,
    Call { nnn: u16 },
    SkipEqImm { x: u8, kk: u8 },
    SkipNeImm { x: u8, kk: u8 },
    SkipEqReg { x: u8, y: u8 },
    SkipNeReg { x: u8, y: u8 },
    LoadImm { x: u8, kk: u8 },
    AddImm { x: u8, kk: u8 },
    Move { x: u8, y: u8 },
    Or { x: u8, y: u8 },
    And { x: u8, y: u8 },
    Xor { x: u8, y: u8 },
    AddReg { x: u8, y: u8 },
    Sub { x: u8, y: u8 },
    SubNeg { x: u8, y: u8 },
    ShiftRight { x: u8, y: u8 },
    ShiftLeft { x: u8, y: u8 },
    Random { x: u8, kk: u8 },
    LoadIndex { nnn: u16 },
    AddIndex { x: u8 },
    JumpOffset { nnn: u16 },
    StoreRegs { x: u8 },
    LoadRegs { x: u8 },
}

impl Instruction {
    pub fn op(&self) -> Op {
        use Instruction::*;
        match self {
            Ret => Op::Ret,
            Call { .. } => Op::Call,
            SkipEqImm { .. } => Op::SkipEqImm,
            SkipNeImm { .. } => Op::SkipNeImm,
            SkipEqReg { .. } => Op::SkipEqReg,
            SkipNeReg { .. } => Op::SkipNeReg,
            LoadImm { .. } => Op::LoadImm,
            AddImm { .. } => Op::AddImm,
            Move { .. } => Op::Move,
            Or { .. } => Op::Or,
            And { .. } => Op::And,
            Xor { .. } => Op::Xor,
            AddReg { .. } => Op::AddReg,
            Sub { .. } => Op::Sub,
            SubNeg { .. } => Op::SubNeg,
            ShiftRight { .. } => Op::ShiftRight,
            ShiftLeft { .. } => Op::ShiftLeft,
            Random { .. } => Op::Random,
            LoadIndex { .. } => Op::LoadIndex,
            AddIndex { .. } => Op::AddIndex,
            JumpOffset { .. } => Op::JumpOffset,
            StoreRegs { .. } => Op::StoreRegs,
            LoadRegs { .. } => Op::LoadRegs,
        }
    }

    /// the highest register index the instruction names, if any
    pub fn highest_register(&self) -> Option<u8> {
        use Instruction::*;
        match *self {
            Ret | Call { .. } | LoadIndex { .. } | JumpOffset { .. } => None,
            SkipEqImm { x, .. }
            | SkipNeImm { x, .. }
            | LoadImm { x, .. }
            | AddImm { x, .. }
            | Random { x, .. }
            | AddIndex { x }
            | StoreRegs { x }
            | LoadRegs { x } => Some(x),
            SkipEqReg { x, y }
            | SkipNeReg { x, y }
            | Move { x, y }
            | Or { x, y }
            | And { x, y }
            | Xor { x, y }
            | AddReg { x, y }
            | Sub { x, y }
            | SubNeg { x, y }
            | ShiftRight { x, y }
            | ShiftLeft { x, y } => Some(x.max(y)),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let m = self.op().mnemonic();
        match *self {
            Ret => write!(f, "{}", m),
            Call { nnn } => write!(f, "{} {:#05X}", m, nnn),
            LoadIndex { nnn } => write!(f, "{} I, {:#05X}", m, nnn),
            JumpOffset { nnn } => write!(f, "{} V0, {:#05X}", m, nnn),
            AddIndex { x } => write!(f, "{} I, V{:X}", m, x),
            StoreRegs { x } => write!(f, "{} [I], V{:X}", m, x),
            LoadRegs { x } => write!(f, "{} V{:X}, [I]", m, x),
            SkipEqImm { x, kk }
            | SkipNeImm { x, kk }
            | LoadImm { x, kk }
            | AddImm { x, kk }
            | Random { x, kk } => write!(f, "{} V{:X}, {:#04X}", m, x, kk),
            SkipEqReg { x, y }
            | SkipNeReg { x, y }
            | Move { x, y }
            | Or { x, y }
            | And { x, y }
            | Xor { x, y }
            | AddReg { x, y }
            | Sub { x, y }
            | SubNeg { x, y } => write!(f, "{} V{:X}, V{:X}", m, x, y),
            ShiftRight { x, .. } | ShiftLeft { x, .. } => write!(f, "{} V{:X}", m, x),
        }
    }
}

/// The standard table: 23 opcodes, in the order they're tried.
#[rustfmt::skip]
pub const CHIP8_INSTRUCTIONS: [(&str, Op); 23] = [
    ("00EE", Op::Ret),
    ("2nnn", Op::Call),
    ("3xkk", Op::SkipEqImm),
    ("4xkk", Op::SkipNeImm),
    ("5xy0", Op::SkipEqReg),
    ("6xkk", Op::LoadImm),
    ("7xkk", Op::AddImm),
    ("8xy0", Op::Move),
    ("8xy1", Op::Or),
    ("8xy2", Op::And),
    ("8xy3", Op::Xor),
    ("8xy4", Op::AddReg),
    ("8xy5", Op::Sub),
    ("8xy6", Op::ShiftRight),
    ("8xy7", Op::SubNeg),
    ("8xyE", Op::ShiftLeft),
    ("9xy0", Op::SkipNeReg),
    ("Annn", Op::LoadIndex),
    ("Bnnn", Op::JumpOffset),
    ("Cxkk", Op::Random),
    ("Fx1E", Op::AddIndex),
    ("Fx55", Op::StoreRegs),
    ("Fx65", Op::LoadRegs),
];

#[derive(Clone, Debug)]
pub struct Entry {
    pub template: Template,
    pub op: Op,
}

/// Ordered (template, opcode) bindings, checked so that every word maps to
/// at most one entry.
#[derive(Clone, Debug)]
pub struct InstructionTable {
    entries: Vec<Entry>,
}

impl InstructionTable {
    pub fn new(definitions: &[(&str, Op)]) -> Result<Self> {
        let mut entries: Vec<Entry> = Vec::with_capacity(definitions.len());
        for &(source, op) in definitions {
            let template = Template::compile(source)?;

            let found = template.field_widths();
            if found != op.shape() {
                return Err(Error::OperandMismatch {
                    template: source.to_string(),
                    op,
                    expected: op.shape().to_vec(),
                    found,
                });
            }

            for earlier in &entries {
                if earlier.op == op {
                    return Err(Error::DuplicateOpcode(op));
                }
                if let Some(example) = earlier.template.overlap(&template) {
                    return Err(Error::TemplateCollision {
                        first: earlier.template.source().to_string(),
                        second: source.to_string(),
                        example,
                    });
                }
            }
            entries.push(Entry { template, op });
        }
        debug!("instruction table ready with {} entries", entries.len());
        Ok(InstructionTable { entries })
    }

    pub fn chip8() -> Result<Self> {
        InstructionTable::new(&CHIP8_INSTRUCTIONS)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// the single entry accepting `word`
    pub fn lookup(&self, word: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.template.matches(word))
    }

    /// operands of `word` in template order, with the opcode that owns them
    pub fn operands(&self, word: u16) -> Option<(Op, Operands)> {
        self.lookup(word)
            .map(|e| (e.op, e.template.operands(word)))
    }

    pub fn decode(&self, word: u16) -> Result<Instruction> {
        let (op, operands) = self
            .operands(word)
            .ok_or(Error::UnknownInstruction(word))?;
        op.build(&operands).ok_or(Error::UnknownInstruction(word))
    }
}
