use crate::error::{Error, Result};

/// smallest address space a CHIP-8 program can expect
pub const MIN_MEMORY_BYTES: usize = 4096;

/// anything bigger can't be reached with a 16-bit I
pub const MAX_MEMORY_BYTES: usize = 0x10000;

/// where the COSMAC VIP interpreter loaded programs
pub const DEFAULT_PROGRAM_ADDR: u16 = 0x0200;

/// What the program counter counts.
///
/// The interpreter core never fetches; it only moves PC relative to the
/// fetch loop's own advance, so it needs to know how big that advance is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    /// PC indexes a stream of instruction words; the fetch loop adds 1
    Instruction,
    /// PC is a byte address into memory; the fetch loop adds 2
    Byte,
}

impl AddressMode {
    /// how far the fetch loop moves PC after each instruction
    pub fn step(&self) -> u16 {
        match self {
            AddressMode::Instruction => 1,
            AddressMode::Byte => 2,
        }
    }
}

/// Where SHR/SHL take the bit they report in VF.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftFlag {
    /// the bit actually shifted out of V[x]
    Register,
    /// the low/high bit of the register *index* x; reproduces older
    /// interpreters that tested the operand rather than the register
    Operand,
}

/// Behaviours that differ between interpreters of the same instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quirks {
    pub shift_flag: ShiftFlag,
    /// Fx55/Fx65 leave I pointing past the last byte transferred
    pub increment_index: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            shift_flag: ShiftFlag::Register,
            increment_index: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub memory_size: usize,
    pub program_addr: u16,
    pub address_mode: AddressMode,
    pub quirks: Quirks,
    /// instructions per second for the runner; `None` runs flat out
    pub clock_hz: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory_size: MIN_MEMORY_BYTES,
            program_addr: DEFAULT_PROGRAM_ADDR,
            address_mode: AddressMode::Instruction,
            quirks: Quirks::default(),
            clock_hz: None,
        }
    }
}

impl Config {
    /// config for running a byte image loaded into memory
    pub fn for_image() -> Self {
        Config {
            address_mode: AddressMode::Byte,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_MEMORY_BYTES..=MAX_MEMORY_BYTES).contains(&self.memory_size) {
            return Err(Error::Config(format!(
                "memory size {} outside {}..={}",
                self.memory_size, MIN_MEMORY_BYTES, MAX_MEMORY_BYTES
            )));
        }
        if self.program_addr as usize >= self.memory_size {
            return Err(Error::Config(format!(
                "program address {:#06x} is beyond the end of memory",
                self.program_addr
            )));
        }
        if let Some(hz) = self.clock_hz {
            if !(hz.is_finite() && hz > 0.0) {
                return Err(Error::Config(format!("clock rate {} must be positive", hz)));
            }
        }
        Ok(())
    }
}
