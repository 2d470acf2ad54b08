use std::io;

use crate::config::{DEFAULT_PROGRAM_ADDR, MAX_MEMORY_BYTES, MIN_MEMORY_BYTES};
use crate::error::{Error, Fault, Result};

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Byte-addressable store behind the machine. Every access is bounds-checked
/// and reports a [`Fault`] rather than panicking, so a bad I can halt the
/// machine cleanly.
pub trait MemoryMap {
    /// write unknown len of data into memory at a particular address,
    /// returning how many bytes landed
    fn write_any(&mut self, reader: &mut impl io::Read, addr: u16) -> Result<usize> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        self.write(&buf, addr)
            .map_err(|_| Error::Load { addr, len })?;
        Ok(len)
    }

    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), Fault> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// copy a chunk of bytes out of "RAM"
    fn read(&self, dst: &mut [u8], addr: u16) -> Result<(), Fault> {
        dst.copy_from_slice(self.get_ro_slice(addr, dst.len())?);
        Ok(())
    }

    /// get a big-endian two-byte word (an instruction)
    fn get_word(&self, addr: u16) -> Result<u16, Fault> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(((word[0] as u16) << 8) | (word[1] as u16))
    }

    /// how many bytes are addressable
    fn size(&self) -> usize;

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Fault>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Fault>;
}

/// Flat CHIP-8 RAM, zeroed at power-on.
///
/// 4K configuration:
///   0x0000-0x01ff  interpreter (unused here; left zeroed)
///   0x0200-0x0fff  program and data
///
/// larger sizes are allowed up to the full 16-bit address space
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Fault> {
        let a = addr as usize;
        match a.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(&mut self.bytes[a..end]),
            _ => Err(Fault::MemoryOutOfBounds { addr: a, len }),
        }
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Fault> {
        let a = addr as usize;
        match a.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[a..end]),
            _ => Err(Fault::MemoryOutOfBounds { addr: a, len }),
        }
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Chip8MemoryMap::new()
    }
}

impl Chip8MemoryMap {
    /// 4K of zeroed RAM
    pub fn new() -> Self {
        Chip8MemoryMap {
            bytes: vec![0u8; MIN_MEMORY_BYTES].into_boxed_slice(),
            program_addr: DEFAULT_PROGRAM_ADDR,
        }
    }

    /// zeroed RAM of some other size
    pub fn with_size(size: usize) -> Result<Self> {
        if !(MIN_MEMORY_BYTES..=MAX_MEMORY_BYTES).contains(&size) {
            return Err(Error::Config(format!("memory size {} not supported", size)));
        }
        Ok(Chip8MemoryMap {
            bytes: vec![0u8; size].into_boxed_slice(),
            program_addr: DEFAULT_PROGRAM_ADDR,
        })
    }

    /// load a CHIP-8 program at `program_addr`, returning its length
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize> {
        self.write_any(reader, self.program_addr)
    }

    /// zero everything
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
