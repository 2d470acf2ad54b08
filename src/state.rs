/// # machine state
///
/// Everything an instruction can touch, and nothing else:
///  - V0..VF     16 8-bit registers; VF doubles as the carry/borrow/shift flag
///  - I          16-bit index register, base address for block transfers
///  - PC         16-bit program counter; what it counts is up to the fetch loop
///  - stack      16 return addresses
///  - SP         8-bit stack pointer; 0xff (i.e. -1) means empty, so the
///               first push lands at index 0
///  - memory     at least 4K of byte-addressable RAM
///
/// Fields are public: collaborators (test harness, future display and timer
/// subsystems) read and write them directly and must keep the invariants
/// themselves.
use crate::error::{Fault, Result};
use crate::memory::{Chip8MemoryMap, MemoryMap};

pub const REGISTER_COUNT: usize = 16;

/// index of the flag register
pub const VF: usize = 0xF;

pub const STACK_DEPTH: usize = 16;

/// SP when nothing has been pushed
pub const SP_EMPTY: u8 = 0xFF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineState {
    pub v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    pub stack: [u16; STACK_DEPTH],
    pub sp: u8,
    pub memory: Chip8MemoryMap,
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::new()
    }
}

impl MachineState {
    /// power-on state with 4K of RAM
    pub fn new() -> Self {
        MachineState::with_memory(Chip8MemoryMap::new())
    }

    pub fn with_memory_size(size: usize) -> Result<Self> {
        Ok(MachineState::with_memory(Chip8MemoryMap::with_size(size)?))
    }

    fn with_memory(memory: Chip8MemoryMap) -> Self {
        MachineState {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: 0,
            stack: [0; STACK_DEPTH],
            sp: SP_EMPTY,
            memory,
        }
    }

    /// back to power-on, keeping the memory size
    pub fn reset(&mut self) {
        self.v = [0; REGISTER_COUNT];
        self.i = 0;
        self.pc = 0;
        self.stack = [0; STACK_DEPTH];
        self.sp = SP_EMPTY;
        self.memory.clear();
    }

    pub fn flag(&self) -> u8 {
        self.v[VF]
    }

    /// number of frames on the stack
    pub fn depth(&self) -> usize {
        self.sp.wrapping_add(1) as usize
    }

    /// push a return address; SP moves before the write
    pub fn push(&mut self, addr: u16) -> Result<(), Fault> {
        let next = self.sp.wrapping_add(1);
        if next as usize >= STACK_DEPTH {
            return Err(Fault::StackOverflow);
        }
        self.stack[next as usize] = addr;
        self.sp = next;
        Ok(())
    }

    /// pop a return address; SP moves after the read
    pub fn pop(&mut self) -> Result<u16, Fault> {
        if self.sp as usize >= STACK_DEPTH {
            return Err(Fault::StackUnderflow);
        }
        let addr = self.stack[self.sp as usize];
        self.sp = self.sp.wrapping_sub(1);
        Ok(addr)
    }

    /// copy V0..=Vx to memory at I
    pub fn store_registers(&mut self, x: usize) -> Result<(), Fault> {
        let regs = self.v.get(..=x).ok_or_else(|| no_such_register(x))?;
        self.memory.write(regs, self.i)
    }

    /// fill V0..=Vx from memory at I
    pub fn load_registers(&mut self, x: usize) -> Result<(), Fault> {
        let regs = self.v.get_mut(..=x).ok_or_else(|| no_such_register(x))?;
        self.memory.read(regs, self.i)
    }
}

fn no_such_register(x: usize) -> Fault {
    Fault::NoSuchRegister(u8::try_from(x).unwrap_or(u8::MAX))
}
