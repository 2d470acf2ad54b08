/// # runner
///
/// Pulls instruction words from a program, hands them to the interpreter as
/// hex text, and advances PC by one step after each. Two kinds of program:
///
/// * a *listing*: a text file of four-hex-digit words; PC indexes the list
/// * an *image*: raw bytes loaded into memory; PC is a byte address
use std::io;

use log::{info, warn};
use spin_sleep::LoopHelper;

use crate::config::{AddressMode, Config};
use crate::error::{Error, Result};
use crate::interpreter::{Chip8Interpreter, Dispatched, Step};
use crate::memory::MemoryMap;
use crate::monitor::Monitor;
use crate::state::MachineState;
use crate::template::parse_word;

pub enum Program {
    Listing(Vec<u16>),
    /// `len` bytes starting at the configured program address
    Image { len: usize },
}

impl Program {
    /// parse a listing: whitespace-separated words, `#` or `;` to end of line
    /// is a comment
    pub fn parse_listing(text: &str) -> Result<Program> {
        let mut words = Vec::new();
        for line in text.lines() {
            let code = line.split(|c: char| c == '#' || c == ';').next().unwrap_or("");
            for token in code.split_whitespace() {
                words.push(parse_word(token)?);
            }
        }
        Ok(Program::Listing(words))
    }

    fn address_mode(&self) -> AddressMode {
        match self {
            Program::Listing(_) => AddressMode::Instruction,
            Program::Image { .. } => AddressMode::Byte,
        }
    }
}

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// PC walked off the end of the program
    EndOfProgram,
    /// a jump landed on itself; nothing more will happen
    Idle,
    StepLimit,
    /// the monitor asked to stop
    Interrupted,
}

pub struct Runner<'a> {
    interpreter: Chip8Interpreter,
    state: MachineState,
    program: Program,
    program_addr: u16,
    monitor: &'a mut dyn Monitor,
    pacer: Option<LoopHelper>,
    steps: u64,
}

impl<'a> Runner<'a> {
    /// a runner for `program`; images need loading with [`Runner::load_image`]
    pub fn new(
        config: &Config,
        interpreter: Chip8Interpreter,
        program: Program,
        monitor: &'a mut dyn Monitor,
    ) -> Result<Runner<'a>> {
        config.validate()?;
        if program.address_mode() != config.address_mode
            || interpreter.address_mode() != config.address_mode
        {
            return Err(Error::Config(format!(
                "program needs {:?} addressing, config has {:?}, interpreter has {:?}",
                program.address_mode(),
                config.address_mode,
                interpreter.address_mode()
            )));
        }

        let mut state = MachineState::with_memory_size(config.memory_size)?;
        state.memory.program_addr = config.program_addr;
        state.pc = match program {
            Program::Listing(_) => 0,
            Program::Image { .. } => config.program_addr,
        };

        let pacer = config
            .clock_hz
            .map(|hz| LoopHelper::builder().build_with_target_rate(hz));

        Ok(Runner {
            interpreter,
            state,
            program,
            program_addr: config.program_addr,
            monitor,
            pacer,
            steps: 0,
        })
    }

    /// a runner for a byte image read from `reader`
    pub fn load_image(
        config: &Config,
        interpreter: Chip8Interpreter,
        reader: &mut impl io::Read,
        monitor: &'a mut dyn Monitor,
    ) -> Result<Runner<'a>> {
        let mut runner = Runner::new(config, interpreter, Program::Image { len: 0 }, monitor)?;
        let len = runner.state.memory.load_program(reader)?;
        info!("loaded {} bytes at {:#06x}", len, runner.program_addr);
        runner.program = Program::Image { len };
        Ok(runner)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// the word at PC, or `None` once PC is outside the program
    fn fetch(&self) -> Option<u16> {
        let pc = self.state.pc;
        match &self.program {
            Program::Listing(words) => words.get(pc as usize).copied(),
            Program::Image { len } => {
                let start = self.program_addr as usize;
                let at = pc as usize;
                if at < start || at + 2 > start + len {
                    return None;
                }
                self.state.memory.get_word(pc).ok()
            }
        }
    }

    /// fetch, dispatch and advance once; `None` when there's nothing to fetch
    pub fn step(&mut self) -> Result<Option<Dispatched>> {
        let word = match self.fetch() {
            Some(word) => word,
            None => return Ok(None),
        };
        let text = format!("{:04X}", word);
        let dispatched = self.interpreter.dispatch(&mut self.state, &text)?;
        let advance = self.program.address_mode().step();
        self.state.pc = self.state.pc.wrapping_add(advance);
        self.steps += 1;
        Ok(Some(dispatched))
    }

    /// run until halted or `max_steps` instructions have gone by
    pub fn run(&mut self, max_steps: u64) -> Result<Halt> {
        for _ in 0..max_steps {
            if let Some(pacer) = self.pacer.as_mut() {
                pacer.loop_start();
            }

            let before = self.state.pc;
            let last = match self.step()? {
                Some(last) => last,
                None => {
                    info!("end of program at pc {:#06x} after {} steps", before, self.steps);
                    return Ok(Halt::EndOfProgram);
                }
            };

            self.monitor.show(&self.state, &last)?;
            if self.monitor.interrupted()? {
                warn!("interrupted at pc {:#06x}", self.state.pc);
                return Ok(Halt::Interrupted);
            }
            if last.step == Step::Jump && self.state.pc == before {
                warn!("idle loop at pc {:#06x}", before);
                return Ok(Halt::Idle);
            }

            if let Some(pacer) = self.pacer.as_mut() {
                pacer.loop_sleep();
            }
        }
        warn!("stopped after {} steps", max_steps);
        Ok(Halt::StepLimit)
    }
}
