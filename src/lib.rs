///
/// ## Design
///
/// * the interpreter core is everything: decode a word, apply its effect
/// * machine state is a plain value the caller owns and passes in; any
///   number of machines can share one interpreter
/// * the instruction set is declared as readable templates (`"8xy4"`) bound
///   to opcode tags, checked once at start-up so no word can mean two things
/// * faults (stack over/underflow, memory out of bounds) stop the machine
///   and name the PC and opcode; nothing wraps silently except arithmetic,
///   which wraps on purpose
/// * fetching, pacing and watching are collaborators around the core, not
///   part of it
///
/// Model
///
/// main
///  |-- config
///  |-- monitor (terminal or dummy)
///  |-- interpreter(config)
///  |    `-- instruction table (templates -> opcodes)
///  `-- runner(interpreter, program, monitor)
///       |-- state(config)
///       `-- loop
///            |-- word = fetch(state.pc)
///            |-- interpreter.execute(state, "%04X" word)
///            |-- state.pc += step
///            `-- monitor.show(state, last); pace
pub mod config;
pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod monitor;
pub mod runner;
pub mod state;
pub mod template;

pub use config::{AddressMode, Config, Quirks, ShiftFlag};
pub use error::{Error, Fault, Result};
pub use instruction::{Instruction, InstructionTable, Op};
pub use interpreter::{Chip8Interpreter, Dispatched, Step};
pub use state::MachineState;
pub use template::Template;
