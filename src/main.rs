use std::error::Error;
use std::fs::{self, File};
use std::path::PathBuf;

use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use chip8_core::config::{Config, ShiftFlag};
use chip8_core::interpreter::Chip8Interpreter;
use chip8_core::monitor::{DummyMonitor, Monitor, TermMonitor};
use chip8_core::runner::{Program, Runner};

#[derive(Parser)]
#[command(name = "chip8")]
#[command(about = "Run a CHIP-8 program through the interpreter core")]
struct Args {
    /// program to run: a .ch8 byte image, or a text listing of hex words
    program: PathBuf,

    /// treat the program as a text listing regardless of extension
    #[arg(long)]
    listing: bool,

    /// stop after this many instructions
    #[arg(short, long, default_value_t = 18_000)]
    steps: u64,

    /// instructions per second; unthrottled if absent
    #[arg(long)]
    hz: Option<f64>,

    /// show machine state in the terminal while running
    #[arg(short, long)]
    monitor: bool,

    /// take the SHR/SHL flag from the operand, like older interpreters
    #[arg(long)]
    operand_shift_flag: bool,

    /// Fx55/Fx65 advance I past the bytes transferred
    #[arg(long)]
    increment_index: bool,

    /// memory size in bytes
    #[arg(long, default_value_t = 4096)]
    memory: usize,

    /// more logging; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn is_listing(args: &Args) -> bool {
    args.listing
        || matches!(
            args.program.extension().and_then(|e| e.to_str()),
            Some("hex") | Some("txt") | Some("lst")
        )
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    // initialise
    let listing = is_listing(&args);
    let mut config = if listing {
        Config::default()
    } else {
        Config::for_image()
    };
    config.memory_size = args.memory;
    config.clock_hz = args.hz;
    config.quirks.increment_index = args.increment_index;
    if args.operand_shift_flag {
        config.quirks.shift_flag = ShiftFlag::Operand;
    }
    config.validate()?;

    let mut term;
    let mut dummy = DummyMonitor::new();
    let monitor: &mut dyn Monitor = if args.monitor {
        term = TermMonitor::new()?;
        &mut term
    } else {
        &mut dummy
    };

    let interpreter = Chip8Interpreter::new(&config)?;

    // load a program
    let mut runner = if listing {
        let program = Program::parse_listing(&fs::read_to_string(&args.program)?)?;
        Runner::new(&config, interpreter, program, monitor)?
    } else {
        let mut f = File::open(&args.program)?;
        Runner::load_image(&config, interpreter, &mut f, monitor)?
    };

    let halt = runner.run(args.steps)?;
    info!("halted: {:?} after {} steps", halt, runner.steps());

    if !args.monitor {
        for line in chip8_core::monitor::state_lines(runner.state()) {
            println!("{}", line);
        }
    }
    Ok(())
}
