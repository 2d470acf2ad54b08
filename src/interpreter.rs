/// # interpreter
///
/// Decodes one instruction word at a time and applies it to a
/// [`MachineState`] the caller owns. The interpreter holds no machine state
/// itself: just the compiled instruction table, the quirks in force, and a
/// source of random bytes for RND.
///
/// PC conventions (the fetch loop must honour these):
///  - after every dispatch the fetch loop advances PC by one step
///  - a taken skip has already added one more step
///  - CALL and JP V0 leave PC one step *before* the target, so the fetch
///    loop's advance lands on it
///  - RET restores the address CALL pushed; the advance then moves past the
///    CALL itself
///
/// The step is 1 when PC counts instructions and 2 when it's a byte address,
/// see [`AddressMode`].
use std::fmt;

use log::{debug, error, trace};
use rand_core::{OsRng, RngCore};

use crate::config::{AddressMode, Config, Quirks, ShiftFlag};
use crate::error::{Error, Fault, Result};
use crate::instruction::{Instruction, InstructionTable};
use crate::state::{MachineState, REGISTER_COUNT, VF};
use crate::template::parse_word;

/// What a dispatched instruction did to control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// fall through to the next instruction
    Next,
    /// a skip was taken; PC has been advanced past the next instruction
    Skip,
    /// PC was set by JP V0
    Jump,
    Call,
    Return,
}

impl Step {
    pub fn skipped(&self) -> bool {
        *self == Step::Skip
    }
}

/// One instruction as it went through the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatched {
    /// PC when the word was dispatched
    pub pc: u16,
    pub word: u16,
    pub instruction: Instruction,
    pub step: Step,
}

impl fmt::Display for Dispatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}  {:04X}  {}", self.pc, self.word, self.instruction)?;
        if self.step.skipped() {
            write!(f, "  (skip)")?;
        }
        Ok(())
    }
}

pub struct Chip8Interpreter {
    table: InstructionTable,
    quirks: Quirks,
    mode: AddressMode,
    rng: Box<dyn RngCore>,
}

impl Chip8Interpreter {
    /// standard instruction set, random bytes from the OS
    pub fn new(config: &Config) -> Result<Chip8Interpreter> {
        Chip8Interpreter::with_rng(config, Box::new(OsRng))
    }

    pub fn with_rng(config: &Config, rng: Box<dyn RngCore>) -> Result<Chip8Interpreter> {
        Chip8Interpreter::with_table(config, InstructionTable::chip8()?, rng)
    }

    pub fn with_table(
        config: &Config,
        table: InstructionTable,
        rng: Box<dyn RngCore>,
    ) -> Result<Chip8Interpreter> {
        config.validate()?;
        Ok(Chip8Interpreter {
            table,
            quirks: config.quirks,
            mode: config.address_mode,
            rng,
        })
    }

    pub fn table(&self) -> &InstructionTable {
        &self.table
    }

    /// what PC counts, and so how far skips and jumps adjust it
    pub fn address_mode(&self) -> AddressMode {
        self.mode
    }

    /// dispatch one instruction given as four hex digits
    pub fn execute(&mut self, state: &mut MachineState, text: &str) -> Result<Step> {
        let word = parse_word(text)?;
        self.execute_word(state, word)
    }

    /// dispatch one already-parsed instruction word
    pub fn execute_word(&mut self, state: &mut MachineState, word: u16) -> Result<Step> {
        self.dispatch_word(state, word).map(|d| d.step)
    }

    /// like [`Chip8Interpreter::execute`], but also hand back what was decoded
    pub fn dispatch(&mut self, state: &mut MachineState, text: &str) -> Result<Dispatched> {
        let word = parse_word(text)?;
        self.dispatch_word(state, word)
    }

    pub fn dispatch_word(&mut self, state: &mut MachineState, word: u16) -> Result<Dispatched> {
        let instruction = self.table.decode(word)?;
        trace!("{:#06x}: {:04X}  {}", state.pc, word, instruction);
        let pc = state.pc;
        let step = self.apply(state, instruction).map_err(|fault| {
            error!("{} at pc {:#06x} executing {:04X}", fault, pc, word);
            Error::Fault {
                pc,
                opcode: word,
                fault,
            }
        })?;
        Ok(Dispatched {
            pc,
            word,
            instruction,
            step,
        })
    }

    /// apply a decoded instruction's effect
    ///
    /// Instructions built by hand rather than decoded can name registers past
    /// VF; those fault without touching state.
    pub fn apply(&mut self, state: &mut MachineState, instruction: Instruction) -> Result<Step, Fault> {
        use Instruction::*;
        if let Some(r) = instruction.highest_register() {
            if r as usize >= REGISTER_COUNT {
                return Err(Fault::NoSuchRegister(r));
            }
        }
        let step = self.mode.step();
        let v = &mut state.v;

        match instruction {
            LoadImm { x, kk } => v[x as usize] = kk,
            AddImm { x, kk } => v[x as usize] = v[x as usize].wrapping_add(kk),
            Move { x, y } => v[x as usize] = v[y as usize],
            Or { x, y } => v[x as usize] |= v[y as usize],
            And { x, y } => v[x as usize] &= v[y as usize],
            Xor { x, y } => v[x as usize] ^= v[y as usize],

            // flags come from the operands as they were; VF is written last
            // so it wins when x is F
            AddReg { x, y } => {
                let (sum, carry) = v[x as usize].overflowing_add(v[y as usize]);
                v[x as usize] = sum;
                v[VF] = carry as u8;
            }
            Sub { x, y } => {
                let (vx, vy) = (v[x as usize], v[y as usize]);
                v[x as usize] = vx.wrapping_sub(vy);
                v[VF] = (vx > vy) as u8;
            }
            SubNeg { x, y } => {
                let (vx, vy) = (v[x as usize], v[y as usize]);
                v[x as usize] = vy.wrapping_sub(vx);
                v[VF] = (vy > vx) as u8;
            }
            ShiftRight { x, .. } => {
                let vx = v[x as usize];
                let out = match self.quirks.shift_flag {
                    ShiftFlag::Register => vx & 1,
                    ShiftFlag::Operand => x & 1,
                };
                v[x as usize] = vx >> 1;
                v[VF] = out;
            }
            ShiftLeft { x, .. } => {
                let vx = v[x as usize];
                let out = match self.quirks.shift_flag {
                    ShiftFlag::Register => vx >> 7,
                    ShiftFlag::Operand => x & 0x80,
                };
                v[x as usize] = vx << 1;
                v[VF] = out;
            }

            Random { x, kk } => v[x as usize] = (self.rng.next_u32() as u8) & kk,

            LoadIndex { nnn } => state.i = nnn,
            AddIndex { x } => state.i = state.i.wrapping_add(v[x as usize] as u16),

            SkipEqImm { x, kk } => {
                let taken = v[x as usize] == kk;
                return Ok(skip_if(state, taken, step));
            }
            SkipNeImm { x, kk } => {
                let taken = v[x as usize] != kk;
                return Ok(skip_if(state, taken, step));
            }
            SkipEqReg { x, y } => {
                let taken = v[x as usize] == v[y as usize];
                return Ok(skip_if(state, taken, step));
            }
            SkipNeReg { x, y } => {
                let taken = v[x as usize] != v[y as usize];
                return Ok(skip_if(state, taken, step));
            }

            JumpOffset { nnn } => {
                let target = (state.v[0] as u16).wrapping_add(nnn);
                state.pc = target.wrapping_sub(step);
                return Ok(Step::Jump);
            }
            Call { nnn } => {
                state.push(state.pc)?;
                debug!("call {:#06x} from {:#06x}, depth {}", nnn, state.pc, state.depth());
                state.pc = nnn.wrapping_sub(step);
                return Ok(Step::Call);
            }
            Ret => {
                let from = state.pc;
                state.pc = state.pop()?;
                debug!("return from {:#06x} to {:#06x}", from, state.pc);
                return Ok(Step::Return);
            }

            StoreRegs { x } => {
                state.store_registers(x as usize)?;
                self.bump_index(state, x);
            }
            LoadRegs { x } => {
                state.load_registers(x as usize)?;
                self.bump_index(state, x);
            }
        }
        Ok(Step::Next)
    }

    fn bump_index(&self, state: &mut MachineState, x: u8) {
        if self.quirks.increment_index {
            state.i = state.i.wrapping_add(x as u16 + 1);
        }
    }
}

fn skip_if(state: &mut MachineState, taken: bool, step: u16) -> Step {
    if taken {
        state.pc = state.pc.wrapping_add(step);
        Step::Skip
    } else {
        Step::Next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMap;
    use crate::state::{SP_EMPTY, STACK_DEPTH};

    /// hands out the same word forever
    struct FixedRng(u32);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }
        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0 as u8)
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn setup() -> (Chip8Interpreter, MachineState) {
        let i = Chip8Interpreter::with_rng(&Config::default(), Box::new(FixedRng(0xA5))).unwrap();
        (i, MachineState::new())
    }

    fn setup_with(config: Config) -> (Chip8Interpreter, MachineState) {
        let i = Chip8Interpreter::with_rng(&config, Box::new(FixedRng(0xA5))).unwrap();
        (i, MachineState::new())
    }

    fn run(i: &mut Chip8Interpreter, s: &mut MachineState, program: &[&str]) -> Result<()> {
        for text in program {
            i.execute(s, text)?;
        }
        Ok(())
    }

    #[test]
    fn test_move_const() -> Result<()> {
        let (mut i, mut s) = setup();
        run(&mut i, &mut s, &["6005", "64FF", "6E1D"])?;
        assert_eq!(s.v[0x0], 0x05);
        assert_eq!(s.v[0x4], 0xFF);
        assert_eq!(s.v[0xE], 0x1D);
        Ok(())
    }

    #[test]
    fn test_move_const_every_register() -> Result<()> {
        let (mut i, mut s) = setup();
        for x in 0..16u16 {
            for kk in [0x00u16, 0x01, 0x7f, 0x80, 0xfe, 0xff] {
                i.execute_word(&mut s, 0x6000 | x << 8 | kk)?;
                assert_eq!(s.v[x as usize], kk as u8);
            }
        }
        Ok(())
    }

    #[test]
    fn test_move() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0x0] = 0x06;
        run(&mut i, &mut s, &["8100", "8210", "8C20"])?;
        assert_eq!(s.v[0x0], 0x06);
        assert_eq!(s.v[0x1], 0x06);
        assert_eq!(s.v[0x2], 0x06);
        assert_eq!(s.v[0xC], 0x06);
        Ok(())
    }

    #[test]
    fn test_add_const() -> Result<()> {
        let (mut i, mut s) = setup();
        run(&mut i, &mut s, &["7011", "7005", "7887", "7810", "706E"])?;
        assert_eq!(s.v[0x0], 0x11 + 0x05 + 0x6E);
        assert_eq!(s.v[0x8], 0x87 + 0x10);
        Ok(())
    }

    #[test]
    fn test_add_const_wraps_without_flag() -> Result<()> {
        let (mut i, mut s) = setup();
        for kk1 in (0..=0xffu16).step_by(17) {
            for kk2 in (0..=0xffu16).step_by(13) {
                s.v[VF] = 0x42;
                i.execute_word(&mut s, 0x6300 | kk1)?;
                i.execute_word(&mut s, 0x7300 | kk2)?;
                assert_eq!(s.v[3] as u16, (kk1 + kk2) % 256);
                assert_eq!(s.v[VF], 0x42);
            }
        }
        Ok(())
    }

    #[test]
    fn test_add_registers() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0x8] = 0x07;
        s.v[0xA] = 0x03;
        s.v[0x4] = 0x02;
        run(&mut i, &mut s, &["84A4", "88A4", "8844"])?;
        assert_eq!(s.v[0x4], 0x05);
        assert_eq!(s.v[0x8], 0x0F);
        assert_eq!(s.v[0xA], 0x03);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_add_carry() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0] = 0x07;
        s.v[1] = 0x03;
        i.execute(&mut s, "8014")?;
        assert_eq!(s.v[0], 0x0A);
        assert_eq!(s.v[VF], 0);

        s.v[0] = 0xFF;
        s.v[1] = 0x02;
        i.execute(&mut s, "8014")?;
        assert_eq!(s.v[0], 0x01);
        assert_eq!(s.v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_add_carry_matches_wide_sum() -> Result<()> {
        let (mut i, mut s) = setup();
        for a in (0..=0xffu16).step_by(15) {
            for b in (0..=0xffu16).step_by(11) {
                s.v[2] = a as u8;
                s.v[5] = b as u8;
                i.execute(&mut s, "8254")?;
                assert_eq!(s.v[2] as u16, (a + b) & 0xff);
                assert_eq!(s.v[VF], (a + b > 0xff) as u8);
            }
        }
        Ok(())
    }

    #[test]
    fn test_add_into_flag_register() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[VF] = 0xF0;
        s.v[1] = 0x20;
        i.execute(&mut s, "8F14")?;
        // the carry overwrites the sum
        assert_eq!(s.v[VF], 1);

        s.v[VF] = 0x01;
        s.v[1] = 0x02;
        i.execute(&mut s, "8F14")?;
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_sub() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0x0] = 0x06;
        s.v[0x1] = 0x05;
        s.v[0x2] = 0x01;
        run(&mut i, &mut s, &["8015", "8105", "8325"])?;
        assert_eq!(s.v[0x0], 0x01);
        assert_eq!(s.v[0x1], 0x04);
        assert_eq!(s.v[0x2], 0x01);
        assert_eq!(s.v[0x3], 0xFF);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_sub_flag() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[4] = 0x30;
        s.v[5] = 0x10;
        i.execute(&mut s, "8455")?;
        assert_eq!(s.v[4], 0x20);
        assert_eq!(s.v[VF], 1);

        s.v[4] = 0x10;
        s.v[5] = 0x30;
        i.execute(&mut s, "8455")?;
        assert_eq!(s.v[4], 0xE0);
        assert_eq!(s.v[VF], 0);

        // equal operands: no borrow, but not strictly greater either
        s.v[4] = 0x10;
        s.v[5] = 0x10;
        i.execute(&mut s, "8455")?;
        assert_eq!(s.v[4], 0);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_sub_from_flag_register_uses_old_value() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[VF] = 0x09;
        s.v[2] = 0x04;
        i.execute(&mut s, "8F25")?;
        assert_eq!(s.v[VF], 1);

        s.v[VF] = 0x04;
        s.v[2] = 0x09;
        i.execute(&mut s, "8F25")?;
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_subn() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[6] = 0x05;
        s.v[7] = 0x08;
        i.execute(&mut s, "8677")?;
        assert_eq!(s.v[6], 0x03);
        assert_eq!(s.v[VF], 1);

        s.v[6] = 0x08;
        s.v[7] = 0x05;
        i.execute(&mut s, "8677")?;
        assert_eq!(s.v[6], 0xFD);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_subn_into_flag_register_uses_old_value() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[VF] = 0x03;
        s.v[1] = 0x09;
        i.execute(&mut s, "8F17")?;
        assert_eq!(s.v[VF], 1);

        s.v[VF] = 0x09;
        s.v[1] = 0x03;
        i.execute(&mut s, "8F17")?;
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_logic() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0] = 0b1100;
        s.v[1] = 0b1010;
        s.v[2] = 0b1100;
        s.v[3] = 0b1100;
        run(&mut i, &mut s, &["8011", "8212", "8313"])?;
        assert_eq!(s.v[0], 0b1110);
        assert_eq!(s.v[2], 0b1000);
        assert_eq!(s.v[3], 0b0110);
        Ok(())
    }

    #[test]
    fn test_shift_right() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[2] = 0b0000_0101;
        i.execute(&mut s, "8206")?;
        assert_eq!(s.v[2], 0b0000_0010);
        assert_eq!(s.v[VF], 1);
        i.execute(&mut s, "8206")?;
        assert_eq!(s.v[2], 0b0000_0001);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_shift_left() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[2] = 0b1100_0001;
        i.execute(&mut s, "820E")?;
        assert_eq!(s.v[2], 0b1000_0010);
        assert_eq!(s.v[VF], 1);
        i.execute(&mut s, "820e")?;
        assert_eq!(s.v[2], 0b0000_0100);
        assert_eq!(s.v[VF], 1);
        i.execute(&mut s, "820E")?;
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_shift_flag_register_keeps_shifted_out_bit() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[VF] = 0x81;
        i.execute(&mut s, "8FF6")?;
        assert_eq!(s.v[VF], 1);

        s.v[VF] = 0x81;
        i.execute(&mut s, "8FFE")?;
        assert_eq!(s.v[VF], 1);

        s.v[VF] = 0x7E;
        i.execute(&mut s, "8FF6")?;
        assert_eq!(s.v[VF], 0);

        s.v[VF] = 0x7E;
        i.execute(&mut s, "8FFE")?;
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_shift_round_trip() -> Result<()> {
        let (mut i, mut s) = setup();
        for value in 0..=0xffu8 {
            if value & 1 == 0 {
                s.v[7] = value;
                i.execute(&mut s, "8706")?;
                assert_eq!(s.v[VF], 0);
                i.execute(&mut s, "870E")?;
                assert_eq!(s.v[7], value);
            }
            if value & 0x80 == 0 {
                s.v[7] = value;
                i.execute(&mut s, "870E")?;
                assert_eq!(s.v[VF], 0);
                i.execute(&mut s, "8706")?;
                assert_eq!(s.v[7], value);
            }
        }
        Ok(())
    }

    #[test]
    fn test_shift_flag_from_operand_quirk() -> Result<()> {
        let mut config = Config::default();
        config.quirks.shift_flag = ShiftFlag::Operand;
        let (mut i, mut s) = setup_with(config);

        // V3 has its low bit clear but x = 3 is odd
        s.v[3] = 0b0000_0010;
        i.execute(&mut s, "8306")?;
        assert_eq!(s.v[3], 0b0000_0001);
        assert_eq!(s.v[VF], 1);

        // a nibble never has 0x80 set, so SHL never reports a carry
        s.v[3] = 0xFF;
        i.execute(&mut s, "830E")?;
        assert_eq!(s.v[3], 0xFE);
        assert_eq!(s.v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_random_is_masked() -> Result<()> {
        let (mut i, mut s) = setup();
        i.execute(&mut s, "C30F")?;
        assert_eq!(s.v[3], 0xA5 & 0x0F);
        i.execute(&mut s, "C300")?;
        assert_eq!(s.v[3], 0);
        Ok(())
    }

    #[test]
    fn test_random_from_os_stays_in_mask() -> Result<()> {
        let mut i = Chip8Interpreter::new(&Config::default())?;
        let mut s = MachineState::new();
        for _ in 0..64 {
            i.execute(&mut s, "C50A")?;
            assert_eq!(s.v[5] & !0x0A, 0);
        }
        Ok(())
    }

    #[test]
    fn test_index() -> Result<()> {
        let (mut i, mut s) = setup();
        i.execute(&mut s, "A123")?;
        assert_eq!(s.i, 0x123);
        s.v[4] = 0x10;
        i.execute(&mut s, "F41E")?;
        assert_eq!(s.i, 0x133);

        s.i = 0xFFFF;
        s.v[4] = 0x02;
        i.execute(&mut s, "F41E")?;
        assert_eq!(s.i, 0x0001);
        Ok(())
    }

    #[test]
    fn test_skip_if_equal_registers() -> Result<()> {
        let (mut i, mut s) = setup();
        s.pc = 10;
        s.v[2] = 0x05;
        s.v[3] = 0x05;
        assert!(i.execute(&mut s, "5230")?.skipped());
        assert_eq!(s.pc, 11);

        s.v[3] = 0x06;
        assert!(!i.execute(&mut s, "5230")?.skipped());
        assert_eq!(s.pc, 11);
        Ok(())
    }

    #[test]
    fn test_skips() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[1] = 0x42;
        s.v[2] = 0x42;
        s.v[3] = 0x43;
        assert_eq!(i.execute(&mut s, "3142")?, Step::Skip);
        assert_eq!(i.execute(&mut s, "3143")?, Step::Next);
        assert_eq!(i.execute(&mut s, "4143")?, Step::Skip);
        assert_eq!(i.execute(&mut s, "4142")?, Step::Next);
        assert_eq!(i.execute(&mut s, "9130")?, Step::Skip);
        assert_eq!(i.execute(&mut s, "9120")?, Step::Next);
        assert_eq!(s.pc, 3);
        Ok(())
    }

    #[test]
    fn test_skip_in_byte_mode_moves_two() -> Result<()> {
        let (mut i, mut s) = setup_with(Config::for_image());
        s.pc = 0x200;
        i.execute(&mut s, "3000")?;
        assert_eq!(s.pc, 0x202);
        Ok(())
    }

    #[test]
    fn test_jump_with_offset() -> Result<()> {
        let (mut i, mut s) = setup();
        s.v[0] = 0x10;
        assert_eq!(i.execute(&mut s, "B300")?, Step::Jump);
        // the fetch loop's +1 lands on 0x310
        assert_eq!(s.pc, 0x30F);

        let (mut i, mut s) = setup_with(Config::for_image());
        s.v[0] = 0x02;
        i.execute(&mut s, "B200")?;
        assert_eq!(s.pc, 0x200);
        Ok(())
    }

    #[test]
    fn test_call_and_return() -> Result<()> {
        let (mut i, mut s) = setup();
        s.pc = 7;
        assert_eq!(i.execute(&mut s, "2040")?, Step::Call);
        assert_eq!(s.pc, 0x3F);
        assert_eq!(s.sp, 0);
        assert_eq!(s.stack[0], 7);
        assert_eq!(i.execute(&mut s, "00EE")?, Step::Return);
        assert_eq!(s.pc, 7);
        assert_eq!(s.sp, SP_EMPTY);
        Ok(())
    }

    #[test]
    fn test_call_return_balance_at_any_depth() -> Result<()> {
        let (mut i, mut s) = setup();
        for depth in 0..STACK_DEPTH as u16 {
            let sp = s.sp;
            s.pc = 0x100 + depth;
            i.execute(&mut s, "2ABC")?;
            i.execute(&mut s, "00EE")?;
            assert_eq!(s.pc, 0x100 + depth);
            assert_eq!(s.sp, sp);
            // leave one frame behind to go a level deeper
            i.execute(&mut s, "2ABC")?;
        }
        Ok(())
    }

    #[test]
    fn test_stack_overflow_is_a_fault() -> Result<()> {
        let (mut i, mut s) = setup();
        for _ in 0..STACK_DEPTH {
            i.execute(&mut s, "2200")?;
        }
        s.pc = 0x0123;
        match i.execute(&mut s, "2200") {
            Err(Error::Fault { pc, opcode, fault }) => {
                assert_eq!(pc, 0x0123);
                assert_eq!(opcode, 0x2200);
                assert_eq!(fault, Fault::StackOverflow);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
        assert_eq!(s.depth(), STACK_DEPTH);
        Ok(())
    }

    #[test]
    fn test_return_without_call_is_a_fault() {
        let (mut i, mut s) = setup();
        assert!(matches!(
            i.execute(&mut s, "00EE"),
            Err(Error::Fault {
                fault: Fault::StackUnderflow,
                opcode: 0x00EE,
                ..
            })
        ));
        assert_eq!(s.sp, SP_EMPTY);
    }

    #[test]
    fn test_store_and_load_registers() -> Result<()> {
        let (mut i, mut s) = setup();
        for n in 0..16 {
            s.v[n] = (n as u8) * 3 + 1;
        }
        s.i = 0x300;
        i.execute(&mut s, "F555")?;
        assert_eq!(s.memory.get_ro_slice(0x300, 7).unwrap(), &[1, 4, 7, 10, 13, 16, 0]);
        assert_eq!(s.i, 0x300);

        let before = s.v;
        i.execute(&mut s, "F565")?;
        assert_eq!(s.v, before);

        s.memory.write(&[0xAA, 0xBB], 0x400).unwrap();
        s.i = 0x400;
        i.execute(&mut s, "F165")?;
        assert_eq!(s.v[..3], [0xAA, 0xBB, 7]);
        Ok(())
    }

    #[test]
    fn test_store_load_round_trip_every_x() -> Result<()> {
        let (mut i, mut s) = setup();
        for x in 0..16u16 {
            for n in 0..16 {
                s.v[n] = 0x80 | n as u8 | (x as u8) << 4;
            }
            let before = s.v;
            s.i = 0x200 + x * 16;
            i.execute_word(&mut s, 0xF055 | x << 8)?;
            i.execute_word(&mut s, 0xF065 | x << 8)?;
            assert_eq!(s.v, before);
        }
        Ok(())
    }

    #[test]
    fn test_increment_index_quirk() -> Result<()> {
        let mut config = Config::default();
        config.quirks.increment_index = true;
        let (mut i, mut s) = setup_with(config);
        s.i = 0x300;
        i.execute(&mut s, "F355")?;
        assert_eq!(s.i, 0x304);
        i.execute(&mut s, "F065")?;
        assert_eq!(s.i, 0x305);
        Ok(())
    }

    #[test]
    fn test_block_transfer_out_of_bounds_is_a_fault() {
        let (mut i, mut s) = setup();
        s.i = 0x0FFC;
        s.pc = 0x42;
        let before = s.v;
        assert!(matches!(
            i.execute(&mut s, "FF65"),
            Err(Error::Fault {
                pc: 0x42,
                fault: Fault::MemoryOutOfBounds { addr: 0x0FFC, len: 16 },
                ..
            })
        ));
        assert_eq!(s.v, before);
    }

    #[test]
    fn test_malformed_and_unknown() {
        let (mut i, mut s) = setup();
        let before = s.clone();
        assert!(matches!(
            i.execute(&mut s, "801"),
            Err(Error::MalformedInstruction(_))
        ));
        assert!(matches!(
            i.execute(&mut s, "zz14"),
            Err(Error::MalformedInstruction(_))
        ));
        assert!(matches!(
            i.execute(&mut s, "00E0"),
            Err(Error::UnknownInstruction(0x00E0))
        ));
        assert!(matches!(
            i.execute(&mut s, "D015"),
            Err(Error::UnknownInstruction(0xD015))
        ));
        assert_eq!(s, before);
    }

    #[test]
    fn test_hand_built_register_past_vf_faults() {
        let (mut i, mut s) = setup();
        let before = s.clone();
        for instruction in [
            Instruction::LoadImm { x: 16, kk: 1 },
            Instruction::Move { x: 0, y: 0x20 },
            Instruction::StoreRegs { x: 0xFF },
            Instruction::SkipEqReg { x: 16, y: 1 },
        ] {
            let r = i.apply(&mut s, instruction);
            assert!(matches!(r, Err(Fault::NoSuchRegister(_))), "{:?}", instruction);
        }
        assert_eq!(s, before);
    }

    #[test]
    fn test_dispatch_reports_what_ran() -> Result<()> {
        let (mut i, mut s) = setup();
        s.pc = 0x12;
        let d = i.dispatch(&mut s, "8014")?;
        assert_eq!(d.pc, 0x12);
        assert_eq!(d.word, 0x8014);
        assert_eq!(d.instruction, Instruction::AddReg { x: 0, y: 1 });
        assert_eq!(d.step, Step::Next);
        assert_eq!(d.to_string(), "0012  8014  ADD V0, V1");

        let d = i.dispatch_word(&mut s, 0x3000)?;
        assert_eq!(d.to_string(), "0012  3000  SE V0, 0x00  (skip)");
        Ok(())
    }

    #[test]
    fn test_states_are_independent() -> Result<()> {
        let (mut i, mut a) = setup();
        let mut b = MachineState::new();
        i.execute(&mut a, "6A01")?;
        i.execute(&mut b, "6A02")?;
        assert_eq!(a.v[0xA], 1);
        assert_eq!(b.v[0xA], 2);
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config {
            memory_size: 16,
            ..Default::default()
        };
        assert!(matches!(
            Chip8Interpreter::new(&config),
            Err(Error::Config(_))
        ));
    }
}
