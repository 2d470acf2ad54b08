use std::io;
use std::time::Duration;

use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use tui::backend::CrosstermBackend;
use tui::layout::{Constraint, Direction, Layout};
use tui::style::{Color, Modifier, Style};
use tui::text::Spans;
use tui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use tui::Terminal;

use crate::interpreter::Dispatched;
use crate::state::{MachineState, REGISTER_COUNT, VF};

/// Monitor is used by the runner to show machine state as it goes. It should
/// abstract the implementation details, so a terminal, a log or nothing at
/// all would work.
pub trait Monitor {
    /// called after every instruction with the state it left and what it was
    fn show(&mut self, state: &MachineState, last: &Dispatched) -> Result<(), io::Error>;

    /// true once the user has asked to stop
    fn interrupted(&mut self) -> Result<bool, io::Error>;
}

/// one line per group of four registers, then the pointers, then the stack
pub fn state_lines(state: &MachineState) -> Vec<String> {
    let mut lines: Vec<String> = state
        .v
        .chunks(4)
        .enumerate()
        .map(|(row, regs)| {
            regs.iter()
                .enumerate()
                .map(|(col, value)| format!("V{:X} {:02x}", row * 4 + col, value))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect();
    lines.push(format!(
        "I {:04x}  PC {:04x}  SP {:02x}",
        state.i, state.pc, state.sp
    ));
    let frames: Vec<String> = state.stack[..state.depth().min(state.stack.len())]
        .iter()
        .map(|addr| format!("{:04x}", addr))
        .collect();
    lines.push(format!("stack [{}]", frames.join(" ")));
    lines
}

const REGISTER_WIDTHS: [Constraint; 3] = [
    Constraint::Length(4),
    Constraint::Length(4),
    Constraint::Length(5),
];

/// register file, pointers and stack in a terminal, rendered using TUI and
/// Crossterm
pub struct TermMonitor {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TermMonitor {
    pub fn new() -> Result<TermMonitor, io::Error> {
        terminal::enable_raw_mode()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(TermMonitor { terminal })
    }
}

impl Drop for TermMonitor {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Monitor for TermMonitor {
    fn show(&mut self, state: &MachineState, last: &Dispatched) -> Result<(), io::Error> {
        let rows: Vec<Row> = (0..REGISTER_COUNT)
            .map(|n| {
                let style = if n == VF {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(format!("V{:X}", n)),
                    Cell::from(format!("{:02x}", state.v[n])),
                    Cell::from(format!("{:3}", state.v[n])),
                ])
                .style(style)
            })
            .collect();
        let mut info: Vec<Spans> = state_lines(state)
            .into_iter()
            .skip(REGISTER_COUNT / 4)
            .map(Spans::from)
            .collect();
        info.push(Spans::from(""));
        info.push(Spans::from(format!("last {}", last)));

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(17), Constraint::Min(24)].as_ref())
                .split(f.size());

            let registers = Table::new(rows)
                .header(
                    Row::new(vec!["reg", "hex", "dec"])
                        .style(Style::default().add_modifier(Modifier::BOLD)),
                )
                .block(Block::default().title("CHIP-8").borders(Borders::ALL))
                .widths(&REGISTER_WIDTHS);
            f.render_widget(registers, chunks[0]);

            let pointers = Paragraph::new(info)
                .block(Block::default().title("esc to quit").borders(Borders::ALL));
            f.render_widget(pointers, chunks[1]);
        })?;
        Ok(())
    }

    fn interrupted(&mut self) -> Result<bool, io::Error> {
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                match evt.code {
                    KeyCode::Esc | KeyCode::Char('q') => return Ok(true),
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(true)
                    }
                    _ => {}
                }
            }
        }
        Ok(false)
    }
}

/// useful for testing and headless runs; counts frames, keeps the last
/// instruction, and can pretend the user pressed quit after a while
pub struct DummyMonitor {
    frames: usize,
    last: Option<Dispatched>,
    interrupt_after: Option<usize>,
}

impl DummyMonitor {
    pub fn new() -> Self {
        DummyMonitor {
            frames: 0,
            last: None,
            interrupt_after: None,
        }
    }

    pub fn interrupt_after(frames: usize) -> Self {
        DummyMonitor {
            interrupt_after: Some(frames),
            ..DummyMonitor::new()
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last(&self) -> Option<&Dispatched> {
        self.last.as_ref()
    }
}

impl Default for DummyMonitor {
    fn default() -> Self {
        DummyMonitor::new()
    }
}

impl Monitor for DummyMonitor {
    #[allow(unused)]
    fn show(&mut self, state: &MachineState, last: &Dispatched) -> Result<(), io::Error> {
        self.frames += 1;
        self.last = Some(*last);
        Ok(())
    }

    fn interrupted(&mut self) -> Result<bool, io::Error> {
        Ok(matches!(self.interrupt_after, Some(n) if self.frames >= n))
    }
}
