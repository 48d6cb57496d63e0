//! Typed ANSI output commands and a single output gate.
//!
//! Invariant: the process backend writes to the terminal only through
//! `OutputGate::flush(..)`.

use std::io::{self, Write};

use crate::core::color::ConsoleColor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Printable text at the current cursor position.
    Text(String),
    /// Raw control sequence.
    BytesStatic(&'static str),

    /// Zero-based cell position.
    MoveTo { x: u16, y: u16 },
    Colors {
        foreground: ConsoleColor,
        background: ConsoleColor,
    },
    ResetAttributes,
    ClearScreen,

    HideCursor,
    ShowCursor,
    /// DECSCUSR shape: block for large cursor sizes, underline otherwise.
    CursorShape { size: u8 },

    EnterAltScreen,
    LeaveAltScreen,
    MouseEnable,
    MouseDisable,
    Title(String),
    /// xterm window resize, in cells.
    ResizeWindow { width: u16, height: u16 },
}

impl TerminalCmd {
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text(data.into())
    }

    fn encode(&self, out: &mut String) {
        use std::fmt::Write as _;
        match self {
            TerminalCmd::Text(data) => out.push_str(data),
            TerminalCmd::BytesStatic(data) => out.push_str(data),
            TerminalCmd::MoveTo { x, y } => {
                let _ = write!(out, "\x1b[{};{}H", u32::from(*y) + 1, u32::from(*x) + 1);
            }
            TerminalCmd::Colors {
                foreground,
                background,
            } => {
                let _ = write!(out, "\x1b[{};{}m", foreground.ansi_fg(), background.ansi_bg());
            }
            TerminalCmd::ResetAttributes => out.push_str("\x1b[0m"),
            TerminalCmd::ClearScreen => out.push_str("\x1b[2J"),
            TerminalCmd::HideCursor => out.push_str("\x1b[?25l"),
            TerminalCmd::ShowCursor => out.push_str("\x1b[?25h"),
            TerminalCmd::CursorShape { size } => {
                let shape = if *size >= 50 { 2 } else { 4 };
                let _ = write!(out, "\x1b[{shape} q");
            }
            TerminalCmd::EnterAltScreen => out.push_str("\x1b[?1049h"),
            TerminalCmd::LeaveAltScreen => out.push_str("\x1b[?1049l"),
            TerminalCmd::MouseEnable => out.push_str("\x1b[?1000h\x1b[?1006h"),
            TerminalCmd::MouseDisable => out.push_str("\x1b[?1006l\x1b[?1000l"),
            TerminalCmd::Title(title) => {
                let clean: String = title.chars().filter(|c| !c.is_control()).collect();
                let _ = write!(out, "\x1b]0;{clean}\x07");
            }
            TerminalCmd::ResizeWindow { width, height } => {
                let _ = write!(out, "\x1b[8;{height};{width}t");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct OutputGate {
    cmds: Vec<TerminalCmd>,
}

impl OutputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    pub fn extend<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = TerminalCmd>,
    {
        self.cmds.extend(cmds);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Encodes the buffered commands without writing them.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for cmd in &self.cmds {
            cmd.encode(&mut out);
        }
        out
    }

    /// Flush buffered commands to `out` as one write.
    ///
    /// This is the single write gate: nothing else in the backend writes to
    /// the terminal.
    pub fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.cmds.is_empty() {
            return Ok(());
        }
        let data = self.render();
        self.cmds.clear();
        out.write_all(data.as_bytes())?;
        out.flush()
    }
}
