//! Process terminal backend (Unix): raw mode, ANSI output and stdin input.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use libc::{self, c_int};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use crate::config::EnvConfig;
use crate::core::color::ConsoleColor;
use crate::core::console::{Cell, ConsoleBackend, CursorInfo, InputRecord, InputSource};
use crate::core::geometry::{Point, Rect, Size};
use crate::core::output::{OutputGate, TerminalCmd};
use crate::error::{Error, Result};
use crate::platform::input_decoder::InputDecoder;

const FALLBACK_SIZE: Size = Size::new(80, 24);

fn read_winsize(fd: c_int) -> Option<Size> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some(Size::new(i32::from(size.ws_col), i32::from(size.ws_row)))
    } else {
        None
    }
}

fn poll_readable(fd: c_int, timeout_ms: i32) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(result > 0 && (fds.revents & libc::POLLIN) != 0)
}

fn get_termios(fd: c_int) -> io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_termios(fd: c_int, termios: &libc::termios) -> io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `io::Write` over a raw descriptor, retrying interrupted writes.
struct FdWriter(c_int);

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let result =
                unsafe { libc::write(self.0, buf.as_ptr() as *const libc::c_void, buf.len()) };
            if result >= 0 {
                return Ok(result as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn to_u16(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

/// Terminal commands painting `cells` into `area`.
///
/// Colors are emitted only when they change from `colors`, which carries
/// the last emitted pair across calls. A double-width character covers the
/// cell after it; zero-width and control characters are painted as spaces.
pub fn encode_cells(
    area: Rect,
    cells: &[Cell],
    colors: &mut Option<(ConsoleColor, ConsoleColor)>,
) -> Vec<TerminalCmd> {
    let mut cmds = Vec::new();
    if area.is_empty() {
        return cmds;
    }
    for (row_index, row) in cells.chunks(area.width as usize).enumerate() {
        let y = area.y + row_index as i32;
        if y < 0 {
            continue;
        }
        cmds.push(TerminalCmd::MoveTo {
            x: to_u16(area.x),
            y: to_u16(y),
        });
        let mut text = String::new();
        let mut skip = 0usize;
        for cell in row {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let pair = (cell.foreground, cell.background);
            if *colors != Some(pair) {
                if !text.is_empty() {
                    cmds.push(TerminalCmd::Text(std::mem::take(&mut text)));
                }
                cmds.push(TerminalCmd::Colors {
                    foreground: cell.foreground,
                    background: cell.background,
                });
                *colors = Some(pair);
            }
            match cell.ch.width() {
                Some(width) if width >= 1 => {
                    text.push(cell.ch);
                    skip = width - 1;
                }
                _ => text.push(' '),
            }
        }
        if !text.is_empty() {
            cmds.push(TerminalCmd::Text(text));
        }
    }
    cmds
}

/// Console backend over the process's controlling terminal.
///
/// Construction switches the terminal to raw mode, enables SGR mouse
/// reporting and (unless disabled) enters the alternate screen, which doubles
/// as the "active screen" switch. [`ConsoleBackend::close`] and `Drop` restore
/// everything.
pub struct ProcessConsole {
    stdin_fd: c_int,
    stdout_fd: c_int,
    original_termios: Option<libc::termios>,
    output: OutputGate,
    colors: Option<(ConsoleColor, ConsoleColor)>,
    cursor: CursorInfo,
    title: String,
    size_override: Option<Size>,
    use_alt_screen: bool,
    active_screen: bool,
    input_taken: bool,
    closed: bool,
}

impl ProcessConsole {
    pub fn new(config: &EnvConfig) -> Result<Self> {
        let mut console = Self {
            stdin_fd: libc::STDIN_FILENO,
            stdout_fd: libc::STDOUT_FILENO,
            original_termios: None,
            output: OutputGate::new(),
            colors: None,
            cursor: CursorInfo::default(),
            title: String::new(),
            size_override: None,
            use_alt_screen: !config.no_alt_screen,
            active_screen: true,
            input_taken: false,
            closed: false,
        };
        console.enable_raw_mode()?;
        if console.use_alt_screen {
            console.output.push(TerminalCmd::EnterAltScreen);
        }
        console.output.extend([
            TerminalCmd::MouseEnable,
            TerminalCmd::ResetAttributes,
            TerminalCmd::ClearScreen,
        ]);
        console.flush("open")?;
        debug!(alt_screen = console.use_alt_screen, "process console opened");
        Ok(console)
    }

    fn enable_raw_mode(&mut self) -> Result<()> {
        let original = get_termios(self.stdin_fd).map_err(|err| Error::backend("tcgetattr", err))?;
        let mut raw = original;
        unsafe {
            libc::cfmakeraw(&mut raw);
        }
        set_termios(self.stdin_fd, &raw).map_err(|err| Error::backend("tcsetattr", err))?;
        self.original_termios = Some(original);
        Ok(())
    }

    fn flush(&mut self, op: &'static str) -> Result<()> {
        self.output
            .flush(&mut FdWriter(self.stdout_fd))
            .map_err(|err| Error::backend(op, err))
    }

    fn push_cursor(&mut self) {
        let cursor = self.cursor;
        self.output.extend([
            TerminalCmd::MoveTo {
                x: to_u16(cursor.position.x),
                y: to_u16(cursor.position.y),
            },
            TerminalCmd::CursorShape { size: cursor.size },
            if cursor.visible {
                TerminalCmd::ShowCursor
            } else {
                TerminalCmd::HideCursor
            },
        ]);
    }
}

impl ConsoleBackend for ProcessConsole {
    fn buffer_size(&self) -> Result<Size> {
        Ok(self
            .size_override
            .or_else(|| read_winsize(self.stdout_fd))
            .unwrap_or(FALLBACK_SIZE))
    }

    /// Terminals have no separate scroll-back buffer here; the requested size
    /// is kept and used for drawing.
    fn set_buffer_size(&mut self, size: Size) -> Result<()> {
        self.size_override = Some(size);
        Ok(())
    }

    fn window_size(&self) -> Result<Size> {
        Ok(read_winsize(self.stdout_fd).unwrap_or(FALLBACK_SIZE))
    }

    fn set_window_size(&mut self, size: Size) -> Result<()> {
        self.output.push(TerminalCmd::ResizeWindow {
            width: to_u16(size.width),
            height: to_u16(size.height),
        });
        self.flush("set_window_size")
    }

    fn cursor(&self) -> Result<CursorInfo> {
        Ok(self.cursor)
    }

    fn set_cursor(&mut self, cursor: CursorInfo) -> Result<()> {
        self.cursor = cursor;
        self.push_cursor();
        self.flush("set_cursor")
    }

    fn title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        self.title = title.to_string();
        self.output.push(TerminalCmd::Title(self.title.clone()));
        self.flush("set_title")
    }

    fn write_cells(&mut self, area: Rect, cells: &[Cell]) -> Result<()> {
        if cells.len() != area.size().area() {
            return Err(Error::invalid_argument(
                "cells",
                format!("expected {} cells, got {}", area.size().area(), cells.len()),
            ));
        }
        self.output.push(TerminalCmd::HideCursor);
        let cmds = encode_cells(area, cells, &mut self.colors);
        self.output.extend(cmds);
        // Cursor state is re-applied after painting moved it.
        self.push_cursor();
        self.flush("write_cells")
    }

    fn take_input(&mut self) -> Option<Box<dyn InputSource>> {
        if self.input_taken {
            return None;
        }
        self.input_taken = true;
        let signals = match Signals::new([libc::SIGWINCH]) {
            Ok(signals) => Some(signals),
            Err(err) => {
                warn!(error = %err, "registering SIGWINCH failed; resizes will not be reported");
                None
            }
        };
        Some(Box::new(ProcessInput {
            stdin_fd: self.stdin_fd,
            stdout_fd: self.stdout_fd,
            decoder: InputDecoder::default(),
            signals,
            resize_pending: false,
        }))
    }

    fn active_screen(&self) -> bool {
        self.active_screen
    }

    fn set_active_screen(&mut self, active: bool) -> Result<()> {
        if self.use_alt_screen {
            self.output.push(if active {
                TerminalCmd::EnterAltScreen
            } else {
                TerminalCmd::LeaveAltScreen
            });
            self.flush("set_active_screen")?;
        }
        self.active_screen = active;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.output.extend([
            TerminalCmd::MouseDisable,
            TerminalCmd::ResetAttributes,
            TerminalCmd::CursorShape { size: 25 },
            TerminalCmd::ShowCursor,
        ]);
        if self.use_alt_screen {
            self.output.push(TerminalCmd::LeaveAltScreen);
        }
        let flushed = self.flush("close");
        let _ = unsafe { libc::tcflush(self.stdin_fd, libc::TCIFLUSH) };
        if let Some(original) = self.original_termios.take() {
            set_termios(self.stdin_fd, &original).map_err(|err| Error::backend("tcsetattr", err))?;
        }
        flushed
    }
}

impl Drop for ProcessConsole {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "restoring the terminal failed");
        }
    }
}

struct ProcessInput {
    stdin_fd: c_int,
    stdout_fd: c_int,
    decoder: InputDecoder,
    signals: Option<Signals>,
    resize_pending: bool,
}

impl ProcessInput {
    fn check_signals(&mut self) {
        if let Some(signals) = self.signals.as_mut() {
            if signals.pending().next().is_some() {
                self.resize_pending = true;
            }
        }
    }
}

impl InputSource for ProcessInput {
    fn wait_ready(&mut self, timeout: Duration) -> Result<bool> {
        self.check_signals();
        if self.resize_pending {
            return Ok(true);
        }
        let now = Instant::now();
        let wait = self.decoder.next_timeout(now, timeout);
        let readable = poll_readable(self.stdin_fd, wait.as_millis().min(i32::MAX as u128) as i32)
            .map_err(|err| Error::backend("poll", err))?;
        self.check_signals();
        Ok(readable || self.resize_pending || self.decoder.has_pending())
    }

    fn read_records(&mut self) -> Result<Vec<InputRecord>> {
        let mut records = Vec::new();
        if std::mem::take(&mut self.resize_pending) {
            let size = read_winsize(self.stdout_fd).unwrap_or(FALLBACK_SIZE);
            records.push(InputRecord::Resize {
                buffer_size: size,
                window_area: Rect::from_parts(Point::ZERO, size),
            });
        }
        if poll_readable(self.stdin_fd, 0).map_err(|err| Error::backend("poll", err))? {
            let mut buffer = [0u8; 4096];
            let read_len =
                unsafe { libc::read(self.stdin_fd, buffer.as_mut_ptr() as *mut _, buffer.len()) };
            if read_len < 0 {
                return Err(Error::backend("read", io::Error::last_os_error()));
            }
            records.extend(self.decoder.feed(&buffer[..read_len as usize]));
        }
        records.extend(self.decoder.flush_due(Instant::now()));
        Ok(records)
    }
}

impl Drop for ProcessInput {
    fn drop(&mut self) {
        if let Some(signals) = self.signals.as_ref() {
            signals.handle().close();
        }
    }
}
