//! Recording in-memory console.
//!
//! Stands in for a terminal in tests and headless tooling: it keeps the last
//! written cells, counts flushes, records cursor and title changes and can
//! feed scripted input records (or read failures) to the listener.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::core::console::{Cell, ConsoleBackend, CursorInfo, InputRecord, InputSource};
use crate::core::geometry::{Point, Rect, Size};
use crate::error::{Error, Result};

#[derive(Debug)]
struct ScreenState {
    buffer_size: Size,
    window_size: Size,
    cells: Vec<Cell>,
    cursor: CursorInfo,
    cursor_changes: usize,
    title: String,
    active_screen: bool,
    flush_count: usize,
    closed: bool,
    input_taken: bool,
}

#[derive(Debug)]
enum InputStep {
    Records(Vec<InputRecord>),
    Fail,
}

#[derive(Debug, Default)]
struct InputShared {
    steps: Mutex<VecDeque<InputStep>>,
    ready: Condvar,
}

impl InputShared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<InputStep>> {
        match self.steps.lock() {
            Ok(steps) => steps,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, step: InputStep) {
        self.lock().push_back(step);
        self.ready.notify_all();
    }
}

/// Cloneable handle; every clone sees the same screen.
#[derive(Clone, Debug)]
pub struct MemoryConsole {
    screen: Arc<Mutex<ScreenState>>,
    input: Option<Arc<InputShared>>,
}

impl MemoryConsole {
    /// A console without an input side; drive the window with
    /// `Window::dispatch` or a `WindowHandle`.
    pub fn new(size: Size) -> Self {
        Self::build(size, None)
    }

    /// A console whose input side is handed to the window's listener; feed it
    /// with [`MemoryConsole::push_input`].
    pub fn with_input(size: Size) -> Self {
        Self::build(size, Some(Arc::new(InputShared::default())))
    }

    fn build(size: Size, input: Option<Arc<InputShared>>) -> Self {
        Self {
            screen: Arc::new(Mutex::new(ScreenState {
                buffer_size: size,
                window_size: size,
                cells: vec![Cell::default(); size.area()],
                cursor: CursorInfo::default(),
                cursor_changes: 0,
                title: String::new(),
                active_screen: true,
                flush_count: 0,
                closed: false,
                input_taken: false,
            })),
            input,
        }
    }

    fn screen(&self) -> MutexGuard<'_, ScreenState> {
        match self.screen.lock() {
            Ok(screen) => screen,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push_input(&self, records: Vec<InputRecord>) {
        if let Some(input) = &self.input {
            input.push(InputStep::Records(records));
        }
    }

    /// The next read reports a backend failure.
    pub fn fail_next_read(&self) {
        if let Some(input) = &self.input {
            input.push(InputStep::Fail);
        }
    }

    /// Number of `write_cells` calls, i.e. completed redraws.
    pub fn flush_count(&self) -> usize {
        self.screen().flush_count
    }

    pub fn cell(&self, p: Point) -> Option<Cell> {
        let screen = self.screen();
        let size = screen.buffer_size;
        if p.x < 0 || p.y < 0 || p.x >= size.width || p.y >= size.height {
            return None;
        }
        screen
            .cells
            .get((p.y * size.width + p.x) as usize)
            .copied()
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.screen().cells.clone()
    }

    /// Characters of row `y`, or an empty string outside the buffer.
    pub fn row_text(&self, y: i32) -> String {
        let screen = self.screen();
        let width = screen.buffer_size.width;
        if y < 0 || y >= screen.buffer_size.height {
            return String::new();
        }
        let start = (y * width) as usize;
        screen.cells[start..start + width as usize]
            .iter()
            .map(|cell| cell.ch)
            .collect()
    }

    pub fn cursor(&self) -> CursorInfo {
        self.screen().cursor
    }

    pub fn cursor_changes(&self) -> usize {
        self.screen().cursor_changes
    }

    pub fn current_title(&self) -> String {
        self.screen().title.clone()
    }

    pub fn active_screen(&self) -> bool {
        self.screen().active_screen
    }

    pub fn is_closed(&self) -> bool {
        self.screen().closed
    }
}

impl ConsoleBackend for MemoryConsole {
    fn buffer_size(&self) -> Result<Size> {
        Ok(self.screen().buffer_size)
    }

    fn set_buffer_size(&mut self, size: Size) -> Result<()> {
        let mut screen = self.screen();
        screen.buffer_size = size;
        screen.cells = vec![Cell::default(); size.area()];
        Ok(())
    }

    fn window_size(&self) -> Result<Size> {
        Ok(self.screen().window_size)
    }

    fn set_window_size(&mut self, size: Size) -> Result<()> {
        self.screen().window_size = size;
        Ok(())
    }

    fn cursor(&self) -> Result<CursorInfo> {
        Ok(self.screen().cursor)
    }

    fn set_cursor(&mut self, cursor: CursorInfo) -> Result<()> {
        let mut screen = self.screen();
        if screen.cursor != cursor {
            screen.cursor = cursor;
            screen.cursor_changes += 1;
        }
        Ok(())
    }

    fn title(&self) -> Result<String> {
        Ok(self.screen().title.clone())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        self.screen().title = title.to_string();
        Ok(())
    }

    fn write_cells(&mut self, area: Rect, cells: &[Cell]) -> Result<()> {
        let expected = area.size().area();
        if cells.len() != expected {
            return Err(Error::invalid_argument(
                "cells",
                format!("expected {expected} cells, got {}", cells.len()),
            ));
        }
        let mut screen = self.screen();
        let size = screen.buffer_size;
        for row in 0..area.height {
            for col in 0..area.width {
                let (x, y) = (area.x + col, area.y + row);
                if x < 0 || y < 0 || x >= size.width || y >= size.height {
                    continue;
                }
                screen.cells[(y * size.width + x) as usize] =
                    cells[(row * area.width + col) as usize];
            }
        }
        screen.flush_count += 1;
        Ok(())
    }

    fn take_input(&mut self) -> Option<Box<dyn InputSource>> {
        let input = self.input.as_ref()?;
        let mut screen = self.screen();
        if screen.input_taken {
            return None;
        }
        screen.input_taken = true;
        Some(Box::new(MemoryInput {
            shared: Arc::clone(input),
        }))
    }

    fn active_screen(&self) -> bool {
        self.screen().active_screen
    }

    fn set_active_screen(&mut self, active: bool) -> Result<()> {
        self.screen().active_screen = active;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.screen().closed = true;
        Ok(())
    }
}

struct MemoryInput {
    shared: Arc<InputShared>,
}

impl InputSource for MemoryInput {
    fn wait_ready(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut steps = self.shared.lock();
        while steps.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            steps = match self.shared.ready.wait_timeout(steps, deadline - now) {
                Ok((steps, _)) => steps,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        Ok(true)
    }

    fn read_records(&mut self) -> Result<Vec<InputRecord>> {
        match self.shared.lock().pop_front() {
            Some(InputStep::Records(records)) => Ok(records),
            Some(InputStep::Fail) => Err(Error::Backend {
                op: "read_records",
                code: -1,
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::MemoryConsole;
    use crate::core::color::ConsoleColor;
    use crate::core::console::{Cell, ConsoleBackend, ControlKeyStates, InputRecord, VirtualKey};
    use crate::core::geometry::{Point, Rect, Size};

    #[test]
    fn write_cells_is_clipped_to_the_buffer() {
        let mut console = MemoryConsole::new(Size::new(4, 2));
        let cell = Cell::new('x', ConsoleColor::White, ConsoleColor::Blue);
        console
            .write_cells(Rect::new(2, 1, 3, 1), &[cell; 3])
            .unwrap();
        assert_eq!(console.row_text(1), "  xx");
        assert_eq!(console.cell(Point::new(3, 1)), Some(cell));
        assert_eq!(console.flush_count(), 1);
        assert!(console.write_cells(Rect::new(0, 0, 2, 2), &[cell; 3]).is_err());
    }

    #[test]
    fn input_side_is_handed_out_once() {
        let mut console = MemoryConsole::with_input(Size::new(4, 2));
        let mut source = console.take_input().unwrap();
        assert!(console.take_input().is_none());
        assert!(MemoryConsole::new(Size::new(1, 1)).take_input().is_none());

        assert!(!source.wait_ready(Duration::from_millis(5)).unwrap());
        let record = InputRecord::key_down(VirtualKey::RETURN, '\r', ControlKeyStates::NONE);
        console.push_input(vec![record.clone()]);
        console.fail_next_read();
        assert!(source.wait_ready(Duration::from_millis(5)).unwrap());
        assert_eq!(source.read_records().unwrap(), vec![record]);
        assert!(source.read_records().is_err());
    }
}
