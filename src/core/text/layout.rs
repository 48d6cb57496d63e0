//! Wrapped, index-addressable display lines for scrollable text views.
//!
//! Raw text is split into logical lines on `\n` (a `\r` directly before the
//! `\n` belongs to the break). Display lines are derived lazily from the
//! logical lines, the width and the wrap mode, and are dropped whenever one of
//! those changes.
//!
//! Lengths and columns are counted in `char`s.

use once_cell::unsync::OnceCell;

use crate::core::geometry::Rect;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    NoWrap,
    SimpleWrap,
}

#[derive(Debug, Default)]
struct DisplayLines {
    lines: Vec<Vec<char>>,
    max_line_length: usize,
}

#[derive(Debug, Default)]
pub struct TextLayout {
    text: String,
    width: usize,
    wrap_mode: WrapMode,
    display: OnceCell<DisplayLines>,
}

impl TextLayout {
    pub fn new(text: impl Into<String>, width: usize, wrap_mode: WrapMode) -> Self {
        Self {
            text: text.into(),
            width,
            wrap_mode,
            display: OnceCell::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text. Returns `false` (and keeps the cache) when unchanged.
    pub fn set_text(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        self.invalidate();
        true
    }

    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        self.invalidate();
    }

    pub fn clear(&mut self) {
        self.set_text("");
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set_width(&mut self, width: usize) {
        if self.width != width {
            self.width = width;
            self.invalidate();
        }
    }

    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode
    }

    pub fn set_wrap_mode(&mut self, wrap_mode: WrapMode) {
        if self.wrap_mode != wrap_mode {
            self.wrap_mode = wrap_mode;
            self.invalidate();
        }
    }

    pub fn buffer_line_count(&self) -> usize {
        self.display().lines.len()
    }

    pub fn max_line_length(&self) -> usize {
        self.display().max_line_length
    }

    /// Length of display line `index`; 0 when out of range.
    pub fn get_line_length(&self, index: i32) -> usize {
        self.line(index).map_or(0, <[char]>::len)
    }

    pub fn line(&self, index: i32) -> Option<&[char]> {
        let index = usize::try_from(index).ok()?;
        self.display().lines.get(index).map(Vec::as_slice)
    }

    /// Row-major characters of `area` in (column, display line) space.
    ///
    /// Positions past a line's end or past the last line are `'\0'`. An area
    /// with non-positive width or height yields nothing.
    pub fn get_characters(&self, area: Rect) -> Vec<char> {
        if area.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(area.size().area());
        for row in area.y..area.bottom() {
            let line = self.line(row).unwrap_or(&[]);
            for col in area.x..area.right() {
                let ch = usize::try_from(col)
                    .ok()
                    .and_then(|col| line.get(col).copied())
                    .unwrap_or('\0');
                out.push(ch);
            }
        }
        out
    }

    fn invalidate(&mut self) {
        self.display.take();
    }

    fn display(&self) -> &DisplayLines {
        self.display
            .get_or_init(|| build_display_lines(&self.text, self.width, self.wrap_mode))
    }
}

fn logical_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    // Every segment but the last was followed by `\n`.
    let terminated = lines.len().saturating_sub(1);
    for line in &mut lines[..terminated] {
        let raw = *line;
        *line = raw.strip_suffix('\r').unwrap_or(raw);
    }
    lines
}

fn build_display_lines(text: &str, width: usize, wrap_mode: WrapMode) -> DisplayLines {
    let mut display = DisplayLines::default();
    for line in logical_lines(text) {
        let chars: Vec<char> = line.chars().collect();
        let wraps = wrap_mode == WrapMode::SimpleWrap && width > 0;
        if !wraps || chars.is_empty() {
            display.max_line_length = display.max_line_length.max(chars.len());
            display.lines.push(chars);
            continue;
        }

        for chunk in chars.chunks(width) {
            display.max_line_length = display.max_line_length.max(chunk.len());
            display.lines.push(chunk.to_vec());
        }
        if chars.len() % width == 0 {
            display.lines.push(Vec::new());
        }
    }
    display
}
