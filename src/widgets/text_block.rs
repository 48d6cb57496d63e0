//! Scrollable text view.
//!
//! The caret and the scroll offset live in (column, display line) space of
//! the underlying [`TextLayout`]; the console cursor is placed at
//! `caret - scroll` inside the client area.

use std::any::Any;
use std::cell::RefCell;

use crate::core::console::VirtualKey;
use crate::core::control::{ControlContext, ControlEvent, ControlState, DrawContext, Widget};
use crate::core::geometry::{Point, Rect};
use crate::core::input_event::{KeyEvent, MouseEvent};
use crate::core::text::layout::{TextLayout, WrapMode};
use crate::render::GraphicsSurface;

#[derive(Debug)]
pub struct TextBlock {
    layout: TextLayout,
    /// Layout at the last drawn width while that differs from `layout`'s.
    /// Dropped whenever the text or the wrap mode changes.
    drawn: RefCell<Option<TextLayout>>,
    caret: Point,
    scroll: Point,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            layout: TextLayout::new(text, 0, WrapMode::NoWrap),
            drawn: RefCell::new(None),
            caret: Point::ZERO,
            scroll: Point::ZERO,
        }
    }

    pub fn text(&self) -> &str {
        self.layout.text()
    }

    /// Replaces the text; raises `TextChanged` when it differs.
    pub fn set_text(&mut self, ctx: &mut ControlContext<'_>, text: &str) {
        if !self.layout.set_text(text) {
            return;
        }
        self.drawn.get_mut().take();
        self.sync_width(ctx);
        self.clamp_caret();
        self.scroll_to_caret(ctx.client_area());
        self.update_cursor(ctx);
        ctx.emit(ControlEvent::TextChanged);
    }

    pub fn append(&mut self, ctx: &mut ControlContext<'_>, text: &str) {
        if text.is_empty() {
            return;
        }
        self.layout.append(text);
        self.drawn.get_mut().take();
        ctx.invalidate();
        ctx.emit(ControlEvent::TextChanged);
    }

    pub fn clear(&mut self, ctx: &mut ControlContext<'_>) {
        self.set_text(ctx, "");
    }

    pub fn wrap_mode(&self) -> WrapMode {
        self.layout.wrap_mode()
    }

    /// Switches wrapping; wrapped text never scrolls horizontally.
    pub fn set_wrap_mode(&mut self, ctx: &mut ControlContext<'_>, wrap_mode: WrapMode) {
        if self.layout.wrap_mode() == wrap_mode {
            return;
        }
        self.layout.set_wrap_mode(wrap_mode);
        self.drawn.get_mut().take();
        self.sync_width(ctx);
        if wrap_mode == WrapMode::SimpleWrap {
            self.scroll.x = 0;
        }
        self.clamp_caret();
        self.scroll_to_caret(ctx.client_area());
        self.update_cursor(ctx);
        ctx.invalidate();
    }

    pub fn caret(&self) -> Point {
        self.caret
    }

    /// Moves the caret (clamped to the text) and scrolls it into view.
    pub fn set_caret(&mut self, ctx: &mut ControlContext<'_>, caret: Point) {
        self.sync_width(ctx);
        self.caret = caret;
        self.clamp_caret();
        self.scroll_to_caret(ctx.client_area());
        self.update_cursor(ctx);
        ctx.invalidate();
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }

    pub fn set_scroll(&mut self, ctx: &mut ControlContext<'_>, scroll: Point) {
        let scroll = Point::new(scroll.x.max(0), scroll.y.max(0));
        if self.scroll == scroll {
            return;
        }
        self.scroll = scroll;
        self.update_cursor(ctx);
        ctx.invalidate();
    }

    pub fn line_count(&self) -> usize {
        self.layout.buffer_line_count()
    }

    fn sync_width(&mut self, ctx: &ControlContext<'_>) {
        let width = ctx.client_area().width.max(0) as usize;
        self.layout.set_width(width);
        let drawn = self.drawn.get_mut();
        if drawn.as_ref().is_some_and(|layout| layout.width() == width) {
            drawn.take();
        }
    }

    #[cfg(test)]
    fn drawn_width(&self) -> Option<usize> {
        self.drawn.borrow().as_ref().map(TextLayout::width)
    }

    fn line_length(&self, line: i32) -> i32 {
        self.layout.get_line_length(line) as i32
    }

    fn last_line(&self) -> i32 {
        (self.layout.buffer_line_count() as i32 - 1).max(0)
    }

    fn clamp_caret(&mut self) {
        let y = self.caret.y.clamp(0, self.last_line());
        let x = self.caret.x.clamp(0, self.line_length(y));
        self.caret = Point::new(x, y);
    }

    fn scroll_to_caret(&mut self, client: Rect) {
        if client.is_empty() {
            return;
        }
        if self.caret.y < self.scroll.y {
            self.scroll.y = self.caret.y;
        } else if self.caret.y >= self.scroll.y + client.height {
            self.scroll.y = self.caret.y - client.height + 1;
        }
        if self.layout.wrap_mode() == WrapMode::SimpleWrap {
            self.scroll.x = 0;
        } else if self.caret.x < self.scroll.x {
            self.scroll.x = self.caret.x;
        } else if self.caret.x >= self.scroll.x + client.width {
            self.scroll.x = self.caret.x - client.width + 1;
        }
    }

    fn update_cursor(&self, ctx: &mut ControlContext<'_>) {
        ctx.set_cursor_position(self.caret - self.scroll);
    }

    fn move_caret(&mut self, key: VirtualKey, page: i32) -> bool {
        let Point { x, y } = self.caret;
        self.caret = match key {
            VirtualKey::LEFT if x > 0 => Point::new(x - 1, y),
            VirtualKey::LEFT if y > 0 => Point::new(self.line_length(y - 1), y - 1),
            VirtualKey::RIGHT if x < self.line_length(y) => Point::new(x + 1, y),
            VirtualKey::RIGHT if y < self.last_line() => Point::new(0, y + 1),
            VirtualKey::UP => Point::new(x, y - 1),
            VirtualKey::DOWN => Point::new(x, y + 1),
            VirtualKey::PRIOR => Point::new(x, y - page.max(1)),
            VirtualKey::NEXT => Point::new(x, y + page.max(1)),
            VirtualKey::HOME => Point::new(0, y),
            VirtualKey::END => Point::new(self.line_length(y), y),
            VirtualKey::LEFT | VirtualKey::RIGHT => return true,
            _ => return false,
        };
        self.clamp_caret();
        true
    }
}

impl Default for TextBlock {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Widget for TextBlock {
    fn type_name(&self) -> &'static str {
        "TextBlock"
    }

    fn can_focus(&self) -> bool {
        true
    }

    fn init_state(&self, state: &mut ControlState) {
        state.cursor_visible = true;
    }

    fn draw(&self, ctx: &DrawContext<'_>, surface: &mut GraphicsSurface) {
        ctx.draw_frame(surface);
        let client = ctx.client_area;
        if client.is_empty() {
            return;
        }
        let source = Rect::from_parts(self.scroll, client.size());
        let width = client.width as usize;
        let chars = if self.layout.width() == width {
            self.layout.get_characters(source)
        } else {
            // Resized since the last input; keep a layout at the drawn width.
            let mut drawn = self.drawn.borrow_mut();
            if drawn.as_ref().is_some_and(|layout| layout.width() != width) {
                drawn.take();
            }
            drawn
                .get_or_insert_with(|| {
                    TextLayout::new(self.layout.text(), width, self.layout.wrap_mode())
                })
                .get_characters(source)
        };
        surface.copy_characters(ctx.colors.foreground, ctx.colors.background, client, &chars);
    }

    fn on_key_event(&mut self, ctx: &mut ControlContext<'_>, event: &mut KeyEvent) {
        if !event.key_down || !ctx.is_focused() || !event.modifiers.modifier_mask().is_empty() {
            return;
        }
        self.sync_width(ctx);
        let client = ctx.client_area();
        if !self.move_caret(event.virtual_key, client.height) {
            return;
        }
        self.scroll_to_caret(client);
        self.update_cursor(ctx);
        ctx.invalidate();
        event.handled = true;
    }

    fn on_mouse_event(&mut self, ctx: &mut ControlContext<'_>, event: &mut MouseEvent) {
        if !event.is_left_press() || !ctx.client_contains(event.position) {
            return;
        }
        if ctx.focus().is_err() {
            return;
        }
        self.caret = ctx.point_to_client(event.position) + self.scroll;
        self.update_cursor(ctx);
        ctx.invalidate();
        event.handled = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
