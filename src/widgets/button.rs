//! Push button.

use std::any::Any;

use crate::core::color::{BorderStyle, ConsoleColor, ControlColors};
use crate::core::console::VirtualKey;
use crate::core::control::{ControlContext, ControlEvent, ControlState, DrawContext, Widget};
use crate::core::geometry::Point;
use crate::core::input_event::{KeyEvent, MouseEvent};
use crate::render::GraphicsSurface;

/// Shows its caption as `[caption]` and raises [`ControlEvent::Clicked`] on
/// Enter, Space or a left click.
#[derive(Debug, Default)]
pub struct Button {
    caption: String,
}

impl Button {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// The rendered text, brackets included.
    pub fn text(&self) -> String {
        format!("[{}]", self.caption)
    }

    pub fn set_caption(&mut self, ctx: &mut ControlContext<'_>, caption: &str) {
        if self.caption == caption {
            return;
        }
        self.caption = caption.to_string();
        ctx.invalidate();
        ctx.emit(ControlEvent::TextChanged);
    }

    /// Raises `Clicked` unless the control is disabled.
    pub fn perform_click(&mut self, ctx: &mut ControlContext<'_>) -> bool {
        let enabled = ctx.state().is_some_and(|state| state.enabled);
        if enabled {
            ctx.emit(ControlEvent::Clicked);
        }
        enabled
    }
}

impl Widget for Button {
    fn type_name(&self) -> &'static str {
        "Button"
    }

    fn can_focus(&self) -> bool {
        true
    }

    fn init_state(&self, state: &mut ControlState) {
        state.colors = ControlColors {
            foreground: Some(ConsoleColor::DarkYellow),
            background: Some(ConsoleColor::DarkBlue),
            border: Some(ConsoleColor::DarkYellow),
            disabled_foreground: Some(ConsoleColor::Gray),
            disabled_background: Some(ConsoleColor::DarkBlue),
            disabled_border: None,
            focused_foreground: Some(ConsoleColor::Yellow),
            focused_background: Some(ConsoleColor::Blue),
            focused_border: Some(ConsoleColor::Yellow),
        };
        state.border_style = BorderStyle::SingleLined;
        state.focused_border_style = Some(BorderStyle::DoubleLined);
        state.cursor_visible = false;
    }

    fn draw(&self, ctx: &DrawContext<'_>, surface: &mut GraphicsSurface) {
        ctx.draw_frame(surface);
        let client = ctx.client_area;
        if client.is_empty() {
            return;
        }
        let clip = surface.set_clip(client.intersect(surface.clip()));
        surface.draw_text(
            ctx.colors.foreground,
            ctx.colors.background,
            Point::new(client.x, client.y),
            &self.text(),
        );
        surface.set_clip(clip);
    }

    fn on_key_event(&mut self, ctx: &mut ControlContext<'_>, event: &mut KeyEvent) {
        let pressed = event.is_plain(VirtualKey::RETURN) || event.is_plain(VirtualKey::SPACE);
        if pressed && ctx.is_focused() && self.perform_click(ctx) {
            event.handled = true;
        }
    }

    fn on_mouse_event(&mut self, ctx: &mut ControlContext<'_>, event: &mut MouseEvent) {
        if !event.is_left_press() || !ctx.client_contains(event.position) {
            return;
        }
        if ctx.focus().is_ok() {
            self.perform_click(ctx);
            event.handled = true;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::Button;
    use crate::core::console::{ControlKeyStates, InputRecord, MouseButtonStates, VirtualKey};
    use crate::core::control::{ControlEvent, ControlId};
    use crate::core::geometry::{Point, Rect, Size};
    use crate::platform::MemoryConsole;
    use crate::runtime::instance::window_test_lock;
    use crate::runtime::Window;

    fn counted_button(window: &Window) -> (ControlId, Arc<AtomicUsize>) {
        let id = window
            .add(window.control(Button::new("OK")).area(Rect::new(1, 1, 6, 3)))
            .unwrap();
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&clicks);
        window
            .subscribe_control(id, move |event: &mut ControlEvent| {
                if *event == ControlEvent::Clicked {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        (id, clicks)
    }

    #[test]
    fn enter_and_space_click_the_focused_button() {
        let _lock = window_test_lock();
        let window = Window::new(MemoryConsole::new(Size::new(10, 5))).unwrap();
        let (id, clicks) = counted_button(&window);

        let enter = InputRecord::key_down(VirtualKey::RETURN, '\r', ControlKeyStates::NONE);
        window.dispatch(enter.clone()).unwrap();
        assert_eq!(clicks.load(Ordering::SeqCst), 0);

        window.set_focused_control(Some(id)).unwrap();
        window.dispatch(enter).unwrap();
        window
            .dispatch(InputRecord::key_down(VirtualKey::SPACE, ' ', ControlKeyStates::NONE))
            .unwrap();
        window
            .dispatch(InputRecord::key_down(
                VirtualKey::RETURN,
                '\r',
                ControlKeyStates::LEFT_CTRL,
            ))
            .unwrap();
        assert_eq!(clicks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disabled_button_does_not_click() {
        let _lock = window_test_lock();
        let window = Window::new(MemoryConsole::new(Size::new(10, 5))).unwrap();
        let (id, clicks) = counted_button(&window);
        window.set_enabled_control(id, false).unwrap();
        let clicked = window
            .with_widget::<Button, _>(id, |button, ctx| button.perform_click(ctx))
            .unwrap();
        assert!(!clicked);
        assert_eq!(clicks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn click_focuses_and_renders_caption_in_brackets() {
        let _lock = window_test_lock();
        let console = MemoryConsole::new(Size::new(10, 5));
        let window = Window::new(console.clone()).unwrap();
        let (id, clicks) = counted_button(&window);
        assert_eq!(console.row_text(2), " │[OK]│   ");

        window
            .dispatch(InputRecord::mouse_press(Point::new(3, 2), MouseButtonStates::LEFT))
            .unwrap();
        assert_eq!(window.focused_control(), Some(id));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(console.row_text(2), " ║[OK]║   ");
    }
}
