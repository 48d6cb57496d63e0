//! Control model: identifiers, per-control state, the widget capability trait
//! and the contexts handed to widgets while drawing and handling input.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::color::{BorderStyle, ControlColors, EffectiveColors, FrameCharSet};
use crate::core::geometry::{Point, Rect};
use crate::core::input_event::{KeyEvent, MouseEvent};
use crate::error::{Error, Result};
use crate::render::GraphicsSurface;
use crate::runtime::focus::FocusChain;
use crate::runtime::scheduler::DrawScheduler;
use crate::runtime::tree::ControlTree;

/// Identifies one window for the lifetime of the process.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WindowId(u64);

impl WindowId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Stable identifier of a control attached to a window.
///
/// Semantics:
/// - IDs carry the owning window; they are rejected by any other window.
/// - IDs are never reused for the lifetime of the window, so a removed
///   control's ID stays invalid even after re-adding it. Storage slots are
///   recycled; the generation tells a slot's occupants apart.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlId {
    window: WindowId,
    index: u32,
    generation: u32,
}

impl ControlId {
    pub(crate) fn new(window: WindowId, index: u32, generation: u32) -> Self {
        Self {
            window,
            index,
            generation,
        }
    }

    pub fn window(self) -> WindowId {
        self.window
    }

    /// Storage slot within the window's tree.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlId({}:{}v{})",
            self.window.0, self.index, self.generation
        )
    }
}

/// Notifications raised by a single control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    AreaChanged { old: Rect, new: Rect },
    FocusChanged { focused: bool },
    TextChanged,
    Clicked,
}

/// Plain state of one control, as seen through the window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlState {
    pub name: String,
    /// Relative to the parent's client area (or the window for root controls).
    pub area: Rect,
    pub tab_order: i32,
    pub colors: ControlColors,
    pub border_style: BorderStyle,
    pub focused_border_style: Option<BorderStyle>,
    pub enabled: bool,
    pub visible: bool,
    pub focused: bool,
    pub can_focus: bool,
    pub tab_stop: bool,
    pub cursor_visible: bool,
    /// Cursor size override; `None` inherits from the parent chain.
    pub cursor_size: Option<u8>,
    /// Relative to the control's client area.
    pub cursor_position: Point,
    pub parent: Option<ControlId>,
    pub children: Vec<ControlId>,
}

impl ControlState {
    fn new(name: &str, can_focus: bool) -> Self {
        Self {
            name: name.to_string(),
            area: Rect::default(),
            tab_order: 0,
            colors: ControlColors::default(),
            border_style: BorderStyle::None,
            focused_border_style: None,
            enabled: true,
            visible: true,
            focused: false,
            can_focus,
            tab_stop: true,
            cursor_visible: false,
            cursor_size: None,
            cursor_position: Point::ZERO,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn effective_border_style(&self) -> BorderStyle {
        match self.focused_border_style {
            Some(style) if self.focused => style,
            _ => self.border_style,
        }
    }

    /// Client area in parent coordinates: the area minus the border.
    pub fn client_area(&self) -> Rect {
        if self.effective_border_style() == BorderStyle::None {
            self.area
        } else {
            self.area.deflate(1)
        }
    }
}

/// Capability interface implemented by concrete controls.
///
/// Widgets own only their content (text, caption, scroll position); the
/// window owns geometry, flags and colors in `ControlState`.
pub trait Widget: Send + Any {
    /// Default control name.
    fn type_name(&self) -> &'static str {
        "Control"
    }

    fn can_focus(&self) -> bool {
        false
    }

    /// Adjusts the initial state (colors, border, cursor) of a new control.
    fn init_state(&self, _state: &mut ControlState) {}

    fn draw(&self, ctx: &DrawContext<'_>, surface: &mut GraphicsSurface) {
        ctx.draw_frame(surface);
    }

    fn on_key_event(&mut self, _ctx: &mut ControlContext<'_>, _event: &mut KeyEvent) {}

    fn on_mouse_event(&mut self, ctx: &mut ControlContext<'_>, event: &mut MouseEvent) {
        if event.is_left_press()
            && ctx.client_contains(event.position)
            && ctx.can_focus()
            && ctx.focus().is_ok()
        {
            event.handled = true;
        }
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A control that is not attached to a window yet (or was removed from one).
///
/// Created by `Window::control`, configured with the builder methods and
/// attached with `Window::add` / `Window::add_to`.
pub struct Control {
    pub(crate) window: WindowId,
    pub(crate) state: ControlState,
    pub(crate) widget: Box<dyn Widget>,
    pub(crate) children: Vec<Control>,
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("window", &self.window)
            .field("name", &self.state.name)
            .field("area", &self.state.area)
            .field("children", &self.children)
            .finish()
    }
}

impl Control {
    pub(crate) fn new(window: WindowId, widget: Box<dyn Widget>) -> Self {
        let mut state = ControlState::new(widget.type_name(), widget.can_focus());
        widget.init_state(&mut state);
        Self {
            window,
            state,
            widget,
            children: Vec::new(),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn children(&self) -> &[Control] {
        &self.children
    }

    pub fn widget<T: Widget>(&self) -> Option<&T> {
        self.widget.as_any().downcast_ref()
    }

    pub fn widget_mut<T: Widget>(&mut self) -> Option<&mut T> {
        self.widget.as_any_mut().downcast_mut()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.state.name = name.into();
        self
    }

    pub fn area(mut self, area: Rect) -> Self {
        self.state.area = area;
        self
    }

    pub fn tab_order(mut self, tab_order: i32) -> Self {
        self.state.tab_order = tab_order;
        self
    }

    pub fn tab_stop(mut self, tab_stop: bool) -> Self {
        self.state.tab_stop = tab_stop;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.state.enabled = enabled;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.state.visible = visible;
        self
    }

    pub fn colors(mut self, colors: ControlColors) -> Self {
        self.state.colors = colors;
        self
    }

    pub fn border_style(mut self, style: BorderStyle) -> Self {
        self.state.border_style = style;
        self
    }

    pub fn focused_border_style(mut self, style: BorderStyle) -> Self {
        self.state.focused_border_style = Some(style);
        self
    }

    pub fn cursor_visible(mut self, visible: bool) -> Self {
        self.state.cursor_visible = visible;
        self
    }

    pub fn cursor_size(mut self, size: u8) -> Result<Self> {
        self.state.cursor_size = Some(validate_cursor_size(size)?);
        Ok(self)
    }

    /// Adds a child; ownership is checked when the tree is attached.
    pub fn child(mut self, child: Control) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn check_owner(&self, window: WindowId) -> Result<()> {
        if self.window != window {
            return Err(Error::CrossWindowOwnership);
        }
        self.children
            .iter()
            .try_for_each(|child| child.check_owner(window))
    }
}

pub(crate) fn validate_cursor_size(size: u8) -> Result<u8> {
    if (1..=100).contains(&size) {
        Ok(size)
    } else {
        Err(Error::invalid_argument(
            "cursor_size",
            format!("{size} is outside 1..=100"),
        ))
    }
}

/// Everything a widget needs to paint itself. Areas are in console coordinates.
pub struct DrawContext<'a> {
    pub id: ControlId,
    pub state: &'a ControlState,
    pub area: Rect,
    pub client_area: Rect,
    pub colors: EffectiveColors,
    pub border_style: BorderStyle,
    pub frame: Option<&'a FrameCharSet>,
}

impl DrawContext<'_> {
    pub fn focused(&self) -> bool {
        self.state.focused
    }

    pub fn enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn draw_background(&self, surface: &mut GraphicsSurface) {
        surface.draw_background(self.colors.background, self.area);
    }

    pub fn draw_border(&self, surface: &mut GraphicsSurface) {
        if let Some(frame) = self.frame {
            surface.draw_border(self.colors.border, self.colors.background, self.area, frame);
        }
    }

    /// Background plus border; the default look of every control.
    pub fn draw_frame(&self, surface: &mut GraphicsSurface) {
        self.draw_background(surface);
        self.draw_border(surface);
    }
}

/// Access to the window from inside a widget's input handler.
///
/// Handlers run under the window lock; everything here is applied directly
/// and repainted once dispatch finishes.
pub struct ControlContext<'a> {
    id: ControlId,
    tree: &'a mut ControlTree,
    focus: &'a mut FocusChain,
    scheduler: &'a mut DrawScheduler,
}

impl<'a> ControlContext<'a> {
    pub(crate) fn new(
        id: ControlId,
        tree: &'a mut ControlTree,
        focus: &'a mut FocusChain,
        scheduler: &'a mut DrawScheduler,
    ) -> Self {
        Self {
            id,
            tree,
            focus,
            scheduler,
        }
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn state(&self) -> Option<&ControlState> {
        self.tree.state(self.id).ok()
    }

    pub fn can_focus(&self) -> bool {
        self.state().is_some_and(|state| state.can_focus)
    }

    /// Client area in console coordinates.
    pub fn client_area(&self) -> Rect {
        self.tree
            .absolute_client_area(self.id)
            .unwrap_or_default()
    }

    pub fn client_contains(&self, console_point: Point) -> bool {
        self.client_area().contains(console_point)
    }

    pub fn point_to_client(&self, console_point: Point) -> Point {
        console_point - self.client_area().location()
    }

    pub fn is_focused(&self) -> bool {
        self.focus.focused() == Some(self.id)
    }

    /// Focuses this control; fails unless it can take focus right now.
    pub fn focus(&mut self) -> Result<()> {
        if self.focus.set_focus(self.tree, Some(self.id))? {
            self.scheduler.invalidate();
        }
        Ok(())
    }

    pub fn set_cursor_position(&mut self, position: Point) {
        if let Ok(state) = self.tree.state_mut(self.id) {
            if state.cursor_position != position {
                state.cursor_position = position;
                self.scheduler.invalidate();
            }
        }
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        if let Ok(state) = self.tree.state_mut(self.id) {
            if state.cursor_visible != visible {
                state.cursor_visible = visible;
                self.scheduler.invalidate();
            }
        }
    }

    /// Requests a repaint once dispatch finishes.
    pub fn invalidate(&mut self) {
        self.scheduler.invalidate();
    }

    pub fn emit(&mut self, mut event: ControlEvent) {
        self.tree.emit(self.id, &mut event);
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_cursor_size, ControlState, WindowId};
    use crate::core::color::BorderStyle;
    use crate::core::geometry::Rect;

    #[test]
    fn client_area_is_deflated_by_border() {
        let mut state = ControlState::new("Panel", false);
        state.area = Rect::new(5, 5, 10, 10);
        assert_eq!(state.client_area(), Rect::new(5, 5, 10, 10));
        for style in [
            BorderStyle::SingleLined,
            BorderStyle::DoubleLined,
            BorderStyle::Bold,
        ] {
            state.border_style = style;
            assert_eq!(state.client_area(), Rect::new(6, 6, 8, 8));
        }
    }

    #[test]
    fn focused_border_style_applies_only_when_focused() {
        let mut state = ControlState::new("TextBlock", true);
        state.border_style = BorderStyle::SingleLined;
        state.focused_border_style = Some(BorderStyle::DoubleLined);
        assert_eq!(state.effective_border_style(), BorderStyle::SingleLined);
        state.focused = true;
        assert_eq!(state.effective_border_style(), BorderStyle::DoubleLined);
    }

    #[test]
    fn cursor_size_range() {
        assert!(validate_cursor_size(0).is_err());
        assert!(validate_cursor_size(101).is_err());
        assert_eq!(validate_cursor_size(100).unwrap(), 100);
    }

    #[test]
    fn window_ids_are_unique() {
        assert_ne!(WindowId::next(), WindowId::next());
    }
}
