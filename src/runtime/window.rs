//! Window: the composition root.
//!
//! One `Mutex<WindowState>` guards the control tree, the focus chain, the
//! draw scheduler and the backend. Every public mutation takes the lock,
//! opens a defer scope, applies its changes and closes the scope; closing the
//! outermost scope repaints once if anything was invalidated.
//!
//! Input arrives on the listener thread and is queued; the thread that owns
//! the window drains the queue with [`Window::run_once`], [`Window::run`] or
//! [`Window::dispatch`]. Subscriber callbacks run under the window lock and
//! must not call back into the `Window`; use a [`WindowHandle`] instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::WindowOptions;
use crate::core::color::{
    BorderStyle, ConsoleColor, ControlColors, EffectiveColors, FrameCharSet, FrameCharSets,
};
use crate::core::console::{Cell, ConsoleBackend, CursorInfo, InputRecord};
use crate::core::control::{
    validate_cursor_size, Control, ControlContext, ControlEvent, ControlId, ControlState,
    DrawContext, Widget, WindowId,
};
use crate::core::geometry::{Point, Rect, Size};
use crate::core::input_event::{FocusEvent, InputEvent, KeyEvent, MenuEvent, MouseEvent, SizeEvent};
use crate::core::keybindings::{KeyCombination, WindowKeyBindings};
use crate::error::{Error, Result};
use crate::render::GraphicsSurface;
use crate::runtime::dispatch;
use crate::runtime::focus::FocusChain;
use crate::runtime::instance::InstanceGuard;
use crate::runtime::listener::{ConsoleListener, InputQueue};
use crate::runtime::scheduler::DrawScheduler;
use crate::runtime::subscription::{SubscriptionId, Subscribers};
use crate::runtime::tree::ControlTree;

/// Raised once per `add`, `add_to`, non-empty `add_range` and `remove`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlsChanged {
    pub parent: Option<ControlId>,
    pub added: Vec<ControlId>,
    pub removed: Vec<ControlId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowClosed {
    pub exit_code: i32,
}

/// Window-level subscriber lists. Key and mouse subscribers run before any
/// control sees the event and may stop routing by setting `handled`.
#[derive(Debug, Default)]
pub struct WindowEvents {
    pub key: Subscribers<KeyEvent>,
    pub mouse: Subscribers<MouseEvent>,
    pub menu: Subscribers<MenuEvent>,
    pub focus: Subscribers<FocusEvent>,
    pub area_changed: Subscribers<SizeEvent>,
    pub controls_changed: Subscribers<ControlsChanged>,
    pub disposed: Subscribers<WindowClosed>,
}

pub(crate) struct WindowState {
    pub(crate) backend: Box<dyn ConsoleBackend>,
    pub(crate) tree: ControlTree,
    pub(crate) focus: FocusChain,
    pub(crate) scheduler: DrawScheduler,
    pub(crate) defaults: EffectiveColors,
    pub(crate) default_cursor_size: u8,
    pub(crate) frame_chars: FrameCharSets,
    pub(crate) bindings: WindowKeyBindings,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) exit_code: i32,
    pub(crate) disposed: bool,
    pub(crate) original_cursor: CursorInfo,
    pub(crate) events: WindowEvents,
}

impl WindowState {
    /// Full repaint: background, every visible control in tree order, one
    /// flush, then the cursor. Suppressed while inhibited, hidden or disposed.
    pub(crate) fn redraw(&mut self) -> Result<()> {
        if self.disposed || !self.visible || self.scheduler.is_inhibited() {
            return Ok(());
        }
        self.scheduler.clear_dirty();

        let size = self.backend.buffer_size()?;
        let fill = Cell::new(' ', self.defaults.foreground, self.defaults.background);
        let mut surface = GraphicsSurface::new(size, fill);
        let mut drawn = 0usize;
        for id in self.tree.pre_order() {
            if !self.tree.is_effectively_visible(id) {
                continue;
            }
            let clip = self.tree.visible_area(id)?;
            if clip.is_empty() {
                continue;
            }
            let Some(widget) = self.tree.widget(id) else {
                continue;
            };
            let state = self.tree.state(id)?;
            let border_style = state.effective_border_style();
            let ctx = DrawContext {
                id,
                state,
                area: self.tree.absolute_area(id)?,
                client_area: self.tree.absolute_client_area(id)?,
                colors: self.tree.effective_colors(id, self.defaults)?,
                border_style,
                frame: self.frame_chars.get(border_style),
            };
            surface.set_clip(clip);
            widget.draw(&ctx, &mut surface);
            drawn += 1;
        }
        surface.reset_clip();
        surface.flush(&mut *self.backend)?;
        debug!(controls = drawn, width = size.width, height = size.height, "window redrawn");
        self.update_cursor()
    }

    /// Shows the focused control's cursor at its client position, sized by
    /// the nearest override up its ancestor chain. Hidden without focus.
    fn update_cursor(&mut self) -> Result<()> {
        let cursor = match self.focus.focused() {
            Some(id) => {
                let state = self.tree.state(id)?;
                CursorInfo {
                    visible: state.cursor_visible && self.tree.is_effectively_visible(id),
                    size: self.focus.cursor_size(&self.tree, self.default_cursor_size),
                    position: self.tree.point_to_console(id, state.cursor_position)?,
                }
            }
            None => CursorInfo {
                visible: false,
                size: self.default_cursor_size,
                position: Point::ZERO,
            },
        };
        self.backend.set_cursor(cursor)
    }

    pub(crate) fn end_deferral(&mut self) -> Result<()> {
        if self.scheduler.release() {
            self.redraw()
        } else {
            Ok(())
        }
    }

    pub(crate) fn revalidate_focus(&mut self) {
        if self.focus.revalidate(&mut self.tree) {
            self.scheduler.invalidate();
        }
    }

    pub(crate) fn set_focus(&mut self, target: Option<ControlId>) -> Result<bool> {
        let changed = self.focus.set_focus(&mut self.tree, target)?;
        if changed {
            self.scheduler.invalidate();
        }
        Ok(changed)
    }

    pub(crate) fn step_focus(&mut self, forward: bool) -> Result<Option<ControlId>> {
        let before = self.focus.focused();
        let after = if forward {
            self.focus.focus_next(&mut self.tree)?
        } else {
            self.focus.focus_previous(&mut self.tree)?
        };
        if before != after {
            self.scheduler.invalidate();
        }
        Ok(after)
    }
}

/// The single live window of the process.
pub struct Window {
    id: WindowId,
    state: Mutex<WindowState>,
    queue: Arc<InputQueue>,
    disposed: Arc<AtomicBool>,
    closed: watch::Sender<Option<i32>>,
    listener: Mutex<Option<ConsoleListener>>,
    guard: Mutex<Option<InstanceGuard>>,
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Window {
    pub fn new<B: ConsoleBackend + 'static>(backend: B) -> Result<Self> {
        Self::with_options(backend, WindowOptions::default())
    }

    /// Creates the window, starts the listener (when the backend has an
    /// input side) and paints the first frame.
    ///
    /// Fails with [`Error::WindowAlreadyLive`] while another window exists.
    pub fn with_options<B: ConsoleBackend + 'static>(
        backend: B,
        options: WindowOptions,
    ) -> Result<Self> {
        let guard = InstanceGuard::acquire()?;
        let mut backend: Box<dyn ConsoleBackend> = Box::new(backend);

        let original_cursor = backend.cursor()?;
        let default_cursor_size = options.default_cursor_size.unwrap_or_else(|| {
            validate_cursor_size(original_cursor.size)
                .unwrap_or(CursorInfo::default().size)
        });
        if let Some(title) = &options.title {
            backend.set_title(title)?;
        }
        backend.set_cursor(CursorInfo {
            visible: false,
            ..original_cursor
        })?;

        let id = WindowId::next();
        let queue = Arc::new(InputQueue::new());
        let listener = match backend.take_input() {
            Some(source) => Some(ConsoleListener::spawn(
                source,
                Arc::clone(&queue),
                options.poll_interval,
            )?),
            None => None,
        };
        let (closed, _) = watch::channel(None);

        let window = Self {
            id,
            state: Mutex::new(WindowState {
                backend,
                tree: ControlTree::new(id),
                focus: FocusChain::new(),
                scheduler: DrawScheduler::new(),
                defaults: options.default_colors,
                default_cursor_size,
                frame_chars: options.frame_char_sets,
                bindings: options.key_bindings,
                visible: true,
                enabled: true,
                exit_code: 0,
                disposed: false,
                original_cursor,
                events: WindowEvents::default(),
            }),
            queue,
            disposed: Arc::new(AtomicBool::new(false)),
            closed,
            listener: Mutex::new(listener),
            guard: Mutex::new(Some(guard)),
        };
        window.invalidate()?;
        info!(window = id.raw(), "window created");
        Ok(window)
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        lock_or_recover(&self.state)
    }

    /// Runs `f` inside a defer scope; the scope's release repaints if `f`
    /// invalidated anything. `f`'s error wins over a redraw error.
    fn mutate<R>(&self, f: impl FnOnce(&mut WindowState) -> Result<R>) -> Result<R> {
        let mut state = self.lock();
        if state.disposed {
            return Err(Error::Disposed);
        }
        state.scheduler.defer();
        let result = f(&mut state);
        let drawn = state.end_deferral();
        let value = result?;
        drawn?;
        Ok(value)
    }

    fn read<R>(&self, f: impl FnOnce(&WindowState) -> Result<R>) -> Result<R> {
        let state = self.lock();
        if state.disposed {
            return Err(Error::Disposed);
        }
        f(&state)
    }

    /// Opens a defer scope; the whole window is repainted once when the last
    /// open scope is released.
    pub fn defer_drawing(&self) -> Result<DrawDeferral<'_>> {
        let mut state = self.lock();
        if state.disposed {
            return Err(Error::Disposed);
        }
        state.scheduler.defer();
        state.scheduler.invalidate();
        Ok(DrawDeferral {
            window: self,
            released: false,
        })
    }

    fn end_deferral(&self) -> Result<()> {
        self.lock().end_deferral()
    }

    /// Forces a full repaint (unless a defer scope is open).
    pub fn invalidate(&self) -> Result<()> {
        self.mutate(|state| {
            state.scheduler.invalidate();
            Ok(())
        })
    }

    // --- window properties -------------------------------------------------

    pub fn title(&self) -> Result<String> {
        self.read(|state| state.backend.title())
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.mutate(|state| state.backend.set_title(title))
    }

    /// Screen buffer size in cells.
    pub fn size(&self) -> Result<Size> {
        self.read(|state| state.backend.buffer_size())
    }

    /// Resizes the buffer, then the visible window, and raises `area_changed`.
    pub fn set_size(&self, size: Size) -> Result<()> {
        if size.width < 0 || size.height < 0 {
            return Err(Error::invalid_argument(
                "size",
                format!("negative size {}x{}", size.width, size.height),
            ));
        }
        self.mutate(|state| {
            if state.backend.buffer_size()? == size {
                return Ok(());
            }
            state.backend.set_buffer_size(size)?;
            state.backend.set_window_size(size)?;
            let mut event = SizeEvent {
                buffer_size: size,
                window_area: Rect::from_parts(Point::ZERO, size),
            };
            state.events.area_changed.emit(&mut event);
            state.scheduler.invalidate();
            Ok(())
        })
    }

    /// Visible window rectangle; the window is the coordinate origin.
    pub fn area(&self) -> Result<Rect> {
        self.read(|state| Ok(Rect::from_parts(Point::ZERO, state.backend.window_size()?)))
    }

    pub fn default_colors(&self) -> EffectiveColors {
        self.lock().defaults
    }

    pub fn set_default_colors(&self, colors: EffectiveColors) -> Result<()> {
        self.mutate(|state| {
            if state.defaults != colors {
                state.defaults = colors;
                state.scheduler.invalidate();
            }
            Ok(())
        })
    }

    pub fn set_default_foreground(&self, color: ConsoleColor) -> Result<()> {
        let colors = EffectiveColors {
            foreground: color,
            ..self.default_colors()
        };
        self.set_default_colors(colors)
    }

    pub fn set_default_background(&self, color: ConsoleColor) -> Result<()> {
        let colors = EffectiveColors {
            background: color,
            ..self.default_colors()
        };
        self.set_default_colors(colors)
    }

    pub fn set_default_border_color(&self, color: ConsoleColor) -> Result<()> {
        let colors = EffectiveColors {
            border: color,
            ..self.default_colors()
        };
        self.set_default_colors(colors)
    }

    pub fn default_cursor_size(&self) -> u8 {
        self.lock().default_cursor_size
    }

    pub fn set_default_cursor_size(&self, size: u8) -> Result<()> {
        let size = validate_cursor_size(size)?;
        self.mutate(|state| {
            if state.default_cursor_size != size {
                state.default_cursor_size = size;
                state.scheduler.invalidate();
            }
            Ok(())
        })
    }

    pub fn frame_char_sets(&self) -> FrameCharSets {
        self.lock().frame_chars
    }

    pub fn set_frame_char_set(&self, style: BorderStyle, set: FrameCharSet) -> Result<()> {
        self.mutate(|state| {
            let before = state.frame_chars;
            state.frame_chars.set(style, set)?;
            if state.frame_chars != before {
                state.scheduler.invalidate();
            }
            Ok(())
        })
    }

    pub fn close_key(&self) -> Option<KeyCombination> {
        self.lock().bindings.close
    }

    pub fn set_close_key(&self, key: Option<KeyCombination>) -> Result<()> {
        self.mutate(|state| {
            state.bindings.close = key;
            Ok(())
        })
    }

    pub fn switch_screen_key(&self) -> Option<KeyCombination> {
        self.lock().bindings.switch_screen
    }

    pub fn set_switch_screen_key(&self, key: Option<KeyCombination>) -> Result<()> {
        self.mutate(|state| {
            state.bindings.switch_screen = key;
            Ok(())
        })
    }

    pub fn active_screen(&self) -> bool {
        self.lock().backend.active_screen()
    }

    pub fn set_active_screen(&self, active: bool) -> Result<()> {
        self.mutate(|state| {
            if state.backend.active_screen() != active {
                state.backend.set_active_screen(active)?;
                state.scheduler.invalidate();
            }
            Ok(())
        })
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// A hidden window never repaints; showing it again repaints once.
    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.mutate(|state| {
            if state.visible != visible {
                state.visible = visible;
                state.scheduler.invalidate();
            }
            Ok(())
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// A disabled window still raises mouse subscribers but routes no clicks
    /// to controls.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.mutate(|state| {
            state.enabled = enabled;
            Ok(())
        })
    }

    pub fn focused_control(&self) -> Option<ControlId> {
        self.lock().focus.focused()
    }

    /// Fails with [`Error::CannotFocus`] for controls that cannot take focus.
    pub fn set_focused_control(&self, target: Option<ControlId>) -> Result<()> {
        self.mutate(|state| state.set_focus(target).map(|_| ()))
    }

    pub fn focus_next(&self) -> Result<Option<ControlId>> {
        self.mutate(|state| state.step_focus(true))
    }

    pub fn focus_previous(&self) -> Result<Option<ControlId>> {
        self.mutate(|state| state.step_focus(false))
    }

    pub fn exit_code(&self) -> i32 {
        self.lock().exit_code
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Runs `f` with the window-level subscriber lists.
    pub fn events<R>(&self, f: impl FnOnce(&mut WindowEvents) -> R) -> Result<R> {
        let mut state = self.lock();
        if state.disposed {
            return Err(Error::Disposed);
        }
        Ok(f(&mut state.events))
    }

    // --- controls ----------------------------------------------------------

    /// Creates a detached control owned by this window.
    pub fn control<W: Widget>(&self, widget: W) -> Control {
        Control::new(self.id, Box::new(widget))
    }

    pub fn add(&self, control: Control) -> Result<ControlId> {
        self.attach(None, control)
    }

    pub fn add_to(&self, parent: ControlId, control: Control) -> Result<ControlId> {
        self.attach(Some(parent), control)
    }

    fn attach(&self, parent: Option<ControlId>, control: Control) -> Result<ControlId> {
        self.mutate(|state| {
            let id = state.tree.insert(parent, control)?;
            let mut event = ControlsChanged {
                parent,
                added: vec![id],
                removed: Vec::new(),
            };
            state.events.controls_changed.emit(&mut event);
            state.scheduler.invalidate();
            debug!(control = ?id, parent = ?parent, "control added");
            Ok(id)
        })
    }

    /// Adds several controls at once. `None` entries are skipped; every
    /// control is checked before any is attached. Raises one
    /// `ControlsChanged` unless nothing was added.
    pub fn add_range(
        &self,
        parent: Option<ControlId>,
        controls: Vec<Option<Control>>,
    ) -> Result<Vec<ControlId>> {
        self.mutate(|state| {
            let controls: Vec<Control> = controls.into_iter().flatten().collect();
            for control in &controls {
                state.tree.validate(parent, control)?;
            }
            if controls.is_empty() {
                return Ok(Vec::new());
            }
            let added: Vec<ControlId> = controls
                .into_iter()
                .map(|control| state.tree.insert_unchecked(parent, control))
                .collect();
            let mut event = ControlsChanged {
                parent,
                added: added.clone(),
                removed: Vec::new(),
            };
            state.events.controls_changed.emit(&mut event);
            state.scheduler.invalidate();
            Ok(added)
        })
    }

    /// Detaches `id` and its subtree, dropping their subscriptions. The
    /// returned control can be attached again under a new id.
    pub fn remove(&self, id: ControlId) -> Result<Control> {
        self.mutate(|state| {
            let parent = state.tree.state(id)?.parent;
            let control = state.tree.remove(id)?;
            state.revalidate_focus();
            let mut event = ControlsChanged {
                parent,
                added: Vec::new(),
                removed: vec![id],
            };
            state.events.controls_changed.emit(&mut event);
            state.scheduler.invalidate();
            debug!(control = ?id, "control removed");
            Ok(control)
        })
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.lock().tree.contains(id)
    }

    /// Children of `parent` (or the root controls) in insertion order.
    pub fn children(&self, parent: Option<ControlId>) -> Result<Vec<ControlId>> {
        self.read(|state| Ok(state.tree.children(parent)?.to_vec()))
    }

    pub fn parent(&self, id: ControlId) -> Result<Option<ControlId>> {
        self.read(|state| Ok(state.tree.state(id)?.parent))
    }

    /// Snapshot of the control's state.
    pub fn control_state(&self, id: ControlId) -> Result<ControlState> {
        self.read(|state| state.tree.state(id).cloned())
    }

    pub fn absolute_area(&self, id: ControlId) -> Result<Rect> {
        self.read(|state| state.tree.absolute_area(id))
    }

    pub fn effective_colors(&self, id: ControlId) -> Result<EffectiveColors> {
        self.read(|state| state.tree.effective_colors(id, state.defaults))
    }

    pub fn point_to_console(&self, id: ControlId, client_point: Point) -> Result<Point> {
        self.read(|state| state.tree.point_to_console(id, client_point))
    }

    pub fn point_to_client(&self, id: ControlId, console_point: Point) -> Result<Point> {
        self.read(|state| state.tree.point_to_client(id, console_point))
    }

    /// Applies `f` to the control's state; repaints and revalidates focus
    /// only when `f` reports a change.
    fn update_control(
        &self,
        id: ControlId,
        f: impl FnOnce(&mut ControlState) -> bool,
    ) -> Result<bool> {
        self.mutate(|state| {
            let changed = f(state.tree.state_mut(id)?);
            if changed {
                state.scheduler.invalidate();
                state.revalidate_focus();
            }
            Ok(changed)
        })
    }

    /// Moves or resizes a control and raises its `AreaChanged`.
    pub fn set_area(&self, id: ControlId, area: Rect) -> Result<()> {
        if area.width < 0 || area.height < 0 {
            return Err(Error::invalid_argument(
                "area",
                format!("negative size {}x{}", area.width, area.height),
            ));
        }
        self.mutate(|state| {
            let old = state.tree.state(id)?.area;
            if old == area {
                return Ok(());
            }
            state.tree.state_mut(id)?.area = area;
            state
                .tree
                .emit(id, &mut ControlEvent::AreaChanged { old, new: area });
            state.scheduler.invalidate();
            Ok(())
        })
    }

    /// Hiding the focused control (or one of its ancestors) clears focus.
    pub fn set_visible_control(&self, id: ControlId, visible: bool) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.visible, visible))
            .map(|_| ())
    }

    /// Disabling the focused control (or one of its ancestors) clears focus.
    pub fn set_enabled_control(&self, id: ControlId, enabled: bool) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.enabled, enabled))
            .map(|_| ())
    }

    pub fn set_tab_order(&self, id: ControlId, tab_order: i32) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.tab_order, tab_order))
            .map(|_| ())
    }

    pub fn set_tab_stop(&self, id: ControlId, tab_stop: bool) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.tab_stop, tab_stop))
            .map(|_| ())
    }

    pub fn set_colors(&self, id: ControlId, colors: ControlColors) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.colors, colors))
            .map(|_| ())
    }

    pub fn set_border_style(&self, id: ControlId, style: BorderStyle) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.border_style, style))
            .map(|_| ())
    }

    pub fn set_focused_border_style(&self, id: ControlId, style: Option<BorderStyle>) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.focused_border_style, style))
            .map(|_| ())
    }

    pub fn set_cursor_visible(&self, id: ControlId, visible: bool) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.cursor_visible, visible))
            .map(|_| ())
    }

    /// `None` inherits the size from the parent chain.
    pub fn set_cursor_size(&self, id: ControlId, size: Option<u8>) -> Result<()> {
        let size = size.map(validate_cursor_size).transpose()?;
        self.update_control(id, |state| set_if_changed(&mut state.cursor_size, size))
            .map(|_| ())
    }

    /// Position relative to the control's client area.
    pub fn set_cursor_position(&self, id: ControlId, position: Point) -> Result<()> {
        self.update_control(id, |state| set_if_changed(&mut state.cursor_position, position))
            .map(|_| ())
    }

    pub fn set_name(&self, id: ControlId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update_control(id, |state| set_if_changed(&mut state.name, name))
            .map(|_| ())
    }

    /// Mutates a control's widget as type `T` with full access to the window
    /// through `ControlContext`. Repaints afterwards.
    pub fn with_widget<T, R>(
        &self,
        id: ControlId,
        f: impl FnOnce(&mut T, &mut ControlContext<'_>) -> R,
    ) -> Result<R>
    where
        T: Widget,
    {
        self.mutate(|state| {
            let mut widget = state.tree.take_widget(id)?;
            let type_name = widget.type_name();
            let result = match widget.as_any_mut().downcast_mut::<T>() {
                Some(typed) => {
                    let mut ctx = ControlContext::new(
                        id,
                        &mut state.tree,
                        &mut state.focus,
                        &mut state.scheduler,
                    );
                    Ok(f(typed, &mut ctx))
                }
                None => Err(Error::invalid_argument(
                    "widget",
                    format!("control is a {type_name}"),
                )),
            };
            state.tree.restore_widget(id, widget);
            state.revalidate_focus();
            if result.is_ok() {
                state.scheduler.invalidate();
            }
            result
        })
    }

    /// Reads a control's widget as type `T`.
    pub fn widget<T, R>(&self, id: ControlId, f: impl FnOnce(&T) -> R) -> Result<R>
    where
        T: Widget,
    {
        self.read(|state| {
            let widget = state.tree.widget(id).ok_or(Error::ControlNotFound(id))?;
            widget
                .as_any()
                .downcast_ref::<T>()
                .map(f)
                .ok_or_else(|| {
                    Error::invalid_argument("widget", format!("control is a {}", widget.type_name()))
                })
        })
    }

    pub fn subscribe_control<F>(&self, id: ControlId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&mut ControlEvent) + Send + 'static,
    {
        let mut state = self.lock();
        if state.disposed {
            return Err(Error::Disposed);
        }
        state.tree.subscribe(id, callback)
    }

    pub fn unsubscribe_control(&self, id: ControlId, subscription: SubscriptionId) -> Result<bool> {
        let mut state = self.lock();
        state.tree.unsubscribe(id, subscription)
    }

    // --- input -------------------------------------------------------------

    /// Routes one record synchronously, as if the listener had delivered it.
    pub fn dispatch(&self, record: InputRecord) -> Result<()> {
        let event = InputEvent::from_record(record);
        let outcome = self.mutate(|state| dispatch::dispatch(state, event))?;
        if outcome.close {
            self.dispose();
        }
        Ok(())
    }

    /// Dispatches every queued record without blocking, then honours a
    /// pending close request. Returns the number of records dispatched.
    pub fn run_once(&self) -> Result<usize> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let mut count = 0;
        while let Some(record) = self.queue.pop() {
            self.dispatch(record)?;
            count += 1;
            if self.is_disposed() {
                return Ok(count);
            }
        }
        if let Some(exit_code) = self.queue.take_close_request() {
            self.close(exit_code);
        }
        Ok(count)
    }

    /// Blocks until input or a close request is pending, then runs
    /// [`Window::run_once`].
    pub fn run_blocking_once(&self) -> Result<usize> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        self.queue.wait(None);
        if self.is_disposed() {
            return Ok(0);
        }
        self.run_once()
    }

    /// Pumps input until the window is disposed; returns the exit code.
    pub fn run(&self) -> Result<i32> {
        while !self.is_disposed() {
            self.run_blocking_once()?;
        }
        Ok(self.exit_code())
    }

    pub fn handle(&self) -> WindowHandle {
        WindowHandle {
            queue: Arc::clone(&self.queue),
            disposed: Arc::clone(&self.disposed),
            closed: self.closed.subscribe(),
        }
    }

    // --- lifecycle ---------------------------------------------------------

    /// Sets the exit code and disposes the window.
    pub fn close(&self, exit_code: i32) {
        {
            let mut state = self.lock();
            if !state.disposed {
                state.exit_code = exit_code;
            }
        }
        self.dispose();
    }

    /// Restores the backend, stops the listener, raises `disposed` and frees
    /// the single-window slot. Later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (exit_code, mut disposed_subscribers) = {
            let mut state = self.lock();
            state.disposed = true;
            let cursor = state.original_cursor;
            if let Err(err) = state.backend.set_cursor(cursor) {
                warn!(error = %err, "restoring the cursor failed");
            }
            if let Err(err) = state.backend.close() {
                warn!(error = %err, "closing the console backend failed");
            }
            let disposed = std::mem::take(&mut state.events.disposed);
            state.events = WindowEvents::default();
            (state.exit_code, disposed)
        };

        self.queue.stop();
        if let Some(mut listener) = lock_or_recover(&self.listener).take() {
            listener.stop();
        }

        disposed_subscribers.emit(&mut WindowClosed { exit_code });
        self.closed.send_replace(Some(exit_code));
        lock_or_recover(&self.guard).take();
        info!(window = self.id.raw(), exit_code, "window disposed");
    }

    /// Completes once the window is disposed, yielding the exit code.
    pub async fn wait_closed(&self) -> i32 {
        wait_for_exit_code(self.closed.subscribe()).await
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

async fn wait_for_exit_code(mut closed: watch::Receiver<Option<i32>>) -> i32 {
    let waited = closed
        .wait_for(Option::is_some)
        .await
        .map(|code| code.unwrap_or_default());
    match waited {
        Ok(code) => code,
        // Sender gone: the last value sent is the exit code, if any.
        Err(_) => closed.borrow().unwrap_or_default(),
    }
}

/// Open defer scope; dropping (or [`DrawDeferral::release`]) closes it.
#[must_use = "drawing resumes when the deferral is released"]
pub struct DrawDeferral<'a> {
    window: &'a Window,
    released: bool,
}

impl DrawDeferral<'_> {
    /// Closes the scope, reporting a redraw failure instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.window.end_deferral()
    }
}

impl Drop for DrawDeferral<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.window.end_deferral() {
            warn!(error = %err, "redraw after deferred drawing failed");
        }
    }
}

/// Cloneable, lock-free access to a window from other threads and from
/// subscriber callbacks.
#[derive(Clone, Debug)]
pub struct WindowHandle {
    queue: Arc<InputQueue>,
    disposed: Arc<AtomicBool>,
    closed: watch::Receiver<Option<i32>>,
}

impl WindowHandle {
    /// Queues a record for the window's pump. Dropped after disposal.
    pub fn post(&self, record: InputRecord) {
        self.queue.push(record);
    }

    /// Asks the pump to close the window with `exit_code`.
    pub fn request_close(&self, exit_code: i32) {
        self.queue.request_close(exit_code);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub async fn wait_closed(&self) -> i32 {
        wait_for_exit_code(self.closed.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::Window;
    use crate::core::console::CursorInfo;
    use crate::core::geometry::{Point, Rect, Size};
    use crate::error::Error;
    use crate::platform::memory_console::MemoryConsole;
    use crate::runtime::instance::window_test_lock;
    use crate::widgets::{Panel, TextBlock};

    #[test]
    fn second_window_is_rejected_while_first_is_live() {
        let _lock = window_test_lock();
        let first = Window::new(MemoryConsole::new(Size::new(10, 4))).unwrap();
        assert!(matches!(
            Window::new(MemoryConsole::new(Size::new(10, 4))),
            Err(Error::WindowAlreadyLive)
        ));
        first.dispose();
        let second = Window::new(MemoryConsole::new(Size::new(10, 4))).unwrap();
        drop(second);
    }

    #[test]
    fn nested_deferrals_redraw_once() {
        let _lock = window_test_lock();
        let console = MemoryConsole::new(Size::new(10, 4));
        let window = Window::new(console.clone()).unwrap();
        let panel = window.add(window.control(Panel::new())).unwrap();
        let before = console.flush_count();

        let outer = window.defer_drawing().unwrap();
        let inner = window.defer_drawing().unwrap();
        window.set_area(panel, Rect::new(1, 1, 3, 2)).unwrap();
        window.set_visible_control(panel, false).unwrap();
        inner.release().unwrap();
        assert_eq!(console.flush_count(), before);
        outer.release().unwrap();
        assert_eq!(console.flush_count(), before + 1);
    }

    #[test]
    fn unchanged_values_do_not_redraw() {
        let _lock = window_test_lock();
        let console = MemoryConsole::new(Size::new(10, 4));
        let window = Window::new(console.clone()).unwrap();
        let panel = window
            .add(window.control(Panel::new()).area(Rect::new(0, 0, 4, 2)))
            .unwrap();
        let before = console.flush_count();
        window.set_area(panel, Rect::new(0, 0, 4, 2)).unwrap();
        window.set_tab_stop(panel, true).unwrap();
        assert_eq!(console.flush_count(), before);
        window.set_area(panel, Rect::new(0, 0, 5, 2)).unwrap();
        assert_eq!(console.flush_count(), before + 1);
    }

    #[test]
    fn area_changes_reach_control_subscribers() {
        let _lock = window_test_lock();
        let window = Window::new(MemoryConsole::new(Size::new(10, 4))).unwrap();
        let panel = window.add(window.control(Panel::new())).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        window
            .subscribe_control(panel, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        window.set_area(panel, Rect::new(0, 0, 2, 2)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cursor_follows_focused_control() {
        let _lock = window_test_lock();
        let console = MemoryConsole::new(Size::new(20, 6));
        let window = Window::new(console.clone()).unwrap();
        window.set_default_cursor_size(40).unwrap();
        let panel = window
            .add(
                window
                    .control(Panel::new())
                    .area(Rect::new(2, 1, 12, 4))
                    .cursor_size(90)
                    .unwrap(),
            )
            .unwrap();
        let text = window
            .add_to(
                panel,
                window
                    .control(TextBlock::new("abc"))
                    .area(Rect::new(1, 1, 6, 2))
                    .cursor_visible(true),
            )
            .unwrap();
        assert!(!console.cursor().visible);

        window.set_focused_control(Some(text)).unwrap();
        window.set_cursor_position(text, Point::new(2, 0)).unwrap();
        assert_eq!(
            console.cursor(),
            CursorInfo {
                visible: true,
                size: 90,
                position: Point::new(5, 2),
            }
        );

        window.set_visible_control(panel, false).unwrap();
        assert_eq!(window.focused_control(), None);
        assert!(!console.cursor().visible);
    }

    #[test]
    fn mutations_after_dispose_fail() {
        let _lock = window_test_lock();
        let window = Window::new(MemoryConsole::new(Size::new(10, 4))).unwrap();
        let panel = window.add(window.control(Panel::new())).unwrap();
        window.close(4);
        window.dispose();
        assert!(window.is_disposed());
        assert_eq!(window.exit_code(), 4);
        assert!(matches!(
            window.set_area(panel, Rect::new(0, 0, 1, 1)),
            Err(Error::Disposed)
        ));
        assert!(matches!(window.defer_drawing(), Err(Error::Disposed)));
    }
}
