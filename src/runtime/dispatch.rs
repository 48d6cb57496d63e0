//! Input routing.
//!
//! Keys: window subscribers, then (key-down only) Tab / Shift-Tab focus
//! moves, the focused control bubbling up to its ancestors, the close
//! binding and finally the switch-screen binding. Any step that marks the
//! event handled ends routing.
//!
//! Mouse: window subscribers, then the topmost visible control under the
//! pointer, bubbling up. Clicks on a disabled window or control do nothing.

use tracing::debug;

use crate::core::console::{ControlKeyStates, VirtualKey};
use crate::core::control::{ControlContext, ControlId, Widget};
use crate::core::geometry::Point;
use crate::core::input_event::{InputEvent, KeyEvent, MouseEvent};
use crate::error::Result;
use crate::runtime::window::WindowState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DispatchOutcome {
    /// The close binding matched; the caller disposes the window once the
    /// lock is released.
    pub(crate) close: bool,
}

pub(crate) fn dispatch(state: &mut WindowState, event: InputEvent) -> Result<DispatchOutcome> {
    let outcome = match event {
        InputEvent::Key(event) => dispatch_key(state, event)?,
        InputEvent::Mouse(event) => {
            dispatch_mouse(state, event);
            DispatchOutcome::default()
        }
        InputEvent::Size(mut event) => {
            debug!(size = ?event.buffer_size, "console resized");
            state.events.area_changed.emit(&mut event);
            state.scheduler.invalidate();
            DispatchOutcome::default()
        }
        InputEvent::Menu(mut event) => {
            debug!(command = event.command_id, "menu command");
            state.events.menu.emit(&mut event);
            DispatchOutcome::default()
        }
        InputEvent::Focus(mut event) => {
            debug!(gained = event.gained, "console focus changed");
            state.events.focus.emit(&mut event);
            DispatchOutcome::default()
        }
    };
    state.revalidate_focus();
    Ok(outcome)
}

fn dispatch_key(state: &mut WindowState, mut event: KeyEvent) -> Result<DispatchOutcome> {
    state.events.key.emit(&mut event);
    if event.handled || !event.key_down {
        return Ok(DispatchOutcome::default());
    }

    if event.virtual_key == VirtualKey::TAB {
        let modifiers = event.modifiers.modifier_mask();
        if modifiers.is_empty() {
            state.step_focus(true)?;
            return Ok(DispatchOutcome::default());
        }
        if modifiers == ControlKeyStates::SHIFT {
            state.step_focus(false)?;
            return Ok(DispatchOutcome::default());
        }
    }

    if let Some(focused) = state.focus.focused() {
        bubble(state, focused, &mut event, |widget, ctx, event| {
            widget.on_key_event(ctx, event)
        });
        if event.handled {
            return Ok(DispatchOutcome::default());
        }
    }

    if state
        .bindings
        .close
        .is_some_and(|binding| binding.matches(&event))
    {
        debug!(key = ?event.virtual_key, "close key pressed");
        return Ok(DispatchOutcome { close: true });
    }

    if state
        .bindings
        .switch_screen
        .is_some_and(|binding| binding.matches(&event))
    {
        let active = !state.backend.active_screen();
        state.backend.set_active_screen(active)?;
        state.scheduler.invalidate();
        debug!(active, "screen buffer switched");
    }
    Ok(DispatchOutcome::default())
}

fn dispatch_mouse(state: &mut WindowState, mut event: MouseEvent) {
    state.events.mouse.emit(&mut event);
    if event.handled || !state.enabled {
        return;
    }
    let Some(target) = hit_test(state, event.position) else {
        return;
    };
    if !state.tree.is_effectively_enabled(target) {
        return;
    }
    bubble(state, target, &mut event, |widget, ctx, event| {
        widget.on_mouse_event(ctx, event)
    });
}

/// Topmost control under `point`: the last one in paint order whose visible
/// part contains it.
fn hit_test(state: &WindowState, point: Point) -> Option<ControlId> {
    state.tree.pre_order().into_iter().rev().find(|id| {
        state.tree.is_effectively_visible(*id)
            && state
                .tree
                .visible_area(*id)
                .is_ok_and(|area| area.contains(point))
    })
}

trait Handled {
    fn handled(&self) -> bool;
}

impl Handled for KeyEvent {
    fn handled(&self) -> bool {
        self.handled
    }
}

impl Handled for MouseEvent {
    fn handled(&self) -> bool {
        self.handled
    }
}

/// Offers `event` to `start` and then each ancestor until one handles it.
/// Disabled controls are skipped.
fn bubble<E, F>(state: &mut WindowState, start: ControlId, event: &mut E, mut handler: F)
where
    E: Handled,
    F: FnMut(&mut dyn Widget, &mut ControlContext<'_>, &mut E),
{
    let mut chain = vec![start];
    chain.extend(state.tree.ancestors(start));
    for id in chain {
        if !state.tree.is_effectively_enabled(id) {
            continue;
        }
        let Ok(mut widget) = state.tree.take_widget(id) else {
            continue;
        };
        {
            let mut ctx =
                ControlContext::new(id, &mut state.tree, &mut state.focus, &mut state.scheduler);
            handler(&mut *widget, &mut ctx, event);
        }
        state.tree.restore_widget(id, widget);
        if event.handled() {
            debug!(control = ?id, "input handled by control");
            return;
        }
    }
}
