//! Text-mode UI controls for terminal sessions.
//!
//! A [`Window`] owns a tree of controls on top of a [`ConsoleBackend`]. It
//! keeps track of focus and tab order, batches redraws through deferral
//! scopes and routes keyboard, mouse and resize input from a background
//! listener thread to subscribers and controls.
//!
//! Invariant: every window mutation happens under the window lock, and a
//! redraw is issued only when the outermost deferral scope ends.
//!
//! # Public API Overview
//! - Create a window with [`Window::new`] over a backend ([`ProcessConsole`]
//!   on Unix terminals, [`MemoryConsole`] for tests and headless use).
//! - Build detached controls with [`Window::control`] and attach them with
//!   [`Window::add`] / [`Window::add_to`].
//! - Pump input with [`Window::run`] or [`Window::run_once`]; post from other
//!   threads through a [`WindowHandle`].
//! - Lay out wrapped text with [`TextLayout`].

pub mod config;
pub mod error;
pub mod logging;

pub mod core;
pub mod platform;
pub mod render;
pub mod runtime;
pub mod widgets;

pub use crate::config::{EnvConfig, WindowOptions};
pub use crate::error::{Error, Result};

/// Geometry, colors and the console boundary.
pub use crate::core::color::{
    BorderStyle, ConsoleColor, ControlColors, EffectiveColors, FrameCharSet, FrameCharSets,
};
pub use crate::core::console::{
    Cell, ConsoleBackend, ControlKeyStates, CursorInfo, InputRecord, InputSource,
    MouseButtonStates, MouseEventFlags, VirtualKey,
};
pub use crate::core::geometry::{Point, Rect, Size};

/// Control model and input events.
pub use crate::core::control::{
    Control, ControlContext, ControlEvent, ControlId, ControlState, DrawContext, Widget, WindowId,
};
pub use crate::core::input_event::{
    FocusEvent, InputEvent, KeyEvent, MenuEvent, MouseEvent, SizeEvent,
};
pub use crate::core::keybindings::{KeyCombination, WindowKeyBindings};
pub use crate::core::text::{TextLayout, WrapMode};

/// Backends.
pub use crate::platform::MemoryConsole;
#[cfg(unix)]
pub use crate::platform::ProcessConsole;

pub use crate::render::GraphicsSurface;
pub use crate::runtime::{
    ControlsChanged, DrawDeferral, SubscriptionId, Window, WindowClosed, WindowEvents,
    WindowHandle,
};
pub use crate::widgets::{Button, Panel, TextBlock};
