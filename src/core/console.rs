//! Console backend boundary: the screen buffer, cursor and raw input records.
//!
//! Implementations live in `platform`; the runtime only talks to these traits.

use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::Duration;

use crate::core::color::ConsoleColor;
use crate::core::geometry::{Point, Rect, Size};
use crate::error::Result;

/// One screen cell: a character with its colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub foreground: ConsoleColor,
    pub background: ConsoleColor,
}

impl Cell {
    pub const fn new(ch: char, foreground: ConsoleColor, background: ConsoleColor) -> Self {
        Self {
            ch,
            foreground,
            background,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(' ', ConsoleColor::Gray, ConsoleColor::Black)
    }
}

/// Cursor state. `size` is the cell fill percentage (1..=100).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorInfo {
    pub visible: bool,
    pub size: u8,
    pub position: Point,
}

impl Default for CursorInfo {
    fn default() -> Self {
        Self {
            visible: true,
            size: 25,
            position: Point::ZERO,
        }
    }
}

/// Windows-style virtual key code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const NONE: Self = Self(0);
    pub const BACK: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const RETURN: Self = Self(0x0D);
    pub const ESCAPE: Self = Self(0x1B);
    pub const SPACE: Self = Self(0x20);
    pub const PRIOR: Self = Self(0x21);
    pub const NEXT: Self = Self(0x22);
    pub const END: Self = Self(0x23);
    pub const HOME: Self = Self(0x24);
    pub const LEFT: Self = Self(0x25);
    pub const UP: Self = Self(0x26);
    pub const RIGHT: Self = Self(0x27);
    pub const DOWN: Self = Self(0x28);
    pub const INSERT: Self = Self(0x2D);
    pub const DELETE: Self = Self(0x2E);
    pub const F1: Self = Self(0x70);
    pub const F2: Self = Self(0x71);
    pub const F3: Self = Self(0x72);
    pub const F4: Self = Self(0x73);
    pub const F5: Self = Self(0x74);
    pub const F6: Self = Self(0x75);
    pub const F7: Self = Self(0x76);
    pub const F8: Self = Self(0x77);
    pub const F9: Self = Self(0x78);
    pub const F10: Self = Self(0x79);
    pub const F11: Self = Self(0x7A);
    pub const F12: Self = Self(0x7B);

    /// Keys reported with [`ControlKeyStates::ENHANCED_KEY`]: the navigation
    /// cluster outside the numeric keypad.
    pub fn is_enhanced(self) -> bool {
        matches!(self.0, 0x21..=0x28 | 0x2D | 0x2E)
    }

    /// Key code of an ASCII letter (case-insensitive) or digit.
    pub fn from_ascii(ch: char) -> Option<Self> {
        match ch {
            'a'..='z' => Some(Self(ch.to_ascii_uppercase() as u16)),
            'A'..='Z' | '0'..='9' => Some(Self(ch as u16)),
            _ => None,
        }
    }

    /// Function key `F{n}` for `n` in 1..=12.
    pub fn function(n: u8) -> Option<Self> {
        if (1..=12).contains(&n) {
            Some(Self(Self::F1.0 + u16::from(n) - 1))
        } else {
            None
        }
    }
}

/// Modifier and lock-key state attached to key and mouse records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ControlKeyStates(pub u16);

impl ControlKeyStates {
    pub const NONE: Self = Self(0);
    pub const RIGHT_ALT: Self = Self(0x0001);
    pub const LEFT_ALT: Self = Self(0x0002);
    pub const RIGHT_CTRL: Self = Self(0x0004);
    pub const LEFT_CTRL: Self = Self(0x0008);
    pub const SHIFT: Self = Self(0x0010);
    pub const NUMLOCK: Self = Self(0x0020);
    pub const SCROLLLOCK: Self = Self(0x0040);
    pub const CAPSLOCK: Self = Self(0x0080);
    pub const ENHANCED_KEY: Self = Self(0x0100);

    const SWITCHES: u16 = Self::NUMLOCK.0 | Self::SCROLLLOCK.0 | Self::CAPSLOCK.0;

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The mask with lock-key toggles (num/scroll/caps lock) removed.
    pub fn without_switches(self) -> Self {
        Self(self.0 & !Self::SWITCHES)
    }

    /// Only the keys the user holds down (shift, ctrl, alt). Lock toggles and
    /// the enhanced-key flag are dropped.
    pub fn modifier_mask(self) -> Self {
        Self(self.0 & !(Self::SWITCHES | Self::ENHANCED_KEY.0))
    }
}

impl BitOr for ControlKeyStates {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ControlKeyStates {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ControlKeyStates {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MouseButtonStates(pub u32);

impl MouseButtonStates {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(0x0001);
    pub const RIGHT: Self = Self(0x0002);
    pub const MIDDLE: Self = Self(0x0004);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MouseButtonStates {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Kind of mouse record; empty means a button press or release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MouseEventFlags(pub u32);

impl MouseEventFlags {
    pub const NONE: Self = Self(0);
    pub const MOVED: Self = Self(0x0001);
    pub const DOUBLE_CLICK: Self = Self(0x0002);
    pub const WHEELED: Self = Self(0x0004);
    pub const HWHEELED: Self = Self(0x0008);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MouseEventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Raw input record as delivered by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputRecord {
    Key {
        virtual_key: VirtualKey,
        character: char,
        key_down: bool,
        repeat_count: u16,
        modifiers: ControlKeyStates,
    },
    Mouse {
        position: Point,
        buttons: MouseButtonStates,
        modifiers: ControlKeyStates,
        flags: MouseEventFlags,
        wheel_delta: i32,
    },
    Resize {
        buffer_size: Size,
        window_area: Rect,
    },
    Menu {
        command_id: u32,
    },
    Focus {
        gained: bool,
    },
}

impl InputRecord {
    /// Key-down record with repeat count 1.
    pub fn key_down(virtual_key: VirtualKey, character: char, modifiers: ControlKeyStates) -> Self {
        Self::Key {
            virtual_key,
            character,
            key_down: true,
            repeat_count: 1,
            modifiers,
        }
    }

    pub fn key_up(virtual_key: VirtualKey, character: char, modifiers: ControlKeyStates) -> Self {
        Self::Key {
            virtual_key,
            character,
            key_down: false,
            repeat_count: 1,
            modifiers,
        }
    }

    /// Button press at `position` (event flags empty).
    pub fn mouse_press(position: Point, buttons: MouseButtonStates) -> Self {
        Self::Mouse {
            position,
            buttons,
            modifiers: ControlKeyStates::NONE,
            flags: MouseEventFlags::NONE,
            wheel_delta: 0,
        }
    }
}

/// Blocking side of the backend, owned by the listener thread.
pub trait InputSource: Send {
    /// Waits up to `timeout` for input; `Ok(true)` when records can be read.
    fn wait_ready(&mut self, timeout: Duration) -> Result<bool>;

    /// Reads every pending record. May return an empty batch.
    fn read_records(&mut self) -> Result<Vec<InputRecord>>;
}

/// Screen-buffer side of the backend.
///
/// All sizes and positions are in cells. `write_cells` receives `area.width *
/// area.height` cells in row-major order.
pub trait ConsoleBackend: Send {
    fn buffer_size(&self) -> Result<Size>;
    fn set_buffer_size(&mut self, size: Size) -> Result<()>;

    fn window_size(&self) -> Result<Size>;
    fn set_window_size(&mut self, size: Size) -> Result<()>;

    fn cursor(&self) -> Result<CursorInfo>;
    fn set_cursor(&mut self, cursor: CursorInfo) -> Result<()>;

    fn title(&self) -> Result<String>;
    fn set_title(&mut self, title: &str) -> Result<()>;

    fn write_cells(&mut self, area: Rect, cells: &[Cell]) -> Result<()>;

    /// Hands out the input side once; later calls return `None`.
    fn take_input(&mut self) -> Option<Box<dyn InputSource>>;

    /// Whether this UI's screen buffer is the one being displayed.
    fn active_screen(&self) -> bool;
    fn set_active_screen(&mut self, active: bool) -> Result<()>;

    /// Releases terminal state (raw mode, alternate screen). Called once on
    /// dispose; must be safe to call again.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlKeyStates, VirtualKey};

    #[test]
    fn switches_are_stripped() {
        let mask = ControlKeyStates::SHIFT
            | ControlKeyStates::NUMLOCK
            | ControlKeyStates::CAPSLOCK
            | ControlKeyStates::SCROLLLOCK;
        assert_eq!(mask.without_switches(), ControlKeyStates::SHIFT);
        assert!(ControlKeyStates::NUMLOCK.without_switches().is_empty());
        assert_eq!(
            (ControlKeyStates::LEFT_ALT | ControlKeyStates::ENHANCED_KEY).without_switches(),
            ControlKeyStates::LEFT_ALT | ControlKeyStates::ENHANCED_KEY
        );
    }

    #[test]
    fn modifier_mask_drops_switches_and_enhanced_flag() {
        let mask = ControlKeyStates::LEFT_ALT
            | ControlKeyStates::ENHANCED_KEY
            | ControlKeyStates::NUMLOCK;
        assert_eq!(mask.modifier_mask(), ControlKeyStates::LEFT_ALT);
        assert!(ControlKeyStates::ENHANCED_KEY.modifier_mask().is_empty());
        assert!(VirtualKey::DOWN.is_enhanced());
        assert!(VirtualKey::DELETE.is_enhanced());
        assert!(!VirtualKey::F11.is_enhanced());
        assert!(!VirtualKey::TAB.is_enhanced());
    }

    #[test]
    fn virtual_key_helpers() {
        assert_eq!(VirtualKey::from_ascii('q'), Some(VirtualKey(0x51)));
        assert_eq!(VirtualKey::from_ascii('7'), Some(VirtualKey(0x37)));
        assert_eq!(VirtualKey::from_ascii('-'), None);
        assert_eq!(VirtualKey::function(4), Some(VirtualKey::F4));
        assert_eq!(VirtualKey::function(11), Some(VirtualKey::F11));
        assert_eq!(VirtualKey::function(13), None);
    }
}
