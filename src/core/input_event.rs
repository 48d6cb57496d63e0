//! Typed input events decoded from backend records.
//!
//! Key and mouse events carry a `handled` flag; once a subscriber or control
//! sets it, routing stops.

use crate::core::console::{
    ControlKeyStates, InputRecord, MouseButtonStates, MouseEventFlags, VirtualKey,
};
use crate::core::geometry::{Point, Rect, Size};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub virtual_key: VirtualKey,
    pub character: char,
    pub key_down: bool,
    pub repeat_count: u16,
    pub modifiers: ControlKeyStates,
    pub handled: bool,
}

impl KeyEvent {
    /// True for a key-down of `key` with no modifiers other than lock toggles.
    pub fn is_plain(&self, key: VirtualKey) -> bool {
        self.key_down && self.virtual_key == key && self.modifiers.modifier_mask().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    /// Position in console (window) coordinates.
    pub position: Point,
    pub buttons: MouseButtonStates,
    pub modifiers: ControlKeyStates,
    pub flags: MouseEventFlags,
    pub wheel_delta: i32,
    pub handled: bool,
}

impl MouseEvent {
    /// Button press or release (no move/wheel/double-click flag).
    pub fn is_press(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_left_press(&self) -> bool {
        self.is_press() && self.buttons.contains(MouseButtonStates::LEFT)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeEvent {
    pub buffer_size: Size,
    pub window_area: Rect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuEvent {
    pub command_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusEvent {
    pub gained: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Size(SizeEvent),
    Menu(MenuEvent),
    Focus(FocusEvent),
}

impl InputEvent {
    pub fn from_record(record: InputRecord) -> Self {
        match record {
            InputRecord::Key {
                virtual_key,
                character,
                key_down,
                repeat_count,
                modifiers,
            } => InputEvent::Key(KeyEvent {
                virtual_key,
                character,
                key_down,
                repeat_count,
                modifiers,
                handled: false,
            }),
            InputRecord::Mouse {
                position,
                buttons,
                modifiers,
                flags,
                wheel_delta,
            } => InputEvent::Mouse(MouseEvent {
                position,
                buttons,
                modifiers,
                flags,
                wheel_delta,
                handled: false,
            }),
            InputRecord::Resize {
                buffer_size,
                window_area,
            } => InputEvent::Size(SizeEvent {
                buffer_size,
                window_area,
            }),
            InputRecord::Menu { command_id } => InputEvent::Menu(MenuEvent { command_id }),
            InputRecord::Focus { gained } => InputEvent::Focus(FocusEvent { gained }),
        }
    }
}

impl From<InputRecord> for InputEvent {
    fn from(record: InputRecord) -> Self {
        Self::from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::InputEvent;
    use crate::core::console::{ControlKeyStates, InputRecord, MouseButtonStates, VirtualKey};
    use crate::core::geometry::{Point, Rect, Size};

    #[test]
    fn key_records_start_unhandled() {
        let event = InputEvent::from_record(InputRecord::key_down(
            VirtualKey::TAB,
            '\t',
            ControlKeyStates::NUMLOCK,
        ));
        let InputEvent::Key(key) = event else {
            panic!("expected key event");
        };
        assert!(!key.handled);
        assert!(key.is_plain(VirtualKey::TAB));
        assert_eq!(key.repeat_count, 1);
    }

    #[test]
    fn shifted_key_is_not_plain() {
        let InputEvent::Key(key) = InputEvent::from_record(InputRecord::key_down(
            VirtualKey::TAB,
            '\t',
            ControlKeyStates::SHIFT,
        )) else {
            panic!("expected key event");
        };
        assert!(!key.is_plain(VirtualKey::TAB));
    }

    #[test]
    fn every_record_kind_maps_to_its_event() {
        let press = InputEvent::from_record(InputRecord::mouse_press(
            Point::new(3, 4),
            MouseButtonStates::LEFT,
        ));
        assert!(matches!(press, InputEvent::Mouse(ref m) if m.is_left_press()));

        let resize = InputEvent::from_record(InputRecord::Resize {
            buffer_size: Size::new(80, 25),
            window_area: Rect::new(0, 0, 80, 25),
        });
        assert!(matches!(resize, InputEvent::Size(_)));
        assert!(matches!(
            InputEvent::from(InputRecord::Menu { command_id: 7 }),
            InputEvent::Menu(ref m) if m.command_id == 7
        ));
        assert!(matches!(
            InputEvent::from(InputRecord::Focus { gained: false }),
            InputEvent::Focus(ref f) if !f.gained
        ));
    }
}
