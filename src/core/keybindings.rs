//! Window-level key combinations (close, switch screen buffer).

use std::fmt;

use crate::core::console::{ControlKeyStates, VirtualKey};
use crate::core::input_event::KeyEvent;

/// A virtual key plus an exact modifier mask.
///
/// Lock toggles (num/scroll/caps lock) and the enhanced-key flag are ignored on
/// both sides when matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    pub key: VirtualKey,
    pub modifiers: ControlKeyStates,
}

impl KeyCombination {
    pub const ALT_F4: KeyCombination =
        KeyCombination::new(VirtualKey::F4, ControlKeyStates::LEFT_ALT);
    pub const F11: KeyCombination = KeyCombination::new(VirtualKey::F11, ControlKeyStates::NONE);
    pub const CTRL_Q: KeyCombination =
        KeyCombination::new(VirtualKey(0x51), ControlKeyStates::LEFT_CTRL);
    pub const ESCAPE: KeyCombination =
        KeyCombination::new(VirtualKey::ESCAPE, ControlKeyStates::NONE);

    pub const fn new(key: VirtualKey, modifiers: ControlKeyStates) -> Self {
        Self { key, modifiers }
    }

    /// Matches key-down events only.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.key_down
            && event.virtual_key == self.key
            && event.modifiers.modifier_mask() == self.modifiers.modifier_mask()
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        if m.contains(ControlKeyStates::LEFT_CTRL) || m.contains(ControlKeyStates::RIGHT_CTRL) {
            f.write_str("ctrl+")?;
        }
        if m.contains(ControlKeyStates::LEFT_ALT) || m.contains(ControlKeyStates::RIGHT_ALT) {
            f.write_str("alt+")?;
        }
        if m.contains(ControlKeyStates::SHIFT) {
            f.write_str("shift+")?;
        }
        match self.key.0 {
            code @ 0x70..=0x7B => write!(f, "f{}", code - 0x70 + 1),
            code @ (0x30..=0x39 | 0x41..=0x5A) => {
                write!(f, "{}", (code as u8 as char).to_ascii_lowercase())
            }
            0x09 => f.write_str("tab"),
            0x0D => f.write_str("enter"),
            0x1B => f.write_str("escape"),
            0x20 => f.write_str("space"),
            code => write!(f, "vk{code:#04x}"),
        }
    }
}

/// Key combinations the window reacts to after subscribers and controls.
///
/// `None` disables the respective binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowKeyBindings {
    pub close: Option<KeyCombination>,
    pub switch_screen: Option<KeyCombination>,
}

impl Default for WindowKeyBindings {
    fn default() -> Self {
        Self {
            close: Some(KeyCombination::ALT_F4),
            switch_screen: Some(KeyCombination::F11),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyCombination, WindowKeyBindings};
    use crate::core::console::{ControlKeyStates, VirtualKey};
    use crate::core::input_event::KeyEvent;

    fn key(vk: VirtualKey, modifiers: ControlKeyStates, key_down: bool) -> KeyEvent {
        KeyEvent {
            virtual_key: vk,
            character: '\0',
            key_down,
            repeat_count: 1,
            modifiers,
            handled: false,
        }
    }

    #[test]
    fn alt_f4_matches_with_lock_toggles() {
        let combo = KeyCombination::ALT_F4;
        assert!(combo.matches(&key(VirtualKey::F4, ControlKeyStates::LEFT_ALT, true)));
        assert!(combo.matches(&key(
            VirtualKey::F4,
            ControlKeyStates::LEFT_ALT | ControlKeyStates::CAPSLOCK | ControlKeyStates::NUMLOCK,
            true
        )));
    }

    #[test]
    fn enhanced_key_flag_is_ignored() {
        let enhanced = ControlKeyStates::ENHANCED_KEY;
        assert!(KeyCombination::F11.matches(&key(VirtualKey::F11, enhanced, true)));
        assert!(KeyCombination::ALT_F4.matches(&key(
            VirtualKey::F4,
            ControlKeyStates::LEFT_ALT | enhanced,
            true
        )));
    }

    #[test]
    fn modifier_mask_must_match_exactly() {
        let combo = KeyCombination::ALT_F4;
        assert!(!combo.matches(&key(VirtualKey::F4, ControlKeyStates::NONE, true)));
        assert!(!combo.matches(&key(VirtualKey::F4, ControlKeyStates::RIGHT_ALT, true)));
        assert!(!combo.matches(&key(
            VirtualKey::F4,
            ControlKeyStates::LEFT_ALT | ControlKeyStates::SHIFT,
            true
        )));
    }

    #[test]
    fn key_up_never_matches() {
        assert!(!KeyCombination::F11.matches(&key(VirtualKey::F11, ControlKeyStates::NONE, false)));
    }

    #[test]
    fn display_names() {
        assert_eq!(KeyCombination::ALT_F4.to_string(), "alt+f4");
        assert_eq!(KeyCombination::CTRL_Q.to_string(), "ctrl+q");
        assert_eq!(KeyCombination::F11.to_string(), "f11");
    }

    #[test]
    fn defaults_close_on_alt_f4_and_switch_on_f11() {
        let bindings = WindowKeyBindings::default();
        assert_eq!(bindings.close, Some(KeyCombination::ALT_F4));
        assert_eq!(bindings.switch_screen, Some(KeyCombination::F11));
    }
}
