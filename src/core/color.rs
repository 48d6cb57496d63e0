//! Console colors, per-state color sets and border frames.

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// The 16 classic console colors, in console attribute order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConsoleColor {
    #[default]
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    DarkYellow = 6,
    Gray = 7,
    DarkGray = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

impl ConsoleColor {
    /// SGR foreground parameter for this color (30-37 / 90-97).
    pub fn ansi_fg(self) -> u8 {
        self.ansi_base() + 30
    }

    /// SGR background parameter for this color (40-47 / 100-107).
    pub fn ansi_bg(self) -> u8 {
        self.ansi_base() + 40
    }

    // Console attribute order is BGR; ANSI is RGB.
    fn ansi_base(self) -> u8 {
        let index = self as u8;
        let low = index & 0x7;
        let rgb = ((low & 1) << 2) | (low & 2) | ((low & 4) >> 2);
        if index & 0x8 != 0 {
            rgb + 60
        } else {
            rgb
        }
    }
}

/// Optional per-state color overrides of one control.
///
/// Unset values inherit: normal colors from the parent chain (and finally the
/// window defaults); disabled and focused colors fall back to the normal ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlColors {
    pub foreground: Option<ConsoleColor>,
    pub background: Option<ConsoleColor>,
    pub border: Option<ConsoleColor>,
    pub disabled_foreground: Option<ConsoleColor>,
    pub disabled_background: Option<ConsoleColor>,
    pub disabled_border: Option<ConsoleColor>,
    pub focused_foreground: Option<ConsoleColor>,
    pub focused_background: Option<ConsoleColor>,
    pub focused_border: Option<ConsoleColor>,
}

/// Fully resolved colors used for one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveColors {
    pub foreground: ConsoleColor,
    pub background: ConsoleColor,
    pub border: ConsoleColor,
}

impl Default for EffectiveColors {
    fn default() -> Self {
        Self {
            foreground: ConsoleColor::Gray,
            background: ConsoleColor::Black,
            border: ConsoleColor::Yellow,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BorderStyle {
    #[default]
    None,
    SingleLined,
    DoubleLined,
    Bold,
}

/// Characters used to paint one border style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCharSet {
    pub top_left: char,
    pub top_right: char,
    pub bottom_left: char,
    pub bottom_right: char,
    pub horizontal: char,
    pub vertical: char,
}

impl FrameCharSet {
    pub const SINGLE: FrameCharSet = FrameCharSet {
        top_left: '\u{250C}',
        top_right: '\u{2510}',
        bottom_left: '\u{2514}',
        bottom_right: '\u{2518}',
        horizontal: '\u{2500}',
        vertical: '\u{2502}',
    };

    pub const DOUBLE: FrameCharSet = FrameCharSet {
        top_left: '\u{2554}',
        top_right: '\u{2557}',
        bottom_left: '\u{255A}',
        bottom_right: '\u{255D}',
        horizontal: '\u{2550}',
        vertical: '\u{2551}',
    };

    pub const BOLD: FrameCharSet = FrameCharSet {
        top_left: '\u{250F}',
        top_right: '\u{2513}',
        bottom_left: '\u{2517}',
        bottom_right: '\u{251B}',
        horizontal: '\u{2501}',
        vertical: '\u{2503}',
    };

    /// Builds a custom set; NUL is rejected since it marks "no character".
    pub fn new(
        top_left: char,
        top_right: char,
        bottom_left: char,
        bottom_right: char,
        horizontal: char,
        vertical: char,
    ) -> Result<Self> {
        let set = Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
            horizontal,
            vertical,
        };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        let chars = [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
            self.horizontal,
            self.vertical,
        ];
        if chars.contains(&'\0') {
            return Err(Error::invalid_argument(
                "frame_char_set",
                "frame characters must not be NUL",
            ));
        }
        Ok(())
    }
}

/// Frame characters per border style, configurable per window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCharSets {
    single: FrameCharSet,
    double: FrameCharSet,
    bold: FrameCharSet,
}

static DEFAULT_FRAME_CHAR_SETS: Lazy<FrameCharSets> = Lazy::new(|| FrameCharSets {
    single: FrameCharSet::SINGLE,
    double: FrameCharSet::DOUBLE,
    bold: FrameCharSet::BOLD,
});

impl Default for FrameCharSets {
    fn default() -> Self {
        *DEFAULT_FRAME_CHAR_SETS
    }
}

impl FrameCharSets {
    pub fn get(&self, style: BorderStyle) -> Option<&FrameCharSet> {
        match style {
            BorderStyle::None => None,
            BorderStyle::SingleLined => Some(&self.single),
            BorderStyle::DoubleLined => Some(&self.double),
            BorderStyle::Bold => Some(&self.bold),
        }
    }

    pub fn set(&mut self, style: BorderStyle, set: FrameCharSet) -> Result<()> {
        set.validate()?;
        match style {
            BorderStyle::None => {
                return Err(Error::invalid_argument(
                    "border_style",
                    "BorderStyle::None has no frame characters",
                ))
            }
            BorderStyle::SingleLined => self.single = set,
            BorderStyle::DoubleLined => self.double = set,
            BorderStyle::Bold => self.bold = set,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BorderStyle, ConsoleColor, FrameCharSet, FrameCharSets};

    #[test]
    fn ansi_codes_swap_red_and_blue() {
        assert_eq!(ConsoleColor::Black.ansi_fg(), 30);
        assert_eq!(ConsoleColor::DarkRed.ansi_fg(), 31);
        assert_eq!(ConsoleColor::DarkBlue.ansi_fg(), 34);
        assert_eq!(ConsoleColor::Gray.ansi_fg(), 37);
        assert_eq!(ConsoleColor::DarkGray.ansi_fg(), 90);
        assert_eq!(ConsoleColor::Yellow.ansi_bg(), 103);
        assert_eq!(ConsoleColor::White.ansi_bg(), 107);
    }

    #[test]
    fn bold_frame_uses_heavy_box_drawing() {
        let sets = FrameCharSets::default();
        let bold = sets.get(BorderStyle::Bold).copied().unwrap();
        assert_eq!(bold.top_left, '┏');
        assert_eq!(bold.bottom_right, '┛');
        assert_eq!(bold.horizontal, '━');
        assert_eq!(bold.vertical, '┃');
        assert!(sets.get(BorderStyle::None).is_none());
    }

    #[test]
    fn nul_frame_characters_are_rejected() {
        assert!(FrameCharSet::new('+', '+', '+', '\0', '-', '|').is_err());
        let ascii = FrameCharSet::new('+', '+', '+', '+', '-', '|').unwrap();
        let mut sets = FrameCharSets::default();
        sets.set(BorderStyle::SingleLined, ascii).unwrap();
        assert_eq!(sets.get(BorderStyle::SingleLined), Some(&ascii));
        assert!(sets.set(BorderStyle::None, ascii).is_err());
    }
}
