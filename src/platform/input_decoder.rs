//! Terminal byte stream to input records.
//!
//! Incomplete escape sequences are kept until more bytes arrive; a lone ESC
//! that is still pending after the timeout is emitted as the Escape key.

use std::time::{Duration, Instant};

use crate::core::console::{
    ControlKeyStates, InputRecord, MouseButtonStates, MouseEventFlags, VirtualKey,
};
use crate::core::geometry::Point;

const ESC: u8 = 0x1b;
const WHEEL_DELTA: i32 = 120;

enum Parsed {
    /// Bytes consumed and the records they produced (possibly none).
    Done(usize, Vec<InputRecord>),
    Incomplete,
}

#[derive(Debug)]
pub struct InputDecoder {
    pending: Vec<u8>,
    timeout: Duration,
    flush_deadline: Option<Instant>,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl InputDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            timeout,
            flush_deadline: None,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InputRecord> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.pending.len() {
            match parse(&self.pending[offset..]) {
                Parsed::Done(consumed, records) => {
                    offset += consumed;
                    out.extend(records);
                }
                Parsed::Incomplete => break,
            }
        }
        self.pending.drain(..offset);
        self.flush_deadline = if self.pending.is_empty() {
            None
        } else {
            Some(Instant::now() + self.timeout)
        };
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// How long the reader may block before [`InputDecoder::flush_due`] has
    /// work to do.
    pub fn next_timeout(&self, now: Instant, default: Duration) -> Duration {
        match self.flush_deadline {
            Some(deadline) => deadline.saturating_duration_since(now).min(default),
            None => default,
        }
    }

    pub fn flush_due(&mut self, now: Instant) -> Vec<InputRecord> {
        match self.flush_deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Emits whatever is pending: a leading ESC becomes the Escape key, the
    /// rest is decoded as plain keys.
    pub fn flush(&mut self) -> Vec<InputRecord> {
        self.flush_deadline = None;
        let pending = std::mem::take(&mut self.pending);
        let mut out = Vec::new();
        let mut rest = pending.as_slice();
        while let Some((&first, tail)) = rest.split_first() {
            if first == ESC {
                out.push(key(VirtualKey::ESCAPE, '\x1b', ControlKeyStates::NONE));
                rest = tail;
                continue;
            }
            match parse(rest) {
                Parsed::Done(consumed, records) => {
                    out.extend(records);
                    rest = &rest[consumed..];
                }
                Parsed::Incomplete => break,
            }
        }
        out
    }
}

fn key(vk: VirtualKey, ch: char, modifiers: ControlKeyStates) -> InputRecord {
    InputRecord::key_down(vk, ch, modifiers)
}

fn parse(bytes: &[u8]) -> Parsed {
    match bytes {
        [] => Parsed::Done(0, Vec::new()),
        [ESC] => Parsed::Incomplete,
        [ESC, b'[', rest @ ..] => parse_csi(rest).map_consumed(2),
        [ESC, b'O'] => Parsed::Incomplete,
        [ESC, b'O', code, ..] => Parsed::Done(3, ss3(*code).into_iter().collect()),
        [ESC, ESC, ..] => Parsed::Done(
            1,
            vec![key(VirtualKey::ESCAPE, '\x1b', ControlKeyStates::NONE)],
        ),
        [ESC, rest @ ..] => match parse_plain(rest) {
            Parsed::Done(consumed, records) => Parsed::Done(
                consumed + 1,
                records.into_iter().map(with_alt).collect(),
            ),
            Parsed::Incomplete => Parsed::Incomplete,
        },
        _ => parse_plain(bytes),
    }
}

impl Parsed {
    fn map_consumed(self, prefix: usize) -> Parsed {
        match self {
            Parsed::Done(consumed, records) => Parsed::Done(consumed + prefix, records),
            Parsed::Incomplete => Parsed::Incomplete,
        }
    }
}

fn with_alt(record: InputRecord) -> InputRecord {
    match record {
        InputRecord::Key {
            virtual_key,
            character,
            key_down,
            repeat_count,
            modifiers,
        } => InputRecord::Key {
            virtual_key,
            character,
            key_down,
            repeat_count,
            modifiers: modifiers | ControlKeyStates::LEFT_ALT,
        },
        other => other,
    }
}

/// One key from a control byte or a UTF-8 character.
fn parse_plain(bytes: &[u8]) -> Parsed {
    let Some(&first) = bytes.first() else {
        return Parsed::Incomplete;
    };
    let record = match first {
        b'\r' | b'\n' => key(VirtualKey::RETURN, '\r', ControlKeyStates::NONE),
        b'\t' => key(VirtualKey::TAB, '\t', ControlKeyStates::NONE),
        0x7f | 0x08 => key(VirtualKey::BACK, '\x08', ControlKeyStates::NONE),
        0x00 => key(VirtualKey::SPACE, ' ', ControlKeyStates::LEFT_CTRL),
        0x01..=0x1a => {
            let letter = char::from(b'A' + first - 1);
            let vk = VirtualKey::from_ascii(letter).unwrap_or(VirtualKey::NONE);
            key(vk, char::from(first), ControlKeyStates::LEFT_CTRL)
        }
        0x1c..=0x1f => key(VirtualKey::NONE, char::from(first), ControlKeyStates::LEFT_CTRL),
        _ => return parse_utf8(bytes),
    };
    Parsed::Done(1, vec![record])
}

fn parse_utf8(bytes: &[u8]) -> Parsed {
    let len = match bytes[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Parsed::Done(1, Vec::new()),
    };
    if bytes.len() < len {
        return Parsed::Incomplete;
    }
    let Some(ch) = std::str::from_utf8(&bytes[..len])
        .ok()
        .and_then(|s| s.chars().next())
    else {
        return Parsed::Done(1, Vec::new());
    };
    let modifiers = if ch.is_ascii_uppercase() {
        ControlKeyStates::SHIFT
    } else {
        ControlKeyStates::NONE
    };
    let vk = match ch {
        ' ' => VirtualKey::SPACE,
        _ => VirtualKey::from_ascii(ch).unwrap_or(VirtualKey::NONE),
    };
    Parsed::Done(len, vec![key(vk, ch, modifiers)])
}

fn ss3(code: u8) -> Option<InputRecord> {
    let vk = match code {
        b'A' => VirtualKey::UP,
        b'B' => VirtualKey::DOWN,
        b'C' => VirtualKey::RIGHT,
        b'D' => VirtualKey::LEFT,
        b'H' => VirtualKey::HOME,
        b'F' => VirtualKey::END,
        b'P' => VirtualKey::F1,
        b'Q' => VirtualKey::F2,
        b'R' => VirtualKey::F3,
        b'S' => VirtualKey::F4,
        _ => return None,
    };
    Some(key(vk, '\0', with_enhanced(vk, ControlKeyStates::NONE)))
}

/// `rest` follows `ESC [`.
fn parse_csi(rest: &[u8]) -> Parsed {
    let Some(end) = rest.iter().position(|b| (0x40..=0x7e).contains(b)) else {
        return Parsed::Incomplete;
    };
    let final_byte = rest[end];
    let params = String::from_utf8_lossy(&rest[..end]);
    let consumed = end + 1;

    if let Some(mouse) = params.strip_prefix('<') {
        return Parsed::Done(consumed, sgr_mouse(mouse, final_byte).into_iter().collect());
    }

    let fields: Vec<u32> = params
        .split(';')
        .map(|field| field.parse().unwrap_or(0))
        .collect();
    let modifiers = fields.get(1).copied().map(xterm_modifiers).unwrap_or_default();

    let vk = match final_byte {
        b'A' => Some(VirtualKey::UP),
        b'B' => Some(VirtualKey::DOWN),
        b'C' => Some(VirtualKey::RIGHT),
        b'D' => Some(VirtualKey::LEFT),
        b'H' => Some(VirtualKey::HOME),
        b'F' => Some(VirtualKey::END),
        b'P' => Some(VirtualKey::F1),
        b'Q' => Some(VirtualKey::F2),
        b'R' => Some(VirtualKey::F3),
        b'S' => Some(VirtualKey::F4),
        b'Z' => {
            return Parsed::Done(
                consumed,
                vec![key(VirtualKey::TAB, '\t', ControlKeyStates::SHIFT)],
            )
        }
        b'~' => tilde_key(fields.first().copied().unwrap_or(0)),
        _ => None,
    };
    let records = vk
        .map(|vk| key(vk, '\0', with_enhanced(vk, modifiers)))
        .into_iter()
        .collect();
    Parsed::Done(consumed, records)
}

fn with_enhanced(vk: VirtualKey, modifiers: ControlKeyStates) -> ControlKeyStates {
    if vk.is_enhanced() {
        modifiers | ControlKeyStates::ENHANCED_KEY
    } else {
        modifiers
    }
}

fn tilde_key(code: u32) -> Option<VirtualKey> {
    Some(match code {
        1 | 7 => VirtualKey::HOME,
        2 => VirtualKey::INSERT,
        3 => VirtualKey::DELETE,
        4 | 8 => VirtualKey::END,
        5 => VirtualKey::PRIOR,
        6 => VirtualKey::NEXT,
        11..=15 => VirtualKey::function((code - 10) as u8)?,
        17..=21 => VirtualKey::function((code - 11) as u8)?,
        23 | 24 => VirtualKey::function((code - 12) as u8)?,
        _ => return None,
    })
}

/// xterm modifier parameter: 1 + (shift | alt << 1 | ctrl << 2).
fn xterm_modifiers(param: u32) -> ControlKeyStates {
    let bits = param.saturating_sub(1);
    let mut modifiers = ControlKeyStates::NONE;
    if bits & 1 != 0 {
        modifiers |= ControlKeyStates::SHIFT;
    }
    if bits & 2 != 0 {
        modifiers |= ControlKeyStates::LEFT_ALT;
    }
    if bits & 4 != 0 {
        modifiers |= ControlKeyStates::LEFT_CTRL;
    }
    modifiers
}

/// SGR mouse report body `b;x;y` with final `M` (press) or `m` (release).
fn sgr_mouse(body: &str, final_byte: u8) -> Option<InputRecord> {
    if final_byte != b'M' && final_byte != b'm' {
        return None;
    }
    let mut fields = body.split(';').map(|field| field.parse::<i32>().ok());
    let code = fields.next()??;
    let x = fields.next()??;
    let y = fields.next()??;

    let mut modifiers = ControlKeyStates::NONE;
    if code & 4 != 0 {
        modifiers |= ControlKeyStates::SHIFT;
    }
    if code & 8 != 0 {
        modifiers |= ControlKeyStates::LEFT_ALT;
    }
    if code & 16 != 0 {
        modifiers |= ControlKeyStates::LEFT_CTRL;
    }

    let (buttons, flags, wheel_delta) = if code & 64 != 0 {
        let delta = if code & 1 == 0 { WHEEL_DELTA } else { -WHEEL_DELTA };
        (MouseButtonStates::NONE, MouseEventFlags::WHEELED, delta)
    } else {
        let buttons = match (final_byte, code & 3) {
            (b'm', _) | (_, 3) => MouseButtonStates::NONE,
            (_, 0) => MouseButtonStates::LEFT,
            (_, 1) => MouseButtonStates::MIDDLE,
            _ => MouseButtonStates::RIGHT,
        };
        let flags = if code & 32 != 0 {
            MouseEventFlags::MOVED
        } else {
            MouseEventFlags::NONE
        };
        (buttons, flags, 0)
    };

    Some(InputRecord::Mouse {
        position: Point::new(x - 1, y - 1),
        buttons,
        modifiers,
        flags,
        wheel_delta,
    })
}
