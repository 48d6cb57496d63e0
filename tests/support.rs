#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use console_controls::{ControlKeyStates, InputRecord, VirtualKey};

/// Only one window may be live per process; tests that build one hold this.
pub fn window_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    match LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn key(vk: VirtualKey, modifiers: ControlKeyStates) -> InputRecord {
    InputRecord::key_down(vk, '\0', modifiers)
}

pub fn tab() -> InputRecord {
    key(VirtualKey::TAB, ControlKeyStates::NONE)
}

pub fn shift_tab() -> InputRecord {
    key(VirtualKey::TAB, ControlKeyStates::SHIFT)
}

/// Polls `check` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    check()
}
