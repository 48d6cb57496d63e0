//! Process-wide guard allowing one live window at a time.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

static WINDOW_LIVE: AtomicBool = AtomicBool::new(false);

/// Held by the live window; dropping it lets the next window be created.
#[derive(Debug)]
pub struct InstanceGuard {
    _private: (),
}

impl InstanceGuard {
    pub fn acquire() -> Result<Self> {
        WINDOW_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { _private: () })
            .map_err(|_| Error::WindowAlreadyLive)
    }

    pub fn is_held() -> bool {
        WINDOW_LIVE.load(Ordering::Acquire)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        WINDOW_LIVE.store(false, Ordering::Release);
    }
}

/// Serializes unit tests that need the single window slot.
#[cfg(test)]
pub(crate) fn window_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    match LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
