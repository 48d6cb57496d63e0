//! Listener thread and the input queue it feeds.
//!
//! The listener is the only producer: it waits on the backend, reads records
//! and pushes them onto the window's queue. The window drains the queue on
//! its own thread, so input handling never runs on the listener.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::console::{InputRecord, InputSource};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<InputRecord>,
    close_requested: Option<i32>,
    stopped: bool,
}

/// Pending input plus out-of-band close requests, shared with `WindowHandle`.
#[derive(Debug, Default)]
pub struct InputQueue {
    state: Mutex<QueueState>,
    cvar: Condvar,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, record: InputRecord) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.records.push_back(record);
        self.cvar.notify_all();
    }

    pub fn extend<I>(&self, records: I)
    where
        I: IntoIterator<Item = InputRecord>,
    {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.records.extend(records);
        self.cvar.notify_all();
    }

    /// The first request wins; later codes are ignored.
    pub fn request_close(&self, exit_code: i32) {
        let mut state = self.lock();
        state.close_requested.get_or_insert(exit_code);
        self.cvar.notify_all();
    }

    pub fn take_close_request(&self) -> Option<i32> {
        self.lock().close_requested.take()
    }

    pub fn pop(&self) -> Option<InputRecord> {
        self.lock().records.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Blocks until a record or close request is pending, the queue is
    /// stopped, or `timeout` elapses. Returns whether work is pending.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock();
        loop {
            if !state.records.is_empty() || state.close_requested.is_some() {
                return true;
            }
            if state.stopped {
                return false;
            }
            state = match deadline {
                None => self
                    .cvar
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.cvar
                        .wait_timeout(state, deadline - now)
                        .map(|(state, _)| state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
                }
            };
        }
    }

    /// Drops pending records, refuses new ones and wakes every waiter.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        state.records.clear();
        self.cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }
}

/// Owns the listener thread; stopping joins it.
#[derive(Debug)]
pub struct ConsoleListener {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ConsoleListener {
    pub fn spawn(
        mut source: Box<dyn InputSource>,
        queue: Arc<InputQueue>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("console-listener".to_string())
            .spawn(move || {
                debug!("console listener started");
                listen(source.as_mut(), &queue, &stop_flag, poll_interval);
                debug!("console listener stopped");
            })
            .map_err(|err| Error::backend("spawn_listener", err))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Signals the loop and joins it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            warn!("console listener panicked");
        }
    }
}

impl Drop for ConsoleListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(
    source: &mut dyn InputSource,
    queue: &InputQueue,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match source.wait_ready(poll_interval) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, "waiting for console input failed");
                thread::sleep(poll_interval);
                continue;
            }
        }
        // Stop wins when both are signaled.
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match source.read_records() {
            Ok(records) if records.is_empty() => {}
            Ok(records) => {
                debug!(count = records.len(), "console input received");
                queue.extend(records);
            }
            Err(err) => warn!(error = %err, "reading console input failed"),
        }
    }
}
