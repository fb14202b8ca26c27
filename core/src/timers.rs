use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("no async runtime available to schedule the timer")]
    NoRuntime,
    #[error("timer table has been disposed")]
    Disposed,
}

/// Named trailing-edge timers; arming a name cancels its pending timer.
///
/// Dropping or disposing the table cancels everything, and a task that wakes
/// up after disposal does nothing.
#[derive(Debug, Default)]
pub struct TimerTable {
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
    disposed: Arc<AtomicBool>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` after `delay` unless `name` is re-armed or cancelled first
    pub fn arm<F>(&self, name: &str, delay: Duration, task: F) -> Result<(), TimerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_disposed() {
            return Err(TimerError::Disposed);
        }
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;

        // Spawn and insert under one lock so the newest arm always owns the name
        let mut handles = self.lock();
        let disposed = self.disposed.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !disposed.load(Ordering::Acquire) {
                task.await;
            }
        });

        if let Some(previous) = handles.insert(name.to_string(), handle) {
            trace!("Re-arming timer {}", name);
            previous.abort();
        }
        Ok(())
    }

    pub fn cancel(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, handle) in self.lock().drain() {
            handle.abort();
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.lock().get(name).is_some_and(|h| !h.is_finished())
    }

    pub fn pending_count(&self) -> usize {
        self.lock().values().filter(|h| !h.is_finished()).count()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.cancel_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.dispose();
    }
}
