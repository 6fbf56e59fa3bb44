//! Shared simulation state and the lock that guards it.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub current_day: u64,
    pub status: SimStatus,
    /// Milliseconds since the Unix epoch at which simulated day 0 began.
    pub unix_epoch_start_time: i64,
}

impl SimulationState {
    pub fn new(unix_epoch_start_time: i64) -> Self {
        Self {
            current_day: 0,
            status: SimStatus::NotStarted,
            unix_epoch_start_time,
        }
    }
}

/// Serializes every read and update of a value behind one async lock.
///
/// The lock is held for the whole closure, including any `.await` inside the
/// `*_async` variants. Calling back into the same instance from inside a
/// closure deadlocks; the primitive does not detect it.
#[derive(Debug, Default)]
pub struct GuardedState<T> {
    inner: Mutex<T>,
}

impl<T> GuardedState<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Mutex::new(value) }
    }

    pub async fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.lock().await;
        f(&guard)
    }

    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let mut guard = self.inner.lock().await;
        let next = f(&guard);
        *guard = next;
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Clone> GuardedState<T> {
    /// Like [`read`](Self::read) but the closure may suspend while the lock is held.
    pub async fn read_async<R, F, Fut>(&self, f: F) -> R
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let guard = self.inner.lock().await;
        f(guard.clone()).await
    }

    /// Like [`update`](Self::update) but the closure may suspend while the lock is held.
    pub async fn update_async<F, Fut>(&self, f: F)
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut guard = self.inner.lock().await;
        let next = f(guard.clone()).await;
        *guard = next;
    }

    pub async fn snapshot(&self) -> T {
        self.read(T::clone).await
    }
}
