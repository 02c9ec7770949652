//! # Robot handle
//!
//! All commands to the engine, and all state reads outside of the engine's own sensor cycle, go
//! through a [`RobotHandle`]. The handle owns the engine behind a single mutex, which is held for
//! the lifetime of a [`RobotGuard`] and released when the guard is dropped.
//!
//! Code running inside a sensor cycle (see [`crate::engine::CycleState`]) must never lock the
//! handle, the engine thread would deadlock against any command waiting on it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

use crate::engine::NavEngine;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Shared, exclusively locked handle to the navigation engine.
#[derive(Clone)]
pub struct RobotHandle {
    engine: Arc<Mutex<Box<dyn NavEngine>>>,
}

/// Exclusive access to the engine, released on drop.
pub struct RobotGuard<'a> {
    guard: MutexGuard<'a, Box<dyn NavEngine>>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl RobotHandle {
    pub fn new(engine: Box<dyn NavEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Acquire exclusive access to the engine.
    ///
    /// A panic in another holder does not leave the engine unusable, the lock is recovered.
    pub fn lock(&self) -> RobotGuard<'_> {
        RobotGuard {
            guard: self.engine.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Poll the engine until `pred` is true or `timeout` elapses.
    ///
    /// The lock is only held while `pred` is evaluated, and is released while sleeping between
    /// polls. Returns true if `pred` became true within the timeout.
    pub fn wait_for<F>(&self, timeout: Duration, poll_period: Duration, pred: F) -> bool
    where
        F: Fn(&dyn NavEngine) -> bool,
    {
        let start = Instant::now();

        loop {
            if pred(&*self.lock()) {
                return true;
            }

            if start.elapsed() >= timeout {
                return false;
            }

            thread::sleep(poll_period);
        }
    }
}

impl<'a> Deref for RobotGuard<'a> {
    type Target = dyn NavEngine;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl<'a> DerefMut for RobotGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}
