// src/pipeline/gate.rs

//! Minimum spacing between triggered cycles.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};

/// Remembers when the last cycle was triggered.
///
/// Manual requests go through [`CooldownGate::try_acquire`]; scheduled and
/// forced cycles only [`CooldownGate::mark`] the gate so they push the next
/// allowed manual request back.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last: Mutex<Option<Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Claim the gate, or report how long until it opens.
    ///
    /// A rejection leaves the gate untouched.
    pub fn try_acquire(&self) -> Result<()> {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(at) = *last {
            let since = now.saturating_duration_since(at);
            if since < self.cooldown {
                return Err(AppError::TooSoon {
                    retry_after: self.cooldown - since,
                });
            }
        }
        *last = Some(now);
        Ok(())
    }

    /// Record a trigger unconditionally.
    pub fn mark(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}
