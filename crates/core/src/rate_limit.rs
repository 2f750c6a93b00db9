use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::user::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit store unavailable: {0}")]
    Store(String),
}

/// Per-user admission control with a rolling cooldown.
///
/// `try_admit` is a single atomic set-if-absent-with-expiry: concurrent
/// callers for the same user see at most one admission per window. A store
/// failure is surfaced to the caller, which decides the fallback policy
/// (the dispatcher rejects closed).
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn try_admit(&self, user: UserId) -> Result<bool, RateLimitError>;
    async fn remaining_cooldown(&self, user: UserId) -> Result<Duration, RateLimitError>;
}

/// Process-local limiter holding one expiry deadline per user. Check and
/// set happen inside one critical section, never as a read-then-write pair.
pub struct InMemoryRateLimiter {
    cooldown: Duration,
    deadlines: Mutex<HashMap<UserId, Instant>>,
}

impl InMemoryRateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, deadlines: Mutex::new(HashMap::new()) }
    }

    fn with_deadlines<T>(&self, apply: impl FnOnce(&mut HashMap<UserId, Instant>) -> T) -> T {
        match self.deadlines.lock() {
            Ok(mut deadlines) => apply(&mut deadlines),
            Err(poisoned) => apply(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn try_admit(&self, user: UserId) -> Result<bool, RateLimitError> {
        let now = Instant::now();
        let cooldown = self.cooldown;

        Ok(self.with_deadlines(|deadlines| {
            // Expired tickets count as absent.
            deadlines.retain(|_, deadline| *deadline > now);

            match deadlines.entry(user) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(now + cooldown);
                    true
                }
            }
        }))
    }

    async fn remaining_cooldown(&self, user: UserId) -> Result<Duration, RateLimitError> {
        let now = Instant::now();

        Ok(self.with_deadlines(|deadlines| {
            deadlines
                .get(&user)
                .map(|deadline| deadline.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO)
        }))
    }
}
