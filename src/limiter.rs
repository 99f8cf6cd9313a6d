// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding window attempt limiter with lockout escalation.
//!
//! Each limiter owns one key in a [`KvStore`] holding its attempt history
//! and an optional lockout deadline. State is evaluated lazily on every
//! call; there is no background expiry task.
//!
//! Reaching the limit locks the key for the configured lockout duration.
//! The attempt that trips the lockout is not itself recorded, so once the
//! lockout expires the window only holds attempts that were allowed.

use crate::clock::Clock;
use crate::config::{LimitsConfig, RateLimitConfig};
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const MS_PER_MINUTE: u64 = 60_000;

/// Persisted limiter state for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Timestamps (ms) of recorded attempts, oldest first
    #[serde(default)]
    pub attempts: Vec<i64>,

    /// Deadline (ms) before which every attempt is rejected
    #[serde(default, rename = "lockedUntil")]
    pub locked_until: Option<i64>,
}

/// Result of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    Locked {
        /// Whole minutes until the lockout ends, rounded up
        remaining_minutes: u64,
    },
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. })
    }
}

/// Reason an attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    /// The key was already locked out
    LockedOut { remaining_minutes: u64 },
    /// This attempt hit the limit and started a lockout
    LimitExceeded { lockout_minutes: u64 },
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockedOut { remaining_minutes } => write!(
                f,
                "Too many attempts. Please try again in {} minute(s).",
                remaining_minutes
            ),
            Self::LimitExceeded { lockout_minutes } => write!(
                f,
                "Rate limit exceeded. Locked out for {} minutes.",
                lockout_minutes
            ),
        }
    }
}

/// Outcome of recording an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Attempt recorded
    Allowed {
        /// Attempts left in the current window
        remaining_attempts: u32,
    },
    /// Attempt rejected; the guarded action must not run
    Denied { reason: LimitReason },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Human-readable rejection message, if denied.
    pub fn reason(&self) -> Option<String> {
        match self {
            Decision::Allowed { .. } => None,
            Decision::Denied { reason } => Some(reason.to_string()),
        }
    }

    pub fn remaining_attempts(&self) -> Option<u32> {
        match self {
            Decision::Allowed { remaining_attempts } => Some(*remaining_attempts),
            Decision::Denied { .. } => None,
        }
    }
}

/// Persistent sliding window limiter for a single storage key.
pub struct RateLimiter {
    key: String,
    config: RateLimitConfig,
    lockout_ms: u64,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles within this process
    op_lock: Mutex<()>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("lockout_ms", &self.lockout_ms)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter persisting under `key`.
    pub fn new(
        key: impl Into<String>,
        config: RateLimitConfig,
        lockout_ms: u64,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: key.into(),
            config,
            lockout_ms,
            store,
            clock,
            op_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check for an active lockout, clearing it if it has expired.
    pub fn is_locked_out(&self) -> LockStatus {
        let _guard = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_ms();
        let mut state = self.load_state();

        let (status, expired) = evaluate_lock(&mut state, now);
        if expired {
            self.save_state(&state);
        }
        status
    }

    /// Record an attempt and decide whether the guarded action may proceed.
    pub fn record_attempt(&self) -> Decision {
        let _guard = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_ms();
        let mut state = self.load_state();

        let (status, expired) = evaluate_lock(&mut state, now);
        if let LockStatus::Locked { remaining_minutes } = status {
            debug!(key = %self.key, remaining_minutes, "Attempt rejected during lockout");
            return Decision::Denied {
                reason: LimitReason::LockedOut { remaining_minutes },
            };
        }
        if expired {
            debug!(key = %self.key, "Lockout expired");
        }

        prune(&mut state.attempts, now, self.config.window_ms);

        if state.attempts.len() >= self.config.max_attempts as usize {
            state.locked_until = Some(now.saturating_add(to_i64(self.lockout_ms)));
            self.save_state(&state);

            let lockout_minutes = self.lockout_ms.div_ceil(MS_PER_MINUTE);
            info!(
                key = %self.key,
                attempts = state.attempts.len(),
                lockout_minutes,
                "Attempt limit reached, locking out"
            );
            return Decision::Denied {
                reason: LimitReason::LimitExceeded { lockout_minutes },
            };
        }

        state.attempts.push(now);
        self.save_state(&state);

        let remaining_attempts = self.config.max_attempts - count(&state.attempts);
        debug!(key = %self.key, remaining_attempts, "Attempt allowed");
        Decision::Allowed { remaining_attempts }
    }

    /// Forget all attempts and any lockout for this key.
    pub fn reset(&self) {
        let _guard = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to reset limiter state");
            return;
        }
        info!(key = %self.key, "Limiter reset");
    }

    /// Attempts left in the current window. Ignores lockout; never writes.
    pub fn remaining_attempts(&self) -> u32 {
        let now = self.clock.now_ms();
        let mut attempts = self.load_state().attempts;
        prune(&mut attempts, now, self.config.window_ms);
        self.config.max_attempts.saturating_sub(count(&attempts))
    }

    /// Snapshot of the persisted state.
    pub fn state(&self) -> RateLimitState {
        self.load_state()
    }

    fn load_state(&self) -> RateLimitState {
        let Some(raw) = self.store.get(&self.key) else {
            return RateLimitState::default();
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Malformed limiter state, starting fresh");
                RateLimitState::default()
            }
        }
    }

    fn save_state(&self, state: &RateLimitState) {
        let result = serde_json::to_string(state)
            .map_err(crate::store::StoreError::from)
            .and_then(|raw| self.store.set(&self.key, &raw));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to persist limiter state");
        }
    }
}

/// Evaluate the lockout deadline at `now`. Returns the status and whether
/// an expired deadline was cleared from `state`.
fn evaluate_lock(state: &mut RateLimitState, now: i64) -> (LockStatus, bool) {
    match state.locked_until {
        None => (LockStatus::Unlocked, false),
        Some(until) if now < until => {
            let remaining_ms = until.saturating_sub(now) as u64;
            (
                LockStatus::Locked {
                    remaining_minutes: remaining_ms.div_ceil(MS_PER_MINUTE),
                },
                false,
            )
        }
        Some(_) => {
            state.locked_until = None;
            (LockStatus::Unlocked, true)
        }
    }
}

/// Drop attempts that fall outside the sliding window ending at `now`.
fn prune(attempts: &mut Vec<i64>, now: i64, window_ms: u64) {
    let window = to_i64(window_ms);
    attempts.retain(|&t| now.saturating_sub(t) < window);
}

fn count(attempts: &[i64]) -> u32 {
    u32::try_from(attempts.len()).unwrap_or(u32::MAX)
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Admin action gated by a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardedAction {
    Login,
    Post,
}

impl GuardedAction {
    /// Storage key holding this action's limiter state.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Login => "login_attempts",
            Self::Post => "post_attempts",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for GuardedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The login and post limiters, sharing one store and clock.
#[derive(Debug)]
pub struct Limiters {
    pub login: RateLimiter,
    pub post: RateLimiter,
}

impl Limiters {
    pub fn new(config: &LimitsConfig, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            login: RateLimiter::new(
                GuardedAction::Login.storage_key(),
                config.login,
                config.lockout_duration_ms,
                store.clone(),
                clock.clone(),
            ),
            post: RateLimiter::new(
                GuardedAction::Post.storage_key(),
                config.post,
                config.lockout_duration_ms,
                store,
                clock,
            ),
        }
    }

    pub fn get(&self, action: GuardedAction) -> &RateLimiter {
        match action {
            GuardedAction::Login => &self.login,
            GuardedAction::Post => &self.post,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{KvStore, MemoryStore};

    const MINUTE: i64 = 60_000;

    fn limiter(max_attempts: u32, window_ms: u64) -> (RateLimiter, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let limiter = RateLimiter::new(
            "test_attempts",
            RateLimitConfig {
                max_attempts,
                window_ms,
            },
            30 * 60 * 1000,
            store.clone(),
            clock.clone(),
        );
        (limiter, store, clock)
    }

    #[test]
    fn test_counts_down_then_locks() {
        let (limiter, _, _) = limiter(3, 15 * 60 * 1000);

        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.record_attempt(),
                Decision::Allowed {
                    remaining_attempts: expected
                }
            );
        }

        let decision = limiter.record_attempt();
        assert_eq!(
            decision,
            Decision::Denied {
                reason: LimitReason::LimitExceeded {
                    lockout_minutes: 30
                }
            }
        );
        assert!(limiter.is_locked_out().is_locked());
    }

    #[test]
    fn test_lockout_attempt_is_not_recorded() {
        let (limiter, _, _) = limiter(2, 15 * 60 * 1000);

        limiter.record_attempt();
        limiter.record_attempt();
        limiter.record_attempt();

        let state = limiter.state();
        assert_eq!(state.attempts.len(), 2);
        assert!(state.locked_until.is_some());
    }

    #[test]
    fn test_locked_reason_rounds_minutes_up() {
        let (limiter, _, clock) = limiter(1, 15 * 60 * 1000);

        limiter.record_attempt();
        limiter.record_attempt();

        clock.advance(10 * MINUTE + 1);
        let decision = limiter.record_attempt();
        assert_eq!(
            decision.reason().as_deref(),
            Some("Too many attempts. Please try again in 20 minute(s).")
        );
        assert_eq!(
            limiter.is_locked_out(),
            LockStatus::Locked {
                remaining_minutes: 20
            }
        );
    }

    #[test]
    fn test_expired_lockout_is_cleared_and_persisted() {
        let (limiter, _, clock) = limiter(1, 15 * 60 * 1000);

        limiter.record_attempt();
        limiter.record_attempt();
        assert!(limiter.state().locked_until.is_some());

        clock.advance(30 * MINUTE);
        assert_eq!(limiter.is_locked_out(), LockStatus::Unlocked);
        assert_eq!(limiter.state().locked_until, None);
    }

    #[test]
    fn test_remaining_attempts_does_not_write() {
        let (limiter, store, clock) = limiter(5, 1_000);

        limiter.record_attempt();
        limiter.record_attempt();
        let before = store.get("test_attempts");

        clock.advance(1_000);
        assert_eq!(limiter.remaining_attempts(), 5);
        assert_eq!(store.get("test_attempts"), before);
    }

    #[test]
    fn test_remaining_attempts_ignores_lockout() {
        let (limiter, _, _) = limiter(2, 15 * 60 * 1000);

        limiter.record_attempt();
        limiter.record_attempt();
        limiter.record_attempt();

        assert!(limiter.is_locked_out().is_locked());
        assert_eq!(limiter.remaining_attempts(), 0);
    }

    #[test]
    fn test_malformed_state_treated_as_fresh() {
        let (limiter, store, _) = limiter(5, 15 * 60 * 1000);
        store.set("test_attempts", "{not valid").unwrap();

        assert_eq!(limiter.is_locked_out(), LockStatus::Unlocked);
        assert_eq!(limiter.remaining_attempts(), 5);
        assert_eq!(
            limiter.record_attempt(),
            Decision::Allowed {
                remaining_attempts: 4
            }
        );
    }

    #[test]
    fn test_state_serializes_with_camel_case_deadline() {
        let state = RateLimitState {
            attempts: vec![1, 2],
            locked_until: None,
        };
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"attempts":[1,2],"lockedUntil":null}"#
        );

        let parsed: RateLimitState = serde_json::from_str(r#"{"lockedUntil":99}"#).unwrap();
        assert!(parsed.attempts.is_empty());
        assert_eq!(parsed.locked_until, Some(99));
    }

    #[test]
    fn test_concurrent_attempts_are_serialized() {
        let (limiter, store, _) = limiter(5, 15 * MINUTE as u64);

        let allowed = std::thread::scope(|s| {
            let handles: Vec<_> = (0..50)
                .map(|_| s.spawn(|| limiter.record_attempt().is_allowed()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|allowed| *allowed)
                .count()
        });

        assert_eq!(allowed, 5);
        let state = limiter.state();
        assert_eq!(state.attempts.len(), 5);
        assert!(state.locked_until.is_some());
        assert!(store.get("test_attempts").is_some());
    }

    #[test]
    fn test_limiters_use_separate_keys() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let limiters = Limiters::new(&LimitsConfig::default(), store.clone(), clock);

        assert_eq!(limiters.login.key(), "login_attempts");
        limiters.get(GuardedAction::Login).record_attempt();
        assert_eq!(limiters.login.remaining_attempts(), 4);
        assert_eq!(limiters.post.remaining_attempts(), 10);
        assert!(store.get("login_attempts").is_some());
        assert!(store.get("post_attempts").is_none());
    }
}
