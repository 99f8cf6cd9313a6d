// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: an in-memory store and a manual clock wired into
//! limiters or a full application state.

#![allow(dead_code)]

use blog_guard::{
    clock::ManualClock,
    config::{Config, RateLimitConfig},
    guard::AdminGuard,
    handlers::AppState,
    limiter::RateLimiter,
    metrics::GuardMetrics,
    store::MemoryStore,
};
use std::sync::Arc;

pub const MINUTE: i64 = 60 * 1000;

/// Arbitrary fixed starting instant (2023-11-14T22:13:20Z).
pub const T0: i64 = 1_700_000_000_000;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::new(T0)),
        }
    }

    pub fn limiter(&self, max_attempts: u32, window_ms: u64, lockout_ms: u64) -> RateLimiter {
        RateLimiter::new(
            "login_attempts",
            RateLimitConfig {
                max_attempts,
                window_ms,
            },
            lockout_ms,
            self.store.clone(),
            self.clock.clone(),
        )
    }

    pub fn app_state(&self, config: Config) -> Arc<AppState> {
        let guard = AdminGuard::new(
            &config.limits,
            config.validation.clone(),
            self.store.clone(),
            self.clock.clone(),
        );
        Arc::new(AppState {
            guard,
            metrics: GuardMetrics::new().unwrap(),
            config,
        })
    }
}
