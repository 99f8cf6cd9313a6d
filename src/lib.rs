// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Blog Guard
//!
//! Protection for the admin side of a small blog whose data and accounts
//! live in a hosted backend:
//!
//! - Sliding window limiter with lockout for login attempts (5 per 15 min)
//! - The same limiter for post creation (10 per hour)
//! - Post title/content validation and HTML escaping
//! - Draft auto-save
//!
//! Limiter state is persisted through a [`store::KvStore`] so it survives
//! restarts, and time comes from an injected [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod draft;
pub mod guard;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod store;
pub mod validator;

pub use config::Config;
pub use guard::{AdminGuard, GuardError};
pub use limiter::{Decision, GuardedAction, LockStatus, RateLimiter};
pub use validator::{PostValidation, PostValidator};
