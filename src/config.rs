// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the blog guard service.
//!
//! Defaults match the limits the admin panel has always shipped with:
//! 5 logins per 15 minutes, 10 posts per hour, 30 minute lockout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origin allowed to call the service from a browser
    #[serde(default)]
    pub allowed_origin: Option<String>,

    /// Persistent storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Post validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where limiter state and drafts are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON store file (default: data/blog-guard.json)
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Settings for one rate limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Attempts allowed inside the window
    pub max_attempts: u32,

    /// Sliding window length in milliseconds
    pub window_ms: u64,
}

/// Settings shared by the login and post limiters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "RateLimitConfig::login")]
    pub login: RateLimitConfig,

    #[serde(default = "RateLimitConfig::posts")]
    pub post: RateLimitConfig,

    /// Lockout applied by every limiter once its limit is hit
    /// (default: 30 minutes)
    #[serde(default = "default_lockout_ms")]
    pub lockout_duration_ms: u64,
}

/// Length bounds for blog post fields, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_title_min")]
    pub title_min_length: usize,

    #[serde(default = "default_title_max")]
    pub title_max_length: usize,

    #[serde(default = "default_content_min")]
    pub content_min_length: usize,

    #[serde(default = "default_content_max")]
    pub content_max_length: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_store_path() -> String {
    "data/blog-guard.json".to_string()
}

fn default_lockout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_title_min() -> usize {
    3
}

fn default_title_max() -> usize {
    200
}

fn default_content_min() -> usize {
    10
}

fn default_content_max() -> usize {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origin: None,
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            validation: ValidationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login: RateLimitConfig::login(),
            post: RateLimitConfig::posts(),
            lockout_duration_ms: default_lockout_ms(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            title_min_length: default_title_min(),
            title_max_length: default_title_max(),
            content_min_length: default_content_min(),
            content_max_length: default_content_max(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Login attempts: 5 per 15 minutes.
    pub fn login() -> Self {
        Self {
            max_attempts: 5,
            window_ms: 15 * 60 * 1000,
        }
    }

    /// Post creation: 10 per hour.
    pub fn posts() -> Self {
        Self {
            max_attempts: 10,
            window_ms: 60 * 60 * 1000,
        }
    }

    /// Get the sliding window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl LimitsConfig {
    /// Get the lockout duration
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_millis(self.lockout_duration_ms)
    }
}

impl Config {
    /// Reject settings the limiters and validator cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, limit) in [("login", &self.limits.login), ("post", &self.limits.post)] {
            anyhow::ensure!(limit.max_attempts > 0, "{name} max_attempts must be positive");
            anyhow::ensure!(limit.window_ms > 0, "{name} window_ms must be positive");
        }
        anyhow::ensure!(
            self.limits.lockout_duration_ms > 0,
            "lockout_duration_ms must be positive"
        );

        let v = &self.validation;
        anyhow::ensure!(
            v.title_min_length <= v.title_max_length,
            "title_min_length exceeds title_max_length"
        );
        anyhow::ensure!(
            v.content_min_length <= v.content_max_length,
            "content_min_length exceeds content_max_length"
        );
        anyhow::ensure!(
            self.metrics.path.starts_with('/'),
            "metrics path must start with '/'"
        );
        Ok(())
    }
}
