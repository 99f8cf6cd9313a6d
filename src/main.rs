// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Blog Guard Service
//!
//! Sidecar for the blog admin panel. The front-end asks it whether a login
//! or post submission may proceed, validates posts through it, and keeps
//! the current draft in it. Limiter state and drafts are written to a JSON
//! file so lockouts survive restarts.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 127.0.0.1:8080)
//! - `STORE_PATH`: State file (default: data/blog-guard.json)
//! - `LOGIN_MAX_ATTEMPTS` / `LOGIN_WINDOW_MS`: Login limiter (default: 5 per 15 min)
//! - `POST_MAX_ATTEMPTS` / `POST_WINDOW_MS`: Post limiter (default: 10 per hour)
//! - `LOCKOUT_MS`: Lockout after the limit is hit (default: 30 min)
//! - `ALLOWED_ORIGIN`: Browser origin allowed by CORS (default: none)
//! - `METRICS_ENABLED`: Expose `/metrics` (default: true)

use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blog_guard::{
    clock::SystemClock,
    config::Config,
    guard::AdminGuard,
    handlers::{router, AppState},
    metrics::GuardMetrics,
    store::FileStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    config.validate()?;
    info!(
        bind_addr = %config.bind_addr,
        store = %config.store.path,
        login_max_attempts = config.limits.login.max_attempts,
        post_max_attempts = config.limits.post.max_attempts,
        lockout_ms = config.limits.lockout_duration_ms,
        "Starting blog guard"
    );

    // Create application state
    let store = Arc::new(FileStore::open(&config.store.path)?);
    let guard = AdminGuard::new(
        &config.limits,
        config.validation.clone(),
        store,
        Arc::new(SystemClock),
    );
    let metrics = GuardMetrics::new()
        .map_err(|e| anyhow::anyhow!("Failed to create metrics registry: {e}"))?;

    let state = Arc::new(AppState {
        guard,
        metrics,
        config: config.clone(),
    });

    let mut app = router(state);
    if let Some(origin) = &config.allowed_origin {
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(AllowOrigin::exact(value))
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers([axum::http::header::CONTENT_TYPE]),
                );
            }
            Err(e) => warn!(origin = %origin, error = %e, "Ignoring invalid ALLOWED_ORIGIN"),
        }
    }

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let mut config = Config::default();

    if let Ok(addr) = std::env::var("BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(path) = std::env::var("STORE_PATH") {
        config.store.path = path;
    }
    config.allowed_origin = std::env::var("ALLOWED_ORIGIN").ok();

    let limits = &mut config.limits;
    limits.login.max_attempts = env_or("LOGIN_MAX_ATTEMPTS", limits.login.max_attempts);
    limits.login.window_ms = env_or("LOGIN_WINDOW_MS", limits.login.window_ms);
    limits.post.max_attempts = env_or("POST_MAX_ATTEMPTS", limits.post.max_attempts);
    limits.post.window_ms = env_or("POST_WINDOW_MS", limits.post.window_ms);
    limits.lockout_duration_ms = env_or("LOCKOUT_MS", limits.lockout_duration_ms);

    config.metrics.enabled = env_or("METRICS_ENABLED", config.metrics.enabled);

    config
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
