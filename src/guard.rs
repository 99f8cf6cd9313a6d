// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Guarded admin actions.
//!
//! Wraps the calls that go to the hosted backend (sign-in, insert, update)
//! with the limiter, validation and draft bookkeeping that has to happen
//! around them. The backend call itself is supplied by the caller.

use crate::clock::Clock;
use crate::config::{LimitsConfig, ValidationConfig};
use crate::draft::DraftStore;
use crate::limiter::Limiters;
use crate::store::KvStore;
use crate::validator::{PostValidator, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why a guarded action did not run or did not complete.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Limiter rejected the attempt; the message is meant for the user
    #[error("{0}")]
    RateLimited(String),

    #[error("Email and password are required.")]
    MissingCredentials,

    #[error("Invalid email or password")]
    AuthenticationFailed { detail: String },

    #[error("Validation errors:\n{}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Backend request failed: {0}")]
    Backend(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Credentials handed to the authentication callback.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Trimmed email address
    pub email: String,
    pub password: String,
}

/// Sanitized post ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

/// Sanitized changes to an existing post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostUpdate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

/// Limiters, validator and drafts composed for the admin panel.
pub struct AdminGuard {
    limiters: Limiters,
    validator: PostValidator,
    drafts: DraftStore,
    clock: Arc<dyn Clock>,
}

impl AdminGuard {
    pub fn new(
        limits: &LimitsConfig,
        validation: ValidationConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiters: Limiters::new(limits, store.clone(), clock.clone()),
            validator: PostValidator::new(validation),
            drafts: DraftStore::new(store),
            clock,
        }
    }

    pub fn limiters(&self) -> &Limiters {
        &self.limiters
    }

    pub fn validator(&self) -> &PostValidator {
        &self.validator
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    /// Attempt an admin sign-in.
    ///
    /// Every call counts against the login limiter, including calls with
    /// empty credentials. A successful sign-in clears the limiter.
    pub fn login<T, E, F>(&self, email: &str, password: &str, authenticate: F) -> Result<T, GuardError>
    where
        E: Display,
        F: FnOnce(&Credentials) -> Result<T, E>,
    {
        let decision = self.limiters.login.record_attempt();
        if let Some(reason) = decision.reason() {
            return Err(GuardError::RateLimited(reason));
        }

        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(GuardError::MissingCredentials);
        }

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        match authenticate(&credentials) {
            Ok(session) => {
                self.limiters.login.reset();
                info!("Admin signed in");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in rejected");
                Err(GuardError::AuthenticationFailed {
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Validate and publish a new post, clearing the draft on success.
    pub fn create_post<T, E, F>(&self, title: &str, content: &str, publish: F) -> Result<T, GuardError>
    where
        E: Display,
        F: FnOnce(&NewPost) -> Result<T, E>,
    {
        let decision = self.limiters.post.record_attempt();
        if let Some(reason) = decision.reason() {
            return Err(GuardError::RateLimited(reason));
        }

        let validation = self.validator.validate_post(title, content);
        if !validation.is_valid() {
            return Err(GuardError::Validation(validation.errors));
        }

        let post = NewPost {
            title: validation.sanitized_title,
            content: validation.sanitized_content,
        };
        let created = publish(&post).map_err(|e| GuardError::Backend(e.to_string()))?;

        if let Err(e) = self.drafts.clear() {
            warn!(error = %e, "Post published but draft could not be cleared");
        }
        info!(title = %post.title, "Post published");
        Ok(created)
    }

    /// Validate and apply an edit. Edits are not rate limited.
    pub fn update_post<T, E, F>(
        &self,
        id: &str,
        title: &str,
        content: &str,
        update: F,
    ) -> Result<T, GuardError>
    where
        E: Display,
        F: FnOnce(&PostUpdate) -> Result<T, E>,
    {
        let validation = self.validator.validate_post(title, content);
        if !validation.is_valid() {
            return Err(GuardError::Validation(validation.errors));
        }

        let changes = PostUpdate {
            id: id.to_string(),
            title: validation.sanitized_title,
            content: validation.sanitized_content,
            edited_at: DateTime::<Utc>::from_timestamp_millis(self.clock.now_ms()).unwrap_or_default(),
        };
        let updated = update(&changes).map_err(|e| GuardError::Backend(e.to_string()))?;
        info!(id, "Post updated");
        Ok(updated)
    }
}
