// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for guard decisions.

use crate::limiter::{Decision, GuardedAction, LimitReason};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters exported on the metrics endpoint.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    lockouts: IntCounterVec,
    validation_failures: IntCounter,
}

impl GuardMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new("blog_guard_decisions_total", "Attempts recorded, by outcome"),
            &["action", "outcome"],
        )?;
        let lockouts = IntCounterVec::new(
            Opts::new("blog_guard_lockouts_total", "Lockouts started"),
            &["action"],
        )?;
        let validation_failures = IntCounter::new(
            "blog_guard_validation_failures_total",
            "Posts rejected by validation",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(lockouts.clone()))?;
        registry.register(Box::new(validation_failures.clone()))?;

        Ok(Self {
            registry,
            decisions,
            lockouts,
            validation_failures,
        })
    }

    pub fn observe_decision(&self, action: GuardedAction, decision: &Decision) {
        let outcome = match decision {
            Decision::Allowed { .. } => "allowed",
            Decision::Denied {
                reason: LimitReason::LockedOut { .. },
            } => "locked",
            Decision::Denied {
                reason: LimitReason::LimitExceeded { .. },
            } => {
                self.lockouts.with_label_values(&[action.as_str()]).inc();
                "exceeded"
            }
        };
        self.decisions
            .with_label_values(&[action.as_str(), outcome])
            .inc();
    }

    pub fn observe_validation_failure(&self) {
        self.validation_failures.inc();
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_are_counted_by_outcome() {
        let metrics = GuardMetrics::new().unwrap();

        metrics.observe_decision(
            GuardedAction::Login,
            &Decision::Allowed {
                remaining_attempts: 4,
            },
        );
        metrics.observe_decision(
            GuardedAction::Login,
            &Decision::Denied {
                reason: LimitReason::LimitExceeded {
                    lockout_minutes: 30,
                },
            },
        );
        metrics.observe_validation_failure();

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"blog_guard_decisions_total{action="login",outcome="allowed"} 1"#));
        assert!(text.contains(r#"blog_guard_decisions_total{action="login",outcome="exceeded"} 1"#));
        assert!(text.contains(r#"blog_guard_lockouts_total{action="login"} 1"#));
        assert!(text.contains("blog_guard_validation_failures_total 1"));
    }
}
