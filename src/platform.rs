//! Native platform implementations
//!
//! Implements core platform traits for a single-node deployment:
//! - Clock: std::time via chrono
//! - Environment: process environment
//! - AuditSink: bounded channel drained into structured logs

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use keyturn_core::audit::{AuditEvent, AuditSink};
use keyturn_core::error::{ApiError, Result};
use keyturn_core::platform::{Clock, Environment};

/// System clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Process environment; secrets are plain env vars here (container
/// platforms inject mounted secrets the same way)
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| ApiError::internal(format!("environment variable '{}' not set", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        self.get_var(name)
    }
}

/// Audit sink that hands events to a channel consumed by a logging task.
///
/// `emit` never blocks the exchange path. A full or closed channel drops
/// the event but says so loudly instead of losing it silently.
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Create the sink and spawn its drain task
    pub fn spawn(buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(buffer);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log_event(&event);
            }
        });
        Self { tx }
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(target: "audit", error = %e, "audit event dropped");
        }
    }
}

fn log_event(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        outcome = event.outcome.code(),
        client_id = %event.client_id,
        family_id = event.family_id.map(|f| f.to_string()),
        subject_id = event.subject_id.as_deref(),
        offending_token_id = event.offending_token_id.as_ref().map(|t| t.as_str()),
        at = %event.at,
        "audit"
    );
}
