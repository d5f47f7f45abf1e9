//! Mock implementations of platform traits for tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{ApiError, Result};
use crate::platform::{AccessTokenIssuer, Clock, Environment, SignRequest, SignedAccessToken};

/// Mock clock with a settable, advanceable timestamp
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(secs);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Issuer that mints sequentially numbered fake access tokens
pub struct StaticIssuer {
    counter: AtomicU64,
}

impl StaticIssuer {
    pub fn new() -> Self {
        Self { counter: AtomicU64::new(0) }
    }

    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Default for StaticIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenIssuer for StaticIssuer {
    async fn sign(&self, request: SignRequest<'_>) -> Result<SignedAccessToken> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(SignedAccessToken {
            token: format!("at-{}-{}", request.subject_id, n),
            expires_in: request.expires_in_secs,
        })
    }
}

/// Issuer that always fails, for upstream-outage paths
pub struct FailingIssuer;

#[async_trait]
impl AccessTokenIssuer for FailingIssuer {
    async fn sign(&self, _request: SignRequest<'_>) -> Result<SignedAccessToken> {
        Err(ApiError::upstream_unavailable("signing backend down"))
    }
}

/// Audit sink that records every event for assertions
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Outcome codes in emission order
    pub fn codes(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.outcome.code())
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for RecordingSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Mock environment backed by in-memory maps
pub struct MockEnv {
    vars: HashMap<String, String>,
    secrets: HashMap<String, String>,
}

impl MockEnv {
    pub fn new(vars: HashMap<String, String>, secrets: HashMap<String, String>) -> Self {
        Self { vars, secrets }
    }
}

impl Environment for MockEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::internal(format!("variable '{}' not found", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::internal(format!("secret '{}' not found", name)))
    }
}
