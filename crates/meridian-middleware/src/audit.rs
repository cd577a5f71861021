//! Audit records and sinks.
//!
//! The audit stage builds one [`AuditRecord`] per request and hands it to an
//! [`AuditSink`] once the response is known. Delivery failures are the
//! sink's problem to report; they never change the response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned by an [`AuditSink`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// The record could not be encoded.
    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink refused or failed to accept the record.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// One caller identity claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Claim kind, e.g. `UPN` or `ObjectID`.
    pub kind: &'static str,
    /// Claim value.
    pub value: String,
}

impl CallerIdentity {
    /// A user principal name from `x-ms-client-principal-name`.
    pub fn principal_name(value: impl Into<String>) -> Self {
        Self {
            kind: "UPN",
            value: value.into(),
        }
    }

    /// An object ID from `x-ms-client-object-id`.
    pub fn object_id(value: impl Into<String>) -> Self {
        Self {
            kind: "ObjectID",
            value: value.into(),
        }
    }

    /// The caller-supplied `x-ms-client-request-id`.
    pub fn client_request_id(value: impl Into<String>) -> Self {
        Self {
            kind: "ClientRequestID",
            value: value.into(),
        }
    }
}

/// Final disposition of an audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum AuditOutcome {
    /// The handler has not produced a response yet.
    Pending,
    /// Status below 400.
    Success,
    /// Status 400 or above.
    Failure {
        /// `Status code: {n}`.
        description: String,
    },
}

/// A control-plane audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// `METHOD path`.
    pub operation_name: String,
    /// Peer IP, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_ip: Option<IpAddr>,
    /// Identity claims taken from ARM headers.
    pub caller_identities: Vec<CallerIdentity>,
    /// Server-generated request ID.
    pub request_id: Uuid,
    /// Caller-supplied correlation request ID.
    pub correlation_request_id: String,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    /// Result of the request.
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    /// Marks the request successful.
    pub fn succeed(&mut self) {
        self.outcome = AuditOutcome::Success;
    }

    /// Marks the request failed with the given HTTP status.
    pub fn fail(&mut self, status: u16) {
        self.outcome = AuditOutcome::Failure {
            description: format!("Status code: {status}"),
        };
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Delivers one record.
    async fn send(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Writes audit records as structured log events on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn send(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let payload = serde_json::to_string(record)?;
        tracing::info!(target: "audit", record = %payload, "audit");
        Ok(())
    }
}

/// Keeps records in memory. Used by tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    fail: bool,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every record.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn send(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Unavailable("memory sink configured to fail".into()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuditRecord {
        AuditRecord {
            operation_name: "PUT /subscriptions/x".into(),
            caller_ip: None,
            caller_identities: vec![CallerIdentity::object_id("oid")],
            request_id: Uuid::nil(),
            correlation_request_id: String::new(),
            timestamp: Utc::now(),
            outcome: AuditOutcome::Pending,
        }
    }

    #[test]
    fn test_outcome_transitions() {
        let mut r = record();
        r.succeed();
        assert_eq!(r.outcome, AuditOutcome::Success);
        r.fail(409);
        assert_eq!(
            r.outcome,
            AuditOutcome::Failure {
                description: "Status code: 409".into()
            }
        );
    }

    #[test]
    fn test_record_serializes_outcome_inline() {
        let mut r = record();
        r.fail(500);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["result"], "failure");
        assert_eq!(json["description"], "Status code: 500");
        assert_eq!(json["callerIdentities"][0]["kind"], "ObjectID");
        assert!(json.get("callerIp").is_none());
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        sink.send(&record()).await.unwrap();
        assert_eq!(sink.records().len(), 1);

        let failing = MemoryAuditSink::failing();
        assert!(failing.send(&record()).await.is_err());
        assert!(failing.records().is_empty());
    }
}
