use crate::dns::record_types::DnsRecordType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AddRecord,
    UpdateRecord,
    DeleteRecord,
    CreateZone,
    ReloadZone,
    RestartService,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AddRecord => "add_record",
            AuditAction::UpdateRecord => "update_record",
            AuditAction::DeleteRecord => "delete_record",
            AuditAction::CreateZone => "create_zone",
            AuditAction::ReloadZone => "reload_zone",
            AuditAction::RestartService => "restart_service",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
}

/// One auditable outcome. Produced here, persisted by whoever implements [`AuditSink`].
#[derive(Debug, Clone, Serialize)]
pub struct AuditFact {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: AuditAction,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<DnsRecordType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditFact {
    fn new(user: &str, action: AuditAction, status: AuditStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user: user.to_string(),
            action,
            status,
            zone: None,
            record_type: None,
            details: None,
            error_message: None,
        }
    }

    pub fn success(user: &str, action: AuditAction) -> Self {
        Self::new(user, action, AuditStatus::Success)
    }

    pub fn failure(user: &str, action: AuditAction, error: impl ToString) -> Self {
        let mut fact = Self::new(user, action, AuditStatus::Failure);
        fact.error_message = Some(error.to_string());
        fact
    }

    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn record_type(mut self, record_type: DnsRecordType) -> Self {
        self.record_type = Some(record_type);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, fact: AuditFact);
}

/// Emits every fact as a structured event on the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, fact: AuditFact) {
        let details = fact
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();

        match fact.status {
            AuditStatus::Success => info!(
                target: "audit",
                id = %fact.id,
                user = %fact.user,
                action = fact.action.as_str(),
                zone = fact.zone.as_deref().unwrap_or(""),
                record_type = fact.record_type.map(|t| t.as_str()).unwrap_or(""),
                details = %details,
                "success"
            ),
            AuditStatus::Failure => warn!(
                target: "audit",
                id = %fact.id,
                user = %fact.user,
                action = fact.action.as_str(),
                zone = fact.zone.as_deref().unwrap_or(""),
                error = fact.error_message.as_deref().unwrap_or(""),
                "failure"
            ),
        }
    }
}

/// Keeps facts in memory; handy for callers that batch them and for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    facts: Mutex<Vec<AuditFact>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> Vec<AuditFact> {
        self.facts.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, fact: AuditFact) {
        if let Ok(mut facts) = self.facts.lock() {
            facts.push(fact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_serialization() {
        let fact = AuditFact::failure("alice", AuditAction::DeleteRecord, "Record not found")
            .zone("example.com.hosts")
            .record_type(DnsRecordType::A);
        let json = serde_json::to_value(&fact).unwrap();
        assert_eq!(json["action"], "delete_record");
        assert_eq!(json["status"], "failure");
        assert_eq!(json["record_type"], "A");
        assert_eq!(json["error_message"], "Record not found");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditFact::success("bob", AuditAction::RestartService))
            .await;
        let facts = sink.facts();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].status, AuditStatus::Success);
        assert_eq!(facts[0].user, "bob");
    }
}
