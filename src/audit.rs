use chrono::{SecondsFormat, Utc};

use super::evaluator::Decision;
use super::structs::{Identity, Request};
use super::Result;

/// A record of a single authorization decision
///
/// Serialized as a single json line for audit logs.
#[derive(Serialize, Clone, Debug)]
pub struct AuditEvent {
    /// RFC 3339
    pub timestamp: String,
    pub user: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    pub request: Request,
    pub allowed: bool,
    /// Human readable explanation of the granting rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub generation: u64,
}

impl AuditEvent {
    pub fn new(identity: &Identity, req: &Request, decision: &Decision) -> Self {
        AuditEvent {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user: identity.subject.to_string(),
            groups: identity.groups.iter().cloned().collect(),
            request: req.clone(),
            allowed: decision.allowed,
            reason: decision.reason.as_ref().map(|r| r.to_string()),
            diagnostics: decision.diagnostics.iter().map(|d| d.to_string()).collect(),
            generation: decision.generation,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
