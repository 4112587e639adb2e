use super::course_key::CourseKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Approved and rejected are terminal; no transition leads out of them.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// `pending -> approved | rejected`, plus the idempotent self-transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || (self == Self::Pending && next.is_terminal())
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// A tracked request for credit sent to an external provider.
///
/// Unique per (course, provider, username); the UUID is fixed at creation, so
/// retrying before the provider responds reuses the same identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRequest {
    /// 32-character hex UUID shared with the provider.
    pub uuid: String,
    pub course_key: CourseKey,
    pub provider_id: String,
    pub username: String,
    pub status: RequestStatus,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the parameters last sent to the provider.
    pub parameters: Value,
}

impl CreditRequest {
    pub fn new(course_key: CourseKey, provider_id: &str, username: &str) -> Self {
        Self {
            uuid: Uuid::new_v4().simple().to_string(),
            course_key,
            provider_id: provider_id.to_string(),
            username: username.to_string(),
            status: RequestStatus::Pending,
            timestamp: Utc::now(),
            parameters: Value::Null,
        }
    }
}

/// Append-only audit row recorded every time a request is issued or changes
/// status. Keyed by UUID + revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRequestHistory {
    pub uuid: String,
    pub revision: u32,
    pub status: RequestStatus,
    pub parameters: Value,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
}

/// What the caller needs to forward the request to the provider: the
/// provider URL, the HTTP method, and the (possibly signed) parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: RequestMethod,
    pub parameters: Value,
}
