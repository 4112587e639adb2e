use super::course_key::CourseKey;
use crate::error::CreditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Namespace and name of the grading requirement whose reason payload carries
/// the user's final grade.
pub const GRADE_NAMESPACE: &str = "grade";
pub const GRADE_NAME: &str = "grade";

/// One gating criterion a user must satisfy before becoming eligible for
/// credit in a course. Unique per (course, namespace, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRequirement {
    pub course_key: CourseKey,
    pub namespace: String,
    pub name: String,
    pub display_name: String,
    /// Opaque structured criteria, e.g. `{"min_grade": 0.8}`.
    pub criteria: Value,
    /// Inactive requirements are kept so their status history survives.
    pub active: bool,
}

/// Caller-supplied requirement definition, validated before being applied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequirementSpec {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub criteria: Option<Value>,
}

impl RequirementSpec {
    /// Names of the missing or empty parameters, if any.
    pub fn missing_parameters(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.namespace.is_empty() {
            missing.push("namespace");
        }
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.display_name.is_empty() {
            missing.push("display_name");
        }
        if self.criteria.is_none() {
            missing.push("criteria");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementStatus {
    Pending,
    Satisfied,
    Failed,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Satisfied => "satisfied",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

impl FromStr for RequirementStatus {
    type Err = CreditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "satisfied" => Ok(Self::Satisfied),
            "failed" => Ok(Self::Failed),
            other => Err(CreditError::InvalidCreditStatus(other.to_string())),
        }
    }
}

/// A user's standing against one requirement. One row per
/// (username, course, namespace, name); written by the grading and
/// assessment subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRequirementStatus {
    pub username: String,
    pub course_key: CourseKey,
    pub namespace: String,
    pub name: String,
    pub status: RequirementStatus,
    /// Opaque structured reason, e.g. `{"final_grade": 0.95}`.
    pub reason: Option<Value>,
    pub modified: DateTime<Utc>,
}

impl CreditRequirementStatus {
    /// The final grade recorded in the reason payload, if present.
    pub fn final_grade(&self) -> Option<f64> {
        self.reason.as_ref()?.get("final_grade")?.as_f64()
    }
}

/// Marks that a user has satisfied every active requirement for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEligibility {
    pub username: String,
    pub course_key: CourseKey,
    pub created: DateTime<Utc>,
}

/// A requirement joined with the user's status for it, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementStatusView {
    pub namespace: String,
    pub name: String,
    pub display_name: String,
    pub criteria: Value,
    pub status: Option<RequirementStatus>,
    pub status_date: Option<DateTime<Utc>>,
}
