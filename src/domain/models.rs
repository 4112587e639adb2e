use super::course_key::CourseKey;
use super::request::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course configured to offer a credit pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCourse {
    pub course_key: CourseKey,
    pub enabled: bool,
    /// Ids of the credit providers associated with this course.
    #[serde(default)]
    pub providers: Vec<String>,
}

/// An external credit-granting institution.
///
/// The shared secret key used for payload signing is deliberately not part of
/// this record; it is supplied out of band through process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditProvider {
    pub provider_id: String,
    pub display_name: String,
    pub provider_url: String,
    pub enable_integration: bool,
    /// How long (in seconds) an eligibility is good for display purposes.
    #[serde(default)]
    pub eligibility_duration: Option<i64>,
}

/// Account and profile data forwarded to the credit provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub mailing_address: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    pub provider_url: String,
    pub eligibility_duration: Option<i64>,
}

impl From<&CreditProvider> for ProviderInfo {
    fn from(provider: &CreditProvider) -> Self {
        Self {
            id: provider.provider_id.clone(),
            display_name: provider.display_name.clone(),
            provider_url: provider.provider_url.clone(),
            eligibility_duration: provider.eligibility_duration,
        }
    }
}

/// Per-course view of an eligibility a user has earned, including the
/// providers that can grant credit and the latest request status if the user
/// has already asked one of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilitySummary {
    pub course_key: CourseKey,
    pub created: DateTime<Utc>,
    pub providers: Vec<ProviderInfo>,
    /// Max `eligibility_duration` across the course's providers.
    pub seconds_good_for_display: i64,
    pub request_status: Option<RequestStatus>,
}
