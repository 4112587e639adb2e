use thiserror::Error;

pub type Result<T> = std::result::Result<T, CreditError>;

/// Errors surfaced by the credit engine.
///
/// The first block mirrors the credit workflow's domain taxonomy; each
/// variant is a distinct, catchable condition. The remaining variants wrap
/// infrastructure failures.
#[derive(Error, Debug)]
pub enum CreditError {
    #[error("invalid credit requirements: {0}")]
    InvalidCreditRequirements(String),
    #[error("course {0} is not configured as an enabled credit course")]
    InvalidCreditCourse(String),
    #[error("user {username} is not eligible for credit in course {course_key}")]
    UserIsNotEligible {
        username: String,
        course_key: String,
    },
    #[error("credit provider {0} has no secret key configured")]
    CreditProviderNotConfigured(String),
    #[error("credit request {0} has already received a response from the provider")]
    RequestAlreadyCompleted(String),
    #[error("no credit request with UUID {uuid} is associated with provider {provider_id}")]
    CreditRequestNotFound { uuid: String, provider_id: String },
    #[error("invalid credit status {0:?}, expected \"approved\" or \"rejected\"")]
    InvalidCreditStatus(String),
    #[error("invalid course key: {0}")]
    InvalidCourseKey(String),
    #[error("no user profile found for {0}")]
    UserNotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CreditError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
