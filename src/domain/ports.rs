use super::course_key::CourseKey;
use super::models::{CreditCourse, CreditProvider, UserProfile};
use super::request::{CreditRequest, CreditRequestHistory, RequestStatus};
use super::requirement::{CreditEligibility, CreditRequirement, CreditRequirementStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Store for the configuration entities: courses, providers and their
/// requirement definitions.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn store_course(&self, course: CreditCourse) -> Result<()>;
    async fn find_course(&self, course_key: &CourseKey) -> Result<Option<CreditCourse>>;
    async fn store_provider(&self, provider: CreditProvider) -> Result<()>;
    async fn find_provider(&self, provider_id: &str) -> Result<Option<CreditProvider>>;
    /// Upsert keyed by (course, namespace, name).
    async fn store_requirement(&self, requirement: CreditRequirement) -> Result<()>;
    /// Active requirements for a course, optionally filtered by namespace,
    /// ordered by (namespace, name).
    async fn course_requirements(
        &self,
        course_key: &CourseKey,
        namespace: Option<&str>,
    ) -> Result<Vec<CreditRequirement>>;
    /// Single active requirement lookup.
    async fn find_requirement(
        &self,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CreditRequirement>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn store_profile(&self, profile: UserProfile) -> Result<()>;
    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>>;
}

/// Store for the per-user derived state: requirement statuses and the
/// eligibility rows computed from them.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upsert keyed by (username, course, namespace, name).
    async fn upsert_status(&self, status: CreditRequirementStatus) -> Result<()>;
    async fn statuses_for_user(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequirementStatus>>;
    async fn find_status(
        &self,
        username: &str,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CreditRequirementStatus>>;
    /// Get-or-create on (username, course); an existing row is left alone so
    /// the original creation time survives.
    async fn store_eligibility(&self, eligibility: CreditEligibility) -> Result<()>;
    async fn find_eligibility(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Option<CreditEligibility>>;
    async fn eligibilities_for_user(&self, username: &str) -> Result<Vec<CreditEligibility>>;
}

/// Store for credit requests and their history.
///
/// `get_or_create_request`, `reissue_request` and `transition_request` are
/// the operations racing callers can hit concurrently; implementations must
/// make each of them a single atomic step so the idempotent-UUID invariant
/// holds and status updates are never lost.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Atomic get-or-create keyed by (course, provider, username). Returns
    /// the stored request and whether it was newly created.
    async fn get_or_create_request(&self, fresh: CreditRequest) -> Result<(CreditRequest, bool)>;
    /// Atomically rewrites a pending request's parameters snapshot and
    /// appends the matching history row. Fails with `RequestAlreadyCompleted`
    /// when a provider response has landed since the request was read, so a
    /// stale snapshot can never erase a terminal status.
    async fn reissue_request(&self, request: CreditRequest) -> Result<()>;
    /// Atomic read-validate-write of the status field, appending a history
    /// entry when the status actually changes. Returns the old status and the
    /// updated request, or `None` when no request matches. Fails with
    /// `RequestAlreadyCompleted` when the stored status is terminal and
    /// differs from `next`.
    async fn transition_request(
        &self,
        uuid: &str,
        provider_id: &str,
        next: RequestStatus,
    ) -> Result<Option<(RequestStatus, CreditRequest)>>;
    /// All requests initiated by the user, newest first.
    async fn requests_for_user(&self, username: &str) -> Result<Vec<CreditRequest>>;
    /// The user's requests for one course, newest first.
    async fn requests_for_user_course(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequest>>;
    /// Every stored request, ordered by (username, course, provider).
    async fn all_requests(&self) -> Result<Vec<CreditRequest>>;
    /// History rows in revision order.
    async fn request_history(&self, uuid: &str) -> Result<Vec<CreditRequestHistory>>;
}

pub type CourseStoreBox = Box<dyn CourseStore>;
pub type ProfileStoreBox = Box<dyn ProfileStore>;
pub type StatusStoreBox = Box<dyn StatusStore>;
pub type RequestStoreBox = Box<dyn RequestStore>;
