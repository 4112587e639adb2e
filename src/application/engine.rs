use crate::application::signature::{self, SecretKeys};
use crate::domain::course_key::CourseKey;
use crate::domain::models::{
    CreditCourse, CreditProvider, EligibilitySummary, ProviderInfo, UserProfile,
};
use crate::domain::ports::{CourseStoreBox, ProfileStoreBox, RequestStoreBox, StatusStoreBox};
use crate::domain::request::{
    CreditRequest, CreditRequestHistory, RequestDescriptor, RequestMethod, RequestStatus,
};
use crate::domain::requirement::{
    CreditEligibility, CreditRequirement, CreditRequirementStatus, GRADE_NAME, GRADE_NAMESPACE,
    RequirementSpec, RequirementStatus, RequirementStatusView,
};
use crate::error::{CreditError, Result};
use chrono::Utc;
use serde_json::{Map, Value};

/// The main entry point for the credit workflow.
///
/// `CreditEngine` owns the storage backends and orchestrates requirement
/// configuration, per-user eligibility, and the credit-request lifecycle
/// against an external provider.
pub struct CreditEngine {
    courses: CourseStoreBox,
    profiles: ProfileStoreBox,
    statuses: StatusStoreBox,
    requests: RequestStoreBox,
    secrets: SecretKeys,
}

impl CreditEngine {
    pub fn new(
        courses: CourseStoreBox,
        profiles: ProfileStoreBox,
        statuses: StatusStoreBox,
        requests: RequestStoreBox,
        secrets: SecretKeys,
    ) -> Self {
        Self {
            courses,
            profiles,
            statuses,
            requests,
            secrets,
        }
    }

    // --- configuration -----------------------------------------------------

    pub async fn configure_course(&self, course: CreditCourse) -> Result<()> {
        self.courses.store_course(course).await
    }

    pub async fn configure_provider(&self, provider: CreditProvider) -> Result<()> {
        self.courses.store_provider(provider).await
    }

    pub async fn add_user_profile(&self, profile: UserProfile) -> Result<()> {
        self.profiles.store_profile(profile).await
    }

    /// Replaces the active requirement set for a course.
    ///
    /// Requirements present before but absent from `specs` are deactivated,
    /// not deleted, so their status history survives. Duplicate
    /// (namespace, name) pairs in the input deduplicate with the last
    /// criteria winning.
    pub async fn set_credit_requirements(
        &self,
        course_key: &CourseKey,
        specs: &[RequirementSpec],
    ) -> Result<()> {
        let mut problems = Vec::new();
        for (index, spec) in specs.iter().enumerate() {
            let missing = spec.missing_parameters();
            if !missing.is_empty() {
                problems.push(format!(
                    "requirement {index} has missing or invalid parameters: {}",
                    missing.join(", ")
                ));
            }
        }
        if !problems.is_empty() {
            return Err(CreditError::InvalidCreditRequirements(problems.join("; ")));
        }

        let course = self
            .courses
            .find_course(course_key)
            .await?
            .filter(|course| course.enabled)
            .ok_or_else(|| CreditError::InvalidCreditCourse(course_key.to_string()))?;

        let existing = self.courses.course_requirements(course_key, None).await?;
        for old in existing {
            let kept = specs
                .iter()
                .any(|spec| spec.namespace == old.namespace && spec.name == old.name);
            if !kept {
                self.courses
                    .store_requirement(CreditRequirement {
                        active: false,
                        ..old
                    })
                    .await?;
            }
        }

        for spec in specs {
            self.courses
                .store_requirement(CreditRequirement {
                    course_key: course.course_key.clone(),
                    namespace: spec.namespace.clone(),
                    name: spec.name.clone(),
                    display_name: spec.display_name.clone(),
                    criteria: spec.criteria.clone().unwrap_or_default(),
                    active: true,
                })
                .await?;
        }
        Ok(())
    }

    /// Active requirements for a course, optionally limited to a namespace.
    pub async fn get_credit_requirements(
        &self,
        course_key: &CourseKey,
        namespace: Option<&str>,
    ) -> Result<Vec<CreditRequirement>> {
        self.courses.course_requirements(course_key, namespace).await
    }

    pub async fn get_credit_requirement(
        &self,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CreditRequirement>> {
        self.courses.find_requirement(course_key, namespace, name).await
    }

    pub async fn is_credit_course(&self, course_key: &CourseKey) -> Result<bool> {
        Ok(self
            .courses
            .find_course(course_key)
            .await?
            .is_some_and(|course| course.enabled))
    }

    // --- requirement statuses and eligibility ------------------------------

    /// Records a user's standing against one requirement.
    ///
    /// This is the entry point for the grading and assessment subsystems.
    /// When the write leaves every active requirement satisfied, the
    /// eligibility row is persisted; eligibility reads never recompute it.
    pub async fn set_requirement_status(
        &self,
        username: &str,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
        status: RequirementStatus,
        reason: Option<Value>,
    ) -> Result<()> {
        let requirement = self
            .courses
            .find_requirement(course_key, namespace, name)
            .await?
            .ok_or_else(|| {
                CreditError::InvalidCreditRequirements(format!(
                    "no active requirement {namespace}/{name} for course {course_key}"
                ))
            })?;

        self.statuses
            .upsert_status(CreditRequirementStatus {
                username: username.to_string(),
                course_key: course_key.clone(),
                namespace: requirement.namespace,
                name: requirement.name,
                status,
                reason,
                modified: Utc::now(),
            })
            .await?;

        if status == RequirementStatus::Satisfied && self.all_satisfied(username, course_key).await? {
            self.statuses
                .store_eligibility(CreditEligibility {
                    username: username.to_string(),
                    course_key: course_key.clone(),
                    created: Utc::now(),
                })
                .await?;
            tracing::info!(%username, %course_key, "user is now eligible for credit");
        }
        Ok(())
    }

    async fn all_satisfied(&self, username: &str, course_key: &CourseKey) -> Result<bool> {
        let requirements = self.courses.course_requirements(course_key, None).await?;
        let statuses = self.statuses.statuses_for_user(username, course_key).await?;
        Ok(requirements.iter().all(|requirement| {
            statuses.iter().any(|status| {
                status.namespace == requirement.namespace
                    && status.name == requirement.name
                    && status.status == RequirementStatus::Satisfied
            })
        }))
    }

    /// The user's standing for every active requirement in the course.
    pub async fn get_requirement_statuses(
        &self,
        course_key: &CourseKey,
        username: &str,
    ) -> Result<Vec<RequirementStatusView>> {
        let requirements = self.courses.course_requirements(course_key, None).await?;
        let statuses = self.statuses.statuses_for_user(username, course_key).await?;
        Ok(requirements
            .into_iter()
            .map(|requirement| {
                let status = statuses.iter().find(|status| {
                    status.namespace == requirement.namespace && status.name == requirement.name
                });
                RequirementStatusView {
                    namespace: requirement.namespace,
                    name: requirement.name,
                    display_name: requirement.display_name,
                    criteria: requirement.criteria,
                    status: status.map(|s| s.status),
                    status_date: status.map(|s| s.modified),
                }
            })
            .collect())
    }

    /// Reads the precomputed eligibility flag; never recomputes it from the
    /// individual requirement statuses.
    pub async fn is_user_eligible(&self, username: &str, course_key: &CourseKey) -> Result<bool> {
        Ok(self
            .statuses
            .find_eligibility(username, course_key)
            .await?
            .is_some())
    }

    /// Per-course summary of each eligibility the user has earned.
    pub async fn get_credit_eligibilities(
        &self,
        username: &str,
    ) -> Result<Vec<EligibilitySummary>> {
        let eligibilities = self.statuses.eligibilities_for_user(username).await?;
        let requests = self.requests.requests_for_user(username).await?;

        let mut summaries = Vec::with_capacity(eligibilities.len());
        for eligibility in eligibilities {
            let mut providers = Vec::new();
            if let Some(course) = self.courses.find_course(&eligibility.course_key).await? {
                for provider_id in &course.providers {
                    if let Some(provider) = self.courses.find_provider(provider_id).await? {
                        providers.push(ProviderInfo::from(&provider));
                    }
                }
            }
            let seconds_good_for_display = providers
                .iter()
                .filter_map(|provider| provider.eligibility_duration)
                .max()
                .unwrap_or(0);
            // requests are newest first, so the first match is the latest.
            let request_status = requests
                .iter()
                .find(|request| request.course_key == eligibility.course_key)
                .map(|request| request.status);
            summaries.push(EligibilitySummary {
                course_key: eligibility.course_key,
                created: eligibility.created,
                providers,
                seconds_good_for_display,
                request_status,
            });
        }
        Ok(summaries)
    }

    // --- credit requests ----------------------------------------------------

    /// Initiates a request for credit from a provider.
    ///
    /// Only eligible users may request credit. For providers without
    /// automatic integration this returns a plain GET link and records
    /// nothing, since no callback would ever move the request out of
    /// pending. With integration enabled, the request is persisted under a
    /// UUID that is stable until the provider responds, and the returned
    /// parameters are signed with the provider's shared secret.
    pub async fn create_credit_request(
        &self,
        course_key: &CourseKey,
        provider_id: &str,
        username: &str,
    ) -> Result<RequestDescriptor> {
        if self
            .statuses
            .find_eligibility(username, course_key)
            .await?
            .is_none()
        {
            tracing::warn!(
                %username,
                %course_key,
                "user tried to initiate a credit request but is not eligible"
            );
            return Err(self.not_eligible(username, course_key));
        }

        let course_lists_provider = self
            .courses
            .find_course(course_key)
            .await?
            .is_some_and(|course| course.providers.iter().any(|id| id == provider_id));
        let provider = match self.courses.find_provider(provider_id).await? {
            Some(provider) if course_lists_provider => provider,
            _ => {
                tracing::warn!(
                    %username,
                    %course_key,
                    provider_id,
                    "credit request for a provider not associated with the course"
                );
                return Err(self.not_eligible(username, course_key));
            }
        };

        // Without automatic integration the user visits the provider
        // directly; we never hear back, so no record is kept.
        if !provider.enable_integration {
            return Ok(RequestDescriptor {
                url: provider.provider_url,
                method: RequestMethod::Get,
                parameters: Value::Object(Map::new()),
            });
        }

        // Resolve the shared secret before touching the request table, so a
        // misconfigured provider leaves no request behind that was never
        // actually sent.
        let secret = self.secrets.get(provider_id).ok_or_else(|| {
            tracing::error!(provider_id, "credit provider has no secret key configured");
            CreditError::CreditProviderNotConfigured(provider_id.to_string())
        })?;

        let final_grade = self.satisfied_final_grade(username, course_key).await?;
        let profile = self
            .profiles
            .find_profile(username)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(username.to_string()))?;

        let fresh = CreditRequest::new(course_key.clone(), provider_id, username);
        let (mut request, created) = self.requests.get_or_create_request(fresh).await?;
        if !created && request.status != RequestStatus::Pending {
            tracing::warn!(
                uuid = %request.uuid,
                status = %request.status,
                "cannot initiate credit request, a completed request exists"
            );
            return Err(CreditError::RequestAlreadyCompleted(request.uuid));
        }

        // Regenerate the parameters even when reusing a pending request, so
        // a retried request reflects updated profile data. The rewrite is
        // atomic and fails if a provider response landed in the meantime.
        let parameters = signature::build_parameters(&request, course_key, final_grade, &profile);
        request.parameters = Value::Object(parameters.clone());
        self.requests.reissue_request(request.clone()).await?;

        if created {
            tracing::info!(uuid = %request.uuid, "created new request for credit");
        } else {
            tracing::info!(
                uuid = %request.uuid,
                "updated request for credit so the user can re-issue it"
            );
        }

        let mut signed = parameters;
        let digest = signature::sign(&signed, secret);
        signed.insert("signature".into(), Value::String(digest));
        Ok(RequestDescriptor {
            url: provider.provider_url,
            method: RequestMethod::Post,
            parameters: Value::Object(signed),
        })
    }

    async fn satisfied_final_grade(&self, username: &str, course_key: &CourseKey) -> Result<f64> {
        let grade = self
            .statuses
            .find_status(username, course_key, GRADE_NAMESPACE, GRADE_NAME)
            .await?
            .filter(|status| status.status == RequirementStatus::Satisfied)
            .and_then(|status| status.final_grade());
        grade.ok_or_else(|| {
            tracing::error!(
                %username,
                %course_key,
                "could not retrieve the final grade from the satisfied grade requirement"
            );
            self.not_eligible(username, course_key)
        })
    }

    /// Applies a provider's response to a request.
    ///
    /// Authentication of the callback is the caller's responsibility.
    /// Re-applying the same terminal status is an idempotent no-op; a
    /// conflicting terminal status fails because no transition leads out of
    /// approved or rejected.
    pub async fn update_request_status(
        &self,
        request_uuid: &str,
        provider_id: &str,
        status: &str,
    ) -> Result<()> {
        let next = match status {
            "approved" => RequestStatus::Approved,
            "rejected" => RequestStatus::Rejected,
            other => return Err(CreditError::InvalidCreditStatus(other.to_string())),
        };

        match self
            .requests
            .transition_request(request_uuid, provider_id, next)
            .await?
        {
            Some((old_status, request)) => {
                tracing::info!(
                    uuid = %request.uuid,
                    provider_id,
                    from = %old_status,
                    to = %request.status,
                    "updated credit request status"
                );
                Ok(())
            }
            None => {
                tracing::warn!(
                    uuid = request_uuid,
                    provider_id,
                    "provider attempted to update an unknown credit request"
                );
                Err(CreditError::CreditRequestNotFound {
                    uuid: request_uuid.to_string(),
                    provider_id: provider_id.to_string(),
                })
            }
        }
    }

    /// The user's requests for a course, newest first.
    pub async fn get_request_status(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequest>> {
        self.requests
            .requests_for_user_course(username, course_key)
            .await
    }

    /// All requests the user has initiated, newest first; empty when none.
    pub async fn get_requests_for_user(&self, username: &str) -> Result<Vec<CreditRequest>> {
        self.requests.requests_for_user(username).await
    }

    pub async fn get_request_history(&self, uuid: &str) -> Result<Vec<CreditRequestHistory>> {
        self.requests.request_history(uuid).await
    }

    /// Consumes the engine and returns every stored request for reporting.
    pub async fn into_results(self) -> Result<Vec<CreditRequest>> {
        self.requests.all_requests().await
    }

    fn not_eligible(&self, username: &str, course_key: &CourseKey) -> CreditError {
        CreditError::UserIsNotEligible {
            username: username.to_string(),
            course_key: course_key.to_string(),
        }
    }
}
