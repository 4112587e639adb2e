use crate::domain::course_key::CourseKey;
use crate::domain::models::{CreditCourse, CreditProvider, UserProfile};
use crate::domain::ports::{CourseStore, ProfileStore, RequestStore, StatusStore};
use crate::domain::request::{CreditRequest, CreditRequestHistory, RequestStatus};
use crate::domain::requirement::{CreditEligibility, CreditRequirement, CreditRequirementStatus};
use crate::error::{CreditError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store for courses, providers and requirement definitions.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access. Ideal for tests
/// and single-run batch processing where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryCourseStore {
    courses: Arc<RwLock<HashMap<CourseKey, CreditCourse>>>,
    providers: Arc<RwLock<HashMap<String, CreditProvider>>>,
    requirements: Arc<RwLock<HashMap<(CourseKey, String, String), CreditRequirement>>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn store_course(&self, course: CreditCourse) -> Result<()> {
        let mut courses = self.courses.write().await;
        courses.insert(course.course_key.clone(), course);
        Ok(())
    }

    async fn find_course(&self, course_key: &CourseKey) -> Result<Option<CreditCourse>> {
        let courses = self.courses.read().await;
        Ok(courses.get(course_key).cloned())
    }

    async fn store_provider(&self, provider: CreditProvider) -> Result<()> {
        let mut providers = self.providers.write().await;
        providers.insert(provider.provider_id.clone(), provider);
        Ok(())
    }

    async fn find_provider(&self, provider_id: &str) -> Result<Option<CreditProvider>> {
        let providers = self.providers.read().await;
        Ok(providers.get(provider_id).cloned())
    }

    async fn store_requirement(&self, requirement: CreditRequirement) -> Result<()> {
        let mut requirements = self.requirements.write().await;
        let key = (
            requirement.course_key.clone(),
            requirement.namespace.clone(),
            requirement.name.clone(),
        );
        requirements.insert(key, requirement);
        Ok(())
    }

    async fn course_requirements(
        &self,
        course_key: &CourseKey,
        namespace: Option<&str>,
    ) -> Result<Vec<CreditRequirement>> {
        let requirements = self.requirements.read().await;
        let mut matching: Vec<CreditRequirement> = requirements
            .values()
            .filter(|req| {
                req.active
                    && req.course_key == *course_key
                    && namespace.is_none_or(|ns| req.namespace == ns)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(matching)
    }

    async fn find_requirement(
        &self,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CreditRequirement>> {
        let requirements = self.requirements.read().await;
        let key = (course_key.clone(), namespace.to_string(), name.to_string());
        Ok(requirements.get(&key).filter(|req| req.active).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn store_profile(&self, profile: UserProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.username.clone(), profile);
        Ok(())
    }

    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(username).cloned())
    }
}

/// In-memory store for requirement statuses and eligibility rows.
#[derive(Default, Clone)]
pub struct InMemoryStatusStore {
    statuses: Arc<RwLock<HashMap<(String, CourseKey, String, String), CreditRequirementStatus>>>,
    eligibility: Arc<RwLock<HashMap<(String, CourseKey), CreditEligibility>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn upsert_status(&self, status: CreditRequirementStatus) -> Result<()> {
        let mut statuses = self.statuses.write().await;
        let key = (
            status.username.clone(),
            status.course_key.clone(),
            status.namespace.clone(),
            status.name.clone(),
        );
        statuses.insert(key, status);
        Ok(())
    }

    async fn statuses_for_user(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequirementStatus>> {
        let statuses = self.statuses.read().await;
        let mut matching: Vec<CreditRequirementStatus> = statuses
            .values()
            .filter(|status| status.username == username && status.course_key == *course_key)
            .cloned()
            .collect();
        matching.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(matching)
    }

    async fn find_status(
        &self,
        username: &str,
        course_key: &CourseKey,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CreditRequirementStatus>> {
        let statuses = self.statuses.read().await;
        let key = (
            username.to_string(),
            course_key.clone(),
            namespace.to_string(),
            name.to_string(),
        );
        Ok(statuses.get(&key).cloned())
    }

    async fn store_eligibility(&self, eligibility: CreditEligibility) -> Result<()> {
        let mut rows = self.eligibility.write().await;
        let key = (eligibility.username.clone(), eligibility.course_key.clone());
        rows.entry(key).or_insert(eligibility);
        Ok(())
    }

    async fn find_eligibility(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Option<CreditEligibility>> {
        let rows = self.eligibility.read().await;
        Ok(rows.get(&(username.to_string(), course_key.clone())).cloned())
    }

    async fn eligibilities_for_user(&self, username: &str) -> Result<Vec<CreditEligibility>> {
        let rows = self.eligibility.read().await;
        let mut matching: Vec<CreditEligibility> = rows
            .values()
            .filter(|row| row.username == username)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.course_key.cmp(&b.course_key));
        Ok(matching)
    }
}

/// In-memory store for credit requests and their history.
///
/// Requests are keyed by their (course, provider, username) triple, which
/// makes `get_or_create_request` a single map operation under the write
/// lock.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<(CourseKey, String, String), CreditRequest>>>,
    history: Arc<RwLock<HashMap<String, Vec<CreditRequestHistory>>>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn triple(request: &CreditRequest) -> (CourseKey, String, String) {
        (
            request.course_key.clone(),
            request.provider_id.clone(),
            request.username.clone(),
        )
    }

    fn sorted_newest_first(mut requests: Vec<CreditRequest>) -> Vec<CreditRequest> {
        requests.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.uuid.cmp(&a.uuid)));
        requests
    }

    fn push_history(
        history: &mut HashMap<String, Vec<CreditRequestHistory>>,
        uuid: &str,
        status: RequestStatus,
        parameters: serde_json::Value,
    ) -> u32 {
        let entries = history.entry(uuid.to_string()).or_default();
        let revision = entries.len() as u32 + 1;
        entries.push(CreditRequestHistory {
            uuid: uuid.to_string(),
            revision,
            status,
            parameters,
            created: Utc::now(),
        });
        revision
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get_or_create_request(&self, fresh: CreditRequest) -> Result<(CreditRequest, bool)> {
        let mut requests = self.requests.write().await;
        let key = Self::triple(&fresh);
        if let Some(existing) = requests.get(&key) {
            Ok((existing.clone(), false))
        } else {
            requests.insert(key, fresh.clone());
            Ok((fresh, true))
        }
    }

    async fn reissue_request(&self, request: CreditRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        let key = Self::triple(&request);
        let Some(stored) = requests.get_mut(&key) else {
            return Err(CreditError::CreditRequestNotFound {
                uuid: request.uuid,
                provider_id: request.provider_id,
            });
        };
        // A terminal status may have landed since the request was read; the
        // stale snapshot must not overwrite it.
        if stored.status != RequestStatus::Pending {
            return Err(CreditError::RequestAlreadyCompleted(stored.uuid.clone()));
        }
        stored.parameters = request.parameters;
        let uuid = stored.uuid.clone();
        let parameters = stored.parameters.clone();

        let mut history = self.history.write().await;
        Self::push_history(&mut history, &uuid, RequestStatus::Pending, parameters);
        Ok(())
    }

    async fn transition_request(
        &self,
        uuid: &str,
        provider_id: &str,
        next: RequestStatus,
    ) -> Result<Option<(RequestStatus, CreditRequest)>> {
        let mut requests = self.requests.write().await;
        let Some(request) = requests
            .values_mut()
            .find(|request| request.uuid == uuid && request.provider_id == provider_id)
        else {
            return Ok(None);
        };

        let old_status = request.status;
        if old_status == next {
            return Ok(Some((old_status, request.clone())));
        }
        if !old_status.can_transition_to(next) {
            return Err(CreditError::RequestAlreadyCompleted(uuid.to_string()));
        }
        request.status = next;
        let snapshot = request.clone();

        let mut history = self.history.write().await;
        Self::push_history(&mut history, &snapshot.uuid, next, snapshot.parameters.clone());
        Ok(Some((old_status, snapshot)))
    }

    async fn requests_for_user(&self, username: &str) -> Result<Vec<CreditRequest>> {
        let requests = self.requests.read().await;
        Ok(Self::sorted_newest_first(
            requests
                .values()
                .filter(|request| request.username == username)
                .cloned()
                .collect(),
        ))
    }

    async fn requests_for_user_course(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequest>> {
        let requests = self.requests.read().await;
        Ok(Self::sorted_newest_first(
            requests
                .values()
                .filter(|request| {
                    request.username == username && request.course_key == *course_key
                })
                .cloned()
                .collect(),
        ))
    }

    async fn all_requests(&self) -> Result<Vec<CreditRequest>> {
        let requests = self.requests.read().await;
        let mut all: Vec<CreditRequest> = requests.values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.username, &a.course_key, &a.provider_id).cmp(&(
                &b.username,
                &b.course_key,
                &b.provider_id,
            ))
        });
        Ok(all)
    }

    async fn request_history(&self, uuid: &str) -> Result<Vec<CreditRequestHistory>> {
        let history = self.history.read().await;
        Ok(history.get(uuid).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course_key() -> CourseKey {
        "course-v1:HogwartsX+Potions101+1T2015".parse().unwrap()
    }

    #[tokio::test]
    async fn test_requirement_upsert_and_active_filter() {
        let store = InMemoryCourseStore::new();
        let requirement = CreditRequirement {
            course_key: course_key(),
            namespace: "grade".into(),
            name: "grade".into(),
            display_name: "Grade".into(),
            criteria: json!({"min_grade": 0.8}),
            active: true,
        };
        store.store_requirement(requirement.clone()).await.unwrap();

        let found = store
            .find_requirement(&course_key(), "grade", "grade")
            .await
            .unwrap();
        assert_eq!(found, Some(requirement.clone()));

        store
            .store_requirement(CreditRequirement {
                active: false,
                ..requirement
            })
            .await
            .unwrap();
        assert!(
            store
                .find_requirement(&course_key(), "grade", "grade")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .course_requirements(&course_key(), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_get_or_create_request_is_idempotent() {
        let store = InMemoryRequestStore::new();
        let first = CreditRequest::new(course_key(), "hogwarts", "ron");
        let second = CreditRequest::new(course_key(), "hogwarts", "ron");

        let (stored, created) = store.get_or_create_request(first.clone()).await.unwrap();
        assert!(created);
        assert_eq!(stored.uuid, first.uuid);

        let (reused, created) = store.get_or_create_request(second).await.unwrap();
        assert!(!created);
        assert_eq!(reused.uuid, first.uuid);
    }

    #[tokio::test]
    async fn test_transition_appends_history_once() {
        let store = InMemoryRequestStore::new();
        let request = CreditRequest::new(course_key(), "hogwarts", "ron");
        let uuid = request.uuid.clone();
        let (issued, _) = store.get_or_create_request(request).await.unwrap();
        store.reissue_request(issued).await.unwrap();

        let result = store
            .transition_request(&uuid, "hogwarts", RequestStatus::Approved)
            .await
            .unwrap();
        assert!(matches!(result, Some((RequestStatus::Pending, _))));

        // Idempotent re-application records nothing new.
        store
            .transition_request(&uuid, "hogwarts", RequestStatus::Approved)
            .await
            .unwrap();

        let history = store.request_history(&uuid).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].revision, 2);
        assert_eq!(history[1].status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn test_reissue_cannot_erase_terminal_status() {
        let store = InMemoryRequestStore::new();
        let request = CreditRequest::new(course_key(), "hogwarts", "ron");
        let (mut stale, _) = store.get_or_create_request(request).await.unwrap();

        // A provider callback lands between the read and the rewrite.
        store
            .transition_request(&stale.uuid, "hogwarts", RequestStatus::Approved)
            .await
            .unwrap();

        stale.parameters = json!({"final_grade": 0.95});
        let err = store.reissue_request(stale).await.unwrap_err();
        assert!(matches!(err, CreditError::RequestAlreadyCompleted(_)));

        let stored = store.requests_for_user("ron").await.unwrap();
        assert_eq!(stored[0].status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn test_transition_unknown_provider_is_none() {
        let store = InMemoryRequestStore::new();
        let request = CreditRequest::new(course_key(), "hogwarts", "ron");
        let uuid = request.uuid.clone();
        store.get_or_create_request(request).await.unwrap();

        let result = store
            .transition_request(&uuid, "asu", RequestStatus::Approved)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_eligibility_creation_time_survives_rewrites() {
        let store = InMemoryStatusStore::new();
        let original = CreditEligibility {
            username: "ron".into(),
            course_key: course_key(),
            created: Utc::now(),
        };
        store.store_eligibility(original.clone()).await.unwrap();
        store
            .store_eligibility(CreditEligibility {
                created: Utc::now(),
                ..original.clone()
            })
            .await
            .unwrap();

        let found = store.find_eligibility("ron", &course_key()).await.unwrap();
        assert_eq!(found.unwrap().created, original.created);
    }
}
