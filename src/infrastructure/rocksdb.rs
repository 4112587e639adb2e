use crate::domain::course_key::CourseKey;
use crate::domain::models::{CreditCourse, CreditProvider, UserProfile};
use crate::domain::ports::{CourseStore, ProfileStore, RequestStore, StatusStore};
use crate::domain::request::{CreditRequest, CreditRequestHistory, RequestStatus};
use crate::domain::requirement::{CreditEligibility, CreditRequirement, CreditRequirementStatus};
use crate::error::{CreditError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_COURSES: &str = "courses";
pub const CF_PROVIDERS: &str = "providers";
pub const CF_REQUIREMENTS: &str = "requirements";
pub const CF_PROFILES: &str = "profiles";
pub const CF_STATUSES: &str = "statuses";
pub const CF_ELIGIBILITY: &str = "eligibility";
pub const CF_REQUESTS: &str = "requests";
pub const CF_REQUEST_INDEX: &str = "request_index";
pub const CF_REQUEST_HISTORY: &str = "request_history";

/// Separator for composite keys. Course keys, usernames and provider ids
/// never contain this byte.
const SEP: char = '\x1f';

/// A persistent store implementation using RocksDB.
///
/// One column family per table from the relational model, with JSON-encoded
/// values. Requests are keyed by their (course, provider, username) triple;
/// a UUID index column family supports the provider-callback lookup.
///
/// `Clone` shares the underlying `Arc<DB>`. The write gate serializes the
/// read-modify-write sections (get-or-create, status transition, history
/// append) that must be atomic.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_COURSES,
            CF_PROVIDERS,
            CF_REQUIREMENTS,
            CF_PROFILES,
            CF_STATUSES,
            CF_ELIGIBILITY,
            CF_REQUESTS,
            CF_REQUEST_INDEX,
            CF_REQUEST_HISTORY,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CreditError::Storage(format!("{name} column family not found")))
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn requirement_key(course_key: &CourseKey, namespace: &str, name: &str) -> String {
        format!("{course_key}{SEP}{namespace}{SEP}{name}")
    }

    fn status_key(username: &str, course_key: &CourseKey, namespace: &str, name: &str) -> String {
        format!("{username}{SEP}{course_key}{SEP}{namespace}{SEP}{name}")
    }

    fn eligibility_key(username: &str, course_key: &CourseKey) -> String {
        format!("{username}{SEP}{course_key}")
    }

    fn request_key(request: &CreditRequest) -> String {
        format!(
            "{}{SEP}{}{SEP}{}",
            request.course_key, request.provider_id, request.username
        )
    }

    /// Resolves a UUID to its stored request via the index column family.
    fn request_by_uuid(&self, uuid: &str) -> Result<Option<CreditRequest>> {
        let index_cf = self.cf(CF_REQUEST_INDEX)?;
        let Some(key) = self.db.get_cf(index_cf, uuid.as_bytes())? else {
            return Ok(None);
        };
        let key = String::from_utf8(key)
            .map_err(|_| CreditError::Storage("request index key is not UTF-8".into()))?;
        self.get_json(CF_REQUESTS, &key)
    }

    fn append_history_entry(
        &self,
        uuid: &str,
        status: RequestStatus,
        parameters: serde_json::Value,
    ) -> Result<u32> {
        let mut entries: Vec<CreditRequestHistory> =
            self.get_json(CF_REQUEST_HISTORY, uuid)?.unwrap_or_default();
        let revision = entries.len() as u32 + 1;
        entries.push(CreditRequestHistory {
            uuid: uuid.to_string(),
            revision,
            status,
            parameters,
            created: Utc::now(),
        });
        self.put_json(CF_REQUEST_HISTORY, uuid, &entries)?;
        Ok(revision)
    }
}

#[async_trait]
impl CourseStore for RocksDBStore {
    async fn store_course(&self, course: CreditCourse) -> Result<()> {
        self.put_json(CF_COURSES, &course.course_key.to_string(), &course)
    }

    async fn find_course(&self, course_key: &CourseKey) -> Result<Option<CreditCourse>> {
        self.get_json(CF_COURSES, &course_key.to_string())
    }

    async fn store_provider(&self, provider: CreditProvider) -> Result<()> {
        let key = provider.provider_id.clone();
        self.put_json(CF_PROVIDERS, &key, &provider)
    }

    async fn find_provider(&self, provider_id: &str) -> Result<Option<CreditProvider>> {
        self.get_json(CF_PROVIDERS, provider_id)
    }

    async fn store_requirement(&self, requirement: CreditRequirement) -> Result<()> {
        let key = Self::requirement_key(
            &requirement.course_key,
            &requirement.namespace,
            &requirement.name,
        );
        self.put_json(CF_REQUIREMENTS, &key, &requirement)
    }

    async fn course_requirements(
        &self,
        course_key: &CourseKey,
        namespace: Option<&str>,
    ) -> Result<Vec<CreditRequirement>> {
        let mut matching: Vec<CreditRequirement> = self
            .scan_json::<CreditRequirement>(CF_REQUIREMENTS)?
            .into_iter()
            .filter(|req| {
                req.active
                    && req.course_key == *course_key
                    && namespace.is_none_or(|ns| req.namespace == ns)
            })
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
        let key = Self::requirement_key(course_key, namespace, name);
        Ok(self
            .get_json::<CreditRequirement>(CF_REQUIREMENTS, &key)?
            .filter(|req| req.active))
    }
}

#[async_trait]
impl ProfileStore for RocksDBStore {
    async fn store_profile(&self, profile: UserProfile) -> Result<()> {
        let key = profile.username.clone();
        self.put_json(CF_PROFILES, &key, &profile)
    }

    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>> {
        self.get_json(CF_PROFILES, username)
    }
}

#[async_trait]
impl StatusStore for RocksDBStore {
    async fn upsert_status(&self, status: CreditRequirementStatus) -> Result<()> {
        let key = Self::status_key(
            &status.username,
            &status.course_key,
            &status.namespace,
            &status.name,
        );
        self.put_json(CF_STATUSES, &key, &status)
    }

    async fn statuses_for_user(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequirementStatus>> {
        let mut matching: Vec<CreditRequirementStatus> = self
            .scan_json::<CreditRequirementStatus>(CF_STATUSES)?
            .into_iter()
            .filter(|status| status.username == username && status.course_key == *course_key)
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
        let key = Self::status_key(username, course_key, namespace, name);
        self.get_json(CF_STATUSES, &key)
    }

    async fn store_eligibility(&self, eligibility: CreditEligibility) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let key = Self::eligibility_key(&eligibility.username, &eligibility.course_key);
        if self.get_json::<CreditEligibility>(CF_ELIGIBILITY, &key)?.is_none() {
            self.put_json(CF_ELIGIBILITY, &key, &eligibility)?;
        }
        Ok(())
    }

    async fn find_eligibility(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Option<CreditEligibility>> {
        let key = Self::eligibility_key(username, course_key);
        self.get_json(CF_ELIGIBILITY, &key)
    }

    async fn eligibilities_for_user(&self, username: &str) -> Result<Vec<CreditEligibility>> {
        let mut matching: Vec<CreditEligibility> = self
            .scan_json::<CreditEligibility>(CF_ELIGIBILITY)?
            .into_iter()
            .filter(|row| row.username == username)
            .collect();
        matching.sort_by(|a, b| a.course_key.cmp(&b.course_key));
        Ok(matching)
    }
}

#[async_trait]
impl RequestStore for RocksDBStore {
    async fn get_or_create_request(&self, fresh: CreditRequest) -> Result<(CreditRequest, bool)> {
        let _gate = self.write_gate.lock().await;
        let key = Self::request_key(&fresh);
        if let Some(existing) = self.get_json::<CreditRequest>(CF_REQUESTS, &key)? {
            return Ok((existing, false));
        }
        self.put_json(CF_REQUESTS, &key, &fresh)?;
        let index_cf = self.cf(CF_REQUEST_INDEX)?;
        self.db
            .put_cf(index_cf, fresh.uuid.as_bytes(), key.as_bytes())?;
        Ok((fresh, true))
    }

    async fn reissue_request(&self, request: CreditRequest) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let key = Self::request_key(&request);
        let Some(mut stored) = self.get_json::<CreditRequest>(CF_REQUESTS, &key)? else {
            return Err(CreditError::CreditRequestNotFound {
                uuid: request.uuid,
                provider_id: request.provider_id,
            });
        };
        // A terminal status may have landed since the request was read; the
        // stale snapshot must not overwrite it.
        if stored.status != RequestStatus::Pending {
            return Err(CreditError::RequestAlreadyCompleted(stored.uuid));
        }
        stored.parameters = request.parameters;
        self.put_json(CF_REQUESTS, &key, &stored)?;
        self.append_history_entry(&stored.uuid, stored.status, stored.parameters.clone())?;
        Ok(())
    }

    async fn transition_request(
        &self,
        uuid: &str,
        provider_id: &str,
        next: RequestStatus,
    ) -> Result<Option<(RequestStatus, CreditRequest)>> {
        let _gate = self.write_gate.lock().await;
        let Some(mut request) = self.request_by_uuid(uuid)? else {
            return Ok(None);
        };
        if request.provider_id != provider_id {
            return Ok(None);
        }

        let old_status = request.status;
        if old_status == next {
            return Ok(Some((old_status, request)));
        }
        if !old_status.can_transition_to(next) {
            return Err(CreditError::RequestAlreadyCompleted(uuid.to_string()));
        }
        request.status = next;
        let key = Self::request_key(&request);
        self.put_json(CF_REQUESTS, &key, &request)?;
        self.append_history_entry(uuid, next, request.parameters.clone())?;
        Ok(Some((old_status, request)))
    }

    async fn requests_for_user(&self, username: &str) -> Result<Vec<CreditRequest>> {
        let mut matching: Vec<CreditRequest> = self
            .scan_json::<CreditRequest>(CF_REQUESTS)?
            .into_iter()
            .filter(|request| request.username == username)
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.uuid.cmp(&a.uuid)));
        Ok(matching)
    }

    async fn requests_for_user_course(
        &self,
        username: &str,
        course_key: &CourseKey,
    ) -> Result<Vec<CreditRequest>> {
        let mut matching: Vec<CreditRequest> = self
            .scan_json::<CreditRequest>(CF_REQUESTS)?
            .into_iter()
            .filter(|request| request.username == username && request.course_key == *course_key)
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.uuid.cmp(&a.uuid)));
        Ok(matching)
    }

    async fn all_requests(&self) -> Result<Vec<CreditRequest>> {
        let mut all = self.scan_json::<CreditRequest>(CF_REQUESTS)?;
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
        Ok(self.get_json(CF_REQUEST_HISTORY, uuid)?.unwrap_or_default())
    }
}
