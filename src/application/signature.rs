//! Builds and signs the parameter payload sent to a credit provider.

use crate::domain::course_key::CourseKey;
use crate::domain::models::UserProfile;
use crate::domain::request::CreditRequest;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Per-provider shared secret keys, supplied through process configuration.
#[derive(Debug, Clone, Default)]
pub struct SecretKeys(HashMap<String, String>);

impl SecretKeys {
    pub fn get(&self, provider_id: &str) -> Option<&str> {
        self.0.get(provider_id).map(String::as_str)
    }
}

impl From<HashMap<String, String>> for SecretKeys {
    fn from(keys: HashMap<String, String>) -> Self {
        Self(keys)
    }
}

/// Assembles the outbound parameter set for a credit request.
///
/// Every profile field is present as a `user_*` key; optional fields render
/// as `""` rather than being omitted. The timestamp is the request's
/// creation time, so it is strictly before "now" whenever this runs.
pub fn build_parameters(
    request: &CreditRequest,
    course_key: &CourseKey,
    final_grade: f64,
    profile: &UserProfile,
) -> Map<String, Value> {
    let mut parameters = Map::new();
    parameters.insert("request_uuid".into(), Value::String(request.uuid.clone()));
    parameters.insert(
        "timestamp".into(),
        Value::String(request.timestamp.to_rfc3339()),
    );
    parameters.insert("course_org".into(), Value::String(course_key.org.clone()));
    parameters.insert("course_num".into(), Value::String(course_key.course.clone()));
    parameters.insert("course_run".into(), Value::String(course_key.run.clone()));
    parameters.insert("final_grade".into(), Value::from(final_grade));
    parameters.insert(
        "user_username".into(),
        Value::String(profile.username.clone()),
    );
    parameters.insert("user_email".into(), Value::String(profile.email.clone()));
    parameters.insert(
        "user_full_name".into(),
        Value::String(profile.full_name.clone()),
    );
    parameters.insert(
        "user_mailing_address".into(),
        Value::String(profile.mailing_address.clone().unwrap_or_default()),
    );
    parameters.insert(
        "user_country".into(),
        Value::String(profile.country.clone().unwrap_or_default()),
    );
    parameters
}

/// Signs a parameter set with the provider's shared secret.
///
/// The canonical string is the sorted `key=value` pairs joined with `&`,
/// with any existing `signature` key excluded, fed through HMAC-SHA256 and
/// base64-encoded.
pub fn sign(parameters: &Map<String, Value>, secret: &str) -> String {
    let mut keys: Vec<&String> = parameters.keys().filter(|k| *k != "signature").collect();
    keys.sort();

    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key of any length is valid");
    let mut first = true;
    for key in keys {
        if !first {
            mac.update(b"&");
        }
        first = false;
        mac.update(key.as_bytes());
        mac.update(b"=");
        mac.update(render(&parameters[key]).as_bytes());
    }
    BASE64.encode(mac.finalize().into_bytes())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
