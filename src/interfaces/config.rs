use crate::application::engine::CreditEngine;
use crate::domain::course_key::CourseKey;
use crate::domain::models::{CreditCourse, CreditProvider, UserProfile};
use crate::domain::requirement::RequirementSpec;
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Administrative configuration loaded from a JSON setup file: the credit
/// courses and providers, the requirement definitions per course, the known
/// user profiles, and the per-provider shared secret keys.
#[derive(Debug, Default, Deserialize)]
pub struct SetupConfig {
    #[serde(default)]
    pub courses: Vec<CreditCourse>,
    #[serde(default)]
    pub providers: Vec<CreditProvider>,
    /// Requirement specs keyed by course key string.
    #[serde(default)]
    pub requirements: HashMap<String, Vec<RequirementSpec>>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub secret_keys: HashMap<String, String>,
}

impl SetupConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_reader(File::open(path)?)?)
    }

    /// Seeds the engine with the configured entities. Providers and courses
    /// go first so requirement validation sees them.
    pub async fn apply(&self, engine: &CreditEngine) -> Result<()> {
        for provider in &self.providers {
            engine.configure_provider(provider.clone()).await?;
        }
        for course in &self.courses {
            engine.configure_course(course.clone()).await?;
        }
        for user in &self.users {
            engine.add_user_profile(user.clone()).await?;
        }
        for (raw_key, specs) in &self.requirements {
            let course_key: CourseKey = raw_key.parse()?;
            engine.set_credit_requirements(&course_key, specs).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_config_parses() {
        let config: SetupConfig = serde_json::from_value(json!({
            "courses": [{
                "course_key": "course-v1:HogwartsX+Potions101+1T2015",
                "enabled": true,
                "providers": ["hogwarts"],
            }],
            "providers": [{
                "provider_id": "hogwarts",
                "display_name": "Hogwarts School of Witchcraft and Wizardry",
                "provider_url": "https://credit.example.com/request",
                "enable_integration": true,
                "eligibility_duration": 60,
            }],
            "requirements": {
                "course-v1:HogwartsX+Potions101+1T2015": [{
                    "namespace": "grade",
                    "name": "grade",
                    "display_name": "Grade",
                    "criteria": {"min_grade": 0.8},
                }],
            },
            "users": [{
                "username": "ron",
                "email": "ron@example.com",
                "full_name": "Ron Weasley",
                "country": "US",
            }],
            "secret_keys": {"hogwarts": "931433d583c84ca7ba41784bad3232e6"},
        }))
        .unwrap();

        assert_eq!(config.courses.len(), 1);
        assert_eq!(config.providers[0].eligibility_duration, Some(60));
        assert!(config.users[0].mailing_address.is_none());
        assert_eq!(
            config.secret_keys.get("hogwarts").map(String::as_str),
            Some("931433d583c84ca7ba41784bad3232e6")
        );
    }
}
