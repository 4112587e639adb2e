use credit_engine::application::engine::CreditEngine;
use credit_engine::application::signature::SecretKeys;
use credit_engine::domain::course_key::CourseKey;
use credit_engine::domain::models::{CreditCourse, CreditProvider, UserProfile};
use credit_engine::domain::requirement::{RequirementSpec, RequirementStatus};
use credit_engine::infrastructure::in_memory::{
    InMemoryCourseStore, InMemoryProfileStore, InMemoryRequestStore, InMemoryStatusStore,
};
use serde_json::json;
use std::collections::HashMap;

pub const USERNAME: &str = "ron";
pub const PROVIDER_ID: &str = "hogwarts";
pub const PROVIDER_URL: &str = "https://credit.example.com/request";
pub const SECRET_KEY: &str = "931433d583c84ca7ba41784bad3232e6";

/// Second integrated provider, with its own secret key.
pub const OTHER_PROVIDER_ID: &str = "beauxbatons";
pub const OTHER_SECRET_KEY: &str = "ad5fe4479e2745aa8b6e171873c04d9f";

/// Attached to the course and integration-enabled, but no secret key.
pub const UNCONFIGURED_PROVIDER_ID: &str = "asu";

/// Attached to the course with automatic integration turned off.
pub const OFFLINE_PROVIDER_ID: &str = "mit";
pub const OFFLINE_PROVIDER_URL: &str = "https://mit.example.com/credit";

pub fn course_key() -> CourseKey {
    "course-v1:HogwartsX+Potions101+1T2015".parse().unwrap()
}

pub fn grade_spec(min_grade: f64) -> RequirementSpec {
    RequirementSpec {
        namespace: "grade".into(),
        name: "grade".into(),
        display_name: "Grade".into(),
        criteria: Some(json!({"min_grade": min_grade})),
    }
}

pub fn spec(namespace: &str, name: &str) -> RequirementSpec {
    RequirementSpec {
        namespace: namespace.into(),
        name: name.into(),
        display_name: name.into(),
        criteria: Some(json!({})),
    }
}

fn provider(
    provider_id: &str,
    url: &str,
    enable_integration: bool,
    eligibility_duration: Option<i64>,
) -> CreditProvider {
    CreditProvider {
        provider_id: provider_id.into(),
        display_name: format!("{provider_id} credit provider"),
        provider_url: url.into(),
        enable_integration,
        eligibility_duration,
    }
}

pub fn ron() -> UserProfile {
    UserProfile {
        username: USERNAME.into(),
        email: "ron@example.com".into(),
        full_name: "Ron Weasley".into(),
        mailing_address: None,
        country: Some("US".into()),
    }
}

/// An in-memory engine seeded with one credit course, four providers in
/// different configurations, and one user profile.
pub async fn engine() -> CreditEngine {
    let mut secrets = HashMap::new();
    secrets.insert(PROVIDER_ID.to_string(), SECRET_KEY.to_string());
    secrets.insert(OTHER_PROVIDER_ID.to_string(), OTHER_SECRET_KEY.to_string());

    let engine = CreditEngine::new(
        Box::new(InMemoryCourseStore::new()),
        Box::new(InMemoryProfileStore::new()),
        Box::new(InMemoryStatusStore::new()),
        Box::new(InMemoryRequestStore::new()),
        SecretKeys::from(secrets),
    );

    engine
        .configure_provider(provider(PROVIDER_ID, PROVIDER_URL, true, Some(31_536_000)))
        .await
        .unwrap();
    engine
        .configure_provider(provider(
            OTHER_PROVIDER_ID,
            "https://beauxbatons.example.com/request",
            true,
            Some(15_768_000),
        ))
        .await
        .unwrap();
    engine
        .configure_provider(provider(
            UNCONFIGURED_PROVIDER_ID,
            "https://asu.example.com/request",
            true,
            None,
        ))
        .await
        .unwrap();
    engine
        .configure_provider(provider(
            OFFLINE_PROVIDER_ID,
            OFFLINE_PROVIDER_URL,
            false,
            None,
        ))
        .await
        .unwrap();

    engine
        .configure_course(CreditCourse {
            course_key: course_key(),
            enabled: true,
            providers: vec![
                PROVIDER_ID.into(),
                OTHER_PROVIDER_ID.into(),
                UNCONFIGURED_PROVIDER_ID.into(),
                OFFLINE_PROVIDER_ID.into(),
            ],
        })
        .await
        .unwrap();
    engine.add_user_profile(ron()).await.unwrap();
    engine
}

/// Configures a single grade requirement and satisfies it for `ron`, which
/// makes the user eligible for credit in the fixture course.
pub async fn make_eligible(engine: &CreditEngine, final_grade: f64) {
    engine
        .set_credit_requirements(&course_key(), &[grade_spec(0.8)])
        .await
        .unwrap();
    engine
        .set_requirement_status(
            USERNAME,
            &course_key(),
            "grade",
            "grade",
            RequirementStatus::Satisfied,
            Some(json!({"final_grade": final_grade})),
        )
        .await
        .unwrap();
}
