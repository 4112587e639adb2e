mod common;

use common::*;
use credit_engine::domain::course_key::CourseKey;
use credit_engine::domain::models::CreditCourse;
use credit_engine::domain::request::RequestStatus;
use credit_engine::domain::requirement::{RequirementSpec, RequirementStatus};
use credit_engine::error::CreditError;
use serde_json::json;

#[tokio::test]
async fn test_set_requirements_rejects_invalid_specs() {
    let engine = engine().await;
    let incomplete = RequirementSpec {
        namespace: "grade".into(),
        name: String::new(),
        display_name: String::new(),
        criteria: None,
    };

    let err = engine
        .set_credit_requirements(&course_key(), &[grade_spec(0.8), incomplete])
        .await
        .unwrap_err();
    match err {
        CreditError::InvalidCreditRequirements(message) => {
            assert!(message.contains("requirement 1"));
            assert!(message.contains("name"));
            assert!(message.contains("criteria"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was applied.
    let requirements = engine
        .get_credit_requirements(&course_key(), None)
        .await
        .unwrap();
    assert!(requirements.is_empty());
}

#[tokio::test]
async fn test_set_requirements_rejects_unknown_course() {
    let engine = engine().await;
    let unknown: CourseKey = "course-v1:MIT+Physics+2024".parse().unwrap();

    let err = engine
        .set_credit_requirements(&unknown, &[grade_spec(0.8)])
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::InvalidCreditCourse(_)));
}

#[tokio::test]
async fn test_set_requirements_rejects_disabled_course() {
    let engine = engine().await;
    let disabled: CourseKey = "course-v1:HogwartsX+Herbology+1T2015".parse().unwrap();
    engine
        .configure_course(CreditCourse {
            course_key: disabled.clone(),
            enabled: false,
            providers: vec![PROVIDER_ID.into()],
        })
        .await
        .unwrap();

    let err = engine
        .set_credit_requirements(&disabled, &[grade_spec(0.8)])
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::InvalidCreditCourse(_)));
}

#[tokio::test]
async fn test_requirements_replace_and_deactivate() {
    let engine = engine().await;
    engine
        .set_credit_requirements(
            &course_key(),
            &[grade_spec(0.8), spec("reverification", "midterm")],
        )
        .await
        .unwrap();
    assert_eq!(
        engine
            .get_credit_requirements(&course_key(), None)
            .await
            .unwrap()
            .len(),
        2
    );

    // Re-applying with only the grade requirement deactivates the other.
    engine
        .set_credit_requirements(&course_key(), &[grade_spec(0.9)])
        .await
        .unwrap();
    let remaining = engine
        .get_credit_requirements(&course_key(), None)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].namespace, "grade");
    assert_eq!(remaining[0].criteria, json!({"min_grade": 0.9}));

    let gone = engine
        .get_credit_requirement(&course_key(), "reverification", "midterm")
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_requirements_namespace_filter() {
    let engine = engine().await;
    engine
        .set_credit_requirements(
            &course_key(),
            &[grade_spec(0.8), spec("reverification", "midterm")],
        )
        .await
        .unwrap();

    let grades = engine
        .get_credit_requirements(&course_key(), Some("grade"))
        .await
        .unwrap();
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].name, "grade");
}

#[tokio::test]
async fn test_is_credit_course() {
    let engine = engine().await;
    assert!(engine.is_credit_course(&course_key()).await.unwrap());

    let unknown: CourseKey = "course-v1:MIT+Physics+2024".parse().unwrap();
    assert!(!engine.is_credit_course(&unknown).await.unwrap());
}

#[tokio::test]
async fn test_status_view_and_eligibility_derivation() {
    let engine = engine().await;
    engine
        .set_credit_requirements(
            &course_key(),
            &[grade_spec(0.8), spec("reverification", "midterm")],
        )
        .await
        .unwrap();

    engine
        .set_requirement_status(
            USERNAME,
            &course_key(),
            "grade",
            "grade",
            RequirementStatus::Satisfied,
            Some(json!({"final_grade": 0.95})),
        )
        .await
        .unwrap();
    assert!(!engine.is_user_eligible(USERNAME, &course_key()).await.unwrap());

    let views = engine
        .get_requirement_statuses(&course_key(), USERNAME)
        .await
        .unwrap();
    assert_eq!(views.len(), 2);
    let grade = views.iter().find(|v| v.namespace == "grade").unwrap();
    assert_eq!(grade.status, Some(RequirementStatus::Satisfied));
    assert!(grade.status_date.is_some());
    let midterm = views.iter().find(|v| v.name == "midterm").unwrap();
    assert_eq!(midterm.status, None);
    assert_eq!(midterm.status_date, None);

    engine
        .set_requirement_status(
            USERNAME,
            &course_key(),
            "reverification",
            "midterm",
            RequirementStatus::Satisfied,
            None,
        )
        .await
        .unwrap();
    assert!(engine.is_user_eligible(USERNAME, &course_key()).await.unwrap());
}

#[tokio::test]
async fn test_status_for_unknown_requirement_is_rejected() {
    let engine = engine().await;
    engine
        .set_credit_requirements(&course_key(), &[grade_spec(0.8)])
        .await
        .unwrap();

    let err = engine
        .set_requirement_status(
            USERNAME,
            &course_key(),
            "proctored_exam",
            "final",
            RequirementStatus::Satisfied,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::InvalidCreditRequirements(_)));
}

#[tokio::test]
async fn test_eligibility_summaries() {
    let engine = engine().await;
    make_eligible(&engine, 0.95).await;

    let summaries = engine.get_credit_eligibilities(USERNAME).await.unwrap();
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.course_key, course_key());
    assert_eq!(summary.providers.len(), 4);
    // Max eligibility_duration across the course's providers.
    assert_eq!(summary.seconds_good_for_display, 31_536_000);
    assert_eq!(summary.request_status, None);

    engine
        .create_credit_request(&course_key(), PROVIDER_ID, USERNAME)
        .await
        .unwrap();
    let summaries = engine.get_credit_eligibilities(USERNAME).await.unwrap();
    assert_eq!(summaries[0].request_status, Some(RequestStatus::Pending));
}
