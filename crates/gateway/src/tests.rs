//! Router tests against the in-memory store

use crate::{create_router, AppState};
use atlas_common::{
    abstracts::{
        Abstract, AbstractSettings, AbstractStatus, Category, Owner, SubTopic, SubmissionWindow,
    },
    auth::{JwtManager, Role},
    config::AppConfig,
    InMemoryStore,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn settings() -> AbstractSettings {
    AbstractSettings {
        categories: vec![Category {
            id: "cat-cardio".into(),
            name: "Cardiology".into(),
            sub_topics: vec![SubTopic {
                id: "topic-hf".into(),
                name: "Heart failure".into(),
            }],
            reviewer_ids: vec!["rev-1".into(), "rev-2".into()],
        }],
        max_length: Some(500),
        ..AbstractSettings::default()
    }
}

fn seeded(id: &str, owner: &str, status: AbstractStatus) -> Abstract {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Abstract {
        id: id.to_string(),
        event_id: "evt-1".to_string(),
        abstract_number: None,
        title: format!("Seeded {}", id),
        authors: "A. Author".to_string(),
        author_affiliations: String::new(),
        content: "Methods and results of a seeded study.".to_string(),
        category: Some("cat-cardio".to_string()),
        sub_topic: Some("topic-hf".to_string()),
        file: None,
        owner: Owner::Registration(owner.to_string()),
        registrant: None,
        status,
        assigned_reviewers: Default::default(),
        reviews: Vec::new(),
        revision: None,
        decision_reason: None,
        registration_proof_url: None,
        registration_verified: false,
        final_file_url: None,
        created_at: created,
        updated_at: created,
    }
}

async fn app(records: Vec<Abstract>) -> Router {
    app_with(settings(), records).await
}

async fn app_with(settings: AbstractSettings, records: Vec<Abstract>) -> Router {
    let store = InMemoryStore::new()
        .with_event("evt-1", settings, records)
        .await;
    let mut config = AppConfig::default();
    config.rate_limit.enabled = false;

    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
    };
    create_router(state, Arc::new(JwtManager::new(SECRET, 3600)))
}

fn token(user: &str, role: Role) -> String {
    JwtManager::new(SECRET, 3600)
        .generate_token(user, role, Some(format!("User {}", user)), None)
        .unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, auth: Option<(&str, Role)>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user, role)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

const ADMIN: Option<(&str, Role)> = Some(("admin-1", Role::Admin));
const REGISTRANT: Option<(&str, Role)> = Some(("reg-1", Role::Registrant));

fn submission(title: &str) -> Value {
    json!({
        "title": title,
        "authors": "J. Doe, K. Roe",
        "content": "We followed 120 patients for twelve months.",
        "category": "cat-cardio",
        "subTopic": "topic-hf"
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = app(vec![]).await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = app(vec![]).await;
    let (status, body) = call(&app, Method::GET, "/api/events/evt-1/abstracts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn registrant_submits_and_lists_own() {
    let app = app(vec![seeded("other", "reg-9", AbstractStatus::Submitted)]).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts",
        REGISTRANT,
        Some(submission("Early mobilisation after surgery")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["abstractNumber"], 1);

    let (status, body) = call(&app, Method::GET, "/api/events/evt-1/abstracts", REGISTRANT, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalItems"], 1);
    assert_eq!(body["data"]["items"][0]["title"], "Early mobilisation after surgery");
}

#[tokio::test]
async fn invalid_submission_reports_fields() {
    let app = app(vec![]).await;
    let mut payload = submission("AB");
    payload["subTopic"] = json!("topic-unknown");

    let (status, body) = call(&app, Method::POST, "/api/events/evt-1/abstracts", REGISTRANT, Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["title"][0], "Title must be at least 3 characters");
    assert_eq!(
        body["errors"]["sub_topic"][0],
        "Sub-topic does not belong to the selected category"
    );
}

#[tokio::test]
async fn unknown_status_is_not_representable() {
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::UnderReview)]).await;
    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/events/evt-1/abstracts/a1/status",
        ADMIN,
        Some(json!({"status": "published"})),
    )
    .await;
    assert!(status.is_client_error());

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/events/evt-1/abstracts/a1/status",
        ADMIN,
        Some(json!({"status": "approved", "reason": "Strong methods"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["decisionReason"], "Strong methods");
}

#[tokio::test]
async fn assignment_is_staff_only_and_idempotent() {
    let app = app(vec![
        seeded("a1", "reg-1", AbstractStatus::Pending),
        seeded("a2", "reg-2", AbstractStatus::Submitted),
    ])
    .await;
    let request = json!({"abstractIds": ["a1", "missing"], "reviewerIds": ["rev-1"]});

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts/assign-reviewers",
        REGISTRANT,
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts/assign-reviewers",
        ADMIN,
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pairs = body["data"]["pairs"].as_array().unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0]["newlyAssigned"], true);
    assert_eq!(pairs[1]["success"], false);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts/assign-reviewers",
        ADMIN,
        Some(request),
    )
    .await;
    assert_eq!(body["data"]["pairs"][0]["success"], true);
    assert_eq!(body["data"]["pairs"][0]["newlyAssigned"], false);
    assert_eq!(body["data"]["abstracts"][0]["reviewerCount"], 1);

    // reviewers only see what they are assigned to
    let (_, body) = call(
        &app,
        Method::GET,
        "/api/events/evt-1/abstracts/all-event-abstracts",
        Some(("rev-1", Role::Reviewer)),
        None,
    )
    .await;
    assert_eq!(body["data"]["totalItems"], 1);
    assert_eq!(body["data"]["items"][0]["id"], "a1");
}

#[tokio::test]
async fn auto_assign_uses_category_pool() {
    let mut uncategorized = seeded("a2", "reg-2", AbstractStatus::Submitted);
    uncategorized.category = None;
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::Submitted), uncategorized]).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts/auto-assign-reviewers",
        ADMIN,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["assignedAbstracts"], 1);
    assert_eq!(body["data"]["skippedAbstracts"], 1);
    assert_eq!(body["data"]["newAssignments"], 2);
}

#[tokio::test]
async fn one_review_per_reviewer() {
    let mut record = seeded("a1", "reg-1", AbstractStatus::UnderReview);
    record.assigned_reviewers.insert("rev-1".into());
    let app = app(vec![record]).await;
    let uri = "/api/events/evt-1/abstracts/a1/review";

    let (status, _) = call(
        &app,
        Method::POST,
        uri,
        Some(("rev-2", Role::Reviewer)),
        Some(json!({"decision": "accept", "score": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for score in [6, 8] {
        let (status, _) = call(
            &app,
            Method::POST,
            uri,
            Some(("rev-1", Role::Reviewer)),
            Some(json!({"decision": "accept", "score": score, "comments": "Clear"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = call(&app, Method::GET, "/api/events/evt-1/abstracts/a1", ADMIN, None).await;
    let reviews = body["data"]["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["score"], 8);
}

#[tokio::test]
async fn final_file_requires_verified_proof() {
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::Accepted)]).await;
    let base = "/api/events/evt-1/abstracts/a1";
    let file = json!({"url": "https://files.example.org/final.pdf"});

    let (status, body) = call(&app, Method::POST, &format!("{base}/final-file"), REGISTRANT, Some(file.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Registration must be verified before uploading the final file"
    );

    let (status, _) = call(&app, Method::PUT, &format!("{base}/verify-registration"), ADMIN, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let proof = json!({"url": "https://files.example.org/receipt.pdf"});
    let (status, body) = call(&app, Method::POST, &format!("{base}/registration-proof"), REGISTRANT, Some(proof)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registrationVerified"], false);

    let (status, body) = call(&app, Method::PUT, &format!("{base}/verify-registration"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registrationVerified"], true);

    let (status, body) = call(&app, Method::POST, &format!("{base}/final-file"), REGISTRANT, Some(file)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["finalFileUrl"], "https://files.example.org/final.pdf");
}

#[tokio::test]
async fn blank_revision_instructions_are_rejected() {
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::UnderReview)]).await;
    let uri = "/api/events/evt-1/abstracts/a1/request-revision";

    let (status, _) = call(&app, Method::POST, uri, ADMIN, Some(json!({"instructions": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::POST, uri, ADMIN, Some(json!({"instructions": "Trim the intro"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "revision-requested");
    assert_eq!(body["data"]["revision"]["instructions"], "Trim the intro");
}

#[tokio::test]
async fn export_returns_csv_attachment() {
    let mut reviewed = seeded("a1", "reg-1", AbstractStatus::Accepted);
    reviewed.final_file_url = Some("https://files.example.org/a1.pdf".into());
    let app = app(vec![reviewed, seeded("a2", "reg-2", AbstractStatus::Submitted)]).await;

    let request = Request::builder()
        .uri("/api/events/evt-1/abstracts/download?exportMode=excel-single&finalOnly=true")
        .header(header::AUTHORIZATION, format!("Bearer {}", token("admin-1", Role::Admin)))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"abstracts_evt-1_excel-single.csv\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("Seeded a1"));

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/events/evt-1/abstracts/download?exportMode=files-only",
        ADMIN,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn revision_resubmits_after_the_window_closes() {
    let closed = AbstractSettings {
        window: SubmissionWindow {
            opens_at: None,
            closes_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        },
        ..settings()
    };
    let app = app_with(
        closed,
        vec![
            seeded("a1", "reg-1", AbstractStatus::RevisionRequested),
            seeded("a2", "reg-1", AbstractStatus::Draft),
        ],
    )
    .await;

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/events/evt-1/abstracts/a1",
        REGISTRANT,
        Some(submission("Revised mobilisation study")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "revised-pending-review");

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/events/evt-1/abstracts/a2",
        REGISTRANT,
        Some(submission("Late draft")),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["message"], "Abstract submission window is closed");
}

#[tokio::test]
async fn only_the_owner_uploads_a_registration_proof() {
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::Accepted)]).await;
    let uri = "/api/events/evt-1/abstracts/a1/registration-proof";
    let proof = json!({"url": "https://files.example.org/receipt.pdf"});

    let (status, _) = call(&app, Method::POST, uri, Some(("reg-9", Role::Registrant)), Some(proof.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(&app, Method::GET, "/api/events/evt-1/abstracts/a1", ADMIN, None).await;
    assert_eq!(body["data"]["registrationProofUrl"], Value::Null);

    let (status, body) = call(&app, Method::POST, uri, REGISTRANT, Some(proof)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registrationProofUrl"], "https://files.example.org/receipt.pdf");
}

#[tokio::test]
async fn missing_abstracts_fail_the_same_pairs() {
    let app = app(vec![seeded("a1", "reg-1", AbstractStatus::Submitted)]).await;
    let request = json!({
        "abstractIds": ["a1", "missing"],
        "reviewerIds": ["rev-1", " rev-1 ", "rev-2"]
    });

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/events/evt-1/abstracts/assign-reviewers",
        ADMIN,
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pairs = body["data"]["pairs"].as_array().unwrap();
    let found = pairs.iter().filter(|p| p["abstractId"] == "a1").count();
    let missing = pairs.iter().filter(|p| p["abstractId"] == "missing").count();
    assert_eq!(found, 2);
    assert_eq!(missing, found);
}
