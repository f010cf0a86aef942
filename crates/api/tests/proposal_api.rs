//! HTTP-level integration tests for the proposal workflow endpoints.
//!
//! Drives the full router over the in-memory store: create, publish,
//! review, appeal, rubric scoring and the vote opened on the last step.

mod common;

use axum::http::StatusCode;
use charm_core::types::DbId;
use charm_db::ProposalStore;
use common::{body_json, build_test_app, get, post_json, put_json, TestApp};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn workflow(space_id: DbId) -> Value {
    json!({
        "spaceId": space_id,
        "title": "Community garden grant",
        "evaluations": [
            { "title": "Review", "type": "pass_fail", "requiredReviews": 2, "appealable": true },
            { "title": "Scoring", "type": "rubric" },
            {
                "title": "Community vote",
                "type": "vote",
                "voteSettings": {
                    "type": "SingleChoice",
                    "threshold": 50,
                    "options": ["Yes", "No", "Abstain"],
                    "maxChoices": 1,
                    "durationDays": 5
                }
            }
        ]
    })
}

async fn create(app: &TestApp, token: &str, body: Value) -> Value {
    let response = post_json(app, "/api/v1/proposals", token, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn evaluation_id(proposal: &Value, position: usize) -> String {
    proposal["evaluations"][position]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn submit(app: &TestApp, token: &str, proposal_id: &str, eid: &str, result: &str) -> (StatusCode, Value) {
    let response = post_json(
        app,
        &format!("/api/v1/proposals/{proposal_id}/evaluations/{eid}/submit-result"),
        token,
        json!({ "result": result }),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Test: creating a proposal returns the draft pseudo-step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_draft_with_ordered_steps() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());

    let proposal = create(&app, &author, workflow(DbId::new_v4())).await;

    assert_eq!(proposal["status"], "draft");
    assert_eq!(proposal["current_step"]["step"], "draft");
    assert_eq!(proposal["current_step"]["index"], 0);
    assert_eq!(proposal["evaluation_status"], "draft");
    let types: Vec<&str> = proposal["evaluations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["evaluation_type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["pass_fail", "rubric", "vote"]);
}

// ---------------------------------------------------------------------------
// Test: request validation rejects malformed bodies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_required_reviews_is_400() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());

    let response = post_json(
        &app,
        "/api/v1/proposals",
        &author,
        json!({
            "spaceId": DbId::new_v4(),
            "title": "Grant",
            "evaluations": [{ "title": "Review", "type": "pass_fail", "requiredReviews": 0 }]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: publishing validates the workflow and authorship
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_requires_rubric_criteria_and_authorship() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());
    let stranger = app.token(DbId::new_v4());
    let proposal = create(&app, &author, workflow(DbId::new_v4())).await;
    let id = proposal["id"].as_str().unwrap();

    let response = post_json(&app, &format!("/api/v1/proposals/{id}/publish"), &stranger, json!({})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "UNAUTHORISED_ACTION");

    let response = post_json(&app, &format!("/api/v1/proposals/{id}/publish"), &author, json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Scoring"));
}

// ---------------------------------------------------------------------------
// Test: the full review → appeal → rubric → vote flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn declined_step_is_appealed_and_workflow_reaches_vote() {
    let app = build_test_app();
    let author_id = DbId::new_v4();
    let author = app.token(author_id);
    let reviewer_a = app.token(DbId::new_v4());
    let reviewer_b = app.token(DbId::new_v4());
    let appeal_reviewer = app.token(DbId::new_v4());
    let space_id = DbId::new_v4();

    let proposal = create(&app, &author, workflow(space_id)).await;
    let id = proposal["id"].as_str().unwrap().to_string();
    let review = evaluation_id(&proposal, 0);
    let scoring = evaluation_id(&proposal, 1);
    let vote_step = evaluation_id(&proposal, 2);

    // Rubric criteria must exist before publishing.
    let response = put_json(
        &app,
        &format!("/api/v1/proposals/{id}/evaluations/{scoring}/rubric-criteria"),
        &author,
        json!({
            "rubricCriteria": [
                { "title": "Impact", "type": "range", "parameters": { "min": 1, "max": 5 } }
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let criteria_id = body_json(response).await["data"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(&app, &format!("/api/v1/proposals/{id}/publish"), &author, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let published = body_json(response).await["data"].clone();
    assert_eq!(published["current_step"]["step"], "pass_fail");
    assert_eq!(published["current_step"]["index"], 1);

    // Only the current step accepts results.
    let (status, _) = submit(&app, &reviewer_a, &id, &scoring, "pass").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // One pass and one fail: a tie declines the step.
    let (status, json) = submit(&app, &reviewer_a, &id, &review, "pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["decided"], false);
    assert_eq!(json["data"]["reviews"], 1);

    let (status, json) = submit(&app, &reviewer_b, &id, &review, "fail").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["decided"], true);
    assert_eq!(json["data"]["evaluation"]["result"], "fail");
    assert_eq!(json["data"]["resolved"]["evaluation_status"], "declined");

    // Only an author may appeal.
    let appeal_uri = format!("/api/v1/proposals/{id}/evaluations/{review}/appeal");
    let response = post_json(&app, &appeal_uri, &reviewer_b, json!({ "reason": "unfair" })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(&app, &appeal_uri, &author, json!({ "reason": "New budget attached" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let appealed = body_json(response).await["data"].clone();
    assert!(appealed["appealed_at"].is_string());
    assert_eq!(appealed["appeal_reason"], "New budget attached");
    assert!(appealed["result"].is_null());

    // Regular reviews are closed while the appeal is open.
    let (status, _) = submit(&app, &reviewer_a, &id, &review, "pass").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let response = post_json(
        &app,
        &format!("/api/v1/proposals/{id}/evaluations/{review}/appeal/submit-result"),
        &appeal_reviewer,
        json!({ "result": "pass" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["evaluation"]["result"], "pass");
    assert_eq!(json["data"]["resolved"]["current_step"]["step"], "rubric");

    // Out-of-range scores write nothing.
    let answers_uri = format!("/api/v1/proposals/{id}/evaluations/{scoring}/rubric-answers");
    let response = put_json(
        &app,
        &answers_uri,
        &reviewer_a,
        json!({ "answers": [{ "rubricCriteriaId": criteria_id, "response": { "score": 9 } }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = put_json(
        &app,
        &answers_uri,
        &reviewer_a,
        json!({
            "answers": [{ "rubricCriteriaId": criteria_id, "response": { "score": 4 }, "comment": "Clear plan" }]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    // Passing the rubric step opens the vote on the next step.
    let (status, json) = submit(&app, &author, &id, &scoring, "pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["vote"]["evaluation_id"], vote_step.as_str());
    assert_eq!(json["data"]["vote"]["title"], "Community garden grant");
    assert_eq!(json["data"]["resolved"]["current_step"]["step"], "vote");

    // Listing and cards reflect the new current step.
    let response = get(&app, &format!("/api/v1/spaces/{space_id}/proposals"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await["data"].clone();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["current_step"]["step"], "vote");
    assert_eq!(listed[0]["evaluation_status"], "in_progress");

    let response = get(&app, &format!("/api/v1/spaces/{space_id}/proposal-cards"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cards = body_json(response).await["data"].clone();
    assert_eq!(cards[0]["properties"]["proposalStep"], "Community vote");
    assert_eq!(
        cards[0]["properties"][format!("proposalEvaluationTotal:{scoring}")],
        4
    );

    let response = get(&app, &format!("/api/v1/proposals/{id}"), Some(&author)).await;
    let detail = body_json(response).await["data"].clone();
    assert!(detail["evaluations"][2]["vote"]["deadline"].is_string());
    assert_eq!(detail["evaluations"][0]["appeal_reviews"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: evaluations of another proposal are rejected as insecure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evaluation_of_another_proposal_is_403() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());
    let first = create(&app, &author, workflow(DbId::new_v4())).await;
    let second = create(&app, &author, workflow(DbId::new_v4())).await;

    let (status, json) = submit(
        &app,
        &author,
        first["id"].as_str().unwrap(),
        &evaluation_id(&second, 0),
        "pass",
    )
    .await;
    // Drafts fail the published check before the evaluation is loaded.
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "UNDESIRABLE_OPERATION");

    let response = put_json(
        &app,
        &format!(
            "/api/v1/proposals/{}/evaluations/{}/rubric-criteria",
            first["id"].as_str().unwrap(),
            evaluation_id(&second, 1)
        ),
        &author,
        json!({ "rubricCriteria": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INSECURE_OPERATION");
}

// ---------------------------------------------------------------------------
// Test: templates are served from their own route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn template_route_only_serves_templates() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());
    let space_id = DbId::new_v4();

    let mut body = workflow(space_id);
    body["isTemplate"] = json!(true);
    let template = create(&app, &author, body).await;
    let regular = create(&app, &author, workflow(space_id)).await;

    let response = get(
        &app,
        &format!("/api/v1/proposal-templates/{}", template["id"].as_str().unwrap()),
        Some(&author),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_template"], true);

    let response = get(
        &app,
        &format!("/api/v1/proposal-templates/{}", regular["id"].as_str().unwrap()),
        Some(&author),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(
        &app,
        &format!("/api/v1/spaces/{space_id}/proposals?includeTemplates=true"),
        None,
    )
    .await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: rewards publish once the final step passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rewards_step_follows_the_final_pass() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());
    let proposal = create(
        &app,
        &author,
        json!({
            "spaceId": DbId::new_v4(),
            "title": "Bounty",
            "fields": { "pendingRewards": [{ "title": "Build it", "amount": 250 }] },
            "evaluations": [{ "title": "Feedback", "type": "feedback" }]
        }),
    )
    .await;
    let id = proposal["id"].as_str().unwrap().to_string();
    let feedback = evaluation_id(&proposal, 0);

    post_json(&app, &format!("/api/v1/proposals/{id}/publish"), &author, json!({})).await;
    // Feedback always passes whatever is submitted.
    let (status, json) = submit(&app, &author, &id, &feedback, "fail").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["evaluation"]["result"], "pass");
    assert_eq!(json["data"]["resolved"]["current_step"]["step"], "rewards");
    assert_eq!(json["data"]["resolved"]["evaluation_status"], "unpublished");

    let response = post_json(&app, &format!("/api/v1/proposals/{id}/rewards"), &author, json!({})).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    let response = get(&app, &format!("/api/v1/proposals/{id}"), Some(&author)).await;
    let detail = body_json(response).await["data"].clone();
    assert_eq!(detail["current_step"]["step"], "rewards");
    assert_eq!(detail["current_step"]["index"], 2);
    assert_eq!(detail["evaluation_status"], "published");

    let response = post_json(&app, &format!("/api/v1/proposals/{id}/archive"), &author, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["evaluation_status"], "archived");
}

// ---------------------------------------------------------------------------
// Test: oversized rubric criteria lists are rejected before any write
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rubric_criteria_list_is_capped() {
    let app = build_test_app();
    let author = app.token(DbId::new_v4());
    let proposal = create(&app, &author, workflow(DbId::new_v4())).await;
    let id = proposal["id"].as_str().unwrap().to_string();
    let scoring = evaluation_id(&proposal, 1);
    let uri = format!("/api/v1/proposals/{id}/evaluations/{scoring}/rubric-criteria");

    let criteria: Vec<Value> = (0..101)
        .map(|i| json!({ "title": format!("Criteria {i}"), "type": "range", "parameters": { "min": 1, "max": 5 } }))
        .collect();
    let response = put_json(&app, &uri, &author, json!({ "rubricCriteria": criteria })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let scoring_id: DbId = scoring.parse().unwrap();
    let stored = app.store.list_rubric_criteria(id.parse().unwrap(), scoring_id).await.unwrap();
    assert!(stored.is_empty());
}
