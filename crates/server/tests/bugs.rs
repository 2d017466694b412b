//! Integration tests for the bug endpoints.

mod common;

use axum::http::Method;
use common::{bug_payload, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_create_bug_joins_reference_names() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let project_id = app.create_project(&session, "Tracker").await;

    let response = app
        .authed(
            Method::POST,
            "/api/v1/bugs/create",
            &session,
            Some(bug_payload(project_id, "Crash on save")),
        )
        .await;

    assert_eq!(response.status, 200);
    let bug = &response.body["bugs"][0];
    assert_eq!(bug["name"], "Crash on save");
    assert_eq!(bug["project_id"], project_id);
    assert_eq!(bug["priority_name"], "Medium");
    assert_eq!(bug["status_name"], "Open");
    assert_eq!(bug["due_date"], "2030-01-31");
    assert!(bug["complete_date"].is_null());
}

#[tokio::test]
async fn test_reference_lists_priorities_and_statuses() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;

    let response = app
        .authed(Method::GET, "/api/v1/bugs/reference", &session, None)
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.ids("priorities", "priority_id"), vec![1, 2, 3, 4]);
    assert_eq!(response.body["priorities"][3]["name"], "Critical");
    assert_eq!(response.ids("statuses", "status_id"), vec![1, 2, 3, 4]);
    assert_eq!(response.body["statuses"][3]["name"], "Closed");
}

#[tokio::test]
async fn test_create_bug_rejects_out_of_range_priority() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let project_id = app.create_project(&session, "Tracker").await;

    let mut payload = bug_payload(project_id, "Bad priority");
    payload["priority_id"] = json!(9);

    let response = app
        .authed(Method::POST, "/api/v1/bugs/create", &session, Some(payload))
        .await;

    assert_eq!(response.status, 400);
    assert!(response.body["errors"]["priority_id"].is_string());
}

#[tokio::test]
async fn test_create_bug_in_unknown_project_is_not_owned() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;

    let response = app
        .authed(
            Method::POST,
            "/api/v1/bugs/create",
            &session,
            Some(bug_payload(4242, "Orphan")),
        )
        .await;

    common::assert_not_owned(&response, "project_id");
}

#[tokio::test]
async fn test_bug_round_trip() {
    // Arrange
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let project_id = app.create_project(&session, "Tracker").await;
    let bug_id = app.create_bug(&session, project_id, "Crash").await;

    // Act
    let mut update = bug_payload(project_id, "Crash on startup");
    update["bug_id"] = json!(bug_id);
    update["status_id"] = json!(4);
    update["complete_date"] = json!("2030-02-01");
    let updated = app
        .authed(Method::PUT, "/api/v1/bugs/update", &session, Some(update))
        .await;

    let deleted = app
        .authed(
            Method::DELETE,
            "/api/v1/bugs/delete",
            &session,
            Some(json!({ "bug_id": bug_id })),
        )
        .await;

    // Assert
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["bugs"][0]["name"], "Crash on startup");
    assert_eq!(updated.body["bugs"][0]["status_name"], "Closed");
    assert_eq!(updated.body["bugs"][0]["complete_date"], "2030-02-01");

    assert_eq!(deleted.status, 200);
    assert!(!deleted.ids("bugs", "bug_id").contains(&bug_id));
}

#[tokio::test]
async fn test_delete_bug_removes_its_comments() {
    // Arrange
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let project_id = app.create_project(&session, "Tracker").await;
    let doomed = app.create_bug(&session, project_id, "Doomed").await;
    let kept = app.create_bug(&session, project_id, "Kept").await;
    app.create_comment(&session, doomed, "first").await;
    app.create_comment(&session, doomed, "second").await;
    let kept_comment = app.create_comment(&session, kept, "stays").await;

    // Act
    let response = app
        .authed(
            Method::DELETE,
            "/api/v1/bugs/delete",
            &session,
            Some(json!({ "bug_id": doomed })),
        )
        .await;

    // Assert
    assert_eq!(response.status, 200);
    assert_eq!(response.ids("bugs", "bug_id"), vec![kept]);
    assert_eq!(response.ids("comments", "comment_id"), vec![kept_comment]);
}

#[tokio::test]
async fn test_invalid_project_reported_before_invalid_bug() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;

    let mut update = bug_payload(777, "Nowhere");
    update["bug_id"] = json!(888);

    let response = app
        .authed(Method::PUT, "/api/v1/bugs/update", &session, Some(update))
        .await;

    common::assert_not_owned(&response, "project_id");
}

#[tokio::test]
async fn test_invalid_bug_reported_when_project_is_owned() {
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let project_id = app.create_project(&session, "Tracker").await;

    let mut update = bug_payload(project_id, "Nowhere");
    update["bug_id"] = json!(888);

    let response = app
        .authed(Method::PUT, "/api/v1/bugs/update", &session, Some(update))
        .await;

    common::assert_not_owned(&response, "bug_id");
}

#[tokio::test]
async fn test_bug_cannot_move_to_another_project() {
    // Arrange
    let app = TestApp::spawn().await;
    let session = app.signed_in("a@x.com").await;
    let home = app.create_project(&session, "Home").await;
    let elsewhere = app.create_project(&session, "Elsewhere").await;
    let bug_id = app.create_bug(&session, home, "Rooted").await;

    let mut update = bug_payload(elsewhere, "Uprooted");
    update["bug_id"] = json!(bug_id);

    // Act
    let response = app
        .authed(Method::PUT, "/api/v1/bugs/update", &session, Some(update))
        .await;

    // Assert
    common::assert_not_owned(&response, "bug_id");

    let bugs = app.authed(Method::GET, "/api/v1/bugs", &session, None).await;
    assert_eq!(bugs.body["bugs"][0]["project_id"], home);
    assert_eq!(bugs.body["bugs"][0]["name"], "Rooted");
}
