//! Cross-account isolation: one account can never see or touch another's
//! projects, bugs or comments, and the refusal looks exactly like a
//! reference to an id that does not exist.

mod common;

use axum::http::Method;
use common::{assert_not_owned, bug_payload, Session, TestApp};
use serde_json::json;

struct Tree {
    project_id: i64,
    bug_id: i64,
    comment_id: i64,
}

async fn owner_with_tree(app: &TestApp) -> (Session, Tree) {
    let session = app.signed_in("owner@x.com").await;
    let project_id = app.create_project(&session, "Private").await;
    let bug_id = app.create_bug(&session, project_id, "Secret bug").await;
    let comment_id = app.create_comment(&session, bug_id, "Secret note").await;
    (
        session,
        Tree {
            project_id,
            bug_id,
            comment_id,
        },
    )
}

#[tokio::test]
async fn test_stranger_sees_empty_collections() {
    let app = TestApp::spawn().await;
    owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;

    for (path, collection) in [
        ("/api/v1/projects", "projects"),
        ("/api/v1/bugs", "bugs"),
        ("/api/v1/comments", "comments"),
    ] {
        let response = app.authed(Method::GET, path, &stranger, None).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body[collection], json!([]), "{path} leaked rows");
    }
}

#[tokio::test]
async fn test_stranger_cannot_mutate_project() {
    let app = TestApp::spawn().await;
    let (owner, tree) = owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;

    let update = app
        .authed(
            Method::PUT,
            "/api/v1/projects/update",
            &stranger,
            Some(json!({ "project_id": tree.project_id, "name": "Mine now", "description": "" })),
        )
        .await;
    let delete = app
        .authed(
            Method::DELETE,
            "/api/v1/projects/delete",
            &stranger,
            Some(json!({ "project_id": tree.project_id })),
        )
        .await;

    assert_not_owned(&update, "project_id");
    assert_not_owned(&delete, "project_id");

    let projects = app.authed(Method::GET, "/api/v1/projects", &owner, None).await;
    assert_eq!(projects.body["projects"][0]["name"], "Private");
}

#[tokio::test]
async fn test_stranger_cannot_mutate_bug() {
    let app = TestApp::spawn().await;
    let (owner, tree) = owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;
    let stranger_project = app.create_project(&stranger, "Decoy").await;

    let create = app
        .authed(
            Method::POST,
            "/api/v1/bugs/create",
            &stranger,
            Some(bug_payload(tree.project_id, "Planted")),
        )
        .await;

    // Pulling the owner's bug into the stranger's own project.
    let mut hijack = bug_payload(stranger_project, "Stolen");
    hijack["bug_id"] = json!(tree.bug_id);
    let update = app
        .authed(Method::PUT, "/api/v1/bugs/update", &stranger, Some(hijack))
        .await;

    let delete = app
        .authed(
            Method::DELETE,
            "/api/v1/bugs/delete",
            &stranger,
            Some(json!({ "bug_id": tree.bug_id })),
        )
        .await;

    assert_not_owned(&create, "project_id");
    assert_not_owned(&update, "bug_id");
    assert_not_owned(&delete, "bug_id");

    let bugs = app.authed(Method::GET, "/api/v1/bugs", &owner, None).await;
    assert_eq!(bugs.ids("bugs", "bug_id"), vec![tree.bug_id]);
    assert_eq!(bugs.body["bugs"][0]["project_id"], tree.project_id);
}

#[tokio::test]
async fn test_owner_cannot_move_bug_into_foreign_project() {
    let app = TestApp::spawn().await;
    let (owner, tree) = owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;
    let foreign_project = app.create_project(&stranger, "Theirs").await;

    let mut update = bug_payload(foreign_project, "Escaping");
    update["bug_id"] = json!(tree.bug_id);

    let response = app
        .authed(Method::PUT, "/api/v1/bugs/update", &owner, Some(update))
        .await;

    assert_not_owned(&response, "project_id");
}

#[tokio::test]
async fn test_stranger_cannot_mutate_comment() {
    let app = TestApp::spawn().await;
    let (owner, tree) = owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;

    let create = app
        .authed(
            Method::POST,
            "/api/v1/comments/create",
            &stranger,
            Some(json!({ "bug_id": tree.bug_id, "description": "spam" })),
        )
        .await;
    let update = app
        .authed(
            Method::PUT,
            "/api/v1/comments/update",
            &stranger,
            Some(json!({
                "comment_id": tree.comment_id,
                "bug_id": tree.bug_id,
                "description": "edited"
            })),
        )
        .await;
    let delete = app
        .authed(
            Method::DELETE,
            "/api/v1/comments/delete",
            &stranger,
            Some(json!({ "comment_id": tree.comment_id })),
        )
        .await;

    assert_not_owned(&create, "bug_id");
    assert_not_owned(&update, "bug_id");
    assert_not_owned(&delete, "comment_id");

    let comments = app.authed(Method::GET, "/api/v1/comments", &owner, None).await;
    assert_eq!(comments.body["comments"][0]["description"], "Secret note");
}

#[tokio::test]
async fn test_foreign_id_indistinguishable_from_missing_id() {
    let app = TestApp::spawn().await;
    let (_, tree) = owner_with_tree(&app).await;
    let stranger = app.signed_in("stranger@x.com").await;

    let foreign = app
        .authed(
            Method::DELETE,
            "/api/v1/bugs/delete",
            &stranger,
            Some(json!({ "bug_id": tree.bug_id })),
        )
        .await;
    let missing = app
        .authed(
            Method::DELETE,
            "/api/v1/bugs/delete",
            &stranger,
            Some(json!({ "bug_id": tree.bug_id + 1000 })),
        )
        .await;

    assert_eq!(foreign.status, missing.status);
    assert_eq!(foreign.body, missing.body);
}
