use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::{
        collections::ReferenceData,
        models::{Bug, Comment},
    },
    error::Result,
    middleware::{auth::AuthAccount, validate::ValidatedJson},
    routes::expect_one_row,
    services::ownership::{ResourceRef, Scoped},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bugs))
        .route("/reference", get(reference))
        .route("/create", post(create_bug))
        .route("/update", put(update_bug))
        .route("/delete", delete(delete_bug))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBugRequest {
    #[validate(range(min = 1, message = "Invalid project id"))]
    pub project_id: i64,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: String,
    #[validate(range(min = 1, max = 4, message = "Invalid priority"))]
    pub priority_id: i64,
    #[validate(range(min = 1, max = 4, message = "Invalid status"))]
    pub status_id: i64,
    pub due_date: Option<NaiveDate>,
    pub complete_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBugRequest {
    #[validate(range(min = 1, message = "Invalid bug id"))]
    pub bug_id: i64,
    #[validate(range(min = 1, message = "Invalid project id"))]
    pub project_id: i64,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: String,
    #[validate(range(min = 1, max = 4, message = "Invalid priority"))]
    pub priority_id: i64,
    #[validate(range(min = 1, max = 4, message = "Invalid status"))]
    pub status_id: i64,
    pub due_date: Option<NaiveDate>,
    pub complete_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteBugRequest {
    #[validate(range(min = 1, message = "Invalid bug id"))]
    pub bug_id: i64,
}

impl Scoped for CreateBugRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::project(self.project_id)]
    }
}

impl Scoped for UpdateBugRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![
            ResourceRef::project(self.project_id),
            ResourceRef::bug_in(self.project_id, self.bug_id),
        ]
    }
}

impl Scoped for DeleteBugRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::bug(self.bug_id)]
    }
}

#[derive(Debug, Serialize)]
pub struct BugListResponse {
    pub bugs: Vec<Bug>,
}

#[derive(Debug, Serialize)]
pub struct BugDeletedResponse {
    pub bugs: Vec<Bug>,
    pub comments: Vec<Comment>,
}

async fn list_bugs(
    State(state): State<AppState>,
    account: AuthAccount,
) -> Result<Json<BugListResponse>> {
    let bugs = state.collections.bugs(account.id).await?;
    Ok(Json(BugListResponse { bugs }))
}

async fn reference(State(state): State<AppState>) -> Result<Json<ReferenceData>> {
    Ok(Json(state.collections.reference_data().await?))
}

async fn create_bug(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<CreateBugRequest>,
) -> Result<Json<BugListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO bug (project_id, name, description, location, priority_id, status_id,
                         due_date, complete_date, create_time, update_time)
        SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        WHERE EXISTS (SELECT 1 FROM project WHERE project_id = ? AND account_id = ?)
        "#,
    )
    .bind(body.project_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.location)
    .bind(body.priority_id)
    .bind(body.status_id)
    .bind(body.due_date)
    .bind(body.complete_date)
    .bind(now)
    .bind(now)
    .bind(body.project_id)
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "create bug")?;

    tracing::info!(account_id = account.id, project_id = body.project_id, "Bug created");

    list_bugs(State(state), account).await
}

/// A bug stays in the project it was created in. `project_id` in the body
/// names that project and must match.
async fn update_bug(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdateBugRequest>,
) -> Result<Json<BugListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let result = sqlx::query(
        r#"
        UPDATE bug
        SET name = ?, description = ?, location = ?, priority_id = ?, status_id = ?,
            due_date = ?, complete_date = ?, update_time = ?
        WHERE bug_id = ?
          AND project_id = ?
          AND project_id IN (SELECT project_id FROM project WHERE account_id = ?)
        "#,
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.location)
    .bind(body.priority_id)
    .bind(body.status_id)
    .bind(body.due_date)
    .bind(body.complete_date)
    .bind(Utc::now())
    .bind(body.bug_id)
    .bind(body.project_id)
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "update bug")?;

    tracing::info!(account_id = account.id, bug_id = body.bug_id, "Bug updated");

    list_bugs(State(state), account).await
}

async fn delete_bug(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<DeleteBugRequest>,
) -> Result<Json<BugDeletedResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let result = sqlx::query(
        r#"
        DELETE FROM bug
        WHERE bug_id = ?
          AND project_id IN (SELECT project_id FROM project WHERE account_id = ?)
        "#,
    )
    .bind(body.bug_id)
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "delete bug")?;

    tracing::info!(account_id = account.id, bug_id = body.bug_id, "Bug deleted");

    Ok(Json(BugDeletedResponse {
        bugs: state.collections.bugs(account.id).await?,
        comments: state.collections.comments(account.id).await?,
    }))
}
