use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::models::{Bug, Comment, Project},
    error::Result,
    middleware::{auth::AuthAccount, validate::ValidatedJson},
    routes::expect_one_row,
    services::ownership::{ResourceRef, Scoped},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/create", post(create_project))
        .route("/update", put(update_project))
        .route("/delete", delete(delete_project))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(range(min = 1, message = "Invalid project id"))]
    pub project_id: i64,
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteProjectRequest {
    #[validate(range(min = 1, message = "Invalid project id"))]
    pub project_id: i64,
}

impl Scoped for UpdateProjectRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::project(self.project_id)]
    }
}

impl Scoped for DeleteProjectRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::project(self.project_id)]
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

/// Deleting a project cascades through its bugs and their comments.
#[derive(Debug, Serialize)]
pub struct ProjectDeletedResponse {
    pub projects: Vec<Project>,
    pub bugs: Vec<Bug>,
    pub comments: Vec<Comment>,
}

async fn list_projects(
    State(state): State<AppState>,
    account: AuthAccount,
) -> Result<Json<ProjectListResponse>> {
    let projects = state.collections.projects(account.id).await?;
    Ok(Json(ProjectListResponse { projects }))
}

async fn create_project(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<CreateProjectRequest>,
) -> Result<Json<ProjectListResponse>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO project (account_id, name, description, create_time, update_time)
        SELECT ?, ?, ?, ?, ?
        WHERE EXISTS (SELECT 1 FROM account WHERE account_id = ?)
        "#,
    )
    .bind(account.id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(now)
    .bind(now)
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "create project")?;

    tracing::info!(account_id = account.id, "Project created");

    list_projects(State(state), account).await
}

async fn update_project(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<ProjectListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let result = sqlx::query(
        r#"
        UPDATE project
        SET name = ?, description = ?, update_time = ?
        WHERE project_id = ? AND account_id = ?
        "#,
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(Utc::now())
    .bind(body.project_id)
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "update project")?;

    tracing::info!(account_id = account.id, project_id = body.project_id, "Project updated");

    list_projects(State(state), account).await
}

async fn delete_project(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<DeleteProjectRequest>,
) -> Result<Json<ProjectDeletedResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let result = sqlx::query("DELETE FROM project WHERE project_id = ? AND account_id = ?")
        .bind(body.project_id)
        .bind(account.id)
        .execute(&state.db.pool)
        .await?;
    expect_one_row(result, "delete project")?;

    tracing::info!(account_id = account.id, project_id = body.project_id, "Project deleted");

    Ok(Json(ProjectDeletedResponse {
        projects: state.collections.projects(account.id).await?,
        bugs: state.collections.bugs(account.id).await?,
        comments: state.collections.comments(account.id).await?,
    }))
}
