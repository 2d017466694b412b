use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::models::Comment,
    error::Result,
    middleware::{auth::AuthAccount, validate::ValidatedJson},
    routes::expect_one_row,
    services::ownership::{ResourceRef, Scoped},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments))
        .route("/create", post(create_comment))
        .route("/update", put(update_comment))
        .route("/delete", delete(delete_comment))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(range(min = 1, message = "Invalid bug id"))]
    pub bug_id: i64,
    #[validate(length(min = 1, max = 500, message = "Comment must be 1 to 500 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(range(min = 1, message = "Invalid comment id"))]
    pub comment_id: i64,
    #[validate(range(min = 1, message = "Invalid bug id"))]
    pub bug_id: i64,
    #[validate(length(min = 1, max = 500, message = "Comment must be 1 to 500 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteCommentRequest {
    #[validate(range(min = 1, message = "Invalid comment id"))]
    pub comment_id: i64,
}

impl Scoped for CreateCommentRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::bug(self.bug_id)]
    }
}

impl Scoped for UpdateCommentRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![
            ResourceRef::bug(self.bug_id),
            ResourceRef::comment_on(self.bug_id, self.comment_id),
        ]
    }
}

impl Scoped for DeleteCommentRequest {
    fn resources(&self) -> Vec<ResourceRef> {
        vec![ResourceRef::comment(self.comment_id)]
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

const OWNED_BUGS: &str = r#"
    SELECT b.bug_id FROM bug b
    JOIN project p ON p.project_id = b.project_id
    WHERE p.account_id = ?
"#;

async fn list_comments(
    State(state): State<AppState>,
    account: AuthAccount,
) -> Result<Json<CommentListResponse>> {
    let comments = state.collections.comments(account.id).await?;
    Ok(Json(CommentListResponse { comments }))
}

async fn create_comment(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<CreateCommentRequest>,
) -> Result<Json<CommentListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let now = Utc::now();
    let query = format!(
        r#"
        INSERT INTO comment (bug_id, description, create_time, update_time)
        SELECT ?, ?, ?, ?
        WHERE ? IN ({OWNED_BUGS})
        "#
    );

    let result = sqlx::query(&query)
        .bind(body.bug_id)
        .bind(&body.description)
        .bind(now)
        .bind(now)
        .bind(body.bug_id)
        .bind(account.id)
        .execute(&state.db.pool)
        .await?;
    expect_one_row(result, "create comment")?;

    tracing::info!(account_id = account.id, bug_id = body.bug_id, "Comment created");

    list_comments(State(state), account).await
}

/// Comments stay on their bug; `bug_id` must be the one they were posted to.
async fn update_comment(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdateCommentRequest>,
) -> Result<Json<CommentListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let query = format!(
        r#"
        UPDATE comment
        SET description = ?, update_time = ?
        WHERE comment_id = ?
          AND bug_id = ?
          AND bug_id IN ({OWNED_BUGS})
        "#
    );

    let result = sqlx::query(&query)
        .bind(&body.description)
        .bind(Utc::now())
        .bind(body.comment_id)
        .bind(body.bug_id)
        .bind(account.id)
        .execute(&state.db.pool)
        .await?;
    expect_one_row(result, "update comment")?;

    tracing::info!(account_id = account.id, comment_id = body.comment_id, "Comment updated");

    list_comments(State(state), account).await
}

async fn delete_comment(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<DeleteCommentRequest>,
) -> Result<Json<CommentListResponse>> {
    state.ownership.authorize(account.id, &body).await?;

    let query = format!(
        "DELETE FROM comment WHERE comment_id = ? AND bug_id IN ({OWNED_BUGS})"
    );

    let result = sqlx::query(&query)
        .bind(body.comment_id)
        .bind(account.id)
        .execute(&state.db.pool)
        .await?;
    expect_one_row(result, "delete comment")?;

    tracing::info!(account_id = account.id, comment_id = body.comment_id, "Comment deleted");

    list_comments(State(state), account).await
}
