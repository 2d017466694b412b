use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::{collections::AccountView, models::Account},
    error::{AppError, Result},
    middleware::{auth::AuthAccount, validate::ValidatedJson},
    routes::{auth::clear_session_cookies, expect_one_row, MessageResponse},
    services::password::{hash_password, verify_password},
    AppState,
};

/// Authenticated account management. Registration is mounted separately on
/// the public side.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/update-name", put(update_name))
        .route("/update-email", put(update_email))
        .route("/update-password", put(update_password))
        .route("/delete", delete(delete_account))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email"),
        length(max = 254, message = "Email must be at most 254 characters")
    )]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password must be 1 to 128 characters"))]
    pub pwd: String,
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNameRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[validate(
        email(message = "Invalid email"),
        length(max = 254, message = "Email must be at most 254 characters")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub pwd: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_pwd: String,
    #[validate(length(min = 1, max = 128, message = "Password must be 1 to 128 characters"))]
    pub new_pwd: String,
    pub confirm_pwd: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    pub pwd: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account: Account,
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    if state.credentials.email_in_use(&body.email, None).await? {
        return Err(AppError::EmailInUse);
    }

    let password_hash = hash_password(&body.pwd)?;

    let account_id = state
        .credentials
        .create_account(&body.email, &password_hash, &body.first_name, &body.last_name)
        .await?;

    tracing::info!(account_id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Account created")),
    ))
}

async fn me(State(state): State<AppState>, account: AuthAccount) -> Result<Json<AccountView>> {
    Ok(Json(state.collections.everything(account.id).await?))
}

async fn update_name(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdateNameRequest>,
) -> Result<Json<AccountResponse>> {
    let result = sqlx::query(
        "UPDATE account SET first_name = ?, last_name = ?, update_time = ? WHERE account_id = ?",
    )
    .bind(&body.first_name)
    .bind(&body.last_name)
    .bind(Utc::now())
    .bind(account.id)
    .execute(&state.db.pool)
    .await?;
    expect_one_row(result, "update account name")?;

    account_response(&state, account.id).await
}

async fn update_email(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdateEmailRequest>,
) -> Result<Json<AccountResponse>> {
    confirm_password(&state, account.id, &body.pwd).await?;

    if state
        .credentials
        .email_in_use(&body.email, Some(account.id))
        .await?
    {
        return Err(AppError::EmailInUse);
    }

    if !state.credentials.change_email(account.id, &body.email).await? {
        return Err(AppError::Internal(format!(
            "email update for account {} affected no rows",
            account.id
        )));
    }

    tracing::info!(account_id = account.id, "Account email changed");

    account_response(&state, account.id).await
}

async fn update_password(
    State(state): State<AppState>,
    account: AuthAccount,
    ValidatedJson(body): ValidatedJson<UpdatePasswordRequest>,
) -> Result<Json<AccountResponse>> {
    if body.new_pwd != body.confirm_pwd {
        return Err(AppError::field("confirm_pwd", "Passwords do not match"));
    }

    confirm_password(&state, account.id, &body.current_pwd).await?;

    let password_hash = hash_password(&body.new_pwd)?;
    if !state
        .credentials
        .set_password_hash(account.id, &password_hash)
        .await?
    {
        return Err(AppError::Internal(format!(
            "password update for account {} affected no rows",
            account.id
        )));
    }

    tracing::info!(account_id = account.id, "Account password changed");

    account_response(&state, account.id).await
}

async fn delete_account(
    State(state): State<AppState>,
    account: AuthAccount,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<DeleteAccountRequest>,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    confirm_password(&state, account.id, &body.pwd).await?;

    // Projects, bugs, comments and the stored session go with the row.
    let result = sqlx::query("DELETE FROM account WHERE account_id = ?")
        .bind(account.id)
        .execute(&state.db.pool)
        .await?;
    expect_one_row(result, "delete account")?;

    tracing::info!(account_id = account.id, "Account deleted");

    Ok((
        clear_session_cookies(jar),
        Json(MessageResponse::new("Account deleted")),
    ))
}

/// Re-checks the password of an already authenticated account before a
/// sensitive change. A vanished account fails like a bad token.
async fn confirm_password(state: &AppState, account_id: i64, pwd: &str) -> Result<()> {
    let hash = state
        .credentials
        .password_hash(account_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(pwd, &hash)? {
        tracing::warn!(account_id, "Incorrect password on account change");
        return Err(AppError::IncorrectPassword);
    }

    Ok(())
}

async fn account_response(state: &AppState, account_id: i64) -> Result<Json<AccountResponse>> {
    let account = state
        .collections
        .account(account_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("account {account_id} missing after update")))?;

    Ok(Json(AccountResponse { account }))
}
