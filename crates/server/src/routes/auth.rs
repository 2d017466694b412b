use axum::{
    extract::State,
    routing::{delete, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::collections::AccountView,
    error::{AppError, Result},
    middleware::validate::ValidatedJson,
    routes::MessageResponse,
    services::{password::verify_password, tokens::TokenPair},
    AppState,
};

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";
/// The refresh cookie is only ever sent to the refresh endpoint.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", delete(logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub pwd: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub account_id: i64,
}

fn session_cookie(name: &'static str, value: String, path: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn expired_cookie(name: &'static str, path: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path(path).http_only(true).build();
    cookie.make_removal();
    cookie
}

pub fn set_session_cookies(jar: CookieJar, pair: TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access, "/", secure))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh, REFRESH_PATH, secure))
}

/// Expires both cookies explicitly; the refresh cookie is never sent to the
/// caller's endpoint, so it cannot be removed from the request jar.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.add(expired_cookie(ACCESS_COOKIE, "/"))
        .add(expired_cookie(REFRESH_COOKIE, REFRESH_PATH))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<AccountView>)> {
    let credentials = state
        .credentials
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| {
            tracing::warn!(email = %body.email, "Login attempt for unregistered email");
            AppError::EmailUnregistered
        })?;

    if !verify_password(&body.pwd, &credentials.password_hash)? {
        tracing::warn!(account_id = credentials.account_id, "Failed login attempt - incorrect password");
        return Err(AppError::IncorrectPassword);
    }

    let view = state.collections.everything(credentials.account_id).await?;
    let pair = state.tokens.rotate(credentials.account_id).await?;

    tracing::info!(account_id = credentials.account_id, "Account logged in");

    Ok((
        set_session_cookies(jar, pair, state.config.cookie_secure),
        Json(view),
    ))
}

async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingToken)?;

    let (account_id, pair) = state.tokens.refresh(&presented).await?;

    tracing::info!(account_id, "Session refreshed");

    Ok((
        set_session_cookies(jar, pair, state.config.cookie_secure),
        Json(RefreshResponse { account_id }),
    ))
}

/// Best effort: the client-side session is cleared whatever happens here.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let account_id = jar
        .get(ACCESS_COOKIE)
        .and_then(|c| state.tokens.verify_access(c.value()).ok());

    match account_id {
        Some(account_id) => match state.tokens.revoke(account_id).await {
            Ok(()) => tracing::info!(account_id, "Account logged out"),
            Err(e) => tracing::warn!(account_id, error = %e, "Failed to revoke refresh token"),
        },
        None => tracing::debug!("Logout without a valid access token"),
    }

    (
        clear_session_cookies(jar),
        Json(MessageResponse::new("Logged out")),
    )
}
