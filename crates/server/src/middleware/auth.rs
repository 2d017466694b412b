use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{error::AppError, routes::auth::ACCESS_COOKIE, AppState};

#[derive(Clone, Copy, Debug)]
pub struct AuthAccount {
    pub id: i64,
}

/// First pipeline stage: resolves the access cookie to an account before any
/// payload is looked at.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let account_id = state.tokens.verify_access(&token)?;

    request.extensions_mut().insert(AuthAccount { id: account_id });

    Ok(next.run(request).await)
}

// Extractor for getting the authenticated account from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthAccount>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}
