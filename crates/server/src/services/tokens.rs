//! Access and refresh token issuance, verification and rotation.
//!
//! Access tokens are verified by signature and expiry alone. Refresh tokens
//! must additionally match the single value persisted for the account, so
//! logging out or rotating immediately invalidates every older refresh token.
//! Every verification failure surfaces as the same `Unauthorized` error.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::credentials::{hash_token, CredentialStore},
    error::{AppError, Result},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub account_id: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    fn sign(&self, account_id: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            account_id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| AppError::Internal("Failed to create token".to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AppError::Unauthorized
            })
    }
}

#[derive(Clone)]
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    store: CredentialStore,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        store: CredentialStore,
    ) -> Self {
        Self {
            access: SigningKeys::new(access_secret, access_ttl),
            refresh: SigningKeys::new(refresh_secret, refresh_ttl),
            store,
        }
    }

    pub fn from_config(config: &Config, store: CredentialStore) -> Self {
        Self::new(
            &config.access_token_secret,
            &config.refresh_token_secret,
            Duration::minutes(config.access_token_ttl_mins),
            Duration::days(config.refresh_token_ttl_days),
            store,
        )
    }

    pub fn issue_access_token(&self, account_id: i64) -> Result<String> {
        self.access.sign(account_id)
    }

    pub fn issue_refresh_token(&self, account_id: i64) -> Result<String> {
        self.refresh.sign(account_id)
    }

    /// Signature and expiry only; no database round trip.
    pub fn verify_access(&self, token: &str) -> Result<i64> {
        self.access.verify(token).map(|claims| claims.account_id)
    }

    /// Read-only check of a refresh token against the persisted one. Nothing
    /// is rotated; the refresh endpoint uses [`TokenService::refresh`], which
    /// checks and swaps in one compare-and-replace.
    pub async fn verify_refresh(&self, token: &str) -> Result<i64> {
        let claims = self.refresh.verify(token)?;

        match self.store.refresh_token_hash(claims.account_id).await? {
            Some(stored) if stored == hash_token(token) => Ok(claims.account_id),
            _ => {
                tracing::warn!(account_id = claims.account_id, "Stale or revoked refresh token");
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Issues a fresh pair and overwrites the persisted refresh token.
    pub async fn rotate(&self, account_id: i64) -> Result<TokenPair> {
        let pair = self.issue_pair(account_id)?;

        if !self
            .store
            .replace_refresh_token(account_id, &pair.refresh)
            .await?
        {
            return Err(AppError::Internal(format!(
                "account {account_id} vanished while storing refresh token"
            )));
        }

        Ok(pair)
    }

    /// Exchanges a live refresh token for a new pair. The swap only happens if
    /// the presented token is still the persisted one, so of two concurrent
    /// refreshes with the same token at most one wins.
    pub async fn refresh(&self, presented: &str) -> Result<(i64, TokenPair)> {
        let claims = self.refresh.verify(presented)?;
        let pair = self.issue_pair(claims.account_id)?;

        if !self
            .store
            .compare_and_replace(claims.account_id, presented, &pair.refresh)
            .await?
        {
            tracing::warn!(account_id = claims.account_id, "Stale or revoked refresh token");
            return Err(AppError::Unauthorized);
        }

        Ok((claims.account_id, pair))
    }

    pub async fn revoke(&self, account_id: i64) -> Result<()> {
        self.store.clear_refresh_token(account_id).await
    }

    fn issue_pair(&self, account_id: i64) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue_access_token(account_id)?,
            refresh: self.issue_refresh_token(account_id)?,
        })
    }
}
