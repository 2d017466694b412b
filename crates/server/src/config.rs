use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    pub cookie_secure: bool,
    /// Front-end origin allowed to send credentialed requests. When unset,
    /// CORS is permissive and cookies are not shared cross-origin.
    pub cors_origin: Option<String>,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT").unwrap_or(5000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/bugtrack.db?mode=rwc".to_string()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .unwrap_or_else(|_| "development-access-secret-change-in-production".to_string()),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .unwrap_or_else(|_| "development-refresh-secret-change-in-production".to_string()),
            access_token_ttl_mins: parse_var("ACCESS_TOKEN_TTL_MINS").unwrap_or(15),
            refresh_token_ttl_days: parse_var("REFRESH_TOKEN_TTL_DAYS").unwrap_or(7),
            cookie_secure: parse_var("COOKIE_SECURE").unwrap_or(true),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
        }
    }

    pub fn default_for_testing() -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_ttl_mins: 15,
            refresh_token_ttl_days: 7,
            cookie_secure: false,
            cors_origin: None,
            static_dir: "static".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
