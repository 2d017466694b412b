use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Public view of an account. Credentials never leave the credential store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub account_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub project_id: i64,
    pub account_id: i64,
    pub name: String,
    pub description: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// A bug joined with its priority and status names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bug {
    pub bug_id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub priority_id: i64,
    pub priority_name: String,
    pub status_id: i64,
    pub status_name: String,
    pub due_date: Option<NaiveDate>,
    pub complete_date: Option<NaiveDate>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub comment_id: i64,
    pub bug_id: i64,
    pub description: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Priority {
    pub priority_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub status_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credentials {
    pub account_id: i64,
    pub password_hash: String,
}
