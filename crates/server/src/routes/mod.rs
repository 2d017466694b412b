pub mod accounts;
pub mod auth;
pub mod bugs;
pub mod comments;
pub mod projects;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteQueryResult;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
        }
    }
}

/// Every mutation re-asserts ownership in its own filter. Once the ownership
/// stage has passed, anything but exactly one affected row means the rows
/// changed underneath the request.
pub fn expect_one_row(result: SqliteQueryResult, operation: &str) -> Result<()> {
    match result.rows_affected() {
        1 => Ok(()),
        n => Err(AppError::Internal(format!("{operation} affected {n} rows"))),
    }
}
