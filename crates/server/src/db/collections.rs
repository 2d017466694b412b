//! Authoritative, fully joined views of everything an account owns.
//!
//! Every mutating endpoint re-reads the affected collections through here and
//! returns them whole, so clients replace state instead of merging deltas.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    db::models::{Account, Bug, Comment, Priority, Project, Status},
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CollectionReader {
    pool: SqlitePool,
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub account: Account,
    pub projects: Vec<Project>,
    pub bugs: Vec<Bug>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceData {
    pub priorities: Vec<Priority>,
    pub statuses: Vec<Status>,
}

impl CollectionReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn account(&self, account_id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, email, first_name, last_name, create_time, update_time
            FROM account
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn projects(&self, account_id: i64) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, account_id, name, description, create_time, update_time
            FROM project
            WHERE account_id = ?
            ORDER BY project_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    pub async fn bugs(&self, account_id: i64) -> Result<Vec<Bug>> {
        let bugs = sqlx::query_as::<_, Bug>(
            r#"
            SELECT b.bug_id, b.project_id, b.name, b.description, b.location,
                   b.priority_id, pr.name AS priority_name,
                   b.status_id, s.name AS status_name,
                   b.due_date, b.complete_date, b.create_time, b.update_time
            FROM bug b
            JOIN project p ON p.project_id = b.project_id
            JOIN priority pr ON pr.priority_id = b.priority_id
            JOIN status s ON s.status_id = b.status_id
            WHERE p.account_id = ?
            ORDER BY b.bug_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bugs)
    }

    pub async fn comments(&self, account_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.comment_id, c.bug_id, c.description, c.create_time, c.update_time
            FROM comment c
            JOIN bug b ON b.bug_id = c.bug_id
            JOIN project p ON p.project_id = b.project_id
            WHERE p.account_id = ?
            ORDER BY c.comment_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    /// The account plus every collection hanging off it. An authenticated
    /// account that no longer exists is an invariant violation.
    pub async fn everything(&self, account_id: i64) -> Result<AccountView> {
        let account = self.account(account_id).await?.ok_or_else(|| {
            AppError::Internal(format!("account {account_id} missing during rehydration"))
        })?;

        Ok(AccountView {
            account,
            projects: self.projects(account_id).await?,
            bugs: self.bugs(account_id).await?,
            comments: self.comments(account_id).await?,
        })
    }

    pub async fn reference_data(&self) -> Result<ReferenceData> {
        let priorities = sqlx::query_as::<_, Priority>(
            "SELECT priority_id, name FROM priority ORDER BY priority_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let statuses =
            sqlx::query_as::<_, Status>("SELECT status_id, name FROM status ORDER BY status_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ReferenceData {
            priorities,
            statuses,
        })
    }
}
