//! Row-level ownership along the chain account -> project -> bug -> comment.
//!
//! Lookups are evaluated fresh on every request. A resource that does not
//! exist and one owned by another account are indistinguishable to callers.

use sqlx::SqlitePool;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceKind {
    Project,
    Bug,
    Comment,
}

impl ResourceKind {
    /// Name of the payload field carrying this kind of id.
    pub fn field(self) -> &'static str {
        match self {
            ResourceKind::Project => "project_id",
            ResourceKind::Bug => "bug_id",
            ResourceKind::Comment => "comment_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Project => "Project",
            ResourceKind::Bug => "Bug",
            ResourceKind::Comment => "Comment",
        }
    }
}

/// A referenced resource. `parent`, when set, pins the resource to that
/// direct parent (project for a bug, bug for a comment); parents never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: i64,
    pub parent: Option<i64>,
}

impl ResourceRef {
    pub fn project(id: i64) -> Self {
        Self {
            kind: ResourceKind::Project,
            id,
            parent: None,
        }
    }

    pub fn bug(id: i64) -> Self {
        Self {
            kind: ResourceKind::Bug,
            id,
            parent: None,
        }
    }

    /// A bug that must live in `project_id`.
    pub fn bug_in(project_id: i64, id: i64) -> Self {
        Self {
            parent: Some(project_id),
            ..Self::bug(id)
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            kind: ResourceKind::Comment,
            id,
            parent: None,
        }
    }

    /// A comment that must belong to `bug_id`.
    pub fn comment_on(bug_id: i64, id: i64) -> Self {
        Self {
            parent: Some(bug_id),
            ..Self::comment(id)
        }
    }
}

/// A request payload that references owned resources.
pub trait Scoped {
    fn resources(&self) -> Vec<ResourceRef>;
}

#[derive(Clone)]
pub struct OwnershipVerifier {
    pool: SqlitePool,
}

impl OwnershipVerifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn belongs_to_account(
        &self,
        account_id: i64,
        kind: ResourceKind,
        resource_id: i64,
    ) -> Result<bool> {
        self.reaches(
            account_id,
            ResourceRef {
                kind,
                id: resource_id,
                parent: None,
            },
        )
        .await
    }

    async fn reaches(&self, account_id: i64, resource: ResourceRef) -> Result<bool> {
        let query = match resource.kind {
            ResourceKind::Project => {
                "SELECT COUNT(*) FROM project WHERE project_id = ? AND account_id = ?"
            }
            ResourceKind::Bug => {
                r#"
                SELECT COUNT(*) FROM bug
                WHERE bug_id = ?
                  AND project_id IN (SELECT project_id FROM project WHERE account_id = ?)
                  AND (? IS NULL OR project_id = ?)
                "#
            }
            ResourceKind::Comment => {
                r#"
                SELECT COUNT(*) FROM comment
                WHERE comment_id = ?
                  AND bug_id IN (
                      SELECT b.bug_id FROM bug b
                      JOIN project p ON p.project_id = b.project_id
                      WHERE p.account_id = ?
                  )
                  AND (? IS NULL OR bug_id = ?)
                "#
            }
        };

        let mut query = sqlx::query_scalar::<_, i64>(query)
            .bind(resource.id)
            .bind(account_id);
        if resource.kind != ResourceKind::Project {
            query = query.bind(resource.parent).bind(resource.parent);
        }

        let count = query.fetch_one(&self.pool).await?;

        Ok(count > 0)
    }

    /// Checks every referenced resource, outermost link of the chain first,
    /// and fails on the first one the account cannot reach.
    pub async fn authorize<S: Scoped + ?Sized>(&self, account_id: i64, payload: &S) -> Result<()> {
        let mut resources = payload.resources();
        resources.sort_by_key(|r| r.kind);

        for resource in resources {
            if !self.reaches(account_id, resource).await? {
                tracing::warn!(
                    account_id,
                    field = resource.kind.field(),
                    resource_id = resource.id,
                    "Ownership check failed"
                );
                return Err(AppError::NotOwned {
                    kind: resource.kind,
                });
            }
        }

        Ok(())
    }
}
