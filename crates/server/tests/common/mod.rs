//! Common test utilities for integration tests.
//!
//! Each `TestApp` owns the real router over a private in-memory database and
//! drives it in-process, carrying session cookies by hand.

#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use bugtrack_server::{create_router, db::Database, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Response with the JSON body and cookies set by the server.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub body: Value,
    pub cookies: HashMap<String, String>,
    pub set_cookie_headers: Vec<String>,
}

/// Session cookies as issued by login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl TestResponse {
    pub fn session(&self) -> Session {
        Session {
            access: self.cookies.get("token").cloned().expect("missing token cookie"),
            refresh: self
                .cookies
                .get("refreshToken")
                .cloned()
                .expect("missing refreshToken cookie"),
        }
    }

    /// Ids of the objects in `body[collection]`, keyed by `id_field`.
    pub fn ids(&self, collection: &str, id_field: &str) -> Vec<i64> {
        self.body[collection]
            .as_array()
            .unwrap_or_else(|| panic!("`{collection}` missing from {}", self.body))
            .iter()
            .map(|item| item[id_field].as_i64().expect("id should be an integer"))
            .collect()
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db = Database::in_memory()
            .await
            .expect("Failed to open in-memory database");
        db.run_migrations().await.expect("Failed to run migrations");

        let state = AppState::new(db, Config::default_for_testing());

        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        cookie: Option<String>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        let status = response.status().as_u16();
        let set_cookie_headers: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        let cookies = set_cookie_headers
            .iter()
            .filter_map(|raw| {
                let pair = raw.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            body,
            cookies,
            set_cookie_headers,
        }
    }

    pub async fn post_public(&self, path: &str, body: Value) -> TestResponse {
        self.send(Method::POST, path, None, Some(body)).await
    }

    /// Request carrying the access cookie.
    pub async fn authed(
        &self,
        method: Method,
        path: &str,
        session: &Session,
        body: Option<Value>,
    ) -> TestResponse {
        self.send(method, path, Some(format!("token={}", session.access)), body)
            .await
    }

    /// Presents the refresh cookie to the refresh endpoint.
    pub async fn refresh(&self, refresh_token: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(format!("refreshToken={refresh_token}")),
            None,
        )
        .await
    }

    pub async fn register(&self, email: &str, pwd: &str) -> TestResponse {
        self.post_public(
            "/api/v1/accounts/register",
            json!({
                "email": email,
                "pwd": pwd,
                "first_name": "Test",
                "last_name": "User"
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, pwd: &str) -> TestResponse {
        self.post_public("/api/v1/auth/login", json!({ "email": email, "pwd": pwd }))
            .await
    }

    /// Registers an account and logs it in.
    pub async fn signed_in(&self, email: &str) -> Session {
        assert_eq!(self.register(email, PASSWORD).await.status, 201);
        let login = self.login(email, PASSWORD).await;
        assert_eq!(login.status, 200, "login failed: {}", login.body);
        login.session()
    }

    pub async fn create_project(&self, session: &Session, name: &str) -> i64 {
        let response = self
            .authed(
                Method::POST,
                "/api/v1/projects/create",
                session,
                Some(json!({ "name": name, "description": "A project" })),
            )
            .await;
        assert_eq!(response.status, 200, "create project failed: {}", response.body);
        *response
            .ids("projects", "project_id")
            .last()
            .expect("created project missing")
    }

    pub async fn create_bug(&self, session: &Session, project_id: i64, name: &str) -> i64 {
        let response = self
            .authed(
                Method::POST,
                "/api/v1/bugs/create",
                session,
                Some(bug_payload(project_id, name)),
            )
            .await;
        assert_eq!(response.status, 200, "create bug failed: {}", response.body);
        *response.ids("bugs", "bug_id").last().expect("created bug missing")
    }

    pub async fn create_comment(&self, session: &Session, bug_id: i64, text: &str) -> i64 {
        let response = self
            .authed(
                Method::POST,
                "/api/v1/comments/create",
                session,
                Some(json!({ "bug_id": bug_id, "description": text })),
            )
            .await;
        assert_eq!(response.status, 200, "create comment failed: {}", response.body);
        *response
            .ids("comments", "comment_id")
            .last()
            .expect("created comment missing")
    }
}

pub fn bug_payload(project_id: i64, name: &str) -> Value {
    json!({
        "project_id": project_id,
        "name": name,
        "description": "Steps to reproduce",
        "location": "src/main.rs",
        "priority_id": 2,
        "status_id": 1,
        "due_date": "2030-01-31",
        "complete_date": null
    })
}

/// Asserts a 403 keyed to the given id field, the shape used both for
/// resources owned by someone else and for ids that do not exist.
pub fn assert_not_owned(response: &TestResponse, field: &str) {
    assert_eq!(response.status, 403, "expected 403, got {}", response.body);
    let errors = response.body["errors"]
        .as_object()
        .expect("errors object missing");
    assert_eq!(errors.len(), 1, "unexpected errors: {}", response.body);
    assert!(
        errors.contains_key(field),
        "expected error on {field}, got {}",
        response.body
    );
}
