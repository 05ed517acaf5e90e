//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub const SERVICE_ROLE_KEY: &str = "service-role-key";

/// GoTrue's page size when the caller does not ask for one
const DEFAULT_PER_PAGE: usize = 50;

/// In-memory stand-in for the Supabase auth admin API
#[derive(Clone, Default)]
pub struct AuthStub {
    pub users: Arc<Mutex<Vec<(String, String)>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    next_id: Arc<Mutex<u32>>,
}

impl AuthStub {
    pub fn seed(&self, id: &str, email: &str) {
        self.users
            .lock()
            .unwrap()
            .push((id.to_string(), email.to_string()));
    }

    pub fn emails(&self) -> Vec<String> {
        self.users.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Serve the stub and return its base URL
    pub async fn serve(&self) -> String {
        let router = Router::new()
            .route("/auth/v1/admin/users", get(list_users).post(create_user))
            .route("/auth/v1/admin/users/:id", delete(delete_user))
            .with_state(self.clone());
        serve(router).await
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {}", SERVICE_ROLE_KEY);
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(SERVICE_ROLE_KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str())
}

async fn list_users(
    State(stub): State<AuthStub>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let per_page: usize = params
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PER_PAGE);

    let users = stub.users.lock().unwrap();
    let users: Vec<Value> = users
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|(id, email)| json!({ "id": id, "email": email }))
        .collect();
    Ok(Json(json!({ "users": users })))
}

async fn create_user(
    State(stub): State<AuthStub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if body["email_confirm"] != json!(true) || body["password"].as_str().is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let email = body["email"].as_str().ok_or(StatusCode::BAD_REQUEST)?.to_string();

    let mut users = stub.users.lock().unwrap();
    if users.iter().any(|(_, e)| *e == email) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut next_id = stub.next_id.lock().unwrap();
    *next_id += 1;
    let id = format!("user-{}", next_id);
    users.push((id.clone(), email.clone()));
    Ok(Json(json!({ "id": id, "email": email })))
}

async fn delete_user(
    State(stub): State<AuthStub>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut users = stub.users.lock().unwrap();
    let before = users.len();
    users.retain(|(uid, _)| *uid != id);
    if users.len() == before {
        return StatusCode::NOT_FOUND;
    }
    stub.deleted.lock().unwrap().push(id);
    StatusCode::OK
}
