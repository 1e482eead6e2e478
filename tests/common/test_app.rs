//! Test application setup utilities
//!
//! Builds the full router over a throwaway SQLite file and drives it with
//! `tower::ServiceExt::oneshot`.

use axum::{body::Body, http::Request, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use orghub::{
    api,
    config::{AppConfig, BootstrapAdminConfig},
    db, middleware,
    models::CreateOrganizationRequest,
    services::{AuthService, MembershipService},
    AppState,
};

use super::fixtures::organization_payload;

pub const ADMIN_EMAIL: &str = "admin@campus.edu";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const TEST_PASSWORD: &str = "student-pass";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// New application with a fresh database and a bootstrap administrator
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        if let Some(ref admin) = config.bootstrap_admin {
            AuthService::new(db.clone())
                .ensure_bootstrap_admin(admin)
                .await
                .expect("Failed to create bootstrap admin");
        }

        let state = AppState::new(config, db);

        let router = Router::new()
            .nest("/api/v1", api::public_routes())
            .nest(
                "/api/v1",
                api::protected_routes()
                    .layer(axum::middleware::from_fn_with_state(
                        state.clone(),
                        middleware::maintenance_middleware,
                    ))
                    .layer(axum::middleware::from_fn_with_state(
                        state.clone(),
                        middleware::auth_middleware,
                    )),
            )
            .with_state(state.clone());

        Self { router, state }
    }

    // ==================== Accounts ====================

    /// Log in and return the bearer token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                json!({ "email": email, "password": password }),
            )
            .await;
        response.assert_ok();
        let body: Value = response.json();
        body["accessToken"]
            .as_str()
            .expect("login response without token")
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Register a student; returns `(user_id, token)`
    pub async fn register(&self, name: &str) -> (String, String) {
        let email = format!("{}@campus.edu", name.to_lowercase().replace(' ', "."));
        let response = self
            .post_json(
                "/api/v1/auth/register",
                json!({ "name": name, "email": email, "password": TEST_PASSWORD }),
            )
            .await;
        response.assert_created();
        let body: Value = response.json();
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["accessToken"].as_str().unwrap().to_string(),
        )
    }

    /// Create an organization through the API; the creator defaults to the
    /// calling administrator
    pub async fn create_org(&self, admin_token: &str, name: &str, creator: Option<&str>) -> String {
        let mut body = organization_payload(name);
        if let Some(creator) = creator {
            body["creatorUserId"] = json!(creator);
        }
        let response = self
            .post_json_auth("/api/v1/organizations", body, admin_token)
            .await;
        response.assert_created();
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    /// Create an organization with no members at all
    pub async fn create_empty_org(&self, name: &str) -> String {
        let req: CreateOrganizationRequest =
            serde_json::from_value(organization_payload(name)).unwrap();
        MembershipService::new(self.state.db.clone(), self.state.org_locks.clone())
            .create_organization(&req, None)
            .await
            .expect("Failed to create organization")
            .id
    }

    /// File a join request as the caller; returns the request id
    pub async fn request_join(&self, token: &str, org_id: &str) -> String {
        let response = self
            .post_json_auth("/api/v1/requests", json!({ "orgId": org_id }), token)
            .await;
        response.assert_created();
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    pub async fn resolve_request(&self, token: &str, request_id: &str, status: &str) -> TestResponse {
        self.put_json_auth(
            &format!("/api/v1/requests/{}", request_id),
            json!({ "status": status }),
            token,
        )
        .await
    }

    /// The stored user document as the API returns it
    pub async fn user(&self, token: &str, user_id: &str) -> Value {
        let response = self.get_auth(&format!("/api/v1/users/{}", user_id), token).await;
        response.assert_ok();
        response.json()
    }

    /// Members of an organization as seen by `token`
    pub async fn members(&self, token: &str, org_id: &str) -> Vec<Value> {
        let response = self
            .get_auth(&format!("/api/v1/organizations/{}/members", org_id), token)
            .await;
        response.assert_ok();
        response.json()
    }

    // ==================== HTTP ====================

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.request(json_request("POST", uri, body)).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request_with_auth(request, token).await
    }

    pub async fn post_json_auth(&self, uri: &str, body: Value, token: &str) -> TestResponse {
        self.request_with_auth(json_request("POST", uri, body), token)
            .await
    }

    pub async fn put_json_auth(&self, uri: &str, body: Value, token: &str) -> TestResponse {
        self.request_with_auth(json_request("PUT", uri, body), token)
            .await
    }

    pub async fn delete_auth(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request_with_auth(request, token).await
    }

    pub async fn request_with_auth(&self, request: Request<Body>, token: &str) -> TestResponse {
        let (mut parts, body) = request.into_parts();
        parts.headers.insert(
            "Authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        self.request(Request::from_parts(parts, body)).await
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse { status, body }
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    /// The `message` of an error body
    pub fn message(&self) -> String {
        self.json::<Value>()["message"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    pub fn assert_no_content(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NO_CONTENT)
    }

    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CONFLICT)
    }
}

/// Configuration over a unique temporary SQLite file
pub fn test_config() -> AppConfig {
    let db_path = format!("/tmp/orghub_test_{}.db", Uuid::new_v4().simple());

    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", db_path);
    config.database.max_connections = 1;
    config.database.min_connections = 1;
    config.auth.jwt_secret = "test_secret_key_that_is_at_least_32_bytes_long".to_string();
    config.bootstrap_admin = Some(BootstrapAdminConfig {
        name: "Platform Admin".to_string(),
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
    });
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        app.get("/api/v1/health").await.assert_ok();
    }
}
