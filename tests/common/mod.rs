#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use postboard::{
    DEFAULT_MAX_UPLOAD_BYTES, ServerConfig, create_app, db::Database, jwt::JwtConfig,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-integration-tests-0123";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-integration-tests-0123";

pub fn test_tokens() -> JwtConfig {
    JwtConfig::with_secrets(ACCESS_SECRET, REFRESH_SECRET)
}

/// Router plus a handle on its database for seeding and inspection.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_tokens(), None).await
}

pub async fn create_test_app_with(tokens: JwtConfig, base: Option<&str>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        base: base.map(str::to_string),
        db: db.clone(),
        tokens,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    };
    TestApp {
        app: create_app(&config),
        db,
    }
}

/// Registered user with one live session.
pub struct Session {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    /// Send a request with an optional bearer token and JSON body.
    /// Returns the status and the decoded body (`Null` when empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send_request(builder.body(body).unwrap()).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn register(&self, email: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery staple",
                    "firstName": "Test",
                    "lastName": "User",
                    "userName": email.split('@').next().unwrap(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body
    }

    pub async fn login(&self, email: &str) -> Session {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery staple",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Session {
            id: body["id"].as_str().unwrap().to_string(),
            access_token: body["accessToken"].as_str().unwrap().to_string(),
            refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    pub async fn register_and_login(&self, email: &str) -> Session {
        self.register(email).await;
        self.login(email).await
    }

    /// Number of live refresh tokens held by a user.
    pub async fn session_count(&self, user_uuid: &str) -> usize {
        let user = self
            .db
            .users()
            .get_by_uuid(user_uuid)
            .await
            .unwrap()
            .unwrap();
        self.db.tokens().list_by_user(user.id).await.unwrap().len()
    }
}
