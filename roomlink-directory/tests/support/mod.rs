use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use roomlink_directory::{create_directory_route, Directory, DirectoryConfig};
use serde_json::Value;
use std::net::SocketAddr;
use tempfile::TempDir;
use tower::ServiceExt;

/// Directory backed by a throwaway sled database
pub struct TestDirectory {
    pub directory: Directory,
    router: Router,
    _dir: TempDir,
}

impl TestDirectory {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DirectoryConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), dir.path())
            .with_jwt_secret("test-secret");
        let directory = Directory::open(config).unwrap();
        Self {
            router: create_directory_route(directory.clone()),
            directory,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register a user and return its token
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "secret1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}
