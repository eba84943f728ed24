#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ActiveValue, ConnectOptions, Database, DatabaseConnection};
use todo_list_server::auth::{CurrentUser, encode_jwt};
use todo_list_server::config::Config;
use todo_list_server::entities::user;
use todo_list_server::todo::DuplicateTitlePolicy;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "some_secret";

/// Opens a fresh in-memory database with all migrations applied.
///
/// The pool is pinned to one connection because every SQLite memory connection
/// is its own database.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a user directly, bypassing password hashing.
pub async fn create_user(db: &DatabaseConnection, username: &str) -> anyhow::Result<user::Model> {
    let user = user::ActiveModel {
        username: ActiveValue::Set(username.to_string()),
        password_hash: ActiveValue::Set("not-a-real-hash".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(user)
}

pub fn test_config() -> Config {
    Config {
        db_url: "sqlite::memory:".to_string(),
        port: 8080,
        jwt_secret: JWT_SECRET.to_string(),
        duplicate_task_titles: DuplicateTitlePolicy::Siblings,
        unique_list_titles: true,
    }
}

/// Authorization header value for a stored user.
pub async fn bearer_for(user: &user::Model) -> String {
    let current_user = CurrentUser::new(user.id, user.username.clone());
    let token = encode_jwt(&current_user, JWT_SECRET)
        .await
        .expect("Failed to encode token");
    format!("Bearer {}", token)
}

/// Sends one request through the app and decodes the JSON response body.
///
/// Bodies that are not JSON come back as a JSON string.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    authorization: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header("authorization", authorization);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, json)
}
