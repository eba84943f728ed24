use std::sync::Arc;

use crate::auth::{self, AuthState};
use crate::todo::{self, api::v1::TodoState};

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// JSON body of every API error.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable description of the failure
    pub error: String,
    /// Stable machine readable error code
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }

    /// Generic body for failures whose details must not reach the client.
    pub fn internal() -> Self {
        Self::new(
            "INTERNAL_ERROR",
            "An unexpected error occurred while processing your request. Please try again later.",
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::api::v1::register_handler,
        auth::api::v1::json_login_handler,
        auth::api::v1::logout_handler,
        todo::api::v1::create_list_handler,
        todo::api::v1::get_lists_handler,
        todo::api::v1::create_task_handler,
        todo::api::v1::get_tasks_handler,
        todo::api::v1::update_status_handler,
        todo::api::v1::delete_task_handler,
        todo::api::v1::move_task_handler,
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Lists", description = "Todo lists of the caller"),
        (name = "Tasks", description = "Hierarchical tasks")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Handler for GET /api-docs/openapi.json - Returns the OpenAPI document.
#[tracing::instrument]
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(auth_state: Arc<AuthState>, todo_state: Arc<TodoState>) -> Router {
    let login_router = auth::api::v1::create_api_router(auth_state.clone());
    let todo_router = todo::api::v1::create_api_router(todo_state);
    let protected_routes = Router::new()
        .nest("/api/todos", todo_router)
        .merge(auth::api::v1::create_session_router())
        .layer(ServiceBuilder::new().layer(from_fn(auth::api::v1::require_auth_middleware)));
    let public_routes = login_router.route(
        "/api-docs/openapi.json",
        axum::routing::get(openapi_handler),
    );

    public_routes
        .merge(protected_routes)
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::auth_user_middleware,
        )))
}
