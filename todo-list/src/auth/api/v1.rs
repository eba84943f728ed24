use crate::auth::{AuthState, CurrentUser, UserServiceError, decode_jwt, encode_jwt};
use crate::web::api::ErrorResponse;
use axum::{
    Extension, Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON request payload for registration and login.
#[derive(Deserialize, Debug, ToSchema)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public view of a user.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct UserJson {
    pub id: i32,
    pub username: String,
}

/// JSON response for successful API login.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserJson,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AuthMessageResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::MissingCredentials | UserServiceError::UsernameTaken => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("VALIDATION_ERROR", err.to_string())),
            ),
            UserServiceError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("INVALID_CREDENTIALS", err.to_string())),
            ),
            UserServiceError::Hashing(_) | UserServiceError::Database(_) => {
                tracing::error!("Authentication failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal()),
                )
            }
        }
    }
}

fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(String, String), ApiError> {
    let Ok(Json(request)) = payload else {
        return Err(UserServiceError::MissingCredentials.into());
    };
    Ok((
        request.username.unwrap_or_default(),
        request.password.unwrap_or_default(),
    ))
}

/// Creates the public authentication router.
pub fn create_api_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/api/auth/register", axum::routing::post(register_handler))
        .route("/api/auth/login", axum::routing::post(json_login_handler))
        .with_state(state)
}

/// Creates the authentication routes that need a logged-in user.
pub fn create_session_router() -> Router<()> {
    Router::new().route("/api/auth/logout", axum::routing::post(logout_handler))
}

/// API authentication middleware that extracts the current user from Authorization Bearer header.
/// Sets the CurrentUser extension if a valid JWT token is found in the Authorization header.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if let Some(token) = token {
        if let Ok(claims) = decode_jwt(token, &state.jwt_secret).await {
            let current_user = CurrentUser::new(claims.user_id, claims.username);
            request.extensions_mut().insert(current_user);
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        let error_response = ErrorResponse::new(
            "UNAUTHORIZED",
            "Authentication required to access this resource",
        );
        return (StatusCode::UNAUTHORIZED, Json(error_response)).into_response();
    }

    next.run(request).await
}

/// Handler for POST /api/auth/register - Registers a new user.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User registered", body = AuthMessageResponse),
        (status = 400, description = "Missing fields or username taken", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AuthState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthMessageResponse>), ApiError> {
    let (username, password) = credentials(payload)?;
    state.user_service().register(&username, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthMessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// Handles JSON login requests and returns a JWT token.
/// Validates credentials and returns either a success response with token or an error.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn json_login_handler(
    State(state): State<Arc<AuthState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (username, password) = credentials(payload)?;
    let user = CurrentUser::from(
        state
            .user_service()
            .authenticate(&username, &password)
            .await?,
    );

    let token = encode_jwt(&user, &state.jwt_secret).await.map_err(|err| {
        tracing::error!("Failed to generate authentication token: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "JWT_ERROR",
                "Failed to generate authentication token",
            )),
        )
    })?;

    Ok(Json(LoginResponse {
        message: "Logged in successfully".to_string(),
        token,
        user: UserJson {
            id: user.id,
            username: user.username,
        },
    }))
}

/// Handler for POST /api/auth/logout. Tokens are stateless, so the client drops its token.
#[tracing::instrument]
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = AuthMessageResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub async fn logout_handler(
    Extension(user): Extension<CurrentUser>,
) -> Json<AuthMessageResponse> {
    tracing::info!(user_id = user.id, "User logged out");
    Json(AuthMessageResponse {
        message: "Logged out".to_string(),
    })
}
