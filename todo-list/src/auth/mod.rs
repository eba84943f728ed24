use crate::entities::*;
use axum::extract::MatchedPath;
use jsonwebtoken::encode;
use sea_orm::*;
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

pub mod api;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: i32, username: String) -> Self {
        Self { id, username }
    }
}

impl From<user::Model> for CurrentUser {
    fn from(model: user::Model) -> Self {
        CurrentUser::new(model.id, model.username)
    }
}

/// One-way password hashing used for stored credentials.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    /// Hashes a plain-text password into a self-describing hash string.
    fn hash(&self, password: &str) -> anyhow::Result<String>;
    /// Checks a plain-text password against a hash produced by [`CredentialHasher::hash`].
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher with the crate's default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> anyhow::Result<String> {
        use argon2::password_hash::{PasswordHasher, SaltString};

        let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to encode salt: {e}"))?;
        let hash = argon2::Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        PasswordHash::new(hash).is_ok_and(|parsed| {
            argon2::Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

/// Authentication state containing the user store, hasher and JWT secret.
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub jwt_secret: String,
}

impl AuthState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        hasher: Arc<dyn CredentialHasher>,
        jwt_secret: String,
    ) -> Self {
        Self {
            db,
            hasher,
            jwt_secret,
        }
    }

    pub fn user_service(&self) -> UserService<'_> {
        UserService::new(&self.db, self.hasher.as_ref())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,       // Expiry time of the token
    pub iat: usize,       // Issued at time of the token
    pub user_id: i32,     // Id of the authenticated user
    pub username: String, // Username of the authenticated user
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Missing username or password")]
    MissingCredentials,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub struct UserService<'a> {
    db: &'a DatabaseConnection,
    hasher: &'a dyn CredentialHasher,
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a DatabaseConnection, hasher: &'a dyn CredentialHasher) -> Self {
        UserService { db, hasher }
    }

    /// Registers a user with a hashed password.
    ///
    /// # Returns
    ///
    /// The stored user, or `UsernameTaken` when the name is already registered.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, UserServiceError> {
        if username.is_empty() || password.is_empty() {
            return Err(UserServiceError::MissingCredentials);
        }
        if self.find_by_username(username).await?.is_some() {
            return Err(UserServiceError::UsernameTaken);
        }

        let password_hash = self
            .hasher
            .hash(password)
            .map_err(|e| UserServiceError::Hashing(e.to_string()))?;
        let created = user::ActiveModel {
            username: ActiveValue::Set(username.to_string()),
            password_hash: ActiveValue::Set(password_hash),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        tracing::info!(user_id = created.id, "Registered user");
        Ok(created)
    }

    /// Checks a username and password against the stored hash.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, UserServiceError> {
        if username.is_empty() || password.is_empty() {
            return Err(UserServiceError::MissingCredentials);
        }
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::warn!("Rejected login with a wrong password");
            return Err(UserServiceError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await
    }
}

pub async fn encode_jwt(user: &CurrentUser, jwt_secret: &str) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let expire = chrono::Duration::hours(24);
    let exp = (now + expire).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        user_id: user.id,
        username: user.username.clone(),
    };
    let jwt = encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub async fn decode_jwt(token: &str, jwt_secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Custom span maker that flags credential routes so their bodies and headers stay out of logs.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

const SENSITIVE_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/register"];

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if SENSITIVE_PATHS.contains(&uri.path()) {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
