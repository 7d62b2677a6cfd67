//! Registration, login and session tokens

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use super::require_user;
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::user::{LoginRequest, RegisterRequest, TokenClaims, TokenKind, User},
    repository::{Repository, WriteBatch},
};

/// Tokens issued on login
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct UsersService {
    repository: Arc<dyn Repository>,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Arc<dyn Repository>, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Create an account with no roles
    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        let request = RegisterRequest {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate().map_err(|errors| {
            let errors = errors.field_errors();
            let key = ["name", "email", "password"]
                .into_iter()
                .find(|field| errors.contains_key(*field))
                .map(|field| match field {
                    "name" => MessageKey::NameRequired,
                    "email" => MessageKey::InvalidEmail,
                    _ => MessageKey::PasswordTooShort,
                })
                .unwrap_or(MessageKey::InvalidRequestBody);
            AppError::Validation(key)
        })?;

        if self.repository.user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict(MessageKey::EmailTaken));
        }

        let hash = hash_password(&request.password)?;
        let user = User::new(request.name, request.email, hash);
        self.repository
            .commit(WriteBatch::new().insert_user(user.clone()))
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and issue an access/refresh token pair
    pub async fn login(&self, request: LoginRequest) -> AppResult<Session> {
        let mut user = self
            .repository
            .user_by_email(request.email.trim())
            .await?
            .ok_or(AppError::Authentication(MessageKey::InvalidCredentials))?;

        if !verify_password(&user.password_hash, &request.password)? {
            tracing::warn!(user_id = %user.id, "Rejected login");
            return Err(AppError::Authentication(MessageKey::InvalidCredentials));
        }

        let access_token = self.issue(user.id, TokenKind::Access)?;
        let refresh_token = self.issue(user.id, TokenKind::Refresh)?;

        user.refresh_token_hash = Some(token_digest(&refresh_token));
        self.repository
            .commit(WriteBatch::new().update_user(user.clone()))
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(Session {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Forget the stored refresh token so it can no longer mint access tokens
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        let mut user = require_user(self.repository.as_ref(), user_id).await?;
        if user.refresh_token_hash.take().is_some() {
            self.repository
                .commit(WriteBatch::new().update_user(user))
                .await?;
        }
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        require_user(self.repository.as_ref(), user_id).await
    }

    /// Validate an access token and return its subject
    pub fn verify_access_token(&self, token: &str) -> AppResult<Uuid> {
        let claims = TokenClaims::from_token(token, &self.config.access_secret).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Authentication(MessageKey::AccessTokenExpired),
                _ => AppError::Authentication(MessageKey::InvalidAccessToken),
            }
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Authentication(MessageKey::InvalidAccessToken));
        }
        Ok(claims.sub)
    }

    /// Mint a fresh access token from the user's current refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<(Uuid, String)> {
        let invalid = || AppError::Authentication(MessageKey::InvalidRefreshToken);

        let claims = TokenClaims::from_token(refresh_token, &self.config.refresh_secret)
            .map_err(|_| invalid())?;
        if claims.kind != TokenKind::Refresh {
            return Err(invalid());
        }

        let user = self
            .repository
            .user_by_id(claims.sub)
            .await?
            .ok_or_else(invalid)?;

        if user.refresh_token_hash.as_deref() != Some(token_digest(refresh_token).as_str()) {
            tracing::warn!(user_id = %user.id, "Refresh token does not match the stored session");
            return Err(invalid());
        }

        let access_token = self.issue(user.id, TokenKind::Access)?;
        tracing::debug!(user_id = %user.id, "Access token refreshed");
        Ok((user.id, access_token))
    }

    fn issue(&self, user_id: Uuid, kind: TokenKind) -> AppResult<String> {
        let (ttl, secret) = match kind {
            TokenKind::Access => (
                Duration::minutes(self.config.access_ttl_minutes),
                &self.config.access_secret,
            ),
            TokenKind::Refresh => (
                Duration::days(self.config.refresh_ttl_days),
                &self.config.refresh_secret,
            ),
        };

        TokenClaims::new(user_id, kind, ttl)
            .create_token(secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Refresh tokens are only ever stored as a SHA-256 digest
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
