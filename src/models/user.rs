//! User model, derived roles and session tokens

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Capability tag granted automatically by performing an action once
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Borrower,
    Library,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Borrower => "borrower",
            Role::Library => "library",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "author" => Ok(Role::Author),
            "borrower" => Ok(Role::Borrower),
            "library" => Ok(Role::Library),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Successful actions that grant a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvent {
    BookCreated,
    LibraryCreated,
    BookBorrowed,
}

impl RoleEvent {
    pub fn granted_role(self) -> Role {
        match self {
            RoleEvent::BookCreated => Role::Author,
            RoleEvent::LibraryCreated => Role::Library,
            RoleEvent::BookBorrowed => Role::Borrower,
        }
    }
}

/// Roles after `event`. Roles are append-only: nothing ever removes one.
pub fn derive_roles(current: &BTreeSet<Role>, event: RoleEvent) -> BTreeSet<Role> {
    let mut roles = current.clone();
    roles.insert(event.granted_role());
    roles
}

/// User document
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    /// Authored books, in creation order
    pub books_written: Vec<Uuid>,
    /// Books currently held; no duplicates
    pub borrowed_books: Vec<Uuid>,
    pub libraries_owned: Vec<Uuid>,
    /// SHA-256 (hex) of the only refresh token currently accepted
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            roles: BTreeSet::new(),
            books_written: Vec::new(),
            borrowed_books: Vec::new(),
            libraries_owned: Vec::new(),
            refresh_token_hash: None,
            created_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn apply(&mut self, event: RoleEvent) {
        self.roles = derive_roles(&self.roles, event);
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn record_book_written(&mut self, book_id: Uuid) {
        push_unique(&mut self.books_written, book_id);
    }

    pub fn forget_book_written(&mut self, book_id: Uuid) {
        self.books_written.retain(|id| *id != book_id);
    }

    pub fn record_library_owned(&mut self, library_id: Uuid) {
        push_unique(&mut self.libraries_owned, library_id);
    }

    pub fn forget_library_owned(&mut self, library_id: Uuid) {
        self.libraries_owned.retain(|id| *id != library_id);
    }

    pub fn record_borrowed(&mut self, book_id: Uuid) {
        push_unique(&mut self.borrowed_books, book_id);
    }

    pub fn forget_borrowed(&mut self, book_id: Uuid) {
        self.borrowed_books.retain(|id| *id != book_id);
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.iter().copied().collect(),
            books_written: self.books_written.clone(),
            borrowed_books: self.borrowed_books.clone(),
            libraries_owned: self.libraries_owned.clone(),
            created_at: self.created_at,
        }
    }
}

fn push_unique(ids: &mut Vec<Uuid>, id: Uuid) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// Public identity embedded in other responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// A user's own view of their account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub books_written: Vec<Uuid>,
    pub borrowed_books: Vec<Uuid>,
    pub libraries_owned: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, code = "name_required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(code = "invalid_email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, code = "password_too_short"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub kind: TokenKind,
    /// Unique per token so two refresh tokens issued in the same second differ
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    pub fn new(user_id: Uuid, kind: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            kind,
            jti: Uuid::new_v4(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a signed JWT
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}
