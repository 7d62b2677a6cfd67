//! Book model and related views

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserSummary;

/// Catalog entry. Availability per copy lives in library inventories.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    /// Written-by relation, fixed at creation
    pub author_id: Uuid,
    pub image_url: Option<String>,
    /// Legacy flag kept for clients of the single-library model
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl Book {
    pub fn new(title: String, author_id: Uuid, image_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            author_id,
            image_url,
            is_available: true,
            created_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn is_written_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }

    pub fn record(&self) -> BookRecord {
        BookRecord {
            id: self.id,
            title: self.title.clone(),
            author_id: self.author_id,
            image_url: self.image_url.clone(),
            is_available: self.is_available,
            created_at: self.created_at,
        }
    }

    pub fn projection(&self, author_name: Option<String>) -> BookProjection {
        BookProjection {
            id: self.id,
            title: self.title.clone(),
            author: author_name,
            image_url: self.image_url.clone(),
            created_at: self.created_at,
        }
    }
}

/// Stored book fields, as listed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// Book as returned by create and update
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookProjection {
    pub id: Uuid,
    pub title: String,
    /// Author display name
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One library's copy of a book
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookAvailability {
    pub library_id: Uuid,
    pub library_name: String,
    pub is_available: bool,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub charge: Decimal,
    pub borrower: Option<UserSummary>,
    pub borrowed_at: Option<DateTime<Utc>>,
}

/// Book detail aggregate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    /// `None` when the author account no longer resolves
    pub author: Option<UserSummary>,
    pub libraries: Vec<BookAvailability>,
}
