//! Borrow and return request/response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserSummary;

/// Borrow request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub library_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
}

/// Return request; the book id comes from the path
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub library_id: Option<Uuid>,
}

/// Outcome of a successful borrow
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowedBook {
    /// Book id
    pub id: Uuid,
    pub borrower: UserSummary,
    /// Fee for this borrow; informational only
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub charge: Decimal,
}

/// Outcome of a successful return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnedBook {
    /// Book id
    pub id: Uuid,
    pub library_id: Uuid,
}
