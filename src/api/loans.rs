//! Borrow and return endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    i18n::{Lang, MessageKey},
    models::loan::{BorrowRequest, BorrowedBook, ReturnRequest, ReturnedBook},
    AppState,
};

use super::{AppJson, AppPath, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub message: String,
    pub book: BorrowedBook,
}

#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    pub book: ReturnedBook,
}

/// Borrow an available copy from a library
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book borrowed", body = BorrowResponse),
        (status = 400, description = "Missing ids or copy already on loan", body = crate::error::ErrorResponse),
        (status = 404, description = "Library or inventory entry not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppJson(request): AppJson<BorrowRequest>,
) -> AppResult<Json<BorrowResponse>> {
    let book = state
        .services
        .loans
        .borrow(user_id, request.library_id, request.book_id)
        .await?;

    Ok(Json(BorrowResponse {
        message: lang.t(MessageKey::BookBorrowed),
        book,
    }))
}

/// Return a borrowed copy to its library
#[utoipa::path(
    put,
    path = "/return/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Missing library id or copy not on loan", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not the borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Library or inventory entry not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(book_id): AppPath<Uuid>,
    AppJson(request): AppJson<ReturnRequest>,
) -> AppResult<Json<ReturnResponse>> {
    let book = state
        .services
        .loans
        .return_book(user_id, request.library_id, Some(book_id))
        .await?;

    Ok(Json(ReturnResponse {
        message: lang.t(MessageKey::BookReturned),
        book,
    }))
}
