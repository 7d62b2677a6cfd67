//! Book catalog endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::{multipart::MultipartRejection, Multipart};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    i18n::{Lang, MessageKey},
    models::book::{BookDetail, BookProjection, BookRecord},
    services::catalog::{BookInput, NewCover},
    AppState,
};

use super::{AppPath, AuthenticatedUser, DeletedResponse};

/// Multipart form for create and update
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BookForm {
    pub title: String,
    /// Cover image (`image/*`)
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

#[derive(Serialize, ToSchema)]
pub struct BooksResponse {
    pub message: String,
    pub books: Vec<BookRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct BookDetailResponse {
    pub message: String,
    pub book: BookDetail,
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub message: String,
    pub book: BookProjection,
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    tracing::debug!("Rejected multipart body: {}", e);
    AppError::Validation(MessageKey::InvalidMultipart)
}

/// Read the `title` and `image` fields; other fields are ignored
async fn read_book_form(multipart: Result<Multipart, MultipartRejection>) -> AppResult<BookInput> {
    let mut multipart = multipart.map_err(multipart_error)?;
    let mut input = BookInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                input.title = Some(field.text().await.map_err(multipart_error)?);
            }
            "image" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    input.cover = Some(NewCover {
                        bytes: bytes.to_vec(),
                        content_type,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All books, oldest first", body = BooksResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    lang: Lang,
) -> AppResult<Json<BooksResponse>> {
    let books = state.services.catalog.list().await?;

    Ok(Json(BooksResponse {
        message: lang.t(MessageKey::BooksFetched),
        books,
    }))
}

/// Book with its author and availability in every library
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetailResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<BookDetailResponse>> {
    let book = state.services.catalog.get(id).await?;

    Ok(Json(BookDetailResponse {
        message: lang.t(MessageKey::BookFetched),
        book,
    }))
}

/// Publish a book with its cover
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing title or cover", body = crate::error::ErrorResponse),
        (status = 409, description = "Title already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let input = read_book_form(multipart).await?;
    let book = state.services.catalog.create(user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: lang.t(MessageKey::BookCreated),
            book,
        }),
    ))
}

/// Change a book's title and optionally its cover (author only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Missing title", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not the author", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<BookResponse>> {
    let input = read_book_form(multipart).await?;
    let book = state.services.catalog.update(user_id, id, input).await?;

    Ok(Json(BookResponse {
        message: lang.t(MessageKey::BookUpdated),
        book,
    }))
}

/// Delete a book (author only)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = DeletedResponse),
        (status = 403, description = "Caller is not the author", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "A copy is on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted_id = state.services.catalog.delete(user_id, id).await?;

    Ok(Json(DeletedResponse {
        message: lang.t(MessageKey::BookDeleted),
        deleted_id,
    }))
}
