//! Library and inventory endpoints

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    i18n::{Lang, MessageKey},
    models::library::{InventoryItem, LibraryDetail, LibrarySummary},
    AppState,
};

use super::{AppJson, AppPath, AuthenticatedUser, DeletedResponse};

/// Create or rename request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LibraryRequest {
    pub name: Option<String>,
}

/// Stock request
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    pub book_id: Option<Uuid>,
    /// Non-negative fee charged per borrow
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub charge: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
pub struct LibrariesResponse {
    pub message: String,
    pub libraries: Vec<LibrarySummary>,
}

#[derive(Serialize, ToSchema)]
pub struct LibraryResponse {
    pub message: String,
    pub library: LibrarySummary,
}

#[derive(Serialize, ToSchema)]
pub struct LibraryDetailResponse {
    pub message: String,
    pub library: LibraryDetail,
}

#[derive(Serialize, ToSchema)]
pub struct InventoryResponse {
    pub message: String,
    pub inventory: Vec<InventoryItem>,
}

/// List all libraries
#[utoipa::path(
    get,
    path = "/libraries",
    tag = "libraries",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All libraries, oldest first", body = LibrariesResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_libraries(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    lang: Lang,
) -> AppResult<Json<LibrariesResponse>> {
    let libraries = state.services.libraries.list().await?;

    Ok(Json(LibrariesResponse {
        message: lang.t(MessageKey::LibrariesFetched),
        libraries,
    }))
}

/// Library with its resolved inventory
#[utoipa::path(
    get,
    path = "/libraries/{id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID")
    ),
    responses(
        (status = 200, description = "Library details", body = LibraryDetailResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_library(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<LibraryDetailResponse>> {
    let library = state.services.libraries.get(id).await?;

    Ok(Json(LibraryDetailResponse {
        message: lang.t(MessageKey::LibraryFetched),
        library,
    }))
}

/// Open a library owned by the caller
#[utoipa::path(
    post,
    path = "/libraries",
    tag = "libraries",
    security(("bearer_auth" = [])),
    request_body = LibraryRequest,
    responses(
        (status = 201, description = "Library created", body = LibraryResponse),
        (status = 400, description = "Missing name", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_library(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppJson(request): AppJson<LibraryRequest>,
) -> AppResult<(StatusCode, Json<LibraryResponse>)> {
    let library = state.services.libraries.create(user_id, request.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(LibraryResponse {
            message: lang.t(MessageKey::LibraryCreated),
            library,
        }),
    ))
}

/// Rename a library (owner only)
#[utoipa::path(
    put,
    path = "/libraries/{id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID")
    ),
    request_body = LibraryRequest,
    responses(
        (status = 200, description = "Library updated", body = LibraryResponse),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_library(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<LibraryRequest>,
) -> AppResult<Json<LibraryResponse>> {
    let library = state
        .services
        .libraries
        .update(user_id, id, request.name)
        .await?;

    Ok(Json(LibraryResponse {
        message: lang.t(MessageKey::LibraryUpdated),
        library,
    }))
}

/// Close a library (owner only)
#[utoipa::path(
    delete,
    path = "/libraries/{id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID")
    ),
    responses(
        (status = 200, description = "Library deleted", body = DeletedResponse),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_library(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted_id = state.services.libraries.delete(user_id, id).await?;

    Ok(Json(DeletedResponse {
        message: lang.t(MessageKey::LibraryDeleted),
        deleted_id,
    }))
}

/// Inventory with book titles, covers and current borrowers
#[utoipa::path(
    get,
    path = "/libraries/{id}/inventory",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID")
    ),
    responses(
        (status = 200, description = "Inventory", body = InventoryResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_inventory(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<InventoryResponse>> {
    let inventory = state.services.libraries.inventory(id).await?;

    Ok(Json(InventoryResponse {
        message: lang.t(MessageKey::InventoryFetched),
        inventory,
    }))
}

/// Stock a book (owner only)
#[utoipa::path(
    post,
    path = "/libraries/{id}/inventory",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID")
    ),
    request_body = InventoryRequest,
    responses(
        (status = 200, description = "Updated inventory", body = InventoryResponse),
        (status = 400, description = "Missing book id or invalid charge", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Library or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already stocked", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<InventoryRequest>,
) -> AppResult<Json<InventoryResponse>> {
    let inventory = state
        .services
        .libraries
        .add_book(user_id, id, request.book_id, request.charge)
        .await?;

    Ok(Json(InventoryResponse {
        message: lang.t(MessageKey::BookAddedToInventory),
        inventory,
    }))
}

/// Withdraw a book (owner only)
#[utoipa::path(
    delete,
    path = "/libraries/{id}/inventory/{book_id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Library ID"),
        ("book_id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Updated inventory", body = InventoryResponse),
        (status = 403, description = "Caller is not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Library or inventory entry not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_book(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    AppPath((id, book_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<InventoryResponse>> {
    let inventory = state
        .services
        .libraries
        .remove_book(user_id, id, book_id)
        .await?;

    Ok(Json(InventoryResponse {
        message: lang.t(MessageKey::BookRemovedFromInventory),
        inventory,
    }))
}
