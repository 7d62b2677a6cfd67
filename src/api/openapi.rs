//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, libraries, loans, users};

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "1.0.0",
        description = "Book lending REST API: authors publish books, owners stock libraries, readers borrow",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::register,
        users::login,
        users::logout,
        users::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Libraries
        libraries::list_libraries,
        libraries::get_library,
        libraries::create_library,
        libraries::update_library,
        libraries::delete_library,
        libraries::get_inventory,
        libraries::add_book,
        libraries::remove_book,
        // Loans
        loans::borrow_book,
        loans::return_book,
    ),
    components(
        schemas(
            // Users
            crate::models::user::Role,
            crate::models::user::UserSummary,
            crate::models::user::UserProfile,
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            users::UserResponse,
            users::LoginResponse,
            // Books
            crate::models::book::BookRecord,
            crate::models::book::BookProjection,
            crate::models::book::BookAvailability,
            crate::models::book::BookDetail,
            books::BookForm,
            books::BooksResponse,
            books::BookDetailResponse,
            books::BookResponse,
            // Libraries
            crate::models::library::InventoryEntry,
            crate::models::library::LibrarySummary,
            crate::models::library::InventoryItem,
            crate::models::library::LibraryDetail,
            libraries::LibraryRequest,
            libraries::InventoryRequest,
            libraries::LibrariesResponse,
            libraries::LibraryResponse,
            libraries::LibraryDetailResponse,
            libraries::InventoryResponse,
            // Loans
            crate::models::loan::BorrowRequest,
            crate::models::loan::ReturnRequest,
            crate::models::loan::BorrowedBook,
            crate::models::loan::ReturnedBook,
            loans::BorrowResponse,
            loans::ReturnResponse,
            // Common
            crate::api::MessageResponse,
            crate::api::DeletedResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Registration and sessions"),
        (name = "books", description = "Book catalog"),
        (name = "libraries", description = "Libraries and their inventories"),
        (name = "loans", description = "Borrowing and returning")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
