//! HTTP router assembly

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{api, AppState};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([api::auth::ACCESS_HEADER.clone()]);

    let public = Router::new()
        .route("/users/register", post(api::users::register))
        .route("/users/login", post(api::users::login));

    let protected = Router::new()
        // Users
        .route("/users/logout", post(api::users::logout))
        .route("/users/me", get(api::users::me))
        // Books
        .route(
            "/books",
            get(api::books::list_books).post(api::books::create_book),
        )
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Libraries
        .route(
            "/libraries",
            get(api::libraries::list_libraries).post(api::libraries::create_library),
        )
        .route(
            "/libraries/:id",
            get(api::libraries::get_library)
                .put(api::libraries::update_library)
                .delete(api::libraries::delete_library),
        )
        .route(
            "/libraries/:id/inventory",
            get(api::libraries::get_inventory).post(api::libraries::add_book),
        )
        .route(
            "/libraries/:id/inventory/:book_id",
            delete(api::libraries::remove_book),
        )
        // Loans
        .route("/borrow", post(api::loans::borrow_book))
        .route("/return/:id", put(api::loans::return_book))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_auth,
        ));

    let api_v1 = public.merge(protected);

    let mut router = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        .nest("/api/v1", api_v1)
        .fallback(api::not_found)
        .with_state(state.clone());

    let covers = &state.config.covers;
    if covers.public_url.starts_with('/') && covers.public_url.len() > 1 {
        // Uploaded files never run script on the API origin
        let files = tower::ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("sandbox; default-src 'none'"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .service(ServeDir::new(&covers.directory));
        router = router.nest_service(&covers.public_url, files);
    }

    router
        .merge(api::openapi::create_openapi_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::envelope::render_errors,
        ))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
