//! HTTP-level tests for the Bookshelf API over the in-memory repository

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use bookshelf_server::{
    create_router,
    i18n::{translate, Lang, MessageKey},
    repository::MemoryRepository,
    services::{LocalCoverStore, Services},
    AppConfig, AppState,
};

struct TestApp {
    server: TestServer,
    _covers: TempDir,
}

fn test_app_in(environment: &str) -> TestApp {
    let covers = TempDir::new().expect("Failed to create temp dir");

    let mut config = AppConfig::default();
    config.app.environment = environment.to_string();
    config.database.url = "memory".to_string();
    config.covers.directory = covers.path().to_string_lossy().into_owned();

    let services = Services::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(LocalCoverStore::new(&config.covers)),
        &config,
    );
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let server = TestServer::new(create_router(state)).expect("Failed to create test server");
    TestApp {
        server,
        _covers: covers,
    }
}

fn test_app() -> TestApp {
    test_app_in("development")
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

struct Session {
    id: String,
    access_token: String,
    refresh_token: String,
}

/// Register and log in, returning the new user's id and tokens
async fn sign_up(server: &TestServer, name: &str) -> Session {
    let email = format!("{}@example.com", name.to_lowercase());

    let response = server
        .post("/api/v1/users/register")
        .json(&json!({ "name": name, "email": email, "password": "secret123" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/v1/users/login")
        .json(&json!({ "email": email, "password": "secret123" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    Session {
        id: body["user"]["id"].as_str().unwrap().to_string(),
        access_token: body["accessToken"].as_str().unwrap().to_string(),
        refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
    }
}

fn cover_form(title: &str) -> MultipartForm {
    MultipartForm::new().add_text("title", title).add_part(
        "image",
        Part::bytes(b"\x89PNG fake image".to_vec())
            .file_name("cover.png")
            .mime_type("image/png"),
    )
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check_with_memory_store() {
    let app = test_app();

    let response = app.server.get("/ready").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn test_lending_round_trip() {
    let app = test_app();
    let server = &app.server;

    let owner = sign_up(server, "Asha").await;
    let author = sign_up(server, "Chetan").await;
    let reader = sign_up(server, "Divya").await;

    // Owner opens a library
    let response = server
        .post("/api/v1/libraries")
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "name": "Central" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let library_id = response.json::<Value>()["library"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Author publishes a book with a cover
    let response = server
        .post("/api/v1/books")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(cover_form("The Long Shelf"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let book: Value = response.json::<Value>()["book"].clone();
    let book_id = book["id"].as_str().unwrap().to_string();
    assert_eq!(book["author"], "Chetan");
    let image_url = book["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/covers/"));

    // The cover is served back
    server.get(&image_url).await.assert_status_ok();

    // Owner stocks it at a charge of 5
    let response = server
        .post(&format!("/api/v1/libraries/{}/inventory", library_id))
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "bookId": book_id, "charge": 5 }))
        .await;
    response.assert_status_ok();
    let inventory = response.json::<Value>()["inventory"].clone();
    assert_eq!(inventory.as_array().unwrap().len(), 1);
    assert_eq!(inventory[0]["isAvailable"], true);
    assert_eq!(inventory[0]["title"], "The Long Shelf");

    // Reader borrows it
    let response = server
        .post("/api/v1/borrow")
        .add_header(header::AUTHORIZATION, bearer(&reader.access_token))
        .json(&json!({ "libraryId": library_id, "bookId": book_id }))
        .await;
    response.assert_status_ok();
    let borrowed = response.json::<Value>()["book"].clone();
    assert_eq!(borrowed["id"], book_id.as_str());
    assert_eq!(borrowed["charge"].as_f64(), Some(5.0));
    assert_eq!(borrowed["borrower"]["id"], reader.id.as_str());

    // A second borrow of the same copy is refused
    let response = server
        .post("/api/v1/borrow")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .json(&json!({ "libraryId": library_id, "bookId": book_id }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Book is already borrowed");

    // The book detail shows who holds it
    let response = server
        .get(&format!("/api/v1/books/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&reader.access_token))
        .await;
    response.assert_status_ok();
    let detail = response.json::<Value>()["book"].clone();
    assert_eq!(detail["author"]["name"], "Chetan");
    assert_eq!(detail["libraries"][0]["isAvailable"], false);
    assert_eq!(detail["libraries"][0]["borrower"]["id"], reader.id.as_str());

    let response = server
        .get("/api/v1/users/me")
        .add_header(header::AUTHORIZATION, bearer(&reader.access_token))
        .await;
    response.assert_status_ok();
    let profile = response.json::<Value>()["user"].clone();
    assert_eq!(profile["borrowedBooks"], json!([book_id]));
    assert_eq!(profile["roles"], json!(["borrower"]));

    // Only the borrower may return it
    let response = server
        .put(&format!("/api/v1/return/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "libraryId": library_id }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .put(&format!("/api/v1/return/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&reader.access_token))
        .json(&json!({ "libraryId": library_id }))
        .await;
    response.assert_status_ok();
    let returned = response.json::<Value>()["book"].clone();
    assert_eq!(returned["id"], book_id.as_str());
    assert_eq!(returned["libraryId"], library_id.as_str());

    // The copy is back on the shelf
    let response = server
        .get(&format!("/api/v1/libraries/{}/inventory", library_id))
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .await;
    response.assert_status_ok();
    let entry = response.json::<Value>()["inventory"][0].clone();
    assert_eq!(entry["isAvailable"], true);
    assert!(entry["borrower"].is_null());
    assert_eq!(entry["charge"].as_f64(), Some(5.0));
}

#[tokio::test]
async fn test_missing_token_is_rejected_with_stack_in_development() {
    let app = test_app();

    let response = app.server.get("/api/v1/books").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Not authorized, no token provided");
    assert!(body["stack"].is_string());
}

#[tokio::test]
async fn test_production_errors_hide_the_stack() {
    let app = test_app_in("production");

    let response = app.server.get("/api/v1/libraries").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Not authorized, no token provided");
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn test_messages_follow_accept_language() {
    let app = test_app();

    let response = app
        .server
        .get("/api/v1/books")
        .add_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("hi-IN,hi;q=0.9,en;q=0.8"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>()["message"],
        translate(MessageKey::NoToken, Lang::Hi)
    );
}

#[tokio::test]
async fn test_invalid_access_token_is_rejected() {
    let app = test_app();

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(header::AUTHORIZATION, bearer("not.a.jwt"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid access token");
}

#[tokio::test]
async fn test_refresh_token_mints_a_new_access_token() {
    let app = test_app();
    let session = sign_up(&app.server, "Farah").await;

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(
            HeaderName::from_static("x-refresh-token"),
            HeaderValue::from_str(&session.refresh_token).unwrap(),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["user"]["id"], session.id.as_str());

    let renewed = response
        .headers()
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
        .expect("renewed access token header")
        .to_string();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("accessToken="));

    // The minted token works on its own
    app.server
        .get("/api/v1/users/me")
        .add_header(header::AUTHORIZATION, bearer(&renewed))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_revokes_the_refresh_token() {
    let app = test_app();
    let session = sign_up(&app.server, "Gopal").await;

    app.server
        .post("/api/v1/users/logout")
        .add_header(header::AUTHORIZATION, bearer(&session.access_token))
        .await
        .assert_status_ok();

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(
            HeaderName::from_static("x-refresh-token"),
            HeaderValue::from_str(&session.refresh_token).unwrap(),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
    let app = test_app();
    sign_up(&app.server, "Hema").await;

    let response = app
        .server
        .post("/api/v1/users/register")
        .json(&json!({ "name": "Other", "email": "HEMA@example.com", "password": "secret123" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["message"], "User already exists");
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = test_app();
    sign_up(&app.server, "Ishaan").await;

    let response = app
        .server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "ishaan@example.com", "password": "wrong-password" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_malformed_json_uses_the_error_envelope() {
    let app = test_app();

    let response = app
        .server
        .post("/api/v1/users/register")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Request body is malformed");
}

#[tokio::test]
async fn test_book_requires_a_cover_image() {
    let app = test_app();
    let author = sign_up(&app.server, "Jaya").await;

    let response = app
        .server
        .post("/api/v1/books")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(MultipartForm::new().add_text("title", "Bare"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Cover image is required");
}

#[tokio::test]
async fn test_svg_cover_is_rejected() {
    let app = test_app();
    let author = sign_up(&app.server, "Jatin").await;

    let form = MultipartForm::new().add_text("title", "Scripted").add_part(
        "image",
        Part::bytes(b"<svg xmlns='http://www.w3.org/2000/svg' onload='alert(1)'/>".to_vec())
            .file_name("cover.svg")
            .mime_type("image/svg+xml"),
    );
    let response = app
        .server
        .post("/api/v1/books")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Cover image must be an image file"
    );
}

#[tokio::test]
async fn test_served_covers_are_sandboxed() {
    let app = test_app();
    let author = sign_up(&app.server, "Kavya").await;

    let response = app
        .server
        .post("/api/v1/books")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(cover_form("Framed"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let image_url = response.json::<Value>()["book"]["imageUrl"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.server.get(&image_url).await;
    response.assert_status_ok();
    let csp = response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(csp.starts_with("sandbox"));
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_only_the_author_may_update_a_book() {
    let app = test_app();
    let author = sign_up(&app.server, "Kiran").await;
    let other = sign_up(&app.server, "Lata").await;

    let response = app
        .server
        .post("/api/v1/books")
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(cover_form("Mine"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let book_id = response.json::<Value>()["book"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .put(&format!("/api/v1/books/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&other.access_token))
        .multipart(MultipartForm::new().add_text("title", "Theirs"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .put(&format!("/api/v1/books/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .multipart(MultipartForm::new().add_text("title", "Still Mine"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["book"]["title"], "Still Mine");

    let response = app
        .server
        .delete(&format!("/api/v1/books/{}", book_id))
        .add_header(header::AUTHORIZATION, bearer(&author.access_token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["deletedId"], book_id.as_str());
}

#[tokio::test]
async fn test_non_owner_cannot_change_a_library() {
    let app = test_app();
    let owner = sign_up(&app.server, "Meera").await;
    let other = sign_up(&app.server, "Nikhil").await;

    let response = app
        .server
        .post("/api/v1/libraries")
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "name": "Riverside" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let library_id = response.json::<Value>()["library"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .put(&format!("/api/v1/libraries/{}", library_id))
        .add_header(header::AUTHORIZATION, bearer(&other.access_token))
        .json(&json!({ "name": "Taken Over" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["message"],
        "You do not have access to this library"
    );

    let response = app
        .server
        .delete(&format!("/api/v1/libraries/{}", library_id))
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["deletedId"], library_id.as_str());
}

#[tokio::test]
async fn test_negative_charge_is_rejected() {
    let app = test_app();
    let owner = sign_up(&app.server, "Omar").await;

    let response = app
        .server
        .post("/api/v1/libraries")
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "name": "Hillside" }))
        .await;
    let library_id = response.json::<Value>()["library"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .post(&format!("/api/v1/libraries/{}/inventory", library_id))
        .add_header(header::AUTHORIZATION, bearer(&owner.access_token))
        .json(&json!({ "bookId": "00000000-0000-0000-0000-000000000000", "charge": -1 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Charge cannot be negative");
}

#[tokio::test]
async fn test_invalid_path_id_is_a_bad_request() {
    let app = test_app();
    let session = sign_up(&app.server, "Priya").await;

    let response = app
        .server
        .get("/api/v1/books/not-a-uuid")
        .add_header(header::AUTHORIZATION, bearer(&session.access_token))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Invalid identifier in request path"
    );
}

#[tokio::test]
async fn test_missing_library_is_not_found() {
    let app = test_app();
    let session = sign_up(&app.server, "Ravi").await;

    let response = app
        .server
        .get("/api/v1/libraries/00000000-0000-0000-0000-000000000000")
        .add_header(header::AUTHORIZATION, bearer(&session.access_token))
        .await;

    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["message"], "Library not found");
}

#[tokio::test]
async fn test_authenticated_lists_start_empty() {
    let app = test_app();
    let session = sign_up(&app.server, "Meera").await;

    for (path, field) in [("/api/v1/books", "books"), ("/api/v1/libraries", "libraries")] {
        let response = app
            .server
            .get(path)
            .add_header(header::AUTHORIZATION, bearer(&session.access_token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()[field], json!([]));
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app();

    let response = app.server.get("/api/v1/nowhere").await;

    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["message"], "Route not found");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_app();

    let response = app.server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let doc: Value = response.json();
    assert!(doc["paths"]["/books"].is_object());
    assert!(doc["paths"]["/borrow"].is_object());
    // The caller comes from the bearer token, not from a documented parameter
    assert!(doc["paths"]["/books"]["get"]["parameters"].is_null());
    assert_eq!(
        doc["paths"]["/libraries/{id}/inventory"]["get"]["parameters"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}
