//! Account endpoints: register, login, logout and profile

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    i18n::{Lang, MessageKey},
    models::user::{LoginRequest, RegisterRequest, UserProfile},
    AppState,
};

use super::{
    auth::{expired_cookie, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
    AppJson, AuthenticatedUser, MessageResponse,
};

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub message: String,
    pub user: UserProfile,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user: UserProfile,
    /// Short-lived token for `Authorization: Bearer`
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    pub refresh_token: String,
}

/// Create an account
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    lang: Lang,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state.services.users.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: lang.t(MessageKey::UserRegistered),
            user: user.profile(),
        }),
    ))
}

/// Log in and receive session tokens, also set as HttpOnly cookies
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    lang: Lang,
    jar: CookieJar,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let session = state.services.users.login(request).await?;
    let secure = state.config.app.is_production();

    let jar = jar
        .add(session_cookie(ACCESS_COOKIE, session.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), secure));

    Ok((
        jar,
        Json(LoginResponse {
            message: lang.t(MessageKey::LoginSuccessful),
            user: session.user.profile(),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        }),
    ))
}

/// End the session and clear cookies
#[utoipa::path(
    post,
    path = "/users/logout",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    state.services.users.logout(user_id).await?;

    let jar = jar
        .remove(expired_cookie(ACCESS_COOKIE))
        .remove(expired_cookie(REFRESH_COOKIE));

    Ok((
        jar,
        Json(MessageResponse {
            message: lang.t(MessageKey::LoggedOut),
        }),
    ))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "User no longer exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    lang: Lang,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users.profile(user_id).await?;

    Ok(Json(UserResponse {
        message: lang.t(MessageKey::ProfileFetched),
        user: user.profile(),
    }))
}
