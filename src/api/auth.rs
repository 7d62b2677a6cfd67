//! Authentication middleware and session cookies
//!
//! Access tokens come from `Authorization: Bearer` or the `accessToken`
//! cookie, refresh tokens from the `refreshToken` cookie or the
//! `x-refresh-token` header. A missing or expired access token is replaced
//! transparently when a valid refresh token accompanies the request.

use axum::{
    extract::{Request, State},
    http::{
        header::{HeaderMap, HeaderValue, AUTHORIZATION},
        HeaderName,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::CurrentUser;
use crate::{error::AppError, i18n::MessageKey, AppState};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

pub static REFRESH_HEADER: HeaderName = HeaderName::from_static("x-refresh-token");
pub static ACCESS_HEADER: HeaderName = HeaderName::from_static("x-access-token");

/// Session cookie carrying `value`
pub fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// Removal cookie for `name`, matching the attributes it was set with
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Require a valid session on every route this layer wraps
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let access = bearer_token(request.headers()).or_else(|| cookie_value(&jar, ACCESS_COOKIE));
    let refresh = cookie_value(&jar, REFRESH_COOKIE).or_else(|| {
        request
            .headers()
            .get(&REFRESH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|v| !v.is_empty())
    });

    let users = &state.services.users;
    let (user_id, renewed) = match (access, refresh) {
        (None, None) => return Err(AppError::Authentication(MessageKey::NoToken)),
        (Some(access), refresh) => match users.verify_access_token(&access) {
            Ok(user_id) => (user_id, None),
            Err(AppError::Authentication(MessageKey::AccessTokenExpired)) => match refresh {
                Some(refresh) => {
                    let (user_id, token) = users.refresh_access_token(&refresh).await?;
                    (user_id, Some(token))
                }
                None => return Err(AppError::Authentication(MessageKey::AccessTokenExpired)),
            },
            Err(e) => return Err(e),
        },
        (None, Some(refresh)) => {
            let (user_id, token) = users.refresh_access_token(&refresh).await?;
            (user_id, Some(token))
        }
    };

    request.extensions_mut().insert(CurrentUser(user_id));
    let response = next.run(request).await;

    let Some(token) = renewed else {
        return Ok(response);
    };

    let header = HeaderValue::from_str(&token)
        .map_err(|e| AppError::Internal(format!("Unencodable access token: {}", e)))?;
    let secure = state.config.app.is_production();
    let jar = CookieJar::new().add(session_cookie(ACCESS_COOKIE, token, secure));

    let mut response = (jar, response).into_response();
    response.headers_mut().insert(ACCESS_HEADER.clone(), header);
    Ok(response)
}
