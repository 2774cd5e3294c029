//! Request extractors: the authenticated user and the client address.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use labeller_core::UserId;

use crate::error::ServiceError;
use crate::routes::AppState;

/// Header carrying the credential when `Authorization` is not used.
pub const TOKEN_HEADER: &str = "x-auth-token";

/// A request whose credential verified.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Pull the raw credential out of the request headers.
///
/// `Authorization: Bearer <token>` wins over `x-auth-token`.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()))
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = credential_from_headers(&parts.headers)
            .ok_or_else(|| ServiceError::Unauthorized("missing credential".into()))?;

        let claims = state
            .issuer
            .verify(token)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;

        Ok(Self {
            user_id: claims.user_id,
        })
    }
}

/// Origin address of the request.
///
/// First hop of `x-forwarded-for` when behind a proxy, otherwise the socket
/// peer if the server was started with connect info.
#[derive(Debug, Clone, Default)]
pub struct ClientAddress(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(Self(forwarded.or_else(peer)))
    }
}
