//! Request extractors for caller identity, client address, and request
//! input.
//!
//! [`ApiJson`] and [`ApiPath`] wrap axum's `Json` and `Path` so malformed
//! bodies and identifiers are rejected with the JSON error body and a 400.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Request};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::auth::Identity;
use crate::error::GatewayError;

/// Authenticated caller. Rejects with 401 when the bearer token is
/// missing or invalid.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| GatewayError::Unauthorized("missing bearer token".to_string()))?;
        state.tokens.verify(token).map(Self)
    }
}

/// Authenticated admin. Rejects with 401 without a valid token and 403
/// for non-admin callers.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller(pub Identity);

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Caller(identity) = Caller::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(GatewayError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(identity))
    }
}

/// Caller identity when a valid bearer token is present.
///
/// Anonymous or badly authenticated requests yield `None` instead of
/// being rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = bearer_token(&parts.headers).and_then(|t| state.tokens.verify(t).ok());
        Ok(Self(identity))
    }
}

/// Best-effort client IP address.
///
/// Taken from the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket peer, falling back to `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(
            forwarded_ip(&parts.headers)
                .or(peer)
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

/// The `User-Agent` header, if present and valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(pub Option<String>);

impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        ))
    }
}

/// JSON request body; decode failures become [`GatewayError::Validation`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters; parse failures become [`GatewayError::Validation`].
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .trim()
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    forwarded
        .into_iter()
        .chain(real)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
