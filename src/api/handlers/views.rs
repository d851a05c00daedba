//! Listing view recording and analytics handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::extract::{ApiPath, Caller, ClientIp, MaybeCaller, UserAgent};
use crate::app_state::AppState;
use crate::domain::{AnalyticsReport, ListingId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::RecordedView;

/// `POST /listings/:id/view`: Record a listing view.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the listing does not exist.
#[utoipa::path(
    post,
    path = "/listings/{id}/view",
    tag = "Views",
    summary = "Record a listing view",
    description = "Records a view from the client IP. Repeat views from the same IP within the recent window extend the open event instead of creating a new one.",
    params(
        ("id" = uuid::Uuid, Path, description = "Listing UUID"),
    ),
    responses(
        (status = 201, description = "View recorded or extended", body = RecordedView),
        (status = 400, description = "Malformed listing id", body = ErrorResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<ListingId>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    MaybeCaller(caller): MaybeCaller,
) -> Result<impl IntoResponse, GatewayError> {
    let recorded = state
        .view_service
        .record_view(
            listing_id,
            caller.map(|c| c.user_id),
            &ip,
            user_agent,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// `GET /listings/:id/analytics`: Owner analytics report.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid token,
/// [`GatewayError::Forbidden`] for non-owners, and
/// [`GatewayError::NotFound`] if the listing does not exist.
#[utoipa::path(
    get,
    path = "/listings/{id}/analytics",
    tag = "Views",
    summary = "Listing analytics",
    description = "Totals, unique and returning visitors, average session length, hourly and daily buckets, country distribution, and message count. Visible to the listing owner only.",
    params(
        ("id" = uuid::Uuid, Path, description = "Listing UUID"),
    ),
    responses(
        (status = 200, description = "Analytics report", body = AnalyticsReport),
        (status = 400, description = "Malformed listing id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller does not own the listing", body = ErrorResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn listing_analytics(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<ListingId>,
    Caller(caller): Caller,
) -> Result<Json<AnalyticsReport>, GatewayError> {
    let report = state
        .view_service
        .analytics(listing_id, caller.user_id, Utc::now())
        .await?;
    Ok(Json(report))
}

/// View and analytics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/listings/{id}/view", post(record_view))
        .route("/listings/{id}/analytics", get(listing_analytics))
}
