//! Admin endpoints: tier management and payment review.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::UpdatePaymentStatusRequest;
use crate::api::extract::{AdminCaller, ApiJson, ApiPath};
use crate::app_state::AppState;
use crate::domain::{NewPremiumTier, PaymentId, PaymentSummary, PremiumPayment, PremiumTier};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /admin/premium-tiers`: Create a premium tier.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for an invalid tier definition.
#[utoipa::path(
    post,
    path = "/admin/premium-tiers",
    tag = "Admin",
    summary = "Create a premium tier",
    description = "Adds a tier to the catalogue. Existing payments keep the price captured at submission.",
    request_body = NewPremiumTier,
    responses(
        (status = 201, description = "Tier created", body = PremiumTier),
        (status = 400, description = "Invalid tier", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_tier(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    ApiJson(req): ApiJson<NewPremiumTier>,
) -> Result<impl IntoResponse, GatewayError> {
    let tier = state
        .premium_service
        .create_tier(admin, req, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(tier)))
}

/// `GET /admin/premium-payments`: All payments for review.
///
/// # Errors
///
/// Returns [`GatewayError`] on datastore failure.
#[utoipa::path(
    get,
    path = "/admin/premium-payments",
    tag = "Admin",
    summary = "List payments",
    description = "Every payment, newest first, joined with purchaser name and email, listing title, and tier name.",
    responses(
        (status = 200, description = "Payment summaries", body = Vec<PaymentSummary>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_payments(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
) -> Result<Json<Vec<PaymentSummary>>, GatewayError> {
    Ok(Json(state.premium_service.list_payments(admin).await?))
}

/// `PUT /admin/premium-payments/:id`: Approve or reject a payment.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown payment and
/// [`GatewayError::InvalidTransition`] if it was already reviewed.
#[utoipa::path(
    put,
    path = "/admin/premium-payments/{id}",
    tag = "Admin",
    summary = "Review a payment",
    description = "Moves a pending payment to approved or rejected. Approval activates the listing for the tier's duration in the same transaction.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payment UUID"),
    ),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Updated payment", body = PremiumPayment),
        (status = 400, description = "Malformed id or body, or target status is not approved or rejected", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 409, description = "Payment already reviewed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    ApiPath(payment_id): ApiPath<PaymentId>,
    ApiJson(req): ApiJson<UpdatePaymentStatusRequest>,
) -> Result<Json<PremiumPayment>, GatewayError> {
    let payment = state
        .premium_service
        .set_status(admin, payment_id, req.target()?, Utc::now())
        .await?;
    Ok(Json(payment))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/premium-tiers", post(create_tier))
        .route("/admin/premium-payments", get(list_payments))
        .route("/admin/premium-payments/{id}", put(update_payment_status))
}
