//! Premium tier catalogue and payment submission handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::PaymentSubmissionForm;
use crate::api::extract::{ApiPath, Caller};
use crate::app_state::AppState;
use crate::domain::{ListingId, PremiumPayment, PremiumState, PremiumTier};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::PaymentSubmission;
use crate::storage::UploadedFile;

/// `GET /premium-tiers`: List premium tiers.
///
/// # Errors
///
/// Returns [`GatewayError`] on datastore failure.
#[utoipa::path(
    get,
    path = "/premium-tiers",
    tag = "Premium",
    summary = "List premium tiers",
    description = "Returns every tier, cheapest first.",
    responses(
        (status = 200, description = "Tier catalogue", body = Vec<PremiumTier>),
    )
)]
pub async fn list_tiers(
    State(state): State<AppState>,
) -> Result<Json<Vec<PremiumTier>>, GatewayError> {
    Ok(Json(state.premium_service.list_tiers().await?))
}

/// `POST /premium-payments`: Submit a payment for review.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for a malformed form, missing
/// proof, or unknown tier; [`GatewayError::Forbidden`] if the caller
/// does not own the listing.
#[utoipa::path(
    post,
    path = "/premium-payments",
    tag = "Premium",
    summary = "Submit a premium payment",
    description = "Uploads the proof of payment and records a pending payment. The amount is the tier's price at submission time.",
    request_body(content = PaymentSubmissionForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Payment submitted", body = PremiumPayment),
        (status = 400, description = "Invalid form, missing proof, or unknown tier", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller does not own the listing", body = ErrorResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn submit_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let submission = read_submission(multipart?).await?;
    let payment = state
        .premium_service
        .submit(caller, submission, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /premium-payments/mine`: The caller's payments.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid token.
#[utoipa::path(
    get,
    path = "/premium-payments/mine",
    tag = "Premium",
    summary = "List own payments",
    description = "Returns the caller's payments, newest first.",
    responses(
        (status = 200, description = "Caller's payments", body = Vec<PremiumPayment>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn my_payments(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<PremiumPayment>>, GatewayError> {
    Ok(Json(state.premium_service.my_payments(caller).await?))
}

/// `GET /listings/:id/premium`: Effective premium state.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the listing does not exist.
#[utoipa::path(
    get,
    path = "/listings/{id}/premium",
    tag = "Premium",
    summary = "Listing premium state",
    description = "Reports whether the listing's premium window is active now. A stored flag whose window has elapsed is reported as lapsed.",
    params(
        ("id" = uuid::Uuid, Path, description = "Listing UUID"),
    ),
    responses(
        (status = 200, description = "Premium state", body = PremiumState),
        (status = 400, description = "Malformed listing id", body = ErrorResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn listing_premium(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<ListingId>,
) -> Result<Json<PremiumState>, GatewayError> {
    Ok(Json(
        state
            .premium_service
            .listing_premium(listing_id, Utc::now())
            .await?,
    ))
}

/// Premium routes. Payment uploads are capped at `upload_max_bytes`.
pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/premium-tiers", get(list_tiers))
        .route(
            "/premium-payments",
            post(submit_payment).layer(DefaultBodyLimit::max(upload_max_bytes)),
        )
        .route("/premium-payments/mine", get(my_payments))
        .route("/listings/{id}/premium", get(listing_premium))
}

// ── Multipart Parsing ───────────────────────────────────────────────────

/// Reads the `listing_id`, `tier_id`, and `proof` fields. Unknown fields
/// are skipped; absent ones are left for the service to reject.
async fn read_submission(mut multipart: Multipart) -> Result<PaymentSubmission, GatewayError> {
    let mut submission = PaymentSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("listing_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                submission.listing_id = Some(parse_id(&text, "listing_id")?);
            }
            Some("tier_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                submission.tier_id = Some(parse_id(&text, "tier_id")?);
            }
            Some("proof") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                submission.proof = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn parse_id<T: std::str::FromStr>(text: &str, field: &str) -> Result<T, GatewayError> {
    text.trim()
        .parse()
        .map_err(|_| GatewayError::Validation(format!("{field} must be a UUID")))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> GatewayError {
    GatewayError::Validation(format!("invalid multipart body: {}", e.body_text()))
}
