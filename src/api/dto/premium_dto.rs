//! Premium payment request DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::PaymentStatus;
use crate::error::GatewayError;

/// Request body for `PUT /admin/premium-payments/:id`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    /// Target status: `approved` or `rejected`.
    pub status: PaymentStatus,
}

impl UpdatePaymentStatusRequest {
    /// Returns the requested terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if `pending` was requested.
    pub fn target(self) -> Result<PaymentStatus, GatewayError> {
        if self.status.is_terminal() {
            Ok(self.status)
        } else {
            Err(GatewayError::Validation(
                "status must be approved or rejected".to_string(),
            ))
        }
    }
}

/// `multipart/form-data` body of `POST /premium-payments`.
///
/// Documentation only; the handler reads the fields from the stream.
#[derive(Debug, ToSchema)]
pub struct PaymentSubmissionForm {
    /// Listing to promote (UUID).
    pub listing_id: String,
    /// Purchased tier (UUID).
    pub tier_id: String,
    /// Proof-of-payment file.
    #[schema(value_type = String, format = Binary)]
    pub proof: Vec<u8>,
}
