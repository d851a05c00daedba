//! Premium tiers, payments, and the payment status state machine.
//!
//! A payment starts `pending` and moves exactly once, to either
//! `approved` or `rejected`. Both are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ListingId, PaymentId, TierId, UserId};
use crate::error::GatewayError;

/// A paid plan granting a listing elevated placement for a fixed period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PremiumTier {
    /// Tier identifier.
    pub id: TierId,
    /// Display name.
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    /// Length of the premium window in calendar days.
    pub duration_days: i32,
    /// Ordered feature list shown to buyers.
    pub features: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl PremiumTier {
    /// Expiry of a premium window granted at `approved_at`.
    #[must_use]
    pub fn expiry_from(&self, approved_at: DateTime<Utc>) -> DateTime<Utc> {
        approved_at + Duration::days(i64::from(self.duration_days))
    }
}

/// Fields for creating a premium tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct NewPremiumTier {
    /// Display name.
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    /// Length of the premium window in calendar days.
    pub duration_days: i32,
    /// Ordered feature list.
    #[serde(default)]
    pub features: Vec<String>,
}

impl NewPremiumTier {
    /// Checks the tier definition.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for an empty name, a negative
    /// price, or a non-positive duration.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.name.trim().is_empty() {
            return Err(GatewayError::Validation("tier name is required".to_string()));
        }
        if self.price < 0 {
            return Err(GatewayError::Validation("tier price must not be negative".to_string()));
        }
        if self.duration_days <= 0 {
            return Err(GatewayError::Validation(
                "tier duration must be at least one day".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a premium payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Submitted, awaiting admin review.
    Pending,
    /// Accepted; the listing was activated.
    Approved,
    /// Declined; the listing is untouched.
    Rejected,
}

impl PaymentStatus {
    /// Returns the database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Returns `true` for states with no outgoing transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Validates a transition from `self` to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidTransition`] unless `self` is
    /// `pending` and `next` is terminal.
    pub fn transition(self, next: Self) -> Result<Self, GatewayError> {
        match (self, next) {
            (Self::Pending, Self::Approved | Self::Rejected) => Ok(next),
            (from, to) => Err(GatewayError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(GatewayError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// A user's claim of having paid for a tier, pending admin verification.
///
/// `expires_at` is set if and only if `status` is `approved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PremiumPayment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Listing to promote.
    pub listing_id: ListingId,
    /// Purchaser.
    pub user_id: UserId,
    /// Purchased tier.
    pub tier_id: TierId,
    /// Public URL of the uploaded proof of payment.
    pub proof_url: String,
    /// Tier price captured at submission time.
    pub amount: i64,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// End of the granted premium window, once approved.
    pub expires_at: Option<DateTime<Utc>>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

/// Fields of a payment about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPremiumPayment {
    /// Listing to promote.
    pub listing_id: ListingId,
    /// Purchaser.
    pub user_id: UserId,
    /// Purchased tier.
    pub tier_id: TierId,
    /// Public URL of the uploaded proof.
    pub proof_url: String,
    /// Tier price at submission.
    pub amount: i64,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl NewPremiumPayment {
    /// Materializes a `pending` payment with a fresh id.
    #[must_use]
    pub fn into_payment(self) -> PremiumPayment {
        PremiumPayment {
            id: PaymentId::new(),
            listing_id: self.listing_id,
            user_id: self.user_id,
            tier_id: self.tier_id,
            proof_url: self.proof_url,
            amount: self.amount,
            status: PaymentStatus::Pending,
            expires_at: None,
            created_at: self.created_at,
        }
    }
}

/// Payment joined with purchaser, listing, and tier details for admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentSummary {
    /// The payment row.
    #[serde(flatten)]
    pub payment: PremiumPayment,
    /// Purchaser display name.
    pub user_name: Option<String>,
    /// Purchaser email.
    pub user_email: Option<String>,
    /// Listing title.
    pub listing_title: Option<String>,
    /// Tier name.
    pub tier_name: Option<String>,
}
