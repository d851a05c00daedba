//! Database row types and their conversions into domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    GeoLocation, Listing, PaymentSummary, PremiumPayment, PremiumTier, UserId, ViewEvent,
};
use crate::error::GatewayError;

/// Purchaser details shown to admins next to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
}

/// A row of `listing_views`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ViewRow {
    /// Row ID.
    pub id: Uuid,
    /// Viewed listing.
    pub listing_id: Uuid,
    /// Authenticated viewer.
    pub viewer_id: Option<Uuid>,
    /// Viewer IP address.
    pub ip_address: String,
    /// Viewer user agent.
    pub user_agent: Option<String>,
    /// Resolved country.
    pub country: Option<String>,
    /// Resolved city.
    pub city: Option<String>,
    /// Resolved region.
    pub region: Option<String>,
    /// Visit start.
    pub view_start_time: DateTime<Utc>,
    /// Latest activity.
    pub view_end_time: Option<DateTime<Utc>>,
    /// Whole-second session duration.
    pub session_duration: Option<i64>,
    /// Return-visit flag.
    pub is_return: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl From<ViewRow> for ViewEvent {
    fn from(row: ViewRow) -> Self {
        Self {
            id: row.id.into(),
            listing_id: row.listing_id.into(),
            viewer_id: row.viewer_id.map(Into::into),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            geo: GeoLocation {
                country: row.country,
                city: row.city,
                region: row.region,
            },
            view_start_time: row.view_start_time,
            view_end_time: row.view_end_time,
            session_duration: row.session_duration,
            is_return: row.is_return,
            created_at: row.created_at,
        }
    }
}

/// A row of `listings` (premium-relevant columns).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    /// Listing ID.
    pub id: Uuid,
    /// Owner.
    pub owner_id: Uuid,
    /// Title.
    pub title: String,
    /// Stored premium flag.
    pub is_premium: bool,
    /// Tier of the latest approval.
    pub premium_tier_id: Option<Uuid>,
    /// End of the latest premium window.
    pub premium_expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id.into(),
            owner_id: row.owner_id.into(),
            title: row.title,
            is_premium: row.is_premium,
            premium_tier_id: row.premium_tier_id.map(Into::into),
            premium_expires_at: row.premium_expires_at,
            created_at: row.created_at,
        }
    }
}

/// A row of `premium_tiers`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TierRow {
    /// Tier ID.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    /// Duration in days.
    pub duration_days: i32,
    /// Feature list.
    pub features: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<TierRow> for PremiumTier {
    fn from(row: TierRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            price: row.price,
            duration_days: row.duration_days,
            features: row.features,
            created_at: row.created_at,
        }
    }
}

/// A row of `premium_payments`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    /// Payment ID.
    pub id: Uuid,
    /// Listing.
    pub listing_id: Uuid,
    /// Purchaser.
    pub user_id: Uuid,
    /// Tier.
    pub tier_id: Uuid,
    /// Proof URL.
    pub proof_url: String,
    /// Captured amount.
    pub amount: i64,
    /// Status string.
    pub status: String,
    /// Granted expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PremiumPayment {
    type Error = GatewayError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| GatewayError::Persistence(format!("corrupt status: {}", row.status)))?;
        Ok(Self {
            id: row.id.into(),
            listing_id: row.listing_id.into(),
            user_id: row.user_id.into(),
            tier_id: row.tier_id.into(),
            proof_url: row.proof_url,
            amount: row.amount,
            status,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// A payment joined with purchaser, listing, and tier columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentSummaryRow {
    /// Payment columns.
    #[sqlx(flatten)]
    pub payment: PaymentRow,
    /// Purchaser name.
    pub user_name: Option<String>,
    /// Purchaser email.
    pub user_email: Option<String>,
    /// Listing title.
    pub listing_title: Option<String>,
    /// Tier name.
    pub tier_name: Option<String>,
}

impl TryFrom<PaymentSummaryRow> for PaymentSummary {
    type Error = GatewayError;

    fn try_from(row: PaymentSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            payment: row.payment.try_into()?,
            user_name: row.user_name,
            user_email: row.user_email,
            listing_title: row.listing_title,
            tier_name: row.tier_name,
        })
    }
}
