//! Listing projection carrying the premium-relevant fields.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ListingId, TierId, UserId};

/// A marketplace listing, reduced to what analytics and premium need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Listing {
    /// Listing identifier.
    pub id: ListingId,
    /// Owning user.
    pub owner_id: UserId,
    /// Listing title.
    pub title: String,
    /// Stored premium flag; may be stale once `premium_expires_at` passes.
    pub is_premium: bool,
    /// Tier of the most recent approval.
    pub premium_tier_id: Option<TierId>,
    /// End of the most recently granted premium window.
    pub premium_expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Effective premium state of a listing at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PremiumState {
    /// Listing identifier.
    pub listing_id: ListingId,
    /// `true` only while the stored window has not elapsed.
    pub active: bool,
    /// Tier of the most recent approval.
    pub tier_id: Option<TierId>,
    /// End of the stored window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Stored flag is set but the window elapsed.
    pub lapsed: bool,
}

impl Listing {
    /// Returns `true` if the listing belongs to `user`.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    /// Evaluates the premium flag against `now`.
    ///
    /// The stored flag is never cleared on expiry, so every read compares
    /// the expiry timestamp instead of trusting `is_premium` alone.
    #[must_use]
    pub fn premium_state(&self, now: DateTime<Utc>) -> PremiumState {
        let unexpired = self.premium_expires_at.is_some_and(|exp| exp > now);
        PremiumState {
            listing_id: self.id,
            active: self.is_premium && unexpired,
            tier_id: self.premium_tier_id,
            expires_at: self.premium_expires_at,
            lapsed: self.is_premium && !unexpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn listing(is_premium: bool, expires_at: Option<DateTime<Utc>>) -> Listing {
        Listing {
            id: ListingId::new(),
            owner_id: UserId::new(),
            title: "Road bike".to_string(),
            is_premium,
            premium_tier_id: is_premium.then(TierId::new),
            premium_expires_at: expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn active_before_expiry() {
        let now = Utc::now();
        let state = listing(true, Some(now + Duration::days(3))).premium_state(now);
        assert!(state.active);
        assert!(!state.lapsed);
    }

    #[test]
    fn lapsed_after_expiry_even_though_flag_is_set() {
        let now = Utc::now();
        let state = listing(true, Some(now - Duration::seconds(1))).premium_state(now);
        assert!(!state.active);
        assert!(state.lapsed);
    }

    #[test]
    fn never_premium() {
        let state = listing(false, None).premium_state(Utc::now());
        assert!(!state.active);
        assert!(!state.lapsed);
    }
}
