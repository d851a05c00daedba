//! In-process store.
//!
//! All state sits behind one [`tokio::sync::RwLock`]. A unit of work
//! takes the write lock for its whole lifetime, mutates a staged copy,
//! and swaps the copy in on commit, so an abandoned unit leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::models::UserProfile;
use super::{ListingStore, PremiumStore, PremiumUnitOfWork, ViewStore};
use crate::domain::{
    Listing, ListingId, NewPremiumPayment, NewPremiumTier, NewViewEvent, PaymentId, PaymentStatus,
    PaymentSummary, PremiumPayment, PremiumTier, TierId, UserId, ViewEvent,
};
use crate::error::GatewayError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, UserProfile>,
    listings: HashMap<ListingId, Listing>,
    message_counts: HashMap<ListingId, u64>,
    views: Vec<ViewEvent>,
    tiers: HashMap<TierId, PremiumTier>,
    payments: Vec<PremiumPayment>,
}

/// In-memory [`super::Store`] used by tests and the `memory` backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn insert_user(&self, user: UserProfile) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Adds or replaces a listing.
    pub async fn insert_listing(&self, listing: Listing) {
        self.state.write().await.listings.insert(listing.id, listing);
    }

    /// Records one message about `listing_id`.
    pub async fn record_message(&self, listing_id: ListingId) {
        *self
            .state
            .write()
            .await
            .message_counts
            .entry(listing_id)
            .or_default() += 1;
    }

    /// Overwrites a tier's price, as an out-of-band catalogue edit would.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the tier does not exist.
    pub async fn reprice_tier(&self, id: TierId, price: i64) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let tier = state
            .tiers
            .get_mut(&id)
            .ok_or_else(|| GatewayError::not_found("tier", id))?;
        tier.price = price;
        Ok(())
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn latest_view_since(
        &self,
        listing_id: ListingId,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ViewEvent>, GatewayError> {
        let state = self.state.read().await;
        Ok(state
            .views
            .iter()
            .filter(|v| v.listing_id == listing_id && v.ip_address == ip && v.created_at >= since)
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn has_view_between(
        &self,
        listing_id: ListingId,
        ip: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let state = self.state.read().await;
        Ok(state.views.iter().any(|v| {
            v.listing_id == listing_id
                && v.ip_address == ip
                && v.created_at > after
                && v.created_at < before
        }))
    }

    async fn insert_view(&self, view: NewViewEvent) -> Result<ViewEvent, GatewayError> {
        let event = view.into_event();
        self.state.write().await.views.push(event.clone());
        Ok(event)
    }

    async fn update_view_end(&self, view: &ViewEvent) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let stored = state
            .views
            .iter_mut()
            .find(|v| v.id == view.id)
            .ok_or_else(|| GatewayError::not_found("view", view.id))?;
        stored.view_end_time = view.view_end_time;
        stored.session_duration = view.session_duration;
        Ok(())
    }

    async fn views_for_listing(&self, listing_id: ListingId) -> Result<Vec<ViewEvent>, GatewayError> {
        let state = self.state.read().await;
        Ok(state
            .views
            .iter()
            .filter(|v| v.listing_id == listing_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, GatewayError> {
        Ok(self.state.read().await.listings.get(&id).cloned())
    }

    async fn count_messages(&self, listing_id: ListingId) -> Result<u64, GatewayError> {
        Ok(self
            .state
            .read()
            .await
            .message_counts
            .get(&listing_id)
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl PremiumStore for MemoryStore {
    async fn list_tiers(&self) -> Result<Vec<PremiumTier>, GatewayError> {
        let state = self.state.read().await;
        let mut tiers: Vec<PremiumTier> = state.tiers.values().cloned().collect();
        tiers.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(tiers)
    }

    async fn get_tier(&self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
        Ok(self.state.read().await.tiers.get(&id).cloned())
    }

    async fn insert_tier(
        &self,
        tier: NewPremiumTier,
        now: DateTime<Utc>,
    ) -> Result<PremiumTier, GatewayError> {
        let tier = PremiumTier {
            id: TierId::new(),
            name: tier.name,
            price: tier.price,
            duration_days: tier.duration_days,
            features: tier.features,
            created_at: now,
        };
        self.state.write().await.tiers.insert(tier.id, tier.clone());
        Ok(tier)
    }

    async fn insert_payment(
        &self,
        payment: NewPremiumPayment,
    ) -> Result<PremiumPayment, GatewayError> {
        let payment = payment.into_payment();
        self.state.write().await.payments.push(payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError> {
        let state = self.state.read().await;
        Ok(state.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<PremiumPayment>, GatewayError> {
        let state = self.state.read().await;
        let mut payments: Vec<PremiumPayment> = state
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn list_payment_summaries(&self) -> Result<Vec<PaymentSummary>, GatewayError> {
        let state = self.state.read().await;
        let mut summaries: Vec<PaymentSummary> = state
            .payments
            .iter()
            .map(|p| {
                let user = state.users.get(&p.user_id);
                PaymentSummary {
                    payment: p.clone(),
                    user_name: user.map(|u| u.name.clone()),
                    user_email: user.map(|u| u.email.clone()),
                    listing_title: state.listings.get(&p.listing_id).map(|l| l.title.clone()),
                    tier_name: state.tiers.get(&p.tier_id).map(|t| t.name.clone()),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.payment.created_at.cmp(&a.payment.created_at));
        Ok(summaries)
    }

    async fn begin(&self) -> Result<Box<dyn PremiumUnitOfWork>, GatewayError> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }
}

/// Unit of work over a staged copy of [`MemoryState`].
#[derive(Debug)]
struct MemoryUnitOfWork {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl PremiumUnitOfWork for MemoryUnitOfWork {
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError> {
        Ok(self.staged.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn tier(&mut self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
        Ok(self.staged.tiers.get(&id).cloned())
    }

    async fn activate_listing(
        &mut self,
        listing_id: ListingId,
        tier_id: TierId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let listing = self
            .staged
            .listings
            .get_mut(&listing_id)
            .ok_or_else(|| GatewayError::not_found("listing", listing_id))?;
        listing.is_premium = true;
        listing.premium_tier_id = Some(tier_id);
        listing.premium_expires_at = Some(expires_at);
        Ok(())
    }

    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PremiumPayment, GatewayError> {
        let payment = self
            .staged
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GatewayError::not_found("payment", id))?;
        payment.status = status;
        payment.expires_at = expires_at;
        Ok(payment.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), GatewayError> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn listing() -> Listing {
        Listing {
            id: ListingId::new(),
            owner_id: UserId::new(),
            title: "Sofa".to_string(),
            is_premium: false,
            premium_tier_id: None,
            premium_expires_at: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (MemoryStore, Listing, PremiumTier, PremiumPayment) {
        let store = MemoryStore::new();
        let listing = listing();
        store.insert_listing(listing.clone()).await;
        let Ok(tier) = store
            .insert_tier(
                NewPremiumTier {
                    name: "Gold".to_string(),
                    price: 500,
                    duration_days: 30,
                    features: Vec::new(),
                },
                Utc::now(),
            )
            .await
        else {
            panic!("tier insert failed");
        };
        let Ok(payment) = store
            .insert_payment(NewPremiumPayment {
                listing_id: listing.id,
                user_id: listing.owner_id,
                tier_id: tier.id,
                proof_url: "/uploads/a.png".to_string(),
                amount: tier.price,
                created_at: Utc::now(),
            })
            .await
        else {
            panic!("payment insert failed");
        };
        (store, listing, tier, payment)
    }

    #[tokio::test]
    async fn uncommitted_unit_of_work_is_discarded() {
        let (store, listing, tier, payment) = seeded().await;
        let expires = Utc::now() + Duration::days(30);

        {
            let Ok(mut uow) = store.begin().await else {
                panic!("begin failed");
            };
            let Ok(()) = uow.activate_listing(listing.id, tier.id, expires).await else {
                panic!("activate failed");
            };
            // dropped without commit
        }

        let Ok(Some(after)) = store.get_listing(listing.id).await else {
            panic!("listing missing");
        };
        assert!(!after.is_premium);
        let Ok(Some(p)) = store.get_payment(payment.id).await else {
            panic!("payment missing");
        };
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn committed_unit_of_work_is_visible() {
        let (store, listing, tier, payment) = seeded().await;
        let expires = Utc::now() + Duration::days(30);

        let Ok(mut uow) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(()) = uow.activate_listing(listing.id, tier.id, expires).await else {
            panic!("activate failed");
        };
        let Ok(_) = uow
            .set_payment_status(payment.id, PaymentStatus::Approved, Some(expires))
            .await
        else {
            panic!("status write failed");
        };
        let Ok(()) = uow.commit().await else {
            panic!("commit failed");
        };

        let Ok(Some(after)) = store.get_listing(listing.id).await else {
            panic!("listing missing");
        };
        assert!(after.is_premium);
        assert_eq!(after.premium_expires_at, Some(expires));
    }

    #[tokio::test]
    async fn latest_view_since_picks_newest_in_window() {
        let store = MemoryStore::new();
        let listing_id = ListingId::new();
        let now = Utc::now();
        for offset in [Duration::minutes(50), Duration::minutes(10), Duration::hours(3)] {
            let _ = store
                .insert_view(NewViewEvent {
                    listing_id,
                    viewer_id: None,
                    ip_address: "198.51.100.4".to_string(),
                    user_agent: None,
                    geo: Default::default(),
                    is_return: false,
                    now: now - offset,
                })
                .await;
        }

        let Ok(Some(found)) = store
            .latest_view_since(listing_id, "198.51.100.4", now - Duration::hours(1))
            .await
        else {
            panic!("expected a recent view");
        };
        assert_eq!(found.created_at, now - Duration::minutes(10));

        let Ok(none) = store
            .latest_view_since(listing_id, "198.51.100.5", now - Duration::hours(1))
            .await
        else {
            panic!("query failed");
        };
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn tiers_sorted_by_price() {
        let store = MemoryStore::new();
        for (name, price) in [("Gold", 900), ("Bronze", 100), ("Silver", 400)] {
            let _ = store
                .insert_tier(
                    NewPremiumTier {
                        name: name.to_string(),
                        price,
                        duration_days: 7,
                        features: Vec::new(),
                    },
                    Utc::now(),
                )
                .await;
        }
        let Ok(tiers) = store.list_tiers().await else {
            panic!("list failed");
        };
        let names: Vec<&str> = tiers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bronze", "Silver", "Gold"]);
    }
}
