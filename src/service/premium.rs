//! Premium tier catalogue and the payment-to-activation lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::Identity;
use crate::domain::{
    ListingId, NewPremiumPayment, NewPremiumTier, PaymentId, PaymentStatus, PaymentSummary,
    PremiumPayment, PremiumState, PremiumTier, TierId,
};
use crate::error::GatewayError;
use crate::persistence::Store;
use crate::storage::{ProofStorage, UploadedFile};

/// A payment submission as received from the client.
///
/// Every field is optional so that missing input surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default)]
pub struct PaymentSubmission {
    /// Listing to promote.
    pub listing_id: Option<ListingId>,
    /// Purchased tier.
    pub tier_id: Option<TierId>,
    /// Proof-of-payment file.
    pub proof: Option<UploadedFile>,
}

/// Orchestrates premium purchases.
///
/// This service is the only writer of a listing's premium fields. The
/// listing activation and the payment's approval are written through a
/// single [`crate::persistence::PremiumUnitOfWork`], so either both land
/// or neither does.
#[derive(Debug, Clone)]
pub struct PremiumService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ProofStorage>,
}

impl PremiumService {
    /// Creates a new `PremiumService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ProofStorage>) -> Self {
        Self { store, storage }
    }

    /// All tiers, ascending by price.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on datastore failure.
    pub async fn list_tiers(&self) -> Result<Vec<PremiumTier>, GatewayError> {
        self.store.list_tiers().await
    }

    /// Creates a tier. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] for non-admins and
    /// [`GatewayError::Validation`] for an invalid definition.
    pub async fn create_tier(
        &self,
        caller: Identity,
        tier: NewPremiumTier,
        now: DateTime<Utc>,
    ) -> Result<PremiumTier, GatewayError> {
        require_admin(caller)?;
        tier.validate()?;
        let tier = self.store.insert_tier(tier, now).await?;
        tracing::info!(tier_id = %tier.id, name = %tier.name, price = tier.price, "premium tier created");
        Ok(tier)
    }

    /// Submits a pending payment for `caller`'s listing.
    ///
    /// The tier's current price is copied into the payment and never
    /// re-derived afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if a field or the proof file is
    /// missing or the tier does not exist, [`GatewayError::NotFound`] if
    /// the listing does not exist, [`GatewayError::Forbidden`] if the
    /// caller does not own it, and [`GatewayError::Storage`] or
    /// [`GatewayError::Persistence`] on collaborator failure.
    pub async fn submit(
        &self,
        caller: Identity,
        submission: PaymentSubmission,
        now: DateTime<Utc>,
    ) -> Result<PremiumPayment, GatewayError> {
        let listing_id = submission
            .listing_id
            .ok_or_else(|| GatewayError::Validation("listing_id is required".to_string()))?;
        let tier_id = submission
            .tier_id
            .ok_or_else(|| GatewayError::Validation("tier_id is required".to_string()))?;
        let proof = submission
            .proof
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| GatewayError::Validation("proof of payment file is required".to_string()))?;

        let tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| GatewayError::Validation(format!("unknown premium tier: {tier_id}")))?;

        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| GatewayError::not_found("listing", listing_id))?;
        if !listing.is_owned_by(caller.user_id) {
            return Err(GatewayError::Forbidden(
                "only the listing owner can buy premium placement".to_string(),
            ));
        }

        let proof_url = self.storage.upload(proof).await?;
        let payment = self
            .store
            .insert_payment(NewPremiumPayment {
                listing_id,
                user_id: caller.user_id,
                tier_id,
                proof_url,
                amount: tier.price,
                created_at: now,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            %listing_id,
            %tier_id,
            amount = payment.amount,
            "premium payment submitted"
        );
        Ok(payment)
    }

    /// Moves a pending payment to `approved` or `rejected`. Admin only.
    ///
    /// Approval activates the listing until `now + tier.duration_days`
    /// and stamps the same expiry on the payment, in one unit of work.
    /// Rejection touches only the payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] for non-admins,
    /// [`GatewayError::NotFound`] if the payment (or its tier or listing)
    /// is missing, [`GatewayError::InvalidTransition`] if the payment is
    /// not pending, and [`GatewayError::Persistence`] on datastore failure,
    /// in which case nothing is written.
    pub async fn set_status(
        &self,
        caller: Identity,
        payment_id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<PremiumPayment, GatewayError> {
        require_admin(caller)?;

        let mut uow = self.store.begin().await?;
        let payment = uow
            .lock_payment(payment_id)
            .await?
            .ok_or_else(|| GatewayError::not_found("payment", payment_id))?;
        let next = payment.status.transition(status)?;

        let updated = match next {
            PaymentStatus::Approved => {
                let tier = uow
                    .tier(payment.tier_id)
                    .await?
                    .ok_or_else(|| GatewayError::not_found("tier", payment.tier_id))?;
                let expires_at = tier.expiry_from(now);
                uow.activate_listing(payment.listing_id, payment.tier_id, expires_at)
                    .await?;
                uow.set_payment_status(payment_id, next, Some(expires_at))
                    .await?
            }
            PaymentStatus::Rejected | PaymentStatus::Pending => {
                uow.set_payment_status(payment_id, next, None).await?
            }
        };
        uow.commit().await?;

        tracing::info!(
            %payment_id,
            listing_id = %updated.listing_id,
            admin_id = %caller.user_id,
            status = %updated.status,
            expires_at = ?updated.expires_at,
            "premium payment reviewed"
        );
        Ok(updated)
    }

    /// Every payment with purchaser and listing details. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] for non-admins and
    /// [`GatewayError::Persistence`] on datastore failure.
    pub async fn list_payments(&self, caller: Identity) -> Result<Vec<PaymentSummary>, GatewayError> {
        require_admin(caller)?;
        self.store.list_payment_summaries().await
    }

    /// Payments submitted by `caller`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on datastore failure.
    pub async fn my_payments(&self, caller: Identity) -> Result<Vec<PremiumPayment>, GatewayError> {
        self.store.payments_for_user(caller.user_id).await
    }

    /// Effective premium state of a listing at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the listing does not exist.
    pub async fn listing_premium(
        &self,
        listing_id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<PremiumState, GatewayError> {
        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| GatewayError::not_found("listing", listing_id))?;
        Ok(listing.premium_state(now))
    }
}

fn require_admin(caller: Identity) -> Result<(), GatewayError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(GatewayError::Forbidden("admin access required".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::domain::{Listing, NewViewEvent, UserId, ViewEvent};
    use crate::persistence::{
        ListingStore, MemoryStore, PremiumStore, PremiumUnitOfWork, ViewStore,
    };
    use async_trait::async_trait;
    use axum::body::Bytes;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingStorage {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProofStorage for RecordingStorage {
        async fn upload(&self, file: UploadedFile) -> Result<String, GatewayError> {
            let name = file.file_name.unwrap_or_else(|| "proof".to_string());
            let url = format!("https://files.test/{name}");
            if let Ok(mut uploads) = self.uploads.lock() {
                uploads.push(url.clone());
            }
            Ok(url)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn user(id: UserId) -> Identity {
        Identity {
            user_id: id,
            role: Role::User,
        }
    }

    fn admin() -> Identity {
        Identity {
            user_id: UserId::new(),
            role: Role::Admin,
        }
    }

    fn proof() -> UploadedFile {
        UploadedFile {
            file_name: Some("receipt.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"receipt"),
        }
    }

    struct Fixture {
        service: PremiumService,
        store: MemoryStore,
        listing: Listing,
        tier: PremiumTier,
    }

    async fn fixture_with(store: Arc<dyn Store>, memory: MemoryStore) -> Fixture {
        let listing = Listing {
            id: ListingId::new(),
            owner_id: UserId::new(),
            title: "Guitar".to_string(),
            is_premium: false,
            premium_tier_id: None,
            premium_expires_at: None,
            created_at: t0() - Duration::days(3),
        };
        memory.insert_listing(listing.clone()).await;
        let Ok(tier) = memory
            .insert_tier(
                NewPremiumTier {
                    name: "Gold".to_string(),
                    price: 500,
                    duration_days: 30,
                    features: vec!["Pinned".to_string()],
                },
                t0() - Duration::days(10),
            )
            .await
        else {
            panic!("tier insert failed");
        };
        Fixture {
            service: PremiumService::new(store, Arc::new(RecordingStorage::default())),
            store: memory,
            listing,
            tier,
        }
    }

    async fn fixture() -> Fixture {
        let memory = MemoryStore::new();
        fixture_with(Arc::new(memory.clone()), memory).await
    }

    async fn submitted(f: &Fixture) -> PremiumPayment {
        let Ok(payment) = f
            .service
            .submit(
                user(f.listing.owner_id),
                PaymentSubmission {
                    listing_id: Some(f.listing.id),
                    tier_id: Some(f.tier.id),
                    proof: Some(proof()),
                },
                t0(),
            )
            .await
        else {
            panic!("submit failed");
        };
        payment
    }

    async fn stored_listing(f: &Fixture) -> Listing {
        let Ok(Some(listing)) = f.store.get_listing(f.listing.id).await else {
            panic!("listing missing");
        };
        listing
    }

    #[tokio::test]
    async fn submit_creates_pending_payment_with_tier_price() {
        let f = fixture().await;
        let payment = submitted(&f).await;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 500);
        assert_eq!(payment.expires_at, None);
        assert_eq!(payment.proof_url, "https://files.test/receipt.png");
    }

    #[tokio::test]
    async fn submit_requires_proof_and_valid_tier() {
        let f = fixture().await;
        let owner = user(f.listing.owner_id);

        let missing_proof = f
            .service
            .submit(
                owner,
                PaymentSubmission {
                    listing_id: Some(f.listing.id),
                    tier_id: Some(f.tier.id),
                    proof: None,
                },
                t0(),
            )
            .await;
        assert!(matches!(missing_proof, Err(GatewayError::Validation(_))));

        let bad_tier = f
            .service
            .submit(
                owner,
                PaymentSubmission {
                    listing_id: Some(f.listing.id),
                    tier_id: Some(TierId::new()),
                    proof: Some(proof()),
                },
                t0(),
            )
            .await;
        assert!(matches!(bad_tier, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn submit_for_someone_elses_listing_is_forbidden() {
        let f = fixture().await;
        let result = f
            .service
            .submit(
                user(UserId::new()),
                PaymentSubmission {
                    listing_id: Some(f.listing.id),
                    tier_id: Some(f.tier.id),
                    proof: Some(proof()),
                },
                t0(),
            )
            .await;
        assert!(matches!(result, Err(GatewayError::Forbidden(_))));
    }

    #[tokio::test]
    async fn approval_activates_listing_and_payment_together() {
        let f = fixture().await;
        let payment = submitted(&f).await;
        let approved_at = t0() + Duration::seconds(1);

        let Ok(approved) = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Approved, approved_at)
            .await
        else {
            panic!("approval failed");
        };

        let expected = approved_at + Duration::days(30);
        assert_eq!(approved.status, PaymentStatus::Approved);
        assert_eq!(approved.expires_at, Some(expected));
        assert_eq!(approved.amount, 500);

        let listing = stored_listing(&f).await;
        assert!(listing.is_premium);
        assert_eq!(listing.premium_tier_id, Some(f.tier.id));
        assert_eq!(listing.premium_expires_at, Some(expected));
    }

    #[tokio::test]
    async fn amount_survives_later_tier_repricing() {
        let f = fixture().await;
        let payment = submitted(&f).await;
        let Ok(()) = f.store.reprice_tier(f.tier.id, 9_999).await else {
            panic!("reprice failed");
        };

        let Ok(approved) = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Approved, t0() + Duration::seconds(1))
            .await
        else {
            panic!("approval failed");
        };
        assert_eq!(approved.amount, 500);
    }

    #[tokio::test]
    async fn rejection_leaves_listing_untouched() {
        let f = fixture().await;
        let payment = submitted(&f).await;

        let Ok(rejected) = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Rejected, t0())
            .await
        else {
            panic!("rejection failed");
        };
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.expires_at, None);
        assert_eq!(stored_listing(&f).await, f.listing);
    }

    #[tokio::test]
    async fn terminal_payments_cannot_move() {
        let f = fixture().await;
        let payment = submitted(&f).await;
        let Ok(_) = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Rejected, t0())
            .await
        else {
            panic!("rejection failed");
        };

        let again = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Approved, t0())
            .await;
        assert!(matches!(again, Err(GatewayError::InvalidTransition { .. })));
        assert!(!stored_listing(&f).await.is_premium);
    }

    #[tokio::test]
    async fn status_change_requires_admin_and_existing_payment() {
        let f = fixture().await;
        let payment = submitted(&f).await;

        let as_owner = f
            .service
            .set_status(user(f.listing.owner_id), payment.id, PaymentStatus::Approved, t0())
            .await;
        assert!(matches!(as_owner, Err(GatewayError::Forbidden(_))));

        let missing = f
            .service
            .set_status(admin(), PaymentId::new(), PaymentStatus::Approved, t0())
            .await;
        assert!(matches!(missing, Err(GatewayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn premium_state_lapses_after_expiry() {
        let f = fixture().await;
        let payment = submitted(&f).await;
        let Ok(_) = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Approved, t0())
            .await
        else {
            panic!("approval failed");
        };

        let Ok(during) = f
            .service
            .listing_premium(f.listing.id, t0() + Duration::days(29))
            .await
        else {
            panic!("lookup failed");
        };
        assert!(during.active);

        let Ok(after) = f
            .service
            .listing_premium(f.listing.id, t0() + Duration::days(31))
            .await
        else {
            panic!("lookup failed");
        };
        assert!(!after.active);
        assert!(after.lapsed);
    }

    #[tokio::test]
    async fn payment_lists() {
        let f = fixture().await;
        let payment = submitted(&f).await;

        let Ok(summaries) = f.service.list_payments(admin()).await else {
            panic!("admin list failed");
        };
        assert_eq!(summaries.len(), 1);
        let Some(summary) = summaries.first() else {
            panic!("missing summary");
        };
        assert_eq!(summary.payment.id, payment.id);
        assert_eq!(summary.listing_title.as_deref(), Some("Guitar"));
        assert_eq!(summary.tier_name.as_deref(), Some("Gold"));

        assert!(f.service.list_payments(user(f.listing.owner_id)).await.is_err());

        let Ok(mine) = f.service.my_payments(user(f.listing.owner_id)).await else {
            panic!("own list failed");
        };
        assert_eq!(mine.len(), 1);
    }

    /// Store whose unit of work fails the payment write after the listing
    /// write went through.
    #[derive(Debug)]
    struct FailAfterListingWrite(MemoryStore);

    struct FailingUnitOfWork(Box<dyn PremiumUnitOfWork>);

    #[async_trait]
    impl PremiumUnitOfWork for FailingUnitOfWork {
        async fn lock_payment(
            &mut self,
            id: PaymentId,
        ) -> Result<Option<PremiumPayment>, GatewayError> {
            self.0.lock_payment(id).await
        }

        async fn tier(&mut self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
            self.0.tier(id).await
        }

        async fn activate_listing(
            &mut self,
            listing_id: ListingId,
            tier_id: TierId,
            expires_at: DateTime<Utc>,
        ) -> Result<(), GatewayError> {
            self.0.activate_listing(listing_id, tier_id, expires_at).await
        }

        async fn set_payment_status(
            &mut self,
            _id: PaymentId,
            _status: PaymentStatus,
            _expires_at: Option<DateTime<Utc>>,
        ) -> Result<PremiumPayment, GatewayError> {
            Err(GatewayError::Persistence("connection reset".to_string()))
        }

        async fn commit(self: Box<Self>) -> Result<(), GatewayError> {
            self.0.commit().await
        }
    }

    #[async_trait]
    impl ViewStore for FailAfterListingWrite {
        async fn latest_view_since(
            &self,
            listing_id: ListingId,
            ip: &str,
            since: DateTime<Utc>,
        ) -> Result<Option<ViewEvent>, GatewayError> {
            self.0.latest_view_since(listing_id, ip, since).await
        }

        async fn has_view_between(
            &self,
            listing_id: ListingId,
            ip: &str,
            after: DateTime<Utc>,
            before: DateTime<Utc>,
        ) -> Result<bool, GatewayError> {
            self.0.has_view_between(listing_id, ip, after, before).await
        }

        async fn insert_view(&self, view: NewViewEvent) -> Result<ViewEvent, GatewayError> {
            self.0.insert_view(view).await
        }

        async fn update_view_end(&self, view: &ViewEvent) -> Result<(), GatewayError> {
            self.0.update_view_end(view).await
        }

        async fn views_for_listing(
            &self,
            listing_id: ListingId,
        ) -> Result<Vec<ViewEvent>, GatewayError> {
            self.0.views_for_listing(listing_id).await
        }
    }

    #[async_trait]
    impl ListingStore for FailAfterListingWrite {
        async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, GatewayError> {
            self.0.get_listing(id).await
        }

        async fn count_messages(&self, listing_id: ListingId) -> Result<u64, GatewayError> {
            self.0.count_messages(listing_id).await
        }
    }

    #[async_trait]
    impl PremiumStore for FailAfterListingWrite {
        async fn list_tiers(&self) -> Result<Vec<PremiumTier>, GatewayError> {
            self.0.list_tiers().await
        }

        async fn get_tier(&self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
            self.0.get_tier(id).await
        }

        async fn insert_tier(
            &self,
            tier: NewPremiumTier,
            now: DateTime<Utc>,
        ) -> Result<PremiumTier, GatewayError> {
            self.0.insert_tier(tier, now).await
        }

        async fn insert_payment(
            &self,
            payment: NewPremiumPayment,
        ) -> Result<PremiumPayment, GatewayError> {
            self.0.insert_payment(payment).await
        }

        async fn get_payment(&self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError> {
            self.0.get_payment(id).await
        }

        async fn payments_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<PremiumPayment>, GatewayError> {
            self.0.payments_for_user(user_id).await
        }

        async fn list_payment_summaries(&self) -> Result<Vec<PaymentSummary>, GatewayError> {
            self.0.list_payment_summaries().await
        }

        async fn begin(&self) -> Result<Box<dyn PremiumUnitOfWork>, GatewayError> {
            let inner = self.0.begin().await?;
            Ok(Box::new(FailingUnitOfWork(inner)))
        }
    }

    #[tokio::test]
    async fn failed_payment_write_rolls_back_listing_activation() {
        let memory = MemoryStore::new();
        let f = fixture_with(Arc::new(FailAfterListingWrite(memory.clone())), memory).await;
        let payment = submitted(&f).await;

        let result = f
            .service
            .set_status(admin(), payment.id, PaymentStatus::Approved, t0())
            .await;
        assert!(matches!(result, Err(GatewayError::Persistence(_))));

        assert_eq!(stored_listing(&f).await, f.listing);
        let Ok(Some(stored)) = f.store.get_payment(payment.id).await else {
            panic!("payment missing");
        };
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.expires_at, None);
    }
}
