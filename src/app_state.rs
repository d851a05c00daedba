//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::service::{PremiumService, ViewService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// View recording and analytics.
    pub view_service: Arc<ViewService>,
    /// Premium tiers and payments.
    pub premium_service: Arc<PremiumService>,
    /// Bearer token verification for caller identity.
    pub tokens: Arc<TokenVerifier>,
}
