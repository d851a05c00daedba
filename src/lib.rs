//! # classifieds-gateway
//!
//! View analytics and premium placement service for a classifieds
//! marketplace.
//!
//! The crate records listing views with per-IP deduplication and
//! return-visitor detection, aggregates them into owner-facing analytics,
//! and runs the premium payment lifecycle: users submit a proof of payment
//! for a tier, admins approve or reject it, and approval activates the
//! listing's premium window atomically with the payment update.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + Extractors (api/)
//!     │
//!     ├── ViewService, PremiumService (service/)
//!     ├── Domain rules: windows, analytics, payment states (domain/)
//!     │
//!     ├── GeoResolver (geo/)          ProofStorage (storage/)
//!     │
//!     └── Store: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod persistence;
pub mod service;
pub mod storage;
