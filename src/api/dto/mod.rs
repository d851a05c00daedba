//! Data Transfer Objects for REST request bodies.
//!
//! Responses reuse the domain types directly; only request shapes that
//! differ from the domain live here.

pub mod premium_dto;

pub use premium_dto::*;
