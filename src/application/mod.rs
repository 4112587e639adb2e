//! Application layer containing the core business logic orchestration.
//!
//! This module defines the `CreditEngine`, the primary entry point for the
//! credit eligibility and credit-request workflow, together with the
//! provider payload builder and signing in `signature`.

pub mod engine;
pub mod signature;
