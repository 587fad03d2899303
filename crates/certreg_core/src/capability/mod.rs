//! Capability-gated registration and amendment.
//!
//! # Responsibility
//! - Define capability values, sessions and typed exercise errors.
//! - Orchestrate validator, quota tracker and record store per exercise.
//!
//! # Invariants
//! - Every exercise closes its session exactly once.
//! - Failures are returned as values, never raised past the issuer.

pub mod error;
pub mod issuer;
pub mod session;
pub mod token;
