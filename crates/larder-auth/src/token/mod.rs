//! Token lifecycle components.
//!
//! This module provides:
//!
//! - Access token revocation checks
//! - Refresh token rotation with reuse detection
//! - Cascading and single-session revocation
//! - Periodic cleanup of expired ledger rows
//! - The [`TokenLifecycleService`] facade

pub mod checker;
pub mod revoker;
pub mod rotation;
pub mod service;
pub mod sweeper;

pub use checker::RevocationChecker;
pub use revoker::CascadingRevoker;
pub use rotation::{RotationValidator, TokenLifetimes};
pub use service::TokenLifecycleService;
pub use sweeper::CleanupSweeper;
