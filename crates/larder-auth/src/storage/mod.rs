//! Storage interface for token lifecycle state.
//!
//! The [`TokenLedger`] owns both tables (blacklist and refresh token
//! tracking); no other component writes to them directly.
//!
//! # Implementations
//!
//! - [`InMemoryTokenLedger`] - single-process store for tests and development
//! - `larder-auth-postgres` - PostgreSQL storage backend

pub mod ledger;
pub mod memory;

pub use ledger::TokenLedger;
pub use memory::InMemoryTokenLedger;
