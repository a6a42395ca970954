//! Operator tooling for the Larder token ledger.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
