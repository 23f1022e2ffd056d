//! # ringsettle-types
//!
//! Shared types, errors, and configuration for **RingSettle**.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`Address`], [`TokenId`], [`InterceptorRef`], [`BatchId`]
//! - **Batch model**: [`Order`], [`Ring`], [`SettlementBatch`]
//! - **Transfer model**: [`TransferItem`], [`TransferPlan`]
//! - **Configuration**: [`SettlementConfig`]
//! - **Errors**: [`RingsettleError`] with `RS_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod transfer;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use transfer::*;

// Constants are accessed via `ringsettle_types::constants::FOO`.
