//! # ringsettle-registry
//!
//! **Broker authorization registry**: the source of truth for which brokers
//! an owner has delegated to, and which spend interceptor (if any) caps each
//! delegation.
//!
//! ## State Machine (per `(owner, broker)`)
//!
//! ```text
//!                 register(None)            register(Some(y))
//!   ┌──────────────┐ ──────────▶ ┌──────────────────┐ ◀──────────┐
//!   │ UNREGISTERED │             │ REGISTERED(x)    │ ───────────┘
//!   └──────────────┘ ◀────────── └──────────────────┘
//!                      unregister
//! ```
//!
//! Mutations require an [`OwnerCredential`] signed by the owner's key.
//! Settlement reads through a [`RegistrySnapshot`], so a batch never sees a
//! registration change made while it runs.

pub mod auth;
pub mod registry;

pub use auth::{OwnerCredential, OwnerKey, RegistryAction, address_of};
pub use registry::{BrokerRegistration, BrokerRegistry, RegistrySnapshot};
