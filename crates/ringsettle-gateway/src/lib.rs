//! # ringsettle-gateway
//!
//! **Spend interceptor gateway**: the only code allowed to call into a
//! third-party [`SpendInterceptor`].
//!
//! Interceptors are untrusted. They may be missing, slow, buggy, panicking,
//! or deliberately failing. The gateway runs every call behind an isolation
//! boundary (own thread + timeout) and maps every failure to an allowance of
//! zero. Nothing an interceptor does can make settlement fail.
//!
//! ```text
//! Engine ──▶ Gateway ──resolve──▶ InterceptorDirectory
//!               │
//!               └──isolated call──▶ dyn SpendInterceptor
//!                        │
//!                        └─ any failure ⇒ allowance 0
//! ```

pub mod directory;
pub mod gateway;
pub mod interceptor;

pub use directory::InterceptorDirectory;
pub use gateway::{InterceptorCallFailure, SpendInterceptorGateway};
pub use interceptor::{InterceptorFault, SpendInterceptor};

#[cfg(any(test, feature = "test-helpers"))]
pub use interceptor::DummyInterceptor;
