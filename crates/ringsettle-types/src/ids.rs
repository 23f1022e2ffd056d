//! Identifiers used throughout RingSettle.
//!
//! Every on-ledger identity (owner, broker, token, interceptor, the registry
//! itself) is a 20-byte [`Address`]. Batches are numbered by [`BatchId`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::RingsettleError;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address. Never a valid owner or token.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = RingsettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| RingsettleError::Serialization(format!("address {s}: {e}")))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|v: Vec<u8>| {
            RingsettleError::Serialization(format!("address {s}: expected 20 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

/// Token identity. Tokens are addressed like any other contract.
pub type TokenId = Address;

// ---------------------------------------------------------------------------
// InterceptorRef
// ---------------------------------------------------------------------------

/// Reference to a spend interceptor capability.
///
/// Absence of an interceptor is always `Option::<InterceptorRef>::None`;
/// an `InterceptorRef` wrapping [`Address::ZERO`] is a real (if odd)
/// reference and is resolved like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct InterceptorRef(pub Address);

impl InterceptorRef {
    #[must_use]
    pub fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for InterceptorRef {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for InterceptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interceptor:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// Identifier of a settlement batch, assigned by the batch producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl BatchId {
    /// The following ID, or `None` once the space is exhausted.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}
