//! Owner authentication for registry mutations.
//!
//! An owner's [`Address`] is the last 20 bytes of `sha256(verifying_key)`.
//! Every `register`/`unregister` carries an [`OwnerCredential`]: an ed25519
//! signature by the owner's key over the canonical request payload, plus a
//! nonce that must strictly increase per owner.
//!
//! Payload format:
//! `"ringsettle:registry:v1:" || registry || action_tag || owner || broker || interceptor_tag [|| interceptor] || nonce_le`
//!
//! Binding the registry address keeps a credential from being replayed
//! against a different registry instance.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use ringsettle_types::{Address, InterceptorRef, Result, RingsettleError, constants};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The mutation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryAction {
    Register { interceptor: Option<InterceptorRef> },
    Unregister,
}

impl RegistryAction {
    /// Canonical signing payload for this action on `(owner, broker)` at
    /// the registry known by `registry`.
    #[must_use]
    pub fn signing_payload(
        &self,
        registry: &Address,
        owner: &Address,
        broker: &Address,
        nonce: u64,
    ) -> Vec<u8> {
        let mut payload = Vec::with_capacity(116);
        payload.extend_from_slice(constants::REGISTRY_SIGNING_DOMAIN);
        payload.extend_from_slice(registry.as_bytes());
        match self {
            Self::Register { .. } => payload.push(0x01),
            Self::Unregister => payload.push(0x02),
        }
        payload.extend_from_slice(owner.as_bytes());
        payload.extend_from_slice(broker.as_bytes());
        match self {
            Self::Register {
                interceptor: Some(interceptor),
            } => {
                payload.push(0x01);
                payload.extend_from_slice(interceptor.address().as_bytes());
            }
            _ => payload.push(0x00),
        }
        payload.extend_from_slice(&nonce.to_le_bytes());
        payload
    }
}

/// Proof that a registry request was issued by the owner's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCredential {
    /// Raw ed25519 verifying key.
    pub public_key: [u8; 32],
    /// Ed25519 signature over [`RegistryAction::signing_payload`].
    pub signature: Vec<u8>,
    /// Per-owner, strictly increasing.
    pub nonce: u64,
}

/// Derive the account address controlled by an ed25519 key.
#[must_use]
pub fn address_of(public_key: &[u8; 32]) -> Address {
    let hash = Sha256::digest(public_key);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}

/// Check that `credential` authorizes `action` on `(owner, broker)` at
/// `registry`.
///
/// Nonce freshness is not checked here; the registry does that under its
/// write lock.
pub(crate) fn verify(
    registry: &Address,
    owner: &Address,
    broker: &Address,
    action: &RegistryAction,
    credential: &OwnerCredential,
) -> Result<()> {
    let key = VerifyingKey::from_bytes(&credential.public_key).map_err(|e| {
        RingsettleError::InvalidPublicKey {
            reason: e.to_string(),
        }
    })?;

    let caller = address_of(&credential.public_key);
    if caller != *owner {
        return Err(RingsettleError::Unauthorized {
            owner: *owner,
            caller,
        });
    }

    let signature = Signature::from_slice(&credential.signature)
        .map_err(|_| RingsettleError::InvalidSignature { owner: *owner })?;
    let payload = action.signing_payload(registry, owner, broker, credential.nonce);
    key.verify_strict(&payload, &signature)
        .map_err(|_| RingsettleError::InvalidSignature { owner: *owner })
}

/// An owner's signing key. Produces credentials for registry requests.
pub struct OwnerKey {
    signing_key: SigningKey,
}

impl OwnerKey {
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Generate a fresh key from a cryptographic RNG.
    pub fn generate<R: rand::CryptoRng + rand::RngCore>(rng: &mut R) -> Self {
        Self {
            signing_key: SigningKey::generate(rng),
        }
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The owner address this key controls.
    #[must_use]
    pub fn address(&self) -> Address {
        address_of(&self.public_key())
    }

    #[must_use]
    pub fn sign(
        &self,
        registry: &Address,
        broker: &Address,
        action: RegistryAction,
        nonce: u64,
    ) -> OwnerCredential {
        let payload = action.signing_payload(registry, &self.address(), broker, nonce);
        OwnerCredential {
            public_key: self.public_key(),
            signature: self.signing_key.sign(&payload).to_bytes().to_vec(),
            nonce,
        }
    }

    #[must_use]
    pub fn sign_register(
        &self,
        registry: &Address,
        broker: &Address,
        interceptor: Option<InterceptorRef>,
        nonce: u64,
    ) -> OwnerCredential {
        self.sign(registry, broker, RegistryAction::Register { interceptor }, nonce)
    }

    #[must_use]
    pub fn sign_unregister(&self, registry: &Address, broker: &Address, nonce: u64) -> OwnerCredential {
        self.sign(registry, broker, RegistryAction::Unregister, nonce)
    }
}
