//! The broker registry and its read-only snapshots.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ringsettle_types::{Address, InterceptorRef, Result, RingsettleError, constants};
use serde::{Deserialize, Serialize};

use crate::auth::{self, OwnerCredential, RegistryAction};

/// One `(owner, broker)` delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerRegistration {
    pub owner: Address,
    pub broker: Address,
    /// `None` means the broker is trusted without capping.
    pub interceptor: Option<InterceptorRef>,
    /// When this registration was last written.
    pub registered_at: DateTime<Utc>,
}

type RegistrationMap = HashMap<(Address, Address), BrokerRegistration>;

/// Immutable view of the registry at one point in time.
///
/// Cheap to clone and safe to share across threads; concurrent simulations
/// may all read the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    registrations: Arc<RegistrationMap>,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn is_registered(&self, owner: &Address, broker: &Address) -> bool {
        self.registrations.contains_key(&(*owner, *broker))
    }

    /// Interceptor for the pair. `None` both when unregistered and when
    /// registered without one; use [`Self::is_registered`] to tell apart.
    #[must_use]
    pub fn interceptor_for(&self, owner: &Address, broker: &Address) -> Option<InterceptorRef> {
        self.registrations
            .get(&(*owner, *broker))
            .and_then(|r| r.interceptor)
    }

    #[must_use]
    pub fn registration(&self, owner: &Address, broker: &Address) -> Option<&BrokerRegistration> {
        self.registrations.get(&(*owner, *broker))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[derive(Default)]
struct RegistryState {
    /// Copy-on-write: writers clone only while a snapshot still holds the old map.
    registrations: Arc<RegistrationMap>,
    /// Last accepted credential nonce per owner.
    nonces: HashMap<Address, u64>,
}

/// Owner → broker → interceptor delegation store.
///
/// Writers are serialized behind one write lock. Readers either query the
/// live state or take a [`RegistrySnapshot`].
pub struct BrokerRegistry {
    address: Address,
    state: RwLock<RegistryState>,
}

impl BrokerRegistry {
    /// Create an empty registry known by `address`.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// The registry's own address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Register (or re-register) `broker` for `owner`.
    ///
    /// Re-registering replaces the interceptor. The credential must be
    /// signed by `owner`'s key for this registry's address with a fresh
    /// nonce.
    ///
    /// # Errors
    /// `Unauthorized`, `InvalidPublicKey`, `InvalidSignature`, or `NonceReplay`.
    pub fn register(
        &self,
        owner: Address,
        broker: Address,
        interceptor: Option<InterceptorRef>,
        credential: &OwnerCredential,
    ) -> Result<()> {
        auth::verify(
            &self.address,
            &owner,
            &broker,
            &RegistryAction::Register { interceptor },
            credential,
        )?;

        let mut state = self.state.write();
        Self::accept_nonce(&mut state, owner, credential.nonce)?;
        let previous = Arc::make_mut(&mut state.registrations).insert(
            (owner, broker),
            BrokerRegistration {
                owner,
                broker,
                interceptor,
                registered_at: Utc::now(),
            },
        );

        tracing::info!(
            owner = %owner,
            broker = %broker,
            interceptor = ?interceptor.map(|i| i.address().to_string()),
            replaced = previous.is_some(),
            "Broker registered"
        );
        Ok(())
    }

    /// Remove the `(owner, broker)` registration. Missing pairs are a no-op.
    ///
    /// # Errors
    /// Same authorization errors as [`Self::register`].
    pub fn unregister(
        &self,
        owner: Address,
        broker: Address,
        credential: &OwnerCredential,
    ) -> Result<()> {
        auth::verify(
            &self.address,
            &owner,
            &broker,
            &RegistryAction::Unregister,
            credential,
        )?;

        let mut state = self.state.write();
        Self::accept_nonce(&mut state, owner, credential.nonce)?;
        let removed = if state.registrations.contains_key(&(owner, broker)) {
            Arc::make_mut(&mut state.registrations)
                .remove(&(owner, broker))
                .is_some()
        } else {
            false
        };

        tracing::info!(owner = %owner, broker = %broker, removed, "Broker unregistered");
        Ok(())
    }

    fn accept_nonce(state: &mut RegistryState, owner: Address, nonce: u64) -> Result<()> {
        if let Some(&last) = state.nonces.get(&owner) {
            if nonce <= last {
                tracing::warn!(owner = %owner, nonce, last, "Registry nonce replay rejected");
                return Err(RingsettleError::NonceReplay { owner, nonce, last });
            }
        }
        state.nonces.insert(owner, nonce);
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, owner: &Address, broker: &Address) -> bool {
        self.state
            .read()
            .registrations
            .contains_key(&(*owner, *broker))
    }

    #[must_use]
    pub fn interceptor_for(&self, owner: &Address, broker: &Address) -> Option<InterceptorRef> {
        self.state
            .read()
            .registrations
            .get(&(*owner, *broker))
            .and_then(|r| r.interceptor)
    }

    /// Last nonce accepted from `owner`, if any.
    #[must_use]
    pub fn last_nonce(&self, owner: &Address) -> Option<u64> {
        self.state.read().nonces.get(owner).copied()
    }

    /// Consistent view of every registration as of now.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            registrations: Arc::clone(&self.state.read().registrations),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().registrations.is_empty()
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::new(Address(constants::DEFAULT_REGISTRY_ADDRESS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OwnerKey;

    const BROKER: Address = Address([0xbb; 20]);
    const INTERCEPTOR: InterceptorRef = InterceptorRef(Address([0xcc; 20]));
    const REGISTRY: Address = Address(constants::DEFAULT_REGISTRY_ADDRESS);

    fn owner() -> OwnerKey {
        OwnerKey::from_seed(&[1; 32])
    }

    #[test]
    fn unregistered_by_default() {
        let registry = BrokerRegistry::default();
        let key = owner();
        assert!(!registry.is_registered(&key.address(), &BROKER));
        assert_eq!(registry.interceptor_for(&key.address(), &BROKER), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn register_without_interceptor() {
        let registry = BrokerRegistry::default();
        let key = owner();
        registry
            .register(key.address(), BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();
        assert!(registry.is_registered(&key.address(), &BROKER));
        assert_eq!(registry.interceptor_for(&key.address(), &BROKER), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregister_replaces_interceptor() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let a = key.address();
        registry
            .register(a, BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();
        registry
            .register(
                a,
                BROKER,
                Some(INTERCEPTOR),
                &key.sign_register(&REGISTRY, &BROKER, Some(INTERCEPTOR), 2),
            )
            .unwrap();
        assert_eq!(registry.interceptor_for(&a, &BROKER), Some(INTERCEPTOR));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_then_unregister_returns_to_unregistered() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let a = key.address();
        registry
            .register(
                a,
                BROKER,
                Some(INTERCEPTOR),
                &key.sign_register(&REGISTRY, &BROKER, Some(INTERCEPTOR), 1),
            )
            .unwrap();
        registry
            .unregister(a, BROKER, &key.sign_unregister(&REGISTRY, &BROKER, 2))
            .unwrap();
        assert!(!registry.is_registered(&a, &BROKER));
        assert_eq!(registry.interceptor_for(&a, &BROKER), None);
    }

    #[test]
    fn unregister_missing_is_noop() {
        let registry = BrokerRegistry::default();
        let key = owner();
        assert!(
            registry
                .unregister(key.address(), BROKER, &key.sign_unregister(&REGISTRY, &BROKER, 1))
                .is_ok()
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn foreign_caller_cannot_register() {
        let registry = BrokerRegistry::default();
        let victim = owner();
        let attacker = OwnerKey::from_seed(&[9; 32]);
        let err = registry
            .register(
                victim.address(),
                BROKER,
                None,
                &attacker.sign_register(&REGISTRY, &BROKER, None, 1),
            )
            .unwrap_err();
        assert!(err.is_authorization());
        assert!(!registry.is_registered(&victim.address(), &BROKER));
    }

    #[test]
    fn foreign_caller_cannot_unregister() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let attacker = OwnerKey::from_seed(&[9; 32]);
        registry
            .register(key.address(), BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();
        let err = registry
            .unregister(key.address(), BROKER, &attacker.sign_unregister(&REGISTRY, &BROKER, 5))
            .unwrap_err();
        assert!(matches!(err, RingsettleError::Unauthorized { .. }));
        assert!(registry.is_registered(&key.address(), &BROKER));
    }

    #[test]
    fn replayed_credential_rejected() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let a = key.address();
        let cred = key.sign_register(&REGISTRY, &BROKER, None, 1);
        registry.register(a, BROKER, None, &cred).unwrap();
        registry
            .unregister(a, BROKER, &key.sign_unregister(&REGISTRY, &BROKER, 2))
            .unwrap();

        let err = registry.register(a, BROKER, None, &cred).unwrap_err();
        assert!(matches!(err, RingsettleError::NonceReplay { nonce: 1, last: 2, .. }));
        assert!(!registry.is_registered(&a, &BROKER));
        assert_eq!(registry.last_nonce(&a), Some(2));
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let a = key.address();
        registry
            .register(a, BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();

        let snapshot = registry.snapshot();
        registry
            .unregister(a, BROKER, &key.sign_unregister(&REGISTRY, &BROKER, 2))
            .unwrap();

        assert!(snapshot.is_registered(&a, &BROKER));
        assert!(!registry.is_registered(&a, &BROKER));
        assert!(!registry.snapshot().is_registered(&a, &BROKER));
    }

    #[test]
    fn snapshot_distinguishes_no_interceptor_from_unregistered() {
        let registry = BrokerRegistry::default();
        let key = owner();
        let a = key.address();
        let other = Address([0xdd; 20]);
        registry
            .register(a, BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.interceptor_for(&a, &BROKER), None);
        assert_eq!(snapshot.interceptor_for(&a, &other), None);
        assert!(snapshot.is_registered(&a, &BROKER));
        assert!(!snapshot.is_registered(&a, &other));
        assert_eq!(snapshot.registration(&a, &BROKER).map(|r| r.owner), Some(a));
    }

    #[test]
    fn concurrent_snapshot_readers() {
        let registry = Arc::new(BrokerRegistry::default());
        let key = owner();
        let a = key.address();
        registry
            .register(a, BROKER, None, &key.sign_register(&REGISTRY, &BROKER, None, 1))
            .unwrap();
        let snapshot = registry.snapshot();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = snapshot.clone();
                std::thread::spawn(move || snapshot.is_registered(&a, &BROKER))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn registration_serde_roundtrip() {
        let reg = BrokerRegistration {
            owner: Address([1; 20]),
            broker: BROKER,
            interceptor: Some(INTERCEPTOR),
            registered_at: Utc::now(),
        };
        let json = serde_json::to_string(&reg).unwrap();
        let back: BrokerRegistration = serde_json::from_str(&json).unwrap();
        assert_eq!(reg, back);
    }

    #[test]
    fn credential_for_another_registry_rejected() {
        let registry = BrokerRegistry::default();
        let other = BrokerRegistry::new(Address([0x42; 20]));
        let key = owner();
        let cred = key.sign_register(&other.address(), &BROKER, None, 1);

        other.register(key.address(), BROKER, None, &cred).unwrap();
        let err = registry.register(key.address(), BROKER, None, &cred).unwrap_err();
        assert!(matches!(err, RingsettleError::InvalidSignature { .. }));
        assert!(!registry.is_registered(&key.address(), &BROKER));
        assert_eq!(registry.last_nonce(&key.address()), None);
    }
}
