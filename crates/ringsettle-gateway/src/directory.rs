//! Resolution of interceptor references to live capabilities.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use ringsettle_types::{Address, InterceptorRef};

use crate::SpendInterceptor;

/// Maps interceptor addresses to the capabilities deployed there.
///
/// A reference with no entry points at something that does not implement
/// [`SpendInterceptor`] (a plain account, the registry itself, ...).
#[derive(Default)]
pub struct InterceptorDirectory {
    deployed: RwLock<HashMap<Address, Arc<dyn SpendInterceptor>>>,
}

impl InterceptorDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy `interceptor` at `address`, replacing whatever was there.
    pub fn install(&self, address: Address, interceptor: Arc<dyn SpendInterceptor>) {
        self.deployed.write().insert(address, interceptor);
        tracing::debug!(address = %address, "Interceptor installed");
    }

    /// Returns `true` if something was removed.
    pub fn remove(&self, address: &Address) -> bool {
        self.deployed.write().remove(address).is_some()
    }

    /// Look up the capability behind `reference`. Resolved per call; callers
    /// must not hold on to the result across settlements.
    #[must_use]
    pub fn resolve(&self, reference: &InterceptorRef) -> Option<Arc<dyn SpendInterceptor>> {
        self.deployed.read().get(&reference.address()).cloned()
    }

    #[must_use]
    pub fn contains(&self, reference: &InterceptorRef) -> bool {
        self.deployed.read().contains_key(&reference.address())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deployed.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployed.read().is_empty()
    }
}
