//! The spend interceptor capability implemented by third parties.

use ringsettle_types::{Address, TokenId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failure reported by an interceptor itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interceptor fault: {0}")]
pub struct InterceptorFault(pub String);

/// Capability consulted to cap broker-mediated spends.
///
/// Implementations own all spend accounting. The gateway queries
/// [`Self::get_allowance`] fresh on every settlement and reports finalized
/// spends through [`Self::on_token_spent`].
pub trait SpendInterceptor: Send + Sync {
    /// How much of `token` the owner's broker may still spend.
    fn get_allowance(&self, owner: &Address, token: &TokenId) -> Result<Decimal, InterceptorFault>;

    /// Best-effort notification that `amount` of `token` was spent.
    fn on_token_spent(
        &self,
        owner: &Address,
        token: &TokenId,
        amount: Decimal,
    ) -> Result<(), InterceptorFault>;
}

#[cfg(any(test, feature = "test-helpers"))]
mod dummy {
    use std::{collections::HashMap, time::Duration};

    use parking_lot::Mutex;
    use ringsettle_types::{Address, TokenId};
    use rust_decimal::Decimal;

    use super::{InterceptorFault, SpendInterceptor};

    #[derive(Default)]
    struct DummyState {
        allowance: Decimal,
        fail_all: bool,
        panic_on_query: bool,
        delay: Option<Duration>,
        spent: HashMap<(Address, TokenId), Decimal>,
        allowance_queries: usize,
        spend_notifications: usize,
    }

    /// Configurable interceptor for tests. **Never use in production.**
    ///
    /// Reports a flat allowance, accumulates notified spends per
    /// `(owner, token)`, and can be told to fail, panic, or stall.
    #[derive(Default)]
    pub struct DummyInterceptor {
        state: Mutex<DummyState>,
    }

    impl DummyInterceptor {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_allowance(&self, allowance: Decimal) {
            self.state.lock().allowance = allowance;
        }

        /// Make every call return a fault.
        pub fn set_fail_all_functions(&self, fail: bool) {
            self.state.lock().fail_all = fail;
        }

        pub fn set_panic_on_query(&self, panic: bool) {
            self.state.lock().panic_on_query = panic;
        }

        /// Sleep this long inside `get_allowance`.
        pub fn set_delay(&self, delay: Option<Duration>) {
            self.state.lock().delay = delay;
        }

        #[must_use]
        pub fn spent(&self, owner: &Address, token: &TokenId) -> Decimal {
            self.state
                .lock()
                .spent
                .get(&(*owner, *token))
                .copied()
                .unwrap_or(Decimal::ZERO)
        }

        #[must_use]
        pub fn allowance_queries(&self) -> usize {
            self.state.lock().allowance_queries
        }

        #[must_use]
        pub fn spend_notifications(&self) -> usize {
            self.state.lock().spend_notifications
        }
    }

    impl SpendInterceptor for DummyInterceptor {
        fn get_allowance(
            &self,
            _owner: &Address,
            _token: &TokenId,
        ) -> Result<Decimal, InterceptorFault> {
            let (delay, panic_on_query, fail_all, allowance) = {
                let mut state = self.state.lock();
                state.allowance_queries += 1;
                (state.delay, state.panic_on_query, state.fail_all, state.allowance)
            };
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            assert!(!panic_on_query, "dummy interceptor told to panic");
            if fail_all {
                return Err(InterceptorFault("all functions fail".into()));
            }
            Ok(allowance)
        }

        fn on_token_spent(
            &self,
            owner: &Address,
            token: &TokenId,
            amount: Decimal,
        ) -> Result<(), InterceptorFault> {
            let mut state = self.state.lock();
            if state.fail_all {
                return Err(InterceptorFault("all functions fail".into()));
            }
            state.spend_notifications += 1;
            *state.spent.entry((*owner, *token)).or_insert(Decimal::ZERO) += amount;
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use dummy::DummyInterceptor;
