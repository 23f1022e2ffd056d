//! The fail-safe call boundary around spend interceptors.
//!
//! Each call runs on its own thread and is awaited for at most
//! `call_timeout`. A call that does not answer in time is abandoned; its
//! thread is detached and its eventual answer discarded.
//!
//! Abandoned threads still count against a per-interceptor in-flight cap.
//! Once an interceptor has `max_in_flight` calls running, further calls to
//! it fail with [`InterceptorCallFailure::Saturated`] without spawning.

use std::{
    collections::HashMap,
    sync::{Arc, mpsc},
    time::Duration,
};

use parking_lot::Mutex;
use ringsettle_types::{Address, InterceptorRef, SettlementConfig, TokenId, constants};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{InterceptorDirectory, InterceptorFault, SpendInterceptor};

/// Why an interceptor call produced no usable answer.
///
/// Never escapes the gateway: every variant degrades to allowance zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterceptorCallFailure {
    /// The reference does not resolve to a [`SpendInterceptor`].
    #[error("target {0} does not implement the interceptor capability")]
    NotImplemented(Address),

    /// The interceptor returned a fault.
    #[error("interceptor reverted: {0}")]
    Reverted(String),

    /// The interceptor answered with a value outside the contract.
    #[error("interceptor returned invalid allowance {0}")]
    InvalidResponse(Decimal),

    /// The interceptor panicked.
    #[error("interceptor panicked")]
    Panicked,

    /// The interceptor did not answer within the call budget.
    #[error("interceptor timed out after {0}ms")]
    TimedOut(u128),

    /// The interceptor already has this many calls running.
    #[error("interceptor saturated with {0} calls in flight")]
    Saturated(usize),

    /// The isolation boundary itself could not be set up.
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),
}

impl InterceptorCallFailure {
    /// Whether the interceptor failed to answer at all, as opposed to
    /// answering badly. Callers stop querying an unresponsive interceptor
    /// for the rest of a run.
    #[must_use]
    pub fn is_unresponsive(&self) -> bool {
        matches!(
            self,
            Self::Panicked | Self::TimedOut(_) | Self::Saturated(_) | Self::ResourceExhausted(_)
        )
    }
}

impl From<InterceptorFault> for InterceptorCallFailure {
    fn from(fault: InterceptorFault) -> Self {
        Self::Reverted(fault.0)
    }
}

type InFlightTable = Arc<Mutex<HashMap<Address, usize>>>;

/// One running call. Released when the worker finishes, unwinding included.
struct InFlightSlot {
    table: InFlightTable,
    interceptor: Address,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if let Some(count) = table.get_mut(&self.interceptor) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                table.remove(&self.interceptor);
            }
        }
    }
}

/// Worker end of one call. Fields drop in order, so a panicking worker
/// frees its slot before the caller sees the channel disconnect.
struct Reply<T> {
    slot: InFlightSlot,
    tx: mpsc::SyncSender<T>,
}

impl<T> Reply<T> {
    fn send(self, result: T) {
        drop(self.slot);
        // The caller may have stopped waiting.
        let _ = self.tx.send(result);
    }
}

/// Sole caller of untrusted interceptors.
pub struct SpendInterceptorGateway {
    directory: Arc<InterceptorDirectory>,
    call_timeout: Duration,
    max_in_flight: usize,
    in_flight: InFlightTable,
}

impl SpendInterceptorGateway {
    #[must_use]
    pub fn new(directory: Arc<InterceptorDirectory>, call_timeout: Duration) -> Self {
        Self {
            directory,
            call_timeout,
            max_in_flight: constants::DEFAULT_MAX_IN_FLIGHT_INTERCEPTOR_CALLS,
            in_flight: InFlightTable::default(),
        }
    }

    #[must_use]
    pub fn from_config(directory: Arc<InterceptorDirectory>, config: &SettlementConfig) -> Self {
        Self::new(directory, config.interceptor_call_timeout())
            .with_max_in_flight(config.max_in_flight_interceptor_calls)
    }

    /// Cap on calls one interceptor may have running. Zero is treated as one.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    #[must_use]
    pub fn directory(&self) -> &InterceptorDirectory {
        &self.directory
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Calls to `interceptor` whose worker thread has not finished yet.
    #[must_use]
    pub fn in_flight(&self, interceptor: &InterceptorRef) -> usize {
        self.in_flight
            .lock()
            .get(&interceptor.address())
            .copied()
            .unwrap_or(0)
    }

    /// Query the allowance, surfacing the failure instead of degrading it.
    pub fn try_allowance(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
    ) -> Result<Decimal, InterceptorCallFailure> {
        let allowance = self.isolated(interceptor, move |capability| {
            capability.get_allowance(&owner, &token)
        })?;
        if allowance.is_sign_negative() {
            return Err(InterceptorCallFailure::InvalidResponse(allowance));
        }
        Ok(allowance)
    }

    /// Send the spend notification, surfacing the failure.
    pub fn try_notify_spent(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
        amount: Decimal,
    ) -> Result<(), InterceptorCallFailure> {
        self.isolated(interceptor, move |capability| {
            capability.on_token_spent(&owner, &token, amount)
        })
    }

    /// `min(requested, allowance)`, with allowance zero on any failure.
    /// Does not notify the interceptor.
    pub fn granted_amount(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
        requested: Decimal,
    ) -> Decimal {
        self.grant(interceptor, owner, token, requested).0
    }

    /// [`Self::granted_amount`] plus the failure that forced a zero grant,
    /// if any.
    pub fn grant(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
        requested: Decimal,
    ) -> (Decimal, Option<InterceptorCallFailure>) {
        match self.try_allowance(interceptor, owner, token) {
            Ok(allowance) => (requested.min(allowance), None),
            Err(failure) => {
                tracing::warn!(
                    interceptor = %interceptor.address(),
                    owner = %owner,
                    token = %token,
                    %failure,
                    "Interceptor allowance query failed; granting nothing"
                );
                (Decimal::ZERO, Some(failure))
            }
        }
    }

    /// Notify the interceptor of a finalized spend. Failures are logged and
    /// otherwise ignored.
    pub fn record_spend(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
        amount: Decimal,
    ) {
        if let Err(failure) = self.try_notify_spent(interceptor, owner, token, amount) {
            tracing::warn!(
                interceptor = %interceptor.address(),
                owner = %owner,
                token = %token,
                %amount,
                %failure,
                "Interceptor spend notification failed; ignored"
            );
        }
    }

    /// Query the allowance, cap `requested` by it, report the capped amount
    /// as spent, and return it.
    pub fn check_and_record_spend(
        &self,
        interceptor: &InterceptorRef,
        owner: Address,
        token: TokenId,
        requested: Decimal,
    ) -> Decimal {
        let granted = self.granted_amount(interceptor, owner, token, requested);
        self.record_spend(interceptor, owner, token, granted);
        granted
    }

    fn isolated<T, F>(&self, interceptor: &InterceptorRef, call: F) -> Result<T, InterceptorCallFailure>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SpendInterceptor) -> Result<T, InterceptorFault> + Send + 'static,
    {
        let capability = self
            .directory
            .resolve(interceptor)
            .ok_or(InterceptorCallFailure::NotImplemented(interceptor.address()))?;
        let slot = self.acquire_slot(interceptor.address())?;

        // Capacity 1 so the worker never blocks on send after we stop waiting.
        let (tx, rx) = mpsc::sync_channel(1);
        let reply = Reply { slot, tx };
        std::thread::Builder::new()
            .name("interceptor-call".into())
            .spawn(move || {
                let result = call(capability.as_ref());
                reply.send(result);
            })
            .map_err(|e| InterceptorCallFailure::ResourceExhausted(e.to_string()))?;

        match rx.recv_timeout(self.call_timeout) {
            Ok(result) => result.map_err(InterceptorCallFailure::from),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(InterceptorCallFailure::TimedOut(self.call_timeout.as_millis()))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(InterceptorCallFailure::Panicked),
        }
    }

    fn acquire_slot(&self, interceptor: Address) -> Result<InFlightSlot, InterceptorCallFailure> {
        let mut table = self.in_flight.lock();
        let count = table.entry(interceptor).or_insert(0);
        if *count >= self.max_in_flight {
            return Err(InterceptorCallFailure::Saturated(*count));
        }
        *count += 1;
        Ok(InFlightSlot {
            table: Arc::clone(&self.in_flight),
            interceptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DummyInterceptor;

    const OWNER: Address = Address([1; 20]);
    const TOKEN: Address = Address([2; 20]);
    const AT: Address = Address([0xcc; 20]);

    fn setup(timeout_ms: u64) -> (SpendInterceptorGateway, Arc<DummyInterceptor>) {
        let directory = Arc::new(InterceptorDirectory::new());
        let dummy = Arc::new(DummyInterceptor::new());
        directory.install(AT, dummy.clone());
        (
            SpendInterceptorGateway::new(directory, Duration::from_millis(timeout_ms)),
            dummy,
        )
    }

    struct NegativeInterceptor;

    impl SpendInterceptor for NegativeInterceptor {
        fn get_allowance(&self, _: &Address, _: &TokenId) -> Result<Decimal, InterceptorFault> {
            Ok(Decimal::NEGATIVE_ONE)
        }

        fn on_token_spent(&self, _: &Address, _: &TokenId, _: Decimal) -> Result<(), InterceptorFault> {
            Ok(())
        }
    }

    #[test]
    fn grants_min_of_requested_and_allowance() {
        let (gateway, dummy) = setup(1_000);
        let reference = InterceptorRef(AT);

        dummy.set_allowance(Decimal::new(5, 0));
        assert_eq!(
            gateway.granted_amount(&reference, OWNER, TOKEN, Decimal::TEN),
            Decimal::new(5, 0)
        );
        assert_eq!(
            gateway.granted_amount(&reference, OWNER, TOKEN, Decimal::TWO),
            Decimal::TWO
        );
    }

    #[test]
    fn check_and_record_reports_granted_amount() {
        let (gateway, dummy) = setup(1_000);
        dummy.set_allowance(Decimal::new(3, 0));
        let granted = gateway.check_and_record_spend(&InterceptorRef(AT), OWNER, TOKEN, Decimal::TEN);
        assert_eq!(granted, Decimal::new(3, 0));
        assert_eq!(dummy.spent(&OWNER, &TOKEN), Decimal::new(3, 0));
    }

    #[test]
    fn granted_amount_does_not_notify() {
        let (gateway, dummy) = setup(1_000);
        dummy.set_allowance(Decimal::TEN);
        let _ = gateway.granted_amount(&InterceptorRef(AT), OWNER, TOKEN, Decimal::ONE);
        assert_eq!(dummy.spend_notifications(), 0);
        assert_eq!(dummy.allowance_queries(), 1);
    }

    #[test]
    fn unresolvable_reference_grants_zero() {
        let (gateway, _) = setup(1_000);
        let nowhere = InterceptorRef(Address([0xee; 20]));
        assert_eq!(
            gateway.try_allowance(&nowhere, OWNER, TOKEN),
            Err(InterceptorCallFailure::NotImplemented(Address([0xee; 20])))
        );
        assert_eq!(
            gateway.check_and_record_spend(&nowhere, OWNER, TOKEN, Decimal::TEN),
            Decimal::ZERO
        );
    }

    #[test]
    fn failing_interceptor_grants_zero() {
        let (gateway, dummy) = setup(1_000);
        dummy.set_allowance(Decimal::MAX);
        dummy.set_fail_all_functions(true);
        let reference = InterceptorRef(AT);
        assert!(matches!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::Reverted(_))
        ));
        assert_eq!(
            gateway.check_and_record_spend(&reference, OWNER, TOKEN, Decimal::TEN),
            Decimal::ZERO
        );
    }

    #[test]
    fn panicking_interceptor_grants_zero() {
        let (gateway, dummy) = setup(1_000);
        dummy.set_allowance(Decimal::TEN);
        dummy.set_panic_on_query(true);
        let reference = InterceptorRef(AT);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::Panicked)
        );
        assert_eq!(
            gateway.granted_amount(&reference, OWNER, TOKEN, Decimal::TEN),
            Decimal::ZERO
        );
    }

    #[test]
    fn slow_interceptor_times_out_to_zero() {
        let (gateway, dummy) = setup(20);
        dummy.set_allowance(Decimal::TEN);
        dummy.set_delay(Some(Duration::from_millis(500)));
        let reference = InterceptorRef(AT);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::TimedOut(20))
        );
    }

    #[test]
    fn negative_allowance_is_invalid() {
        let directory = Arc::new(InterceptorDirectory::new());
        directory.install(AT, Arc::new(NegativeInterceptor));
        let gateway = SpendInterceptorGateway::new(directory, Duration::from_millis(1_000));
        let reference = InterceptorRef(AT);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::InvalidResponse(Decimal::NEGATIVE_ONE))
        );
        assert_eq!(
            gateway.granted_amount(&reference, OWNER, TOKEN, Decimal::ONE),
            Decimal::ZERO
        );
    }

    #[test]
    fn failed_notification_keeps_granted_amount() {
        struct DeafInterceptor;
        impl SpendInterceptor for DeafInterceptor {
            fn get_allowance(&self, _: &Address, _: &TokenId) -> Result<Decimal, InterceptorFault> {
                Ok(Decimal::TWO)
            }
            fn on_token_spent(&self, _: &Address, _: &TokenId, _: Decimal) -> Result<(), InterceptorFault> {
                Err(InterceptorFault("not listening".into()))
            }
        }

        let directory = Arc::new(InterceptorDirectory::new());
        directory.install(AT, Arc::new(DeafInterceptor));
        let gateway = SpendInterceptorGateway::new(directory, Duration::from_millis(1_000));
        assert_eq!(
            gateway.check_and_record_spend(&InterceptorRef(AT), OWNER, TOKEN, Decimal::TEN),
            Decimal::TWO
        );
    }

    #[test]
    fn timeout_follows_config() {
        let config = SettlementConfig {
            interceptor_call_timeout_ms: 75,
            ..SettlementConfig::default()
        };
        let gateway = SpendInterceptorGateway::from_config(Arc::new(InterceptorDirectory::new()), &config);
        assert_eq!(gateway.call_timeout(), Duration::from_millis(75));
        assert_eq!(
            gateway.max_in_flight(),
            constants::DEFAULT_MAX_IN_FLIGHT_INTERCEPTOR_CALLS
        );
    }

    #[test]
    fn abandoned_calls_saturate_interceptor() {
        let (gateway, dummy) = setup(100);
        let gateway = gateway.with_max_in_flight(2);
        dummy.set_allowance(Decimal::TEN);
        dummy.set_delay(Some(Duration::from_millis(400)));
        let reference = InterceptorRef(AT);

        for _ in 0..2 {
            assert_eq!(
                gateway.try_allowance(&reference, OWNER, TOKEN),
                Err(InterceptorCallFailure::TimedOut(100))
            );
        }
        assert_eq!(gateway.in_flight(&reference), 2);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::Saturated(2))
        );
        assert_eq!(dummy.allowance_queries(), 2);

        // Slots free up once the abandoned workers finish.
        std::thread::sleep(Duration::from_millis(800));
        assert_eq!(gateway.in_flight(&reference), 0);
        dummy.set_delay(None);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Ok(Decimal::TEN)
        );
    }

    #[test]
    fn panicking_call_releases_its_slot() {
        let (gateway, dummy) = setup(1_000);
        let gateway = gateway.with_max_in_flight(1);
        dummy.set_panic_on_query(true);
        let reference = InterceptorRef(AT);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::Panicked)
        );
        assert_eq!(gateway.in_flight(&reference), 0);
        assert_eq!(
            gateway.try_allowance(&reference, OWNER, TOKEN),
            Err(InterceptorCallFailure::Panicked)
        );
    }

    #[test]
    fn grant_reports_the_failure() {
        let (gateway, dummy) = setup(1_000);
        dummy.set_fail_all_functions(true);
        let (granted, failure) = gateway.grant(&InterceptorRef(AT), OWNER, TOKEN, Decimal::TEN);
        assert_eq!(granted, Decimal::ZERO);
        let failure = failure.unwrap();
        assert!(matches!(failure, InterceptorCallFailure::Reverted(_)));
        assert!(!failure.is_unresponsive());
        assert!(InterceptorCallFailure::TimedOut(5).is_unresponsive());
        assert!(InterceptorCallFailure::Saturated(1).is_unresponsive());
    }
}
