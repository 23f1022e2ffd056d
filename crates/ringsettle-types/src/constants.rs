//! System-wide constants for RingSettle.

/// Default wall-clock budget for a single interceptor call, in milliseconds.
pub const DEFAULT_INTERCEPTOR_CALL_TIMEOUT_MS: u64 = 250;

/// Abandoned calls an interceptor may still be running before the gateway
/// stops starting new ones for it.
pub const DEFAULT_MAX_IN_FLIGHT_INTERCEPTOR_CALLS: usize = 4;

/// Maximum rings allowed in a single settlement batch (default).
pub const DEFAULT_MAX_RINGS_PER_BATCH: usize = 10_000;

/// Maximum orders allowed in a single settlement batch (default).
pub const DEFAULT_MAX_ORDERS_PER_BATCH: usize = 100_000;

/// Number of committed batch IDs remembered for idempotency.
pub const DEFAULT_IDEMPOTENCY_CACHE_SIZE: usize = 100_000;

/// Minimum number of orders forming a ring.
pub const MIN_RING_SIZE: usize = 2;

/// Default address of the broker registry.
pub const DEFAULT_REGISTRY_ADDRESS: [u8; 20] = [
    0xb0, 0x4e, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x01,
];

/// Domain tag prefixed to every registry signing payload.
pub const REGISTRY_SIGNING_DOMAIN: &[u8] = b"ringsettle:registry:v1:";

/// Domain tag prefixed to the transfer plan digest.
pub const PLAN_DIGEST_DOMAIN: &[u8] = b"ringsettle:plan:v1:";
