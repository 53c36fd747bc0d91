//! Parameter keys and defaults read from connection descriptors.

/// Serialization name used to encode outgoing frames.
pub const SERIALIZATION_KEY: &str = "serialization";

/// Default serialization name.
pub const DEFAULT_SERIALIZATION: &str = "msgpack";

/// Maximum frame payload length in bytes (`0` disables the check).
pub const PAYLOAD_KEY: &str = "payload";

/// Default maximum payload (8 MiB).
pub const DEFAULT_PAYLOAD: usize = 8 * 1024 * 1024;

/// Number of additional attempts after the first one.
pub const RETRIES_KEY: &str = "retries";

/// Default retry count.
pub const DEFAULT_RETRIES: u32 = 2;

/// Whether timeout faults take part in failover.
pub const FAILOVER_TIMEOUT_KEY: &str = "failover.timeout";

/// Timeouts are not retried unless a method opts in.
pub const DEFAULT_FAILOVER_TIMEOUT: bool = false;

/// Per-call response timeout in milliseconds.
pub const TIMEOUT_KEY: &str = "timeout";

/// Default response timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Load balancer name.
pub const LOADBALANCE_KEY: &str = "loadbalance";

/// Default load balancer.
pub const DEFAULT_LOADBALANCE: &str = "roundrobin";

/// Interface name parameter / attachment.
pub const INTERFACE_KEY: &str = "interface";

/// Service path attachment.
pub const PATH_KEY: &str = "path";

/// Service version parameter / attachment.
pub const VERSION_KEY: &str = "version";

/// Service version used when none is configured.
pub const DEFAULT_SERVICE_VERSION: &str = "0.0.0";

/// Comma-separated, ordered filter names applied around an invoker.
pub const FILTER_KEY: &str = "filter";
