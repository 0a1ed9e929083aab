use statebridge_protocol::ErrorPolicy;

use crate::LogFormat;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Key of the store the daemon serves when none is configured.
pub const DEFAULT_STORE_KEY: &str = "main";

/// Longest inbound message line the daemon accepts, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default handling of failed requests.
#[must_use]
pub const fn default_error_policy() -> ErrorPolicy {
    ErrorPolicy::Silent
}

/// Owned default store key.
#[must_use]
pub fn default_store_key_string() -> String {
    DEFAULT_STORE_KEY.to_owned()
}

/// Default inbound line limit.
#[must_use]
pub const fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}
