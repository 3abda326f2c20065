//! Metric name and label definitions.

/// Session pool metrics
pub mod sessions {
    /// Number of live sessions in the pool
    pub const ACTIVE: &str = "parley_sessions_active";
    /// Total sessions created (successful authentication)
    pub const CREATED_TOTAL: &str = "parley_sessions_created_total";
    /// Total sessions torn down by the idle sweeper
    pub const EVICTED_TOTAL: &str = "parley_sessions_evicted_total";
    /// Total failed authentication attempts
    pub const AUTH_FAILURES_TOTAL: &str = "parley_sessions_auth_failures_total";
}

/// Listener dispatch metrics
pub mod listeners {
    /// Total inbound messages evaluated against listeners
    pub const MESSAGES_EVALUATED_TOTAL: &str = "parley_listener_messages_evaluated_total";
    /// Total listener matches
    pub const MATCHES_TOTAL: &str = "parley_listener_matches_total";
    /// Total handler invocations that failed or referenced a missing handler
    pub const HANDLER_FAILURES_TOTAL: &str = "parley_listener_handler_failures_total";
    /// Handler execution duration in seconds
    pub const HANDLER_DURATION_SECONDS: &str = "parley_listener_handler_duration_seconds";
}

/// Tool-call boundary metrics
pub mod tools {
    /// Total tool calls
    pub const CALLS_TOTAL: &str = "parley_tool_calls_total";
    /// Total tool calls that returned a failure payload
    pub const ERRORS_TOTAL: &str = "parley_tool_errors_total";
}

/// Common label keys
pub mod labels {
    pub const TOOL: &str = "tool";
    pub const HANDLER: &str = "handler";
    pub const ERROR_TYPE: &str = "error_type";
}
