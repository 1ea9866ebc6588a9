//! Connection-scoped logging macros: every log line from a connection's
//! lifecycle is automatically tagged with its `connection_id` instead of
//! requiring that at every call site.

/// Log at `debug` level, prefixed with the connection id. Expects the
/// caller to have a `connection_id` field or local binding in scope.
#[macro_export]
macro_rules! conn_debug {
    ($self_:expr, $($arg:tt)*) => {
        log::debug!("[{}] {}", $self_.connection_id(), format!($($arg)*))
    };
}

/// Log at `warn` level, prefixed with the connection id.
#[macro_export]
macro_rules! conn_warn {
    ($self_:expr, $($arg:tt)*) => {
        log::warn!("[{}] {}", $self_.connection_id(), format!($($arg)*))
    };
}

/// Log at `error` level, prefixed with the connection id.
#[macro_export]
macro_rules! conn_error {
    ($self_:expr, $($arg:tt)*) => {
        log::error!("[{}] {}", $self_.connection_id(), format!($($arg)*))
    };
}
