use std::fmt;

/// The coarse category a [`GatewayError`] belongs to, per the taxonomy in the
/// error handling design: validation, authentication, transport, protocol,
/// timeout, data, and resource errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Transport,
    Protocol,
    Timeout,
    Data,
    Resource,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Data => "data",
            ErrorKind::Resource => "resource",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// The single error currency threaded through every crate in the workspace:
/// every fallible operation in the core returns `Result<T, GatewayError>`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("unsupported resolution: {0}")]
    UnsupportedResolution(String),
    #[error("bar count {0} is out of range [1, 2000]")]
    BarCountOutOfRange(u32),
    #[error("cvd timeframe must be strictly finer than the chart resolution")]
    CvdTimeframeNotFiner,

    #[error("no session found for user")]
    NoSessionForUser,
    #[error("session is missing its cookie signature")]
    MissingSignature,
    #[error("vendor chart bootstrap endpoint unreachable: {0}")]
    BootstrapUnreachable(String),
    #[error("access token not found in bootstrap response")]
    TokenNotFound,
    #[error("access token is expired")]
    TokenExpired,
    #[error("vendor rejected authentication")]
    AuthRejected,

    #[error("dial failed: {0}")]
    DialFailed(String),
    #[error("connection closed unexpectedly")]
    UnexpectedClose,
    #[error("heartbeat missed")]
    HeartbeatMissed,
    #[error("writer queue overflowed")]
    WriteQueueOverflow,
    #[error("transport error: {0}")]
    Transport(String),

    #[error("received an unparseable frame")]
    MalformedFrame,
    #[error("vendor reported a critical error: {0}")]
    CriticalError(String),
    #[error("symbol could not be resolved: {0}")]
    SymbolNotResolved(String),
    #[error("study error reported by vendor: {0}")]
    StudyError(String),
    #[error("unexpected response to request")]
    ProtocolError,

    #[error("request timed out")]
    Timeout,

    #[error("no bars were returned")]
    NoBars,
    #[error("bar data contained a null or NaN OHLCV value")]
    InvalidBarData,
    #[error("cvd was requested but never returned")]
    StudyNotReturned,

    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("study configuration is unavailable")]
    StudyConfigUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The coarse category this error belongs to, used both to pick an HTTP
    /// status code at the boundary (§6) and to decide retriability (§7).
    pub fn kind(&self) -> ErrorKind {
        use GatewayError::*;
        match self {
            EmptySymbol | UnsupportedResolution(_) | BarCountOutOfRange(_)
            | CvdTimeframeNotFiner => ErrorKind::Validation,

            NoSessionForUser | MissingSignature | BootstrapUnreachable(_) | TokenNotFound
            | TokenExpired | AuthRejected => ErrorKind::Authentication,

            DialFailed(_) | UnexpectedClose | HeartbeatMissed | WriteQueueOverflow
            | Transport(_) => ErrorKind::Transport,

            MalformedFrame | CriticalError(_) | SymbolNotResolved(_) | StudyError(_)
            | ProtocolError => ErrorKind::Protocol,

            Timeout => ErrorKind::Timeout,

            NoBars | InvalidBarData | StudyNotReturned => ErrorKind::Data,

            PoolExhausted | StudyConfigUnavailable => ErrorKind::Resource,

            Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` for exactly the three variants §7 names as safe for the
    /// caller to retry without risking duplicate side effects: `Timeout`,
    /// `Transport`, `PoolExhausted`. Other transport-category errors
    /// (`DialFailed`, `UnexpectedClose`, `HeartbeatMissed`,
    /// `WriteQueueOverflow`) are supervisor-internal — they drive
    /// reconnection and never reach the caller as the final result of
    /// `getChart`, so they are deliberately excluded here even though they
    /// share `ErrorKind::Transport`.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::Transport(_) | GatewayError::PoolExhausted
        )
    }

    /// The HTTP status code an out-of-scope REST handler should map this
    /// error onto, per §6.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => match self {
                GatewayError::NoSessionForUser => 403,
                _ => 401,
            },
            ErrorKind::Timeout => 504,
            ErrorKind::Transport | ErrorKind::Protocol | ErrorKind::Resource => 502,
            ErrorKind::Data => 502,
            ErrorKind::Internal => 500,
        }
    }
}

/// The user-visible error shape returned by `getChart`, per §7.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    pub retriable: bool,
}

impl From<&GatewayError> for ErrorResponse {
    fn from(e: &GatewayError) -> Self {
        ErrorResponse {
            kind: e.kind().to_string(),
            message: e.to_string(),
            retriable: e.retriable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_session_for_user_maps_to_403_not_401() {
        assert_eq!(GatewayError::NoSessionForUser.http_status(), 403);
        assert_eq!(GatewayError::TokenExpired.http_status(), 401);
    }

    #[test]
    fn timeout_transport_and_pool_exhausted_are_the_only_retriable_kinds() {
        assert!(GatewayError::Timeout.retriable());
        assert!(GatewayError::Transport("broken pipe".into()).retriable());
        assert!(GatewayError::PoolExhausted.retriable());
        assert!(!GatewayError::InvalidBarData.retriable());
        assert!(!GatewayError::NoSessionForUser.retriable());
        // Same ErrorKind::Transport as GatewayError::Transport, but these
        // never escape the supervisor, so they stay non-retriable.
        assert!(!GatewayError::DialFailed("refused".into()).retriable());
        assert!(!GatewayError::UnexpectedClose.retriable());
        assert!(!GatewayError::HeartbeatMissed.retriable());
        assert!(!GatewayError::WriteQueueOverflow.retriable());
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(GatewayError::EmptySymbol.http_status(), 400);
        assert_eq!(GatewayError::CvdTimeframeNotFiner.http_status(), 400);
    }
}
