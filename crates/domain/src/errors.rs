use thiserror::Error;

/// Classification of every user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed call inputs (empty host, bad characters, reserved param key).
    InvalidArgument,
    /// Invalid config or request state, e.g. signing enabled without a secret.
    FailedVerification,
    /// Fetch exhausted its retries, or async admission rejected the task.
    ResolveFail,
    /// No endpoint candidate, or no bootstrap server was reachable.
    ScheduleFail,
    OutOfMemory,
    /// Unexpected transport or codec failure.
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::FailedVerification => "FAILED_VERIFICATION",
            ErrorKind::ResolveFail => "RESOLVE_FAIL",
            ErrorKind::ScheduleFail => "SCHEDULE_FAIL",
            ErrorKind::OutOfMemory => "OUT_OF_MEMORY",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Status object carried by every failing call: kind, machine-readable code,
/// human-readable message and the session id of the client that produced it.
///
/// Components deep in the stack construct errors without a session; the
/// client facade stamps its sid on the way out via [`HttpDnsError::with_session`].
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message} (sid {session})", code = .kind.code())]
pub struct HttpDnsError {
    pub kind: ErrorKind,
    pub message: String,
    pub session: String,
}

impl HttpDnsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            session: String::new(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn failed_verification(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedVerification, message)
    }

    pub fn resolve_fail(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResolveFail, message)
    }

    pub fn schedule_fail(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ScheduleFail, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
