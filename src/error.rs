use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookingError>;

/// Why a guest or operator credential was rejected.
///
/// Kept separate from `NotFound` so that a caller cannot tell an unknown booking from a
/// wrong secret by looking at the error shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidVerificationCode,
    InvalidToken,
    TokenExpired,
    InvalidSignature,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            AuthFailure::InvalidVerificationCode => "invalid verification code",
            AuthFailure::InvalidToken => "invalid cancel token",
            AuthFailure::TokenExpired => "cancel token expired",
            AuthFailure::InvalidSignature => "invalid webhook signature",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyConfirmed,
    ActiveChargeExists,
    InvalidChargeTransition,
    BookingNotPending,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ConflictKind::AlreadyConfirmed => "booking already confirmed",
            ConflictKind::ActiveChargeExists => "booking already has an active charge",
            ConflictKind::InvalidChargeTransition => "charge cannot move to the requested status",
            ConflictKind::BookingNotPending => "booking is not pending",
        };
        f.write_str(msg)
    }
}

/// Failures talking to the payment gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether re-issuing the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Rejected { status, body } => {
                *status >= 500 || *status == 429 || is_split_too_close(body)
            }
            GatewayError::Decode(_) => false,
        }
    }
}

// The gateway refuses splits whose value is too close to the charge total; the
// booking is still valid, so the charge can be attempted again.
fn is_split_too_close(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("split") && body.contains("close")
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(AuthFailure),
    #[error("conflict: {0}")]
    Conflict(ConflictKind),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("notification error: {0}")]
    Notification(String),
}

impl BookingError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BookingError::NotFound(what.into())
    }

    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            BookingError::Gateway(e) => e.is_retryable(),
            BookingError::Persistence(_) | BookingError::Notification(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BookingError {
    fn from(e: rocksdb::Error) -> Self {
        BookingError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(e: serde_json::Error) -> Self {
        BookingError::Persistence(format!("serialization error: {e}"))
    }
}
