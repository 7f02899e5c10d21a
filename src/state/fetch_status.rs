//! Fetch status codes recorded on a crawl URI
//!
//! Positive codes are HTTP response codes. Zero and negative codes are the
//! frontier's own outcomes: transport failures, policy decisions and operator
//! actions. The numeric values are stable and appear in checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the most recent processing attempt of a URI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum FetchStatus {
    /// Not yet attempted
    #[default]
    Unattempted,

    // ===== Transport failures (retryable) =====
    /// Could not connect to the server
    ConnectFailed,
    /// Connection dropped mid-fetch
    ConnectLost,
    /// DNS lookup failed
    DomainUnresolvable,

    // ===== Other failures =====
    /// Fetch timed out
    Timeout,
    /// Unexpected error while processing
    RuntimeError,
    /// Retry ceiling reached
    TooManyRetries,
    /// A prerequisite (robots.txt, DNS) could not be satisfied in time
    PrerequisiteFailure,

    // ===== Scheduling outcomes =====
    /// Processing postponed, usually while a prerequisite resolves
    Deferred,

    // ===== Policy and operator dispositions =====
    /// Operator blocked the URI
    BlockedByUser,
    /// A configured quota was reached
    BlockedByQuota,
    /// Operator deleted the URI from its queue
    DeletedByUser,
    /// robots.txt disallows the URI
    RobotsPrecluded,

    /// An HTTP response code
    Http(u16),

    /// A code this version does not name
    Other(i32),
}

impl FetchStatus {
    /// Returns the numeric code for this status
    pub fn code(&self) -> i32 {
        match self {
            Self::Unattempted => 0,
            Self::ConnectFailed => -2,
            Self::ConnectLost => -3,
            Self::Timeout => -4,
            Self::RuntimeError => -5,
            Self::DomainUnresolvable => -6,
            Self::TooManyRetries => -8,
            Self::Deferred => -50,
            Self::PrerequisiteFailure => -63,
            Self::BlockedByUser => -5002,
            Self::BlockedByQuota => -5003,
            Self::DeletedByUser => -6000,
            Self::RobotsPrecluded => -9998,
            Self::Http(code) => i32::from(*code),
            Self::Other(code) => *code,
        }
    }

    /// Parses a numeric code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unattempted,
            -2 => Self::ConnectFailed,
            -3 => Self::ConnectLost,
            -4 => Self::Timeout,
            -5 => Self::RuntimeError,
            -6 => Self::DomainUnresolvable,
            -8 => Self::TooManyRetries,
            -50 => Self::Deferred,
            -63 => Self::PrerequisiteFailure,
            -5002 => Self::BlockedByUser,
            -5003 => Self::BlockedByQuota,
            -6000 => Self::DeletedByUser,
            -9998 => Self::RobotsPrecluded,
            c if c > 0 && c <= i32::from(u16::MAX) => Self::Http(c as u16),
            c => Self::Other(c),
        }
    }

    /// Returns true if the server answered at all
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Returns true if the server answered with a 2xx or 3xx code
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Http(code) if (200..400).contains(code))
    }

    /// Returns true for policy/operator dispositions that are not failures
    pub fn is_disregarded(&self) -> bool {
        matches!(
            self,
            Self::RobotsPrecluded | Self::BlockedByUser | Self::BlockedByQuota | Self::DeletedByUser
        )
    }

    /// Returns true if the URI should go back on its queue for another attempt
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            Self::Deferred | Self::ConnectFailed | Self::ConnectLost | Self::DomainUnresolvable
        )
    }

    /// Returns true if a retry should wait out the retry delay first
    pub fn needs_retry_delay(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed | Self::ConnectLost | Self::DomainUnresolvable
        )
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> String {
        match self {
            Self::Unattempted => "unattempted".to_string(),
            Self::ConnectFailed => "connect-failed".to_string(),
            Self::ConnectLost => "connect-lost".to_string(),
            Self::Timeout => "timeout".to_string(),
            Self::RuntimeError => "runtime-error".to_string(),
            Self::DomainUnresolvable => "domain-unresolvable".to_string(),
            Self::TooManyRetries => "too-many-retries".to_string(),
            Self::Deferred => "deferred".to_string(),
            Self::PrerequisiteFailure => "prerequisite-failure".to_string(),
            Self::BlockedByUser => "blocked-by-user".to_string(),
            Self::BlockedByQuota => "blocked-by-quota".to_string(),
            Self::DeletedByUser => "deleted-by-user".to_string(),
            Self::RobotsPrecluded => "robots-precluded".to_string(),
            Self::Http(code) => format!("http-{}", code),
            Self::Other(code) => format!("code-{}", code),
        }
    }
}

impl From<i32> for FetchStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<FetchStatus> for i32 {
    fn from(status: FetchStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
