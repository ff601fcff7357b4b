//! Error types for the Vortex ring buffer core.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VortexError>;

/// Errors raised by the ring buffer, barrier and processor machinery.
///
/// Alert and Timeout are not failures in the usual sense: Alert is the
/// documented shutdown signal and Timeout is a normal event for the
/// timeout-blocking wait strategy. Neither should be logged as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VortexError {
    /// Ring buffer size, batch size, or consumer count was invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the offending parameter.
        message: String,
    },

    /// `try_next`/`try_claim` could not be satisfied without waiting.
    #[error("insufficient capacity to claim {requested} slot(s)")]
    InsufficientCapacity {
        /// Number of slots the caller asked to claim.
        requested: usize,
    },

    /// A `SequenceBarrier::wait_for` was interrupted by `alert()`.
    ///
    /// This is the sole cancellation/shutdown signal in the system, not an
    /// error condition a caller needs to recover from.
    #[error("barrier was alerted")]
    Alert,

    /// A timeout-bounded wait strategy reached its deadline.
    #[error("wait timed out")]
    Timeout,
}

impl VortexError {
    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True if retrying the same operation later is a reasonable response.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCapacity { .. } | Self::Timeout
        )
    }
}
