use std::time::Duration;

use thiserror::Error;

/// How the executor should treat a failed channel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying in place: rate limits, network, session expiry, timeouts.
    Transient,
    /// Retrying cannot help; the action fails immediately.
    Permanent,
    /// The channel is already in the desired state.
    AlreadyConverged,
}

/// Errors that can occur when talking to a sales channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Too many requests; the channel may say when to come back.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// Connection refused, reset, or a 5xx from the channel.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Session or token expired mid-cycle.
    #[error("Session expired: {message}")]
    Session { message: String },

    /// The request did not complete in time.
    #[error("Timed out: {message}")]
    Timeout { message: String },

    /// The listing is already ended or closed.
    #[error("Listing already ended: {remote_id}")]
    AlreadyEnded { remote_id: String },

    /// The listing does not exist on the channel.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The channel refused the payload (validation, policy, duplicates).
    #[error("Rejected by channel: {message}")]
    Rejected { message: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChannelError {
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    #[inline]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error for retry decisions.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited { .. }
            | Self::Network { .. }
            | Self::Session { .. }
            | Self::Timeout { .. } => ErrorClass::Transient,
            Self::AlreadyEnded { .. } => ErrorClass::AlreadyConverged,
            Self::NotFound { .. }
            | Self::Rejected { .. }
            | Self::Internal { .. } => ErrorClass::Permanent,
        }
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-requested wait before the next attempt, if any.
    #[inline]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// First line of an error message, for progress events and alerts.
///
/// ```ignore
/// use feedsync::channel::short_error_message;
/// let error = std::io::Error::other("gateway timeout\n<html>...</html>");
/// assert_eq!(short_error_message(&error), "gateway timeout");
/// ```
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
