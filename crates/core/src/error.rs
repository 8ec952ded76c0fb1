//! Unified error taxonomy for the migration orchestration kernel.
//!
//! Every crate in the workspace converts its local errors into this type at
//! its boundary, mirroring the way the provider adapters classify every
//! failure into one of a small closed set of kinds (spec.md §7).

use thiserror::Error;

/// Result type used throughout the kernel.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the migration orchestration kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested repository, batch, or source does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation would violate an invariant (e.g. starting a non-pending
    /// batch). Never retried; surfaced to the caller as-is.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// The destination API rejected the call due to rate limiting. Retried
    /// with backoff inside the scheduler.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A transient failure (network blip, 5xx, timeout). Retried with
    /// backoff inside the scheduler.
    #[error("transient error: {0}")]
    Transient(String),

    /// Authentication/authorization failure against the destination or
    /// source. Terminal for the affected repository.
    #[error("authentication error: {0}")]
    AuthError(String),

    /// A permanent failure unrelated to auth (e.g. unsupported operation).
    /// Terminal for the affected repository.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// The operation was cancelled. Neither success nor failure; callers
    /// must treat this as a no-op and retry on the next tick.
    #[error("cancelled")]
    Cancelled,

    /// A database error. Bubbled to the HTTP boundary as-is; inside the
    /// scheduler it is treated as `Transient` with a bounded retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration related errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with added context, preserving the source error.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error should be retried with backoff by the scheduler.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }

    /// Whether this error is terminal for the affected repository.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthError(_) | Self::Permanent(_))
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Extension trait for adding context to `Result`s, mirroring the teacher's
/// `ResultExt`.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_and_transient_are_retryable() {
        assert!(Error::rate_limited("x").is_retryable());
        assert!(Error::transient("x").is_retryable());
        assert!(!Error::permanent("x").is_retryable());
    }

    #[test]
    fn auth_and_permanent_are_terminal() {
        assert!(Error::auth("x").is_terminal());
        assert!(Error::permanent("x").is_terminal());
        assert!(!Error::transient("x").is_terminal());
    }
}
