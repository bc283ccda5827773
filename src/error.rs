//! Error types used by the bus runtime and subscriber handlers.
//!
//! This module defines three enums:
//!
//! - [`BusError`] - errors raised by the bus itself (registration, routing, codecs, storage).
//! - [`HandlerError`] - errors raised by subscriber code while handling an event.
//! - [`StoreError`] - errors raised by a key-value store implementation.
//!
//! All of them provide `as_label` for logs/metrics; the first two also `as_message`.

use thiserror::Error;

/// # Errors produced by the bus runtime.
///
/// Registration errors (`DuplicateKey`, `MissingKey`, `InvalidAppKey`,
/// `InvalidArgument`) are fatal programming errors and should abort startup.
/// `Handler` carries a subscriber failure unchanged so the queue backend can
/// decide on retries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// A subscription with this key is already registered in the namespace.
    #[error("duplicate key: {key} already exists in the {queue} queue")]
    DuplicateKey {
        /// Subscription key.
        key: String,
        /// Queue of the subscription being inserted.
        queue: String,
    },

    /// Removal of a subscription key that is not registered.
    #[error("key {key} doesn't exist")]
    MissingKey {
        /// Subscription key.
        key: String,
    },

    /// Application (namespace) name is empty after normalization.
    #[error("invalid application name: {name:?}")]
    InvalidAppKey {
        /// The name as given by the caller.
        name: String,
    },

    /// Invalid registration argument (e.g. negative heartbeat minute).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong.
        reason: String,
    },

    /// A subscription read back from the store was executed directly.
    #[error("subscription {key} has no executor in this process")]
    NoExecutor {
        /// Subscription key.
        key: String,
    },

    /// A rider task arrived without its routing keys.
    #[error("no {field} passed to rider")]
    MissingRiderKey {
        /// Name of the missing attribute.
        field: &'static str,
    },

    /// Payload could not be encoded or decoded.
    #[error("payload codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// The key-value store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Subscriber code failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use queuebus::BusError;
    ///
    /// let err = BusError::MissingKey { key: "k".into() };
    /// assert_eq!(err.as_label(), "bus_missing_key");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::DuplicateKey { .. } => "bus_duplicate_key",
            BusError::MissingKey { .. } => "bus_missing_key",
            BusError::InvalidAppKey { .. } => "bus_invalid_app_key",
            BusError::InvalidArgument { .. } => "bus_invalid_argument",
            BusError::NoExecutor { .. } => "bus_no_executor",
            BusError::MissingRiderKey { .. } => "bus_missing_rider_key",
            BusError::Codec(_) => "bus_codec",
            BusError::Store(_) => "bus_store",
            BusError::Handler(_) => "bus_handler",
        }
    }

    /// Returns a human-readable message for logs.
    pub fn as_message(&self) -> String {
        match self {
            BusError::Handler(e) => e.as_message(),
            other => other.to_string(),
        }
    }

    /// Returns true for errors raised while registering subscriptions.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            BusError::DuplicateKey { .. }
                | BusError::MissingKey { .. }
                | BusError::InvalidAppKey { .. }
                | BusError::InvalidArgument { .. }
        )
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        BusError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by subscriber handlers.
///
/// Some errors are retryable (`Fail`), others are not (`Fatal`). The bus never
/// retries on its own; the label is a hint for the queue backend.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handling failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error (should not be retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`HandlerError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        HandlerError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
        }
    }

    /// Returns a human-readable message for logs.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// # Example
    /// ```
    /// use queuebus::HandlerError;
    ///
    /// assert!(HandlerError::fail("boom").is_retryable());
    /// assert!(!HandlerError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Fail { .. })
    }
}

/// # Errors produced by key-value store implementations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Operation against a key holding the wrong kind of value.
    #[error("wrong kind of value stored at {key}")]
    WrongType {
        /// The offending key.
        key: String,
    },

    /// `rename` of a key that does not exist.
    #[error("no such key: {key}")]
    NoSuchKey {
        /// The missing key.
        key: String,
    },

    /// Backend connection or protocol failure.
    #[error("store backend failed: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::WrongType { .. } => "store_wrong_type",
            StoreError::NoSuchKey { .. } => "store_no_such_key",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_converts_into_bus_error() {
        let err: BusError = HandlerError::fail("rider crash").into();
        assert_eq!(err.as_label(), "bus_handler");
        assert_eq!(err.to_string(), "execution failed: rider crash");
    }

    #[test]
    fn test_registration_errors_are_flagged() {
        assert!(BusError::InvalidAppKey { name: "/".into() }.is_registration());
        assert!(BusError::invalid_argument("minute").is_registration());
        assert!(!BusError::NoExecutor { key: "k".into() }.is_registration());
    }

    #[test]
    fn test_duplicate_key_message_names_queue() {
        let err = BusError::DuplicateKey {
            key: "event_one".into(),
            queue: "app_default".into(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate key: event_one already exists in the app_default queue"
        );
    }
}
