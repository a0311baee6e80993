//! Error types for pooled resource management
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by error variants that wrap a resource failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the pool, its activator and its leases.
///
/// Capacity overflow on return is not an error: it is a defined disposal
/// path. Releasing a lease twice is not an error either, the second release
/// cannot be expressed.
#[derive(Error, Debug)]
pub enum Error {
    /// The resource type cannot be activated with the supplied configuration.
    ///
    /// Raised once, at pool construction.
    #[error("Configuration error for resource '{resource}': {message}")]
    Configuration {
        /// Type name of the pooled resource
        resource: &'static str,
        /// The error message
        message: String,
        /// The underlying validation error
        #[source]
        source: Option<BoxError>,
    },

    /// Constructing a new resource failed.
    ///
    /// Pool state is untouched: a resource that failed to construct was
    /// never counted.
    #[error("Activation failed for resource '{resource}': {source}")]
    Activation {
        /// Type name of the pooled resource
        resource: &'static str,
        /// The constructor's error
        #[source]
        source: BoxError,
    },

    /// A returned resource could not be reset to steady state.
    ///
    /// The resource has been disposed and was not re-enqueued.
    #[error("Reset failed for resource '{resource}': {source}")]
    Reset {
        /// Type name of the pooled resource
        resource: &'static str,
        /// The reset error
        #[source]
        source: BoxError,
    },

    /// Disposing a retired resource failed.
    #[error("Dispose failed for resource '{resource}': {source}")]
    Dispose {
        /// Type name of the pooled resource
        resource: &'static str,
        /// The dispose error
        #[source]
        source: BoxError,
    },

    /// The pool has been torn down and no longer hands out resources.
    #[error("Pool for resource '{resource}' has been disposed")]
    Disposed {
        /// Type name of the pooled resource
        resource: &'static str,
    },
}

impl Error {
    /// Create a configuration error without an underlying cause.
    pub fn configuration<S: Into<String>>(resource: &'static str, message: S) -> Self {
        Self::Configuration {
            resource,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn activation<E>(resource: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Activation {
            resource,
            source: Box::new(source),
        }
    }

    pub(crate) fn reset<E>(resource: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Reset {
            resource,
            source: Box::new(source),
        }
    }

    pub(crate) fn dispose<E>(resource: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Dispose {
            resource,
            source: Box::new(source),
        }
    }

    /// Check if the failed operation may succeed when retried by the caller.
    ///
    /// The pool itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Activation { .. } | Self::Reset { .. })
    }

    /// Type name of the resource this error concerns.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Configuration { resource, .. }
            | Self::Activation { resource, .. }
            | Self::Reset { resource, .. }
            | Self::Dispose { resource, .. }
            | Self::Disposed { resource } => resource,
        }
    }
}
