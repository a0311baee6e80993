//! Validated-once factory for pooled resources.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::poolable::{Config, Poolable};

type Factory<T> =
    dyn Fn() -> std::result::Result<T, <T as Poolable>::Error> + Send + Sync + 'static;

/// Produces new `T` instances on demand.
///
/// Built once per pool, at pool construction. Configuration is validated
/// up front, so the per-call path is a plain function call.
pub struct Activator<T: Poolable> {
    factory: Arc<Factory<T>>,
}

impl<T: Poolable> Clone for Activator<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: Poolable> fmt::Debug for Activator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("resource", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: Poolable> Activator<T> {
    /// Build an activator around `T`'s designated constructor.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] naming `T` if `config` fails
    /// validation.
    pub fn new(config: T::Config) -> Result<Self> {
        config.validate().map_err(|err| Error::Configuration {
            resource: type_name::<T>(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })?;
        Ok(Self {
            factory: Arc::new(move || T::activate(&config)),
        })
    }

    /// Build an activator from a caller-supplied factory.
    ///
    /// No validation step runs; the factory is trusted to produce
    /// fully-constructed instances.
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn() -> std::result::Result<T, T::Error> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Construct a new instance.
    ///
    /// # Errors
    /// Returns [`Error::Activation`] wrapping the constructor's failure.
    pub fn activate(&self) -> Result<T> {
        (self.factory)().map_err(|err| Error::activation(type_name::<T>(), err))
    }
}
