//! Secret values returned by credential backends
//!
//! A backend may hand back the secret itself or a producer that computes it
//! on demand (e.g. by running a helper). Either way the value must be
//! [`Secret::force`]d into a concrete string before it is written anywhere.
//! Values are held in [`Zeroizing`] buffers so they are wiped on drop.

use crate::{CoreError, Result};
use std::fmt;
use zeroize::Zeroizing;

/// Zero-argument producer for a secret that is computed lazily
pub type SecretProducer = Box<dyn FnOnce() -> Result<Zeroizing<String>> + Send>;

pub enum Secret {
    Concrete(Zeroizing<String>),
    Deferred(SecretProducer),
}

impl Secret {
    /// Wrap a lazy producer
    pub fn deferred<F>(producer: F) -> Self
    where
        F: FnOnce() -> Result<String> + Send + 'static,
    {
        Secret::Deferred(Box::new(move || producer().map(Zeroizing::new)))
    }

    /// Turn the secret into a concrete, non-empty string.
    ///
    /// A deferred producer is invoked exactly once. A producer error or an
    /// empty result is a failure.
    pub fn force(self) -> Result<Zeroizing<String>> {
        let value = match self {
            Secret::Concrete(value) => value,
            Secret::Deferred(producer) => producer()?,
        };
        if value.is_empty() {
            return Err(CoreError::EmptySecret);
        }
        Ok(value)
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Secret::Deferred(_))
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret::Concrete(Zeroizing::new(value))
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::from(value.to_string())
    }
}

// Never print the value.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Concrete(_) => f.write_str("Secret::Concrete(<redacted>)"),
            Secret::Deferred(_) => f.write_str("Secret::Deferred(<producer>)"),
        }
    }
}
