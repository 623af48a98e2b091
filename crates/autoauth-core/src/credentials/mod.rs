//! Credential lookup backends
//!
//! A [`CredentialSpec`] is the query handed to a [`CredentialSource`]; the
//! source answers with zero or more [`CredentialRecord`]s, each of which may
//! carry a [`Secret`].

pub mod authinfo;
pub mod helper;

pub use authinfo::AuthinfoSource;
pub use helper::HelperSource;

use crate::{Result, Secret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyword → value query understood by credential backends
/// (e.g. `host`, `user`, `port`, plus backend-specific extension keys).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSpec(BTreeMap<String, String>);

impl CredentialSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for CredentialSpec {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CredentialSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One search result from a credential backend
#[derive(Debug, Default)]
pub struct CredentialRecord {
    /// Non-secret attributes of the record (host, user, port, ...)
    pub fields: BTreeMap<String, String>,
    pub secret: Option<Secret>,
}

impl CredentialRecord {
    pub fn with_secret(secret: impl Into<Secret>) -> Self {
        Self {
            fields: BTreeMap::new(),
            secret: Some(secret.into()),
        }
    }
}

/// A backend that can be searched for credentials
pub trait CredentialSource: Send + Sync {
    /// Return every record matching `spec`, best match first
    fn search(&self, spec: &CredentialSpec) -> Result<Vec<CredentialRecord>>;
}

/// Searches several sources in order and concatenates their results.
///
/// A failing source is skipped so the remaining ones still get a chance.
#[derive(Default)]
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl CredentialSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Build the backend chain described by the config:
    /// authinfo files first, then the helper command if one is set.
    pub fn from_config(config: &autoauth_config::GlobalConfig) -> Result<Self> {
        let mut chain = Self::new();
        chain.push(AuthinfoSource::new(config.authinfo_paths()));
        if let Some(ref helper) = config.credentials.helper {
            chain.push(HelperSource::from_command_line(helper)?);
        }
        Ok(chain)
    }
}

impl CredentialSource for CredentialChain {
    fn search(&self, spec: &CredentialSpec) -> Result<Vec<CredentialRecord>> {
        let mut records = Vec::new();
        for source in &self.sources {
            match source.search(spec) {
                Ok(mut found) => records.append(&mut found),
                Err(e) => tracing::warn!("Credential source failed, skipping: {}", e),
            }
        }
        Ok(records)
    }
}
