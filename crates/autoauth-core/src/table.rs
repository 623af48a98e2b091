//! Ordered path-pattern → credential-query table

use crate::{CoreError, CredentialSpec, Result};
use regex::Regex;
use std::sync::{Arc, RwLock};

/// Table handle shared between the configuration layer (writer) and the hooks (readers).
/// Writers rebuild or extend the table; the hooks only call [`PatternCredentialTable::lookup`].
pub type SharedTable = Arc<RwLock<PatternCredentialTable>>;

/// One row of the table: a path regex and the query it maps to
#[derive(Debug, Clone)]
pub struct TableEntry {
    pattern: Regex,
    spec: CredentialSpec,
}

impl TableEntry {
    pub fn new(pattern: &str, spec: CredentialSpec) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|source| CoreError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern, spec })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn spec(&self) -> &CredentialSpec {
        &self.spec
    }

    /// Unanchored search: the pattern may occur anywhere in `path`
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Ordered table of [`TableEntry`]s. Lookups scan in insertion order and
/// the first matching entry wins.
#[derive(Debug, Clone, Default)]
pub struct PatternCredentialTable {
    entries: Vec<TableEntry>,
}

impl PatternCredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from the `[[patterns]]` section of the config
    pub fn from_config(config: &autoauth_config::GlobalConfig) -> Result<Self> {
        let mut table = Self::new();
        for entry in &config.patterns {
            table.push(&entry.pattern, CredentialSpec::from(entry.spec.clone()))?;
        }
        Ok(table)
    }

    /// Append an entry at the end of the table
    pub fn push(&mut self, pattern: &str, spec: CredentialSpec) -> Result<()> {
        self.entries.push(TableEntry::new(pattern, spec)?);
        Ok(())
    }

    /// Return the credential spec of the earliest entry whose pattern occurs in `path`
    pub fn lookup(&self, path: &str) -> Option<&CredentialSpec> {
        self.find(path).map(TableEntry::spec)
    }

    /// Like [`lookup`](Self::lookup) but returns the whole entry
    pub fn find(&self, path: &str) -> Option<&TableEntry> {
        self.entries.iter().find(|entry| entry.matches(path))
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_shared(self) -> SharedTable {
        Arc::new(RwLock::new(self))
    }
}
