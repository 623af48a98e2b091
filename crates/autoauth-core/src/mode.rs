//! Automatic authentication mode lifecycle
//!
//! The composition root owns one [`AutoAuthMode`] next to the transport's
//! [`PromptRegistry`]. `enable` installs the secret and confirmation hooks
//! under a single tag; `disable` removes both. Mode starts off.

use crate::{
    ConfirmationHook, CredentialChain, CredentialSource, PatternCredentialTable, PromptKind,
    PromptRegistry, Result, SecretRequestHook, SharedTable,
};
use autoauth_config::GlobalConfig;
use std::sync::Arc;

/// Tag under which the hooks are installed
pub const AUTOAUTH_TAG: &str = "autoauth";

pub struct AutoAuthMode {
    table: SharedTable,
    source: Arc<dyn CredentialSource>,
    tag: String,
    enabled: bool,
}

impl AutoAuthMode {
    pub fn new(table: SharedTable, source: Arc<dyn CredentialSource>) -> Self {
        Self {
            table,
            source,
            tag: AUTOAUTH_TAG.to_string(),
            enabled: false,
        }
    }

    /// Use a different installation tag (e.g. to run two independent tables)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Build the table and credential backends described by `config`
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        let table = PatternCredentialTable::from_config(config)?.into_shared();
        let source = CredentialChain::from_config(config)?;
        Ok(Self::new(table, Arc::new(source)))
    }

    /// Shared table; the configuration layer may write through it while enabled
    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Install both hooks. Calling this again leaves exactly one of each installed.
    pub fn enable(&mut self, registry: &mut PromptRegistry) {
        let secret_added = registry.install(
            PromptKind::Secret,
            &self.tag,
            SecretRequestHook::layer(self.table.clone(), self.source.clone()),
        );
        let confirm_added = registry.install(
            PromptKind::Confirmation,
            &self.tag,
            ConfirmationHook::layer(self.table.clone()),
        );
        if secret_added || confirm_added {
            tracing::info!("Automatic authentication enabled ({})", self.tag);
        }
        self.enabled = true;
    }

    /// Remove both hooks. A no-op if they are not installed.
    pub fn disable(&mut self, registry: &mut PromptRegistry) {
        let secret_removed = registry.remove(PromptKind::Secret, &self.tag);
        let confirm_removed = registry.remove(PromptKind::Confirmation, &self.tag);
        if secret_removed || confirm_removed {
            tracing::info!("Automatic authentication disabled ({})", self.tag);
        }
        self.enabled = false;
    }
}
