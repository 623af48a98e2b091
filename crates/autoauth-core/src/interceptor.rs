//! Automatic answering hooks
//!
//! Both hooks sit in front of the transport's previous handler for their
//! prompt kind. They answer only when the connection path matches the
//! pattern table (and, for secrets, a secret can be resolved). Every other
//! case falls through to the previous handler unchanged.
//!
//! A failed write is not retried and is not handed to the previous handler:
//! part of the answer may already be on the wire, and a second writer would
//! append to it. The prompt is left unanswered instead.

use crate::{
    send_line, Connection, CredentialSource, CredentialSpec, HandlerLayer, PromptHandler,
    PromptOutcome, SharedTable,
};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Answer sent to confirmation prompts for known paths
pub const CONFIRMATION_ANSWER: &str = "yes";

/// Find the credential spec for `path`. A poisoned table lock counts as no match.
fn lookup(table: &SharedTable, path: &str) -> Option<CredentialSpec> {
    match table.read() {
        Ok(table) => table.lookup(path).cloned(),
        Err(_) => {
            tracing::warn!("Pattern table lock poisoned, skipping automatic answer");
            None
        }
    }
}

/// Resolve the secret for `spec`.
///
/// Only the first record returned by `source` is considered. A record
/// without a secret, a failing deferred producer, or an empty value all
/// resolve to `None`.
pub fn resolve_secret(
    source: &dyn CredentialSource,
    spec: &CredentialSpec,
) -> Option<Zeroizing<String>> {
    let records = match source.search(spec) {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!("Credential search failed: {}", e);
            return None;
        }
    };

    let Some(record) = records.into_iter().next() else {
        tracing::debug!("No credential record found");
        return None;
    };

    let Some(secret) = record.secret else {
        tracing::debug!("First credential record has no secret");
        return None;
    };

    match secret.force() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Could not obtain secret: {}", e);
            None
        }
    }
}

/// Answers secret (password) prompts from the credential source
pub struct SecretRequestHook {
    table: SharedTable,
    source: Arc<dyn CredentialSource>,
    next: Arc<dyn PromptHandler>,
}

impl SecretRequestHook {
    pub fn new(
        table: SharedTable,
        source: Arc<dyn CredentialSource>,
        next: Arc<dyn PromptHandler>,
    ) -> Self {
        Self {
            table,
            source,
            next,
        }
    }

    /// Layer that puts a `SecretRequestHook` in front of whatever handler it is given
    pub fn layer(table: SharedTable, source: Arc<dyn CredentialSource>) -> HandlerLayer {
        Arc::new(move |next: Arc<dyn PromptHandler>| {
            Arc::new(SecretRequestHook::new(table.clone(), source.clone(), next))
                as Arc<dyn PromptHandler>
        })
    }
}

impl PromptHandler for SecretRequestHook {
    fn handle(&self, conn: &mut dyn Connection, path: &str) -> PromptOutcome {
        let secret = lookup(&self.table, path)
            .and_then(|spec| resolve_secret(self.source.as_ref(), &spec));

        let Some(secret) = secret else {
            return self.next.handle(conn, path);
        };

        match send_line(conn, &secret) {
            Ok(()) => {
                tracing::debug!("Answered secret prompt for {:?}", path);
                PromptOutcome::Answered
            }
            Err(e) => {
                tracing::warn!("Failed to send secret for {:?}: {}", path, e);
                PromptOutcome::Unanswered
            }
        }
    }
}

/// Answers yes/no prompts with "yes" for any path that has a table entry.
///
/// The entry's spec is not consulted: having any entry marks the path as trusted.
pub struct ConfirmationHook {
    table: SharedTable,
    next: Arc<dyn PromptHandler>,
}

impl ConfirmationHook {
    pub fn new(table: SharedTable, next: Arc<dyn PromptHandler>) -> Self {
        Self { table, next }
    }

    pub fn layer(table: SharedTable) -> HandlerLayer {
        Arc::new(move |next: Arc<dyn PromptHandler>| {
            Arc::new(ConfirmationHook::new(table.clone(), next)) as Arc<dyn PromptHandler>
        })
    }
}

impl PromptHandler for ConfirmationHook {
    fn handle(&self, conn: &mut dyn Connection, path: &str) -> PromptOutcome {
        if lookup(&self.table, path).is_none() {
            return self.next.handle(conn, path);
        }

        match send_line(conn, CONFIRMATION_ANSWER) {
            Ok(()) => {
                tracing::debug!("Confirmed prompt for {:?}", path);
                PromptOutcome::Answered
            }
            Err(e) => {
                tracing::warn!("Failed to send confirmation for {:?}: {}", path, e);
                PromptOutcome::Unanswered
            }
        }
    }
}
