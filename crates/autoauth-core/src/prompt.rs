//! Prompt classification
//!
//! Decides whether the latest output of a sub-process is asking for a
//! secret or for a yes/no confirmation, and routes it to the matching
//! extension point of the [`PromptRegistry`].

use crate::{CoreError, Connection, PromptOutcome, PromptRegistry, Result};
use autoauth_config::PromptsConfig;
use regex::Regex;

/// Matches password, passphrase, PIN and one-time-code prompts ending in `:`
pub const DEFAULT_SECRET_PROMPT: &str =
    r"(?i)\b(?:password|passphrase|passcode|pin|verification code)\b.*:\s*$";

/// Matches ssh-style `(yes/no)?` and `(yes/no/[fingerprint])?` questions
pub const DEFAULT_CONFIRMATION_PROMPT: &str = r"(?i)\(yes/no(?:/\[fingerprint\])?\)\?\s*$";

/// Keep at most this many bytes of unclassified output
const TAIL_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// The sub-process wants a password or similar secret
    Secret,
    /// The sub-process wants a yes/no answer
    Confirmation,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Secret => "secret",
            PromptKind::Confirmation => "confirmation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptClassifier {
    secret: Regex,
    confirmation: Regex,
}

impl PromptClassifier {
    pub fn with_patterns(secret: &str, confirmation: &str) -> Result<Self> {
        Ok(Self {
            secret: compile(secret)?,
            confirmation: compile(confirmation)?,
        })
    }

    /// Use the `[prompts]` overrides, falling back to the built-in patterns
    pub fn from_config(prompts: &PromptsConfig) -> Result<Self> {
        Self::with_patterns(
            prompts.password.as_deref().unwrap_or(DEFAULT_SECRET_PROMPT),
            prompts
                .confirmation
                .as_deref()
                .unwrap_or(DEFAULT_CONFIRMATION_PROMPT),
        )
    }

    /// Classify the last non-blank line of `output`
    pub fn classify(&self, output: &str) -> Option<PromptKind> {
        let line = output.lines().rev().find(|l| !l.trim().is_empty())?;
        if self.confirmation.is_match(line) {
            Some(PromptKind::Confirmation)
        } else if self.secret.is_match(line) {
            Some(PromptKind::Secret)
        } else {
            None
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| CoreError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Feeds sub-process output through a classifier and dispatches detected prompts.
///
/// One dispatcher belongs to one connection; it keeps a bounded tail of the
/// output seen since the last prompt so prompts split across reads are
/// still recognised.
#[derive(Debug, Clone)]
pub struct PromptDispatcher {
    classifier: PromptClassifier,
    buffer: String,
}

impl PromptDispatcher {
    pub fn new(classifier: PromptClassifier) -> Self {
        Self {
            classifier,
            buffer: String::new(),
        }
    }

    /// Append `output` and, if it now ends in a prompt, run the handler chain.
    ///
    /// Returns `None` when no prompt was detected.
    pub fn feed(
        &mut self,
        registry: &PromptRegistry,
        conn: &mut dyn Connection,
        output: &str,
    ) -> Option<PromptOutcome> {
        self.buffer.push_str(output);
        self.truncate();

        let kind = self.classifier.classify(&self.buffer)?;
        self.buffer.clear();
        tracing::debug!("Detected {} prompt", kind.as_str());
        Some(registry.dispatch(kind, conn))
    }

    fn truncate(&mut self) {
        if self.buffer.len() <= TAIL_LIMIT {
            return;
        }
        let mut cut = self.buffer.len() - TAIL_LIMIT;
        while !self.buffer.is_char_boundary(cut) {
            cut += 1;
        }
        self.buffer.drain(..cut);
    }
}
