//! Prompt handler chain
//!
//! The transport exposes one extension point per [`PromptKind`]. Each
//! extension point has a default handler (usually an interactive prompt)
//! and an ordered list of tagged layers. A layer receives the handler below
//! it and returns a handler that wraps it, so the effective handler is a
//! linked chain ending in the default. Layers are identified by tag, which
//! makes installation and removal exact and idempotent.

use crate::PromptKind;
use std::io;
use std::sync::Arc;
use zeroize::Zeroizing;

/// The transport's view of a live sub-process session
pub trait Connection {
    /// Identifying vector of the connection. The last component is its path.
    fn identity(&self) -> &[String];

    /// Write raw bytes to the sub-process's input stream
    fn write_input(&mut self, data: &[u8]) -> io::Result<()>;

    /// Line terminator the transport uses when sending answers
    fn line_terminator(&self) -> &str {
        "\n"
    }
}

/// Path of a connection: the last identity component, or `""` if there is none
pub fn connection_path(conn: &dyn Connection) -> &str {
    conn.identity().last().map(String::as_str).unwrap_or("")
}

/// Write `answer` followed by the connection's line terminator in one call
pub fn send_line(conn: &mut dyn Connection, answer: &str) -> io::Result<()> {
    let terminator = conn.line_terminator();
    // Sized up front so a secret is never left behind in a reallocated buffer
    let mut line = Zeroizing::new(String::with_capacity(answer.len() + terminator.len()));
    line.push_str(answer);
    line.push_str(terminator);
    conn.write_input(line.as_bytes())
}

/// Result of handling a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// An answer was written to the connection
    Answered,
    /// Nothing was written; the prompt is left to whatever the transport does next
    Unanswered,
}

/// Handles one kind of prompt for a connection
pub trait PromptHandler: Send + Sync {
    fn handle(&self, conn: &mut dyn Connection, path: &str) -> PromptOutcome;
}

/// Default handler that never answers
#[derive(Debug, Clone, Copy, Default)]
pub struct Unanswered;

impl PromptHandler for Unanswered {
    fn handle(&self, _conn: &mut dyn Connection, _path: &str) -> PromptOutcome {
        PromptOutcome::Unanswered
    }
}

/// Wraps the next handler in the chain
pub type HandlerLayer =
    Arc<dyn Fn(Arc<dyn PromptHandler>) -> Arc<dyn PromptHandler> + Send + Sync>;

struct ExtensionPoint {
    default: Arc<dyn PromptHandler>,
    layers: Vec<(String, HandlerLayer)>,
    head: Arc<dyn PromptHandler>,
}

impl ExtensionPoint {
    fn new(default: Arc<dyn PromptHandler>) -> Self {
        Self {
            head: default.clone(),
            default,
            layers: Vec::new(),
        }
    }

    fn contains(&self, tag: &str) -> bool {
        self.layers.iter().any(|(t, _)| t == tag)
    }

    fn rebuild(&mut self) {
        self.head = self
            .layers
            .iter()
            .fold(self.default.clone(), |next, (_, layer)| layer(next));
    }
}

/// The transport's two prompt extension points
pub struct PromptRegistry {
    secret: ExtensionPoint,
    confirmation: ExtensionPoint,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new(Arc::new(Unanswered), Arc::new(Unanswered))
    }
}

impl PromptRegistry {
    pub fn new(
        default_secret: Arc<dyn PromptHandler>,
        default_confirmation: Arc<dyn PromptHandler>,
    ) -> Self {
        Self {
            secret: ExtensionPoint::new(default_secret),
            confirmation: ExtensionPoint::new(default_confirmation),
        }
    }

    fn point(&self, kind: PromptKind) -> &ExtensionPoint {
        match kind {
            PromptKind::Secret => &self.secret,
            PromptKind::Confirmation => &self.confirmation,
        }
    }

    fn point_mut(&mut self, kind: PromptKind) -> &mut ExtensionPoint {
        match kind {
            PromptKind::Secret => &mut self.secret,
            PromptKind::Confirmation => &mut self.confirmation,
        }
    }

    /// Install `layer` on top of the chain for `kind`.
    ///
    /// Returns `false` (and changes nothing) if `tag` is already installed.
    pub fn install(&mut self, kind: PromptKind, tag: &str, layer: HandlerLayer) -> bool {
        let point = self.point_mut(kind);
        if point.contains(tag) {
            return false;
        }
        point.layers.push((tag.to_string(), layer));
        point.rebuild();
        true
    }

    /// Remove the layer installed under `tag`. Returns `false` if absent.
    pub fn remove(&mut self, kind: PromptKind, tag: &str) -> bool {
        let point = self.point_mut(kind);
        let before = point.layers.len();
        point.layers.retain(|(t, _)| t != tag);
        if point.layers.len() == before {
            return false;
        }
        point.rebuild();
        true
    }

    pub fn is_installed(&self, kind: PromptKind, tag: &str) -> bool {
        self.point(kind).contains(tag)
    }

    /// Number of layers installed for `kind`
    pub fn layer_count(&self, kind: PromptKind) -> usize {
        self.point(kind).layers.len()
    }

    /// Effective (outermost) handler for `kind`
    pub fn handler(&self, kind: PromptKind) -> Arc<dyn PromptHandler> {
        self.point(kind).head.clone()
    }

    /// Run the chain for `kind` against `conn`
    pub fn dispatch(&self, kind: PromptKind, conn: &mut dyn Connection) -> PromptOutcome {
        let path = connection_path(conn).to_string();
        self.handler(kind).handle(conn, &path)
    }
}
