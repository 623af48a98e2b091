//! Test support utilities for autoauth-core
//!
//! Provides in-memory connections, credential sources and handlers so the
//! hooks can be exercised without a real sub-process or credential store.

use crate::{
    Connection, CoreError, CredentialRecord, CredentialSource, CredentialSpec, PromptHandler,
    PromptOutcome, Result,
};
use std::io;
use std::sync::{Arc, Mutex};

/// Connection that records everything written to it
#[derive(Debug, Default)]
pub struct MockConnection {
    identity: Vec<String>,
    terminator: String,
    written: Vec<u8>,
    writes: usize,
    attempts: usize,
    fail_writes: bool,
}

impl MockConnection {
    pub fn new(identity: &[&str]) -> Self {
        Self {
            identity: identity.iter().map(|s| s.to_string()).collect(),
            terminator: "\n".to_string(),
            ..Default::default()
        }
    }

    pub fn with_terminator(mut self, terminator: &str) -> Self {
        self.terminator = terminator.to_string();
        self
    }

    /// Make every write fail with `BrokenPipe`
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Everything written so far, as text
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    /// Number of successful `write_input` calls
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of `write_input` calls, failed ones included
    pub fn attempt_count(&self) -> usize {
        self.attempts
    }
}

impl Connection for MockConnection {
    fn identity(&self) -> &[String] {
        &self.identity
    }

    fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
        self.attempts += 1;
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        self.written.extend_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn line_terminator(&self) -> &str {
        &self.terminator
    }
}

type RecordFactory = Box<dyn Fn() -> Vec<CredentialRecord> + Send + Sync>;

/// Credential source returning canned records and remembering every query
pub struct MockSource {
    records: RecordFactory,
    fail: bool,
    queries: Mutex<Vec<CredentialSpec>>,
}

impl MockSource {
    /// Records are rebuilt on every search because secrets are consumed when forced
    pub fn with_records<F>(factory: F) -> Self
    where
        F: Fn() -> Vec<CredentialRecord> + Send + Sync + 'static,
    {
        Self {
            records: Box::new(factory),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self::with_records(move || vec![CredentialRecord::with_secret(secret.clone())])
    }

    /// Every search returns an error
    pub fn failing() -> Self {
        let mut source = Self::with_records(Vec::new);
        source.fail = true;
        source
    }

    pub fn queries(&self) -> Vec<CredentialSpec> {
        self.queries.lock().unwrap().clone()
    }

    pub fn search_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl CredentialSource for MockSource {
    fn search(&self, spec: &CredentialSpec) -> Result<Vec<CredentialRecord>> {
        self.queries.lock().unwrap().push(spec.clone());
        if self.fail {
            return Err(CoreError::CredentialHelper("mock source failure".to_string()));
        }
        Ok((self.records)())
    }
}

/// Stand-in for the transport's default handler; counts invocations
#[derive(Debug)]
pub struct RecordingHandler {
    outcome: PromptOutcome,
    paths: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new(outcome: PromptOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            paths: Mutex::new(Vec::new()),
        })
    }

    /// Reports `Answered` without writing (as an interactive prompt would)
    pub fn answering() -> Arc<Self> {
        Self::new(PromptOutcome::Answered)
    }

    pub fn unanswered() -> Arc<Self> {
        Self::new(PromptOutcome::Unanswered)
    }

    pub fn calls(&self) -> usize {
        self.paths.lock().unwrap().len()
    }

    /// Paths passed to each invocation, in order
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl PromptHandler for RecordingHandler {
    fn handle(&self, _conn: &mut dyn Connection, path: &str) -> PromptOutcome {
        self.paths.lock().unwrap().push(path.to_string());
        self.outcome
    }
}
