//! External credential helper backend
//!
//! Speaks the `git credential`-style line protocol: the query is written to
//! the helper's stdin as `key=value` lines followed by a blank line, and the
//! helper answers with `key=value` lines on stdout. The helper only runs
//! when the secret is forced, so a path that never reaches a password
//! prompt never touches it.

use super::{CredentialRecord, CredentialSource, CredentialSpec};
use crate::{CoreError, Result, Secret};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};
use zeroize::Zeroizing;

/// Runs `<program> <args...> get` to obtain a secret
#[derive(Debug, Clone)]
pub struct HelperSource {
    program: String,
    args: Vec<String>,
}

/// Parsed helper response
#[derive(Debug, Default, PartialEq)]
struct HelperResponse {
    fields: BTreeMap<String, String>,
    secret: Option<Zeroizing<String>>,
}

impl HelperSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a shell-style command line such as `pass-helper --store "work vault"`
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = shell_words::split(command)
            .map_err(|e| CoreError::CredentialHelper(format!("{}: {}", command, e)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| CoreError::CredentialHelper("empty helper command".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, spec: &CredentialSpec) -> Result<HelperResponse> {
        let mut input = String::new();
        for (key, value) in spec.iter() {
            input.push_str(&format!("{}={}\n", key, value));
        }
        input.push('\n');

        tracing::debug!("Calling credential helper {} get", self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CoreError::CredentialHelper(format!("{}: {}", self.program, e)))?;

        // A helper that exits without reading its input is judged by its exit status
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                tracing::debug!("Could not write query to {}: {}", self.program, e);
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(CoreError::CredentialHelper(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map(Zeroizing::new)
            .map_err(|_| {
                CoreError::CredentialHelper(format!("{} produced non-UTF-8 output", self.program))
            })?;
        Ok(parse_helper_output(&stdout))
    }
}

impl CredentialSource for HelperSource {
    fn search(&self, spec: &CredentialSpec) -> Result<Vec<CredentialRecord>> {
        let helper = self.clone();
        let query = spec.clone();
        let secret = Secret::Deferred(Box::new(move || {
            let response = helper.run(&query)?;
            response.secret.ok_or_else(|| {
                CoreError::CredentialHelper(format!("{} returned no password", helper.program))
            })
        }));

        Ok(vec![CredentialRecord {
            fields: spec.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            secret: Some(secret),
        }])
    }
}

/// Parse helper `key=value` output. `password` and `secret` both name the secret.
fn parse_helper_output(output: &str) -> HelperResponse {
    let mut response = HelperResponse::default();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "password" | "secret" => {
                    response.secret = Some(Zeroizing::new(value.to_string()));
                }
                _ => {
                    response.fields.insert(key.to_string(), value.to_string());
                }
            }
        }
    }
    response
}
