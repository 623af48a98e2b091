//! netrc / authinfo file backend
//!
//! Understands the usual `machine HOST login USER port PORT password SECRET`
//! layout, a `default` entry, double-quoted values, and `#` comment lines.
//! Unknown `key value` pairs are kept as extension fields and can be
//! queried like any other key.

use super::{CredentialRecord, CredentialSource, CredentialSpec};
use crate::{Result, Secret};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Reads credentials from one or more authinfo/netrc files
#[derive(Debug, Clone)]
pub struct AuthinfoSource {
    files: Vec<PathBuf>,
}

/// A parsed entry. `is_default` marks the catch-all `default` entry.
#[derive(Debug, Clone, Default, PartialEq)]
struct AuthinfoEntry {
    is_default: bool,
    fields: BTreeMap<String, String>,
}

impl AuthinfoSource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Entries of one file. A missing or unreadable file contributes nothing,
    /// so the remaining files are still consulted.
    fn read_entries(path: &Path) -> Vec<AuthinfoEntry> {
        if !path.exists() {
            tracing::debug!("Authinfo file {:?} not found, skipping", path);
            return Vec::new();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => parse_authinfo(&Zeroizing::new(content)),
            Err(e) => {
                tracing::warn!("Skipping unreadable authinfo file {:?}: {}", path, e);
                Vec::new()
            }
        }
    }
}

impl CredentialSource for AuthinfoSource {
    fn search(&self, spec: &CredentialSpec) -> Result<Vec<CredentialRecord>> {
        let mut records = Vec::new();
        let mut fallback = Vec::new();
        for path in &self.files {
            for entry in Self::read_entries(path) {
                if !entry.matches(spec) {
                    continue;
                }
                if entry.is_default {
                    fallback.push(entry.into_record());
                } else {
                    records.push(entry.into_record());
                }
            }
        }
        // `default` entries only ever come after every specific match
        records.append(&mut fallback);
        Ok(records)
    }
}

impl AuthinfoEntry {
    fn matches(&self, spec: &CredentialSpec) -> bool {
        spec.iter().all(|(key, wanted)| {
            let key = canonical_key(key);
            if self.is_default && key == "host" {
                return true;
            }
            self.fields.get(key).map(String::as_str) == Some(wanted)
        })
    }

    fn into_record(mut self) -> CredentialRecord {
        let secret = self.fields.remove("secret").map(Secret::from);
        CredentialRecord {
            fields: self.fields,
            secret,
        }
    }
}

/// Map the various spellings used in authinfo files and queries onto one key
fn canonical_key(key: &str) -> &str {
    match key {
        "machine" | "host" => "host",
        "login" | "user" | "account" => "user",
        "port" | "protocol" => "port",
        "password" | "secret" => "secret",
        other => other,
    }
}

fn parse_authinfo(content: &str) -> Vec<AuthinfoEntry> {
    let tokens: Vec<String> = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(tokenize_line)
        .collect();

    let mut entries = Vec::new();
    let mut current: Option<AuthinfoEntry> = None;
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        match token.as_str() {
            "default" => {
                entries.extend(current.take());
                current = Some(AuthinfoEntry {
                    is_default: true,
                    fields: BTreeMap::new(),
                });
            }
            "machine" | "host" => {
                entries.extend(current.take());
                let mut entry = AuthinfoEntry::default();
                if let Some(host) = iter.next() {
                    entry.fields.insert("host".to_string(), host);
                }
                current = Some(entry);
            }
            key => {
                let Some(value) = iter.next() else { break };
                match current.as_mut() {
                    Some(entry) => {
                        entry.fields.insert(canonical_key(key).to_string(), value);
                    }
                    None => tracing::debug!("Ignoring authinfo token {:?} outside an entry", key),
                }
            }
        }
    }
    entries.extend(current);
    entries
}

/// Split a line on whitespace, honouring double quotes and `\` escapes inside them
fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => token.extend(chars.next()),
                    _ => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# work machines
machine Funny-Machines login root port ssh password "$r00tP#sWD!"
machine Funny-Machines login guest port ssh password guestpw
machine build.example.org
    login ci
    password "with \"quotes\" and spaces"
    team infra
default login anonymous password anon
"#;

    fn secrets(records: Vec<CredentialRecord>) -> Vec<String> {
        records
            .into_iter()
            .filter_map(|r| r.secret)
            .map(|s| s.force().unwrap().as_str().to_string())
            .collect()
    }

    fn source_with(content: &str) -> (tempfile::TempDir, AuthinfoSource) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("authinfo");
        std::fs::write(&path, content).unwrap();
        let source = AuthinfoSource::new(vec![path]);
        (tmp, source)
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize_line(r#"machine h password "a b\"c""#),
            vec!["machine", "h", "password", "a b\"c"]
        );
    }

    #[test]
    fn test_parse_entries() {
        let entries = parse_authinfo(SAMPLE);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].fields["host"], "Funny-Machines");
        assert_eq!(entries[0].fields["user"], "root");
        assert_eq!(entries[0].fields["secret"], "$r00tP#sWD!");
        assert_eq!(entries[2].fields["team"], "infra");
        assert_eq!(entries[2].fields["secret"], "with \"quotes\" and spaces");
        assert!(entries[3].is_default);
    }

    #[test]
    fn test_search_exact_spec() {
        let (_tmp, source) = source_with(SAMPLE);
        let spec = CredentialSpec::new()
            .with("host", "Funny-Machines")
            .with("user", "root")
            .with("port", "ssh");
        let records = source.search(&spec).unwrap();
        assert_eq!(secrets(records), ["$r00tP#sWD!"]);
    }

    #[test]
    fn test_search_keeps_file_order() {
        let (_tmp, source) = source_with(SAMPLE);
        let spec = CredentialSpec::new().with("machine", "Funny-Machines");
        let records = source.search(&spec).unwrap();
        assert_eq!(secrets(records), ["$r00tP#sWD!", "guestpw", "anon"]);
    }

    #[test]
    fn test_extension_keys_are_queryable() {
        let (_tmp, source) = source_with(SAMPLE);
        let spec = CredentialSpec::new().with("team", "infra");
        let records = source.search(&spec).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["user"], "ci");
        assert!(!records[0].fields.contains_key("secret"));
    }

    #[test]
    fn test_default_entry_matches_any_host() {
        let (_tmp, source) = source_with(SAMPLE);
        let spec = CredentialSpec::new()
            .with("host", "unknown.example")
            .with("login", "anonymous");
        assert_eq!(secrets(source.search(&spec).unwrap()), ["anon"]);
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let source = AuthinfoSource::new(vec![PathBuf::from("/nonexistent/authinfo")]);
        assert!(source.search(&CredentialSpec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_file_does_not_hide_later_files() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = tmp.path().join("authinfo.d");
        std::fs::create_dir(&directory).unwrap();
        let binary = tmp.path().join("authinfo.bin");
        std::fs::write(&binary, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let netrc = tmp.path().join("netrc");
        std::fs::write(&netrc, "machine h login bob password pw\n").unwrap();

        let source = AuthinfoSource::new(vec![directory, binary, netrc]);
        let records = source.search(&CredentialSpec::new().with("host", "h")).unwrap();
        assert_eq!(secrets(records), ["pw"]);
    }

    #[test]
    fn test_entry_without_password_has_no_secret() {
        let (_tmp, source) = source_with("machine nopw login bob\n");
        let records = source.search(&CredentialSpec::new().with("host", "nopw")).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].secret.is_none());
    }
}
