//! SSH_ASKPASS / GIT_ASKPASS front end
//!
//! ssh and git run the askpass program with the prompt text as its argument
//! and read the answer from its stdout. Here that invocation becomes a
//! one-shot connection: the prompt is classified, the handler chain runs,
//! and an interactive dialog is the default handler when a terminal is
//! available. Prompts that are neither secret nor confirmation prompts
//! (git's `Username for ...:`) never reach the automatic handlers.

use autoauth_config::GlobalConfig;
use autoauth_core::{
    send_line, AutoAuthMode, Connection, PromptClassifier, PromptHandler, PromptOutcome,
    PromptRegistry, Unanswered, DEFAULT_CONFIRMATION_PROMPT, DEFAULT_SECRET_PROMPT,
};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Set by `autoauth exec` so the binary knows it was started as an askpass program
pub const ASKPASS_ENV: &str = "AUTOAUTH_ASKPASS";

/// Connection path handed down from `autoauth exec --path`
pub const PATH_ENV: &str = "AUTOAUTH_PATH";

/// Connection whose "input stream" is our stdout, read back by ssh/git
pub struct AskpassConnection<W: Write> {
    identity: Vec<String>,
    terminator: String,
    out: W,
}

impl<W: Write> AskpassConnection<W> {
    pub fn new(path: Option<String>, terminator: &str, out: W) -> Self {
        // No path means an empty identity, which reads as the empty path
        let identity = match path {
            Some(path) => vec!["askpass".to_string(), path],
            None => Vec::new(),
        };
        Self {
            identity,
            terminator: terminator.to_string(),
            out,
        }
    }
}

impl<W: Write> Connection for AskpassConnection<W> {
    fn identity(&self) -> &[String] {
        &self.identity
    }

    fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)?;
        self.out.flush()
    }

    fn line_terminator(&self) -> &str {
        &self.terminator
    }
}

/// Interactive password dialog on the controlling terminal
struct InteractiveSecret {
    prompt: String,
}

impl PromptHandler for InteractiveSecret {
    fn handle(&self, conn: &mut dyn Connection, _path: &str) -> PromptOutcome {
        let answer = Password::with_theme(&ColorfulTheme::default())
            .with_prompt(&self.prompt)
            .allow_empty_password(true)
            .interact();
        match answer {
            Ok(secret) => {
                let secret = Zeroizing::new(secret);
                write_answer(conn, &secret)
            }
            Err(e) => {
                tracing::warn!("Interactive prompt failed: {}", e);
                PromptOutcome::Unanswered
            }
        }
    }
}

/// Interactive yes/no dialog on the controlling terminal
struct InteractiveConfirm {
    prompt: String,
}

impl PromptHandler for InteractiveConfirm {
    fn handle(&self, conn: &mut dyn Connection, _path: &str) -> PromptOutcome {
        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(&self.prompt)
            .default(false)
            .interact();
        match answer {
            Ok(true) => write_answer(conn, "yes"),
            Ok(false) => write_answer(conn, "no"),
            Err(e) => {
                tracing::warn!("Interactive prompt failed: {}", e);
                PromptOutcome::Unanswered
            }
        }
    }
}

/// Free-text question (e.g. a username) asked on the controlling terminal
fn interactive_text(conn: &mut dyn Connection, prompt: &str) -> PromptOutcome {
    let answer = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text();
    match answer {
        Ok(text) => write_answer(conn, &text),
        Err(e) => {
            tracing::warn!("Interactive prompt failed: {}", e);
            PromptOutcome::Unanswered
        }
    }
}

fn write_answer(conn: &mut dyn Connection, answer: &str) -> PromptOutcome {
    match send_line(conn, answer) {
        Ok(()) => PromptOutcome::Answered,
        Err(e) => {
            tracing::warn!("Failed to write answer: {}", e);
            PromptOutcome::Unanswered
        }
    }
}

/// Best-effort connection path from the prompt text itself:
/// `user@host's password:`, `Password for 'https://user@host':`,
/// `Enter passphrase for key '/path':`, or the host of a host-key question.
/// Host-key questions never name the user, so `exec` passes the ssh
/// destination down in `$AUTOAUTH_PATH` to keep one path per connection.
pub fn path_from_prompt(prompt: &str) -> Option<String> {
    let candidates = [
        r"(\S+@[^\s']+)'s password",
        r"for '([^']+)'",
        r"host '([^' ]+)",
    ];
    candidates.iter().find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        re.captures(prompt)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

const SSH_PROGRAMS: [&str; 3] = ["ssh", "scp", "sftp"];

// Single-letter options of ssh/scp/sftp that consume the next argument
const VALUE_OPTIONS: &str = "BbcDEeFIiJLlmOoPpQRSWw";

/// The `[user@]host` an ssh, scp or sftp command line connects to.
///
/// `ssh -l user host` becomes `user@host`. Other programs yield `None`.
pub fn destination_from_command(cmd: &[String]) -> Option<String> {
    let (program, args) = cmd.split_first()?;
    let name = Path::new(program).file_name()?.to_str()?;
    if !SSH_PROGRAMS.contains(&name) {
        return None;
    }

    let mut login = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if let Some(flag) = arg.strip_prefix('-') {
            if flag.len() == 1 && VALUE_OPTIONS.contains(flag) {
                let value = args.next();
                if name == "ssh" && flag == "l" {
                    login = value.cloned();
                }
            }
            continue;
        }
        // scp operands without a colon are local files
        if name == "scp" && !arg.contains(':') {
            continue;
        }

        let target = arg.split_once("://").map_or(arg.as_str(), |(_, rest)| rest);
        let host = target.split([':', '/']).next().unwrap_or(target);
        if host.is_empty() {
            continue;
        }
        return Some(match login {
            Some(user) if !host.contains('@') => format!("{}@{}", user, host),
            _ => host.to_string(),
        });
    }
    None
}

/// Pick the connection path: explicit flag, then `$AUTOAUTH_PATH`, then the prompt
pub fn resolve_path(explicit: Option<String>, prompt: &str) -> Option<String> {
    explicit
        .or_else(|| std::env::var(PATH_ENV).ok().filter(|p| !p.is_empty()))
        .or_else(|| path_from_prompt(prompt))
}

/// Answer one askpass prompt, writing the answer to `out`.
///
/// Unrecognised prompts go straight to the interactive dialog, or stay
/// unanswered without a terminal; a secret is never offered for them.
/// Configuration problems only disable the automatic layer; the default
/// handlers still run.
pub fn answer_prompt<W: Write>(
    config: &GlobalConfig,
    prompt: &str,
    path: Option<String>,
    interactive: bool,
    out: W,
) -> PromptOutcome {
    let classifier = PromptClassifier::from_config(&config.prompts).or_else(|e| {
        tracing::warn!("Ignoring prompt overrides: {}", e);
        PromptClassifier::with_patterns(DEFAULT_SECRET_PROMPT, DEFAULT_CONFIRMATION_PROMPT)
    });
    let kind = classifier.ok().and_then(|c| c.classify(prompt));

    let display = prompt.trim_end().trim_end_matches(':').to_string();
    let mut conn = AskpassConnection::new(path, &config.defaults.line_terminator, out);

    let Some(kind) = kind else {
        tracing::debug!("Unrecognised prompt {:?}", prompt);
        return if interactive {
            interactive_text(&mut conn, &display)
        } else {
            PromptOutcome::Unanswered
        };
    };

    let mut registry = if interactive {
        PromptRegistry::new(
            Arc::new(InteractiveSecret {
                prompt: display.clone(),
            }),
            Arc::new(InteractiveConfirm { prompt: display }),
        )
    } else {
        PromptRegistry::new(Arc::new(Unanswered), Arc::new(Unanswered))
    };

    match AutoAuthMode::from_config(config) {
        Ok(mut mode) => mode.enable(&mut registry),
        Err(e) => tracing::warn!("Automatic authentication unavailable: {}", e),
    }

    registry.dispatch(kind, &mut conn)
}
