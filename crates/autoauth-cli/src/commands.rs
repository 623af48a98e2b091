//! CLI command implementations

use crate::askpass::{self, ASKPASS_ENV, PATH_ENV};
use anyhow::{bail, Context, Result};
use autoauth_config::{GlobalConfig, CONFIG_ENV};
use autoauth_core::{CredentialSpec, PatternCredentialTable, PromptOutcome, TableEntry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<GlobalConfig> {
    let config = match path {
        Some(path) => GlobalConfig::load_from(path)?,
        None => GlobalConfig::load()?,
    };
    Ok(config)
}

fn resolve_config_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(GlobalConfig::config_path()?),
    }
}

fn save_config(path: Option<&Path>, config: &GlobalConfig) -> Result<()> {
    match path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    Ok(())
}

/// Answer a single askpass prompt on stdout. Returns the process exit code.
pub fn askpass(config_file: Option<&Path>, prompt: &str, path: Option<String>) -> Result<i32> {
    // A broken config must not break an otherwise working interactive login
    let config = load_config(config_file).unwrap_or_else(|e| {
        tracing::warn!("Using default config: {}", e);
        GlobalConfig::default()
    });

    let path = askpass::resolve_path(path, prompt);
    let interactive = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let stdout = std::io::stdout();

    match askpass::answer_prompt(&config, prompt, path, interactive, stdout.lock()) {
        PromptOutcome::Answered => Ok(0),
        PromptOutcome::Unanswered => Ok(1),
    }
}

/// Show which table entry a path resolves to. Never prints secrets.
pub fn lookup(config_file: Option<&Path>, path: &str, json: bool) -> Result<i32> {
    let config = load_config(config_file)?;
    let table = PatternCredentialTable::from_config(&config)?;

    let Some(entry) = table.find(path) else {
        eprintln!("No pattern matches {:?}", path);
        return Ok(1);
    };

    if json {
        let value = serde_json::json!({
            "pattern": entry.pattern(),
            "spec": entry.spec(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("pattern: {}", entry.pattern());
        for (key, value) in entry.spec().iter() {
            println!("  {} = {}", key, value);
        }
    }
    Ok(0)
}

/// Run a command with this binary installed as its askpass program
pub fn exec(config_file: Option<&Path>, path: Option<String>, cmd: Vec<String>) -> Result<i32> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("No command specified");
    };

    let exe = std::env::current_exe().context("Failed to locate the autoauth binary")?;
    // Host-key prompts only name the host, so every prompt of an ssh
    // connection is matched against its destination
    let path = path.or_else(|| askpass::destination_from_command(&cmd));

    let mut command = Command::new(program);
    command
        .args(args)
        .env(ASKPASS_ENV, "1")
        .env("SSH_ASKPASS", &exe)
        .env("SSH_ASKPASS_REQUIRE", "force")
        .env("GIT_ASKPASS", &exe);
    if let Some(path) = path {
        command.env(PATH_ENV, path);
    }
    if let Some(file) = config_file {
        // The child may run from another directory
        let file = if file.is_absolute() {
            file.to_path_buf()
        } else {
            std::env::current_dir()?.join(file)
        };
        command.env(CONFIG_ENV, file);
    }

    tracing::debug!("Running {} with autoauth askpass", program);
    let status = command
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    Ok(status.code().unwrap_or(1))
}

/// Show the effective configuration, or open the file in `$EDITOR`
pub fn config(config_file: Option<&Path>, edit: bool) -> Result<()> {
    let path = resolve_config_path(config_file)?;
    if edit {
        return edit_config(&path);
    }

    let config = GlobalConfig::load_from(&path)?;
    if path.exists() {
        println!("# Config file: {}", path.display());
    } else {
        println!("# Config file: {} (not created yet, showing defaults)", path.display());
    }
    println!("# {}", summary(&config));
    println!();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn edit_config(path: &Path) -> Result<()> {
    if !path.exists() {
        GlobalConfig::default().save_to(path)?;
        println!("Created default config at {}", path.display());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Command::new(&editor)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to open editor: {}", editor))?;
    if !status.success() {
        bail!("{} exited with {}", editor, status);
    }

    // Catch mistakes now rather than at the next login prompt
    let config = GlobalConfig::load_from(path)?;
    println!("{}", summary(&config));
    Ok(())
}

/// One-line description of what the config will do
fn summary(config: &GlobalConfig) -> String {
    let patterns = match PatternCredentialTable::from_config(config) {
        Ok(table) => format!("{} pattern(s)", table.len()),
        Err(e) => format!("{} pattern(s), not usable: {}", config.patterns.len(), e),
    };
    let helper = match &config.credentials.helper {
        Some(helper) => format!(", helper {:?}", helper),
        None => String::new(),
    };
    format!(
        "{}, {} authinfo file(s){}",
        patterns,
        config.credentials.authinfo_files.len(),
        helper
    )
}

/// Print the pattern table in match order
pub fn pattern_list(config_file: Option<&Path>) -> Result<()> {
    let config = load_config(config_file)?;
    if config.patterns.is_empty() {
        println!("No patterns configured");
        return Ok(());
    }
    for (index, entry) in config.patterns.iter().enumerate() {
        let fields: Vec<String> = entry
            .spec
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        println!("{:>3}  {}  {}", index, entry.pattern, fields.join(" "));
    }
    Ok(())
}

/// Add a pattern, validating the regex before the file is written
pub fn pattern_add(
    config_file: Option<&Path>,
    pattern: &str,
    fields: &[String],
    at: Option<usize>,
) -> Result<()> {
    let spec = parse_fields(fields)?;
    TableEntry::new(pattern, CredentialSpec::from(spec.clone()))?;

    let mut config = load_config(config_file)?;
    if config.patterns.iter().any(|e| e.pattern == pattern) {
        bail!("Pattern {:?} already exists", pattern);
    }
    config.add_pattern(pattern, spec);
    if let Some(index) = at {
        config.move_pattern(pattern, index)?;
    }
    save_config(config_file, &config)?;
    println!("Added pattern {:?}", pattern);
    Ok(())
}

pub fn pattern_remove(config_file: Option<&Path>, pattern: &str) -> Result<()> {
    let mut config = load_config(config_file)?;
    config.remove_pattern(pattern)?;
    save_config(config_file, &config)?;
    println!("Removed pattern {:?}", pattern);
    Ok(())
}

pub fn pattern_move(config_file: Option<&Path>, pattern: &str, index: usize) -> Result<()> {
    let mut config = load_config(config_file)?;
    config.move_pattern(pattern, index)?;
    save_config(config_file, &config)?;
    println!("Moved pattern {:?}", pattern);
    Ok(())
}

/// Parse `key=value` arguments into a credential query
fn parse_fields(fields: &[String]) -> Result<BTreeMap<String, String>> {
    fields
        .iter()
        .map(|field| match field.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Expected key=value, got {:?}", field),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields(&strings(&["host=Funny-Machines", "note=a=b"])).unwrap();
        assert_eq!(fields["host"], "Funny-Machines");
        assert_eq!(fields["note"], "a=b");
        assert!(parse_fields(&strings(&["host"])).is_err());
        assert!(parse_fields(&strings(&["=x"])).is_err());
    }

    #[test]
    fn test_pattern_add_remove_move() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("config.toml");
        let file = Some(file.as_path());

        pattern_add(file, "general", &strings(&["host=a"]), None).unwrap();
        pattern_add(file, r"root@10\.0\.", &strings(&["host=b", "user=root"]), Some(0)).unwrap();
        let config = load_config(file).unwrap();
        assert_eq!(config.patterns[0].pattern, r"root@10\.0\.");
        assert_eq!(config.patterns[0].spec["user"], "root");

        pattern_move(file, "general", 0).unwrap();
        assert_eq!(load_config(file).unwrap().patterns[0].pattern, "general");

        pattern_remove(file, "general").unwrap();
        assert_eq!(load_config(file).unwrap().patterns.len(), 1);
        assert!(pattern_remove(file, "general").is_err());
    }

    #[test]
    fn test_pattern_add_rejects_bad_input() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("config.toml");
        let file = Some(file.as_path());

        assert!(pattern_add(file, "root@(10", &[], None).is_err());
        assert!(!tmp.path().join("config.toml").exists());

        pattern_add(file, "host-b", &[], None).unwrap();
        assert!(pattern_add(file, "host-b", &[], None).is_err());
    }

    #[test]
    fn test_summary_reports_unusable_patterns() {
        let mut config = GlobalConfig::default();
        config.add_pattern("(", BTreeMap::new());
        assert!(summary(&config).contains("not usable"));

        config.patterns.clear();
        assert!(summary(&config).starts_with("0 pattern(s), 2 authinfo file(s)"));
    }
}
