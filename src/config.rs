use crate::model::{CatalogEntry, CommandCatalog};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const SIGNING_SECRET_VAR: &str = "SLACK_SIGNING_SECRET";
pub const BOT_TOKEN_VAR: &str = "SLACK_BOT_TOKEN";
pub const VERIFICATION_TOKEN_VAR: &str = "VERIFICATION_TOKEN";

#[derive(Clone)]
pub struct Secrets {
    pub signing_secret: String,
    pub bot_token: String,
    pub verification_token: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .with_context(|| format!("required environment variable {name} is not set"))
        };

        Ok(Self {
            signing_secret: required(SIGNING_SECRET_VAR)?,
            bot_token: required(BOT_TOKEN_VAR)?,
            verification_token: required(VERIFICATION_TOKEN_VAR)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub source: Option<String>,
    pub catalog: CommandCatalog,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct KubechatConfigFile {
    #[serde(default)]
    commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommandSpec {
    #[serde(alias = "command")]
    verb: String,
    #[serde(default, alias = "sub_commands")]
    resources: Vec<String>,
    #[serde(default)]
    per_instance: bool,
}

pub fn load_catalog() -> Result<CatalogSnapshot> {
    let Some(path) = discover_config_path() else {
        return Ok(CatalogSnapshot {
            source: None,
            catalog: CommandCatalog::default(),
        });
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read catalog config {}", path.display()))?;
    let catalog = parse_catalog(&raw)
        .with_context(|| format!("failed to parse catalog config {}", path.display()))?;

    Ok(CatalogSnapshot {
        source: Some(path.display().to_string()),
        catalog,
    })
}

pub fn parse_catalog(raw: &str) -> Result<CommandCatalog> {
    let parsed: KubechatConfigFile = serde_yaml::from_str(raw)?;
    if parsed.commands.is_empty() {
        anyhow::bail!("catalog config defines no commands");
    }

    let mut entries = Vec::with_capacity(parsed.commands.len());
    for spec in parsed.commands {
        ensure_token(&spec.verb)?;
        for resource in &spec.resources {
            ensure_token(resource)?;
        }
        if entries
            .iter()
            .any(|entry: &CatalogEntry| entry.verb == spec.verb)
        {
            anyhow::bail!("verb '{}' is defined more than once", spec.verb);
        }
        entries.push(CatalogEntry {
            verb: spec.verb,
            resources: spec.resources,
            per_instance: spec.per_instance,
        });
    }

    Ok(CommandCatalog::new(entries))
}

/// Catalog values end up on a command line, so only plain CLI tokens are allowed.
fn ensure_token(value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        anyhow::bail!("'{value}' is not a valid command token");
    }
    Ok(())
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBECHAT_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("kubechat.yaml"), PathBuf::from("kubechat.yml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(&home).join(".config/kubechat/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{Secrets, parse_catalog};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| values.get(name).cloned()
    }

    #[test]
    fn secrets_require_all_three_variables() {
        let secrets = Secrets::from_lookup(lookup(&[
            ("SLACK_SIGNING_SECRET", "sign"),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("VERIFICATION_TOKEN", "verify"),
        ]))
        .unwrap();
        assert_eq!(secrets.bot_token, "xoxb-1");

        let error = Secrets::from_lookup(lookup(&[
            ("SLACK_SIGNING_SECRET", "sign"),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
        ]))
        .err()
        .unwrap();
        assert!(error.to_string().contains("VERIFICATION_TOKEN"));
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let result = Secrets::from_lookup(lookup(&[
            ("SLACK_SIGNING_SECRET", "  "),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("VERIFICATION_TOKEN", "verify"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn catalog_file_overrides_verbs() {
        let catalog = parse_catalog(
            r#"
commands:
  - verb: get
    resources: [pods, deployments]
  - verb: logs
    resources: [pods]
    per_instance: true
"#,
        )
        .unwrap();

        assert_eq!(catalog.verbs().collect::<Vec<_>>(), vec!["get", "logs"]);
        assert!(catalog.allows("get", "deployments"));
        assert!(catalog.drills_down("logs", "pods"));
        assert!(!catalog.is_per_instance("get"));
    }

    #[test]
    fn catalog_rejects_shell_metacharacters() {
        let error = parse_catalog(
            r#"
commands:
  - verb: get
    resources: ["pods;reboot"]
"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("not a valid command token"));
    }

    #[test]
    fn catalog_rejects_duplicate_verbs_and_empty_files() {
        assert!(parse_catalog("commands: []").is_err());
        assert!(
            parse_catalog(
                r#"
commands:
  - verb: get
  - verb: get
"#
            )
            .is_err()
        );
    }
}
