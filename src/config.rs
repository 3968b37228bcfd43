use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::generate::channel_name;

/// Password file read by mbsync at sync time (a mounted secret by default)
pub const DEFAULT_PASSWORD_FILE: &str = "/run/secrets/imap_password";

const DEFAULT_TLS_TYPE: &str = "IMAPS";
const DEFAULT_FOLDER: &str = "INBOX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Config path is not a file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("At least one [account.<name>] section is required")]
    NoAccounts,
    #[error("[{0}] section is required")]
    MissingSection(&'static str),
    #[error("Missing required key '{key}' in [{section}]")]
    MissingKey { section: String, key: &'static str },
    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

/// One configured mailbox identity
#[derive(Debug, Clone, PartialEq)]
pub struct AccountConfig {
    pub name: String,
    pub email: String,
    pub imap_host: String,
    pub imap_user: String,
    /// mbsync TLSType (IMAPS or STARTTLS)
    pub tls_type: String,
    /// Remote folders to archive, in sync order
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub maildir_root: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub verification_dir: PathBuf,
    pub generated_config_dir: PathBuf,
    pub password_file: PathBuf,
}

/// Programs invoked for each pipeline step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub mbsync: String,
    pub notmuch: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// "command", or the name of a backup tool expected on PATH
    pub mode: String,
    /// Shell command line; empty means backup is a no-op
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub backup_after_verify: bool,
    /// Upper bound for each sync/index/backup subprocess; unset means no limit
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Accounts keyed by name, in file order
    pub accounts: IndexMap<String, AccountConfig>,
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub backup: BackupConfig,
    pub orchestration: OrchestrationConfig,
}

impl AccountConfig {
    pub fn new(name: &str, email: &str, imap_host: &str, imap_user: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            imap_host: imap_host.to_string(),
            imap_user: imap_user.to_string(),
            tls_type: DEFAULT_TLS_TYPE.to_string(),
            folders: vec![DEFAULT_FOLDER.to_string()],
        }
    }
}

impl PathsConfig {
    /// Layout with every state location derived from `state_dir`
    pub fn with_state_dir(maildir_root: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            logs_dir: state_dir.join("logs"),
            verification_dir: state_dir.join("verification"),
            generated_config_dir: state_dir.join("generated"),
            password_file: PathBuf::from(DEFAULT_PASSWORD_FILE),
            maildir_root,
            state_dir,
        }
    }
}

impl OrchestrationConfig {
    pub fn step_timeout(&self) -> Option<std::time::Duration> {
        self.timeout_seconds.map(std::time::Duration::from_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mbsync: "mbsync".to_string(),
            notmuch: "notmuch".to_string(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            mode: "command".to_string(),
            command: String::new(),
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            backup_after_verify: true,
            timeout_seconds: None,
        }
    }
}

// On-disk shape. Required keys are optional here so that a missing one is
// reported with its section instead of a generic deserialization error.

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    account: IndexMap<String, RawAccount>,
    paths: Option<RawPaths>,
    #[serde(default)]
    tools: ToolsConfig,
    #[serde(default)]
    backup: BackupConfig,
    #[serde(default)]
    orchestration: OrchestrationConfig,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    email: Option<String>,
    imap_host: Option<String>,
    imap_user: Option<String>,
    tls_type: Option<String>,
    folders: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPaths {
    maildir_root: Option<String>,
    state_dir: Option<String>,
    logs_dir: Option<String>,
    verification_dir: Option<String>,
    generated_config_dir: Option<String>,
    password_file: Option<String>,
}

/// Default config location (~/.config/email-archiver/config.toml on Linux)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("email-archiver/config.toml"))
        .unwrap_or_else(|| PathBuf::from("~/.config/email-archiver/config.toml"))
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .map(|p| p.join("email-archiver"))
        .unwrap_or_else(|| PathBuf::from(shellexpand::tilde("~/.local/state/email-archiver").into_owned()))
}

/// Expand `~` and environment variables, requiring an absolute result
pub fn expand_path(field: &str, raw: &str) -> Result<PathBuf, ConfigError> {
    let expanded = expand(field, raw)?;
    if expanded.contains('\0') {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            message: "path must not contain NUL bytes".to_string(),
        });
    }
    let path = PathBuf::from(expanded);
    if !path.is_absolute() {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            message: format!("path must be absolute after expansion: {}", path.display()),
        });
    }
    Ok(path)
}

fn expand(field: &str, raw: &str) -> Result<String, ConfigError> {
    shellexpand::full(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ConfigError::Invalid {
            field: field.to_string(),
            message: e.to_string(),
        })
}

impl Config {
    /// Load and validate the config file, falling back to the default location
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()),
            None => default_config_path(),
        };

        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        if !config_path.is_file() {
            return Err(ConfigError::NotAFile(config_path));
        }

        let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;

        let config = Self::parse(&content, &config_path)?;
        tracing::debug!(
            path = %config_path.display(),
            accounts = config.accounts.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Parse and validate config text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        if raw.account.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        let mut accounts = IndexMap::new();
        for (name, data) in raw.account {
            let account = validate_account(&name, data)?;
            accounts.insert(name, account);
        }
        check_channel_names(&accounts)?;

        let paths = validate_paths(raw.paths.ok_or(ConfigError::MissingSection("paths"))?)?;

        let tools = ToolsConfig {
            mbsync: expand("tools.mbsync", &raw.tools.mbsync)?,
            notmuch: expand("tools.notmuch", &raw.tools.notmuch)?,
        };

        Ok(Self {
            accounts,
            paths,
            tools,
            backup: raw.backup,
            orchestration: raw.orchestration,
        })
    }

    /// The account whose identity is used for the index (first in file order)
    pub fn primary_account(&self) -> Option<&AccountConfig> {
        self.accounts.values().next()
    }

    pub fn get_account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.get(name)
    }

    pub fn account_names(&self) -> Vec<&str> {
        self.accounts.keys().map(|s| s.as_str()).collect()
    }
}

fn required(value: Option<String>, section: &str, key: &'static str) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey {
        section: section.to_string(),
        key,
    })
}

/// Account names become mbsync identifiers and directory names
fn valid_account_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_account(name: &str, raw: RawAccount) -> Result<AccountConfig, ConfigError> {
    let section = format!("account.{}", name);
    if !valid_account_name(name) {
        return Err(ConfigError::Invalid {
            field: section,
            message: "account names may only contain ASCII letters, digits, '-' and '_'".to_string(),
        });
    }
    let email = required(raw.email, &section, "email")?;
    let imap_host = required(raw.imap_host, &section, "imap_host")?;
    let imap_user = required(raw.imap_user, &section, "imap_user")?;

    let folders = raw
        .folders
        .unwrap_or_else(|| vec![DEFAULT_FOLDER.to_string()]);
    if folders.is_empty() {
        return Err(ConfigError::Invalid {
            field: format!("{}.folders", section),
            message: "at least one folder is required".to_string(),
        });
    }

    Ok(AccountConfig {
        name: name.to_string(),
        email,
        imap_host,
        imap_user,
        tls_type: raw.tls_type.unwrap_or_else(|| DEFAULT_TLS_TYPE.to_string()),
        folders,
    })
}

/// Channel names are `<account>-<sanitized folder>` and share one mbsync
/// namespace, so they must be unique across all accounts.
fn check_channel_names(accounts: &IndexMap<String, AccountConfig>) -> Result<(), ConfigError> {
    let mut seen: HashMap<String, (&str, &str)> = HashMap::new();
    for account in accounts.values() {
        for folder in &account.folders {
            let channel = channel_name(&account.name, folder);
            if let Some((other_account, other_folder)) =
                seen.insert(channel.clone(), (account.name.as_str(), folder.as_str()))
            {
                return Err(ConfigError::Invalid {
                    field: format!("account.{}.folders", account.name),
                    message: format!(
                        "'{}' ({}) and '{}' ({}) map to the same channel name '{}'",
                        other_folder, other_account, folder, account.name, channel
                    ),
                });
            }
        }
    }
    Ok(())
}

fn validate_paths(raw: RawPaths) -> Result<PathsConfig, ConfigError> {
    let maildir_root = expand_path(
        "paths.maildir_root",
        &required(raw.maildir_root, "paths", "maildir_root")?,
    )?;
    let state_dir = match raw.state_dir {
        Some(s) => expand_path("paths.state_dir", &s)?,
        None => default_state_dir(),
    };

    let mut paths = PathsConfig::with_state_dir(maildir_root, state_dir);
    if let Some(s) = raw.logs_dir {
        paths.logs_dir = expand_path("paths.logs_dir", &s)?;
    }
    if let Some(s) = raw.verification_dir {
        paths.verification_dir = expand_path("paths.verification_dir", &s)?;
    }
    if let Some(s) = raw.generated_config_dir {
        paths.generated_config_dir = expand_path("paths.generated_config_dir", &s)?;
    }
    if let Some(s) = raw.password_file {
        paths.password_file = expand_path("paths.password_file", &s)?;
    }
    Ok(paths)
}
