//! Config files for mbsync and notmuch, derived from [`Config`].
//!
//! Rendering is deterministic: no timestamps or random identifiers end up in
//! the output, so regenerating with an unchanged config rewrites the same bytes.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{AccountConfig, Config};
use crate::notmuch::Notmuch;
use crate::runner::RunResult;

pub const MBSYNCRC_FILE: &str = "mbsyncrc";
pub const NOTMUCH_CONFIG_FILE: &str = "notmuch-config";
/// Environment variable notmuch reads its config path from
pub const NOTMUCH_CONFIG_ENV: &str = "NOTMUCH_CONFIG";

const HEADER: &str = "# Generated by email-archiver. Do not edit: this file is overwritten on every run.";

/// Files written by [`write_generated_configs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedConfigPaths {
    pub mbsyncrc: PathBuf,
    pub notmuch_config: PathBuf,
}

impl GeneratedConfigPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            mbsyncrc: dir.join(MBSYNCRC_FILE),
            notmuch_config: dir.join(NOTMUCH_CONFIG_FILE),
        }
    }
}

/// Make a folder name safe for use in mbsync identifiers.
/// `[` is dropped, every other character outside `[A-Za-z0-9-]` becomes `-`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|&c| c != '[')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

pub fn channel_name(account: &str, folder: &str) -> String {
    format!("{}-{}", account, sanitize_name(folder))
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Shell command mbsync runs to read the password. The path is shell-quoted;
/// config loading rejects paths containing NUL, the one thing that cannot be.
fn pass_cmd(password_file: &Path) -> String {
    let path = password_file.to_string_lossy();
    match shlex::try_quote(&path) {
        Ok(quoted_path) => format!("cat {}", quoted_path),
        Err(_) => format!("cat {}", path),
    }
}

fn render_account(out: &mut String, account: &AccountConfig, config: &Config) {
    let name = &account.name;
    let account_dir = config.paths.maildir_root.join(name);

    let _ = writeln!(out, "IMAPAccount {}", name);
    let _ = writeln!(out, "Host {}", account.imap_host);
    let _ = writeln!(out, "User {}", account.imap_user);
    let _ = writeln!(out, "PassCmd {}", quoted(&pass_cmd(&config.paths.password_file)));
    let _ = writeln!(out, "TLSType {}", account.tls_type);
    out.push('\n');

    let _ = writeln!(out, "IMAPStore {}-remote", name);
    let _ = writeln!(out, "Account {}", name);
    out.push('\n');

    let _ = writeln!(out, "MaildirStore {}-local", name);
    let _ = writeln!(out, "Path {}/", account_dir.display());
    let _ = writeln!(out, "Inbox {}", account_dir.join("INBOX").display());
    let _ = writeln!(out, "SubFolders Verbatim");
    out.push('\n');

    // The real folder name is the remote selector; only identifiers are sanitized
    for folder in &account.folders {
        let _ = writeln!(out, "Channel {}", channel_name(name, folder));
        let _ = writeln!(out, "Far :{}-remote:{}", name, quoted(folder));
        let _ = writeln!(out, "Near :{}-local:{}", name, quoted(folder));
        let _ = writeln!(out, "Create Near");
        let _ = writeln!(out, "Expunge None");
        let _ = writeln!(out, "SyncState *");
        let _ = writeln!(out, "Sync Pull");
        out.push('\n');
    }

    let _ = writeln!(out, "Group {}", name);
    for folder in &account.folders {
        let _ = writeln!(out, "Channel {}", channel_name(name, folder));
    }
}

/// Render the mbsync config: per account one IMAPAccount, one IMAPStore, one
/// MaildirStore, one Channel per folder and a Group named after the account.
pub fn render_mbsyncrc(config: &Config) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for account in config.accounts.values() {
        out.push('\n');
        render_account(&mut out, account, config);
    }
    out
}

/// Render the notmuch config, indexing the whole maildir root under the
/// identity of the primary (first) account.
pub fn render_notmuch_config(config: &Config) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push_str("\n\n");

    let _ = writeln!(out, "[database]");
    let _ = writeln!(out, "path={}", config.paths.maildir_root.display());
    out.push('\n');

    let _ = writeln!(out, "[user]");
    if let Some(primary) = config.primary_account() {
        let _ = writeln!(out, "name={}", primary.name);
        let _ = writeln!(out, "primary_email={}", primary.email);
    }
    let others: Vec<&str> = config
        .accounts
        .values()
        .skip(1)
        .map(|a| a.email.as_str())
        .collect();
    if !others.is_empty() {
        let _ = writeln!(out, "other_email={}", others.join(";"));
    }
    out.push('\n');

    let _ = writeln!(out, "[new]");
    let _ = writeln!(out, "tags=unread;inbox;");
    let _ = writeln!(
        out,
        "ignore=.mbsyncstate;.mbsyncstate.journal;.mbsyncstate.new;.mbsyncstate.lock;.uidvalidity"
    );
    out.push('\n');

    let _ = writeln!(out, "[search]");
    let _ = writeln!(out, "exclude_tags=deleted;spam;");
    out.push('\n');

    let _ = writeln!(out, "[maildir]");
    let _ = writeln!(out, "synchronize_flags=true");
    out
}

/// Write both generated configs into `generated_config_dir`, overwriting
/// previous versions.
pub fn write_generated_configs(config: &Config) -> io::Result<GeneratedConfigPaths> {
    let dir = &config.paths.generated_config_dir;
    fs::create_dir_all(dir)?;

    let paths = GeneratedConfigPaths::in_dir(dir);
    fs::write(&paths.mbsyncrc, render_mbsyncrc(config))?;
    fs::write(&paths.notmuch_config, render_notmuch_config(config))?;

    tracing::debug!(
        mbsyncrc = %paths.mbsyncrc.display(),
        notmuch_config = %paths.notmuch_config.display(),
        "generated configs written"
    );
    Ok(paths)
}

pub fn notmuch_database_exists(config: &Config) -> bool {
    config.paths.maildir_root.join(".notmuch").is_dir()
}

/// Create the notmuch database if it does not exist yet, so that queries work
/// before anything has ever been indexed. Returns the `notmuch new` result
/// when initialization ran.
pub fn ensure_notmuch_init(config: &Config, notmuch_config: &Path) -> Option<RunResult> {
    if notmuch_database_exists(config) {
        return None;
    }

    if let Err(e) = fs::create_dir_all(&config.paths.maildir_root) {
        tracing::warn!(
            path = %config.paths.maildir_root.display(),
            error = %e,
            "could not create maildir root"
        );
    }

    println!("Initializing notmuch database...");
    let result = Notmuch::new(&config.tools.notmuch, notmuch_config)
        .new_mail(false, config.orchestration.step_timeout());
    if !result.ok() {
        tracing::warn!(summary = %result.summary(), stderr = %result.stderr, "notmuch init failed");
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AccountConfig, BackupConfig, OrchestrationConfig, PathsConfig, ToolsConfig,
    };
    use indexmap::IndexMap;

    fn config(root: &Path) -> Config {
        let mut primary = AccountConfig::new(
            "primary",
            "user@example.com",
            "imap.example.com",
            "user@example.com",
        );
        primary.folders = vec!["INBOX".to_string(), "Archive".to_string()];

        let mut accounts = IndexMap::new();
        accounts.insert("primary".to_string(), primary);
        Config {
            accounts,
            paths: PathsConfig::with_state_dir(root.join("mail"), root.join("state")),
            tools: ToolsConfig::default(),
            backup: BackupConfig::default(),
            orchestration: OrchestrationConfig::default(),
        }
    }

    fn add_gmail_account(config: &mut Config) {
        let mut gmail = AccountConfig::new(
            "gmail",
            "other@gmail.com",
            "imap.gmail.com",
            "other@gmail.com",
        );
        gmail.folders = vec![
            "INBOX".to_string(),
            "[Gmail]/All Mail".to_string(),
            "[Gmail]/Sent Mail".to_string(),
        ];
        config.accounts.insert("gmail".to_string(), gmail);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("INBOX"), "INBOX");
        assert_eq!(sanitize_name("[Gmail]/All Mail"), "Gmail--All-Mail");
        assert_eq!(sanitize_name("foo bar!baz"), "foo-bar-baz");
        assert_eq!(sanitize_name("INBOX.Sent_Items"), "INBOX-Sent-Items");
    }

    #[test]
    fn test_account_block() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("IMAPAccount primary\n"));
        assert!(rc.contains("Host imap.example.com\n"));
        assert!(rc.contains("User user@example.com\n"));
        assert!(rc.contains("PassCmd \"cat /run/secrets/imap_password\"\n"));
        assert!(rc.contains("TLSType IMAPS\n"));
    }

    #[test]
    fn test_password_file_is_referenced_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.paths.password_file = PathBuf::from("/etc/archiver/pass");
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("PassCmd \"cat /etc/archiver/pass\""));
        assert!(!rc.contains("/run/secrets"));
    }

    #[test]
    fn test_password_file_with_spaces_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.paths.password_file = PathBuf::from("/srv/my secrets/imap pass");
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("PassCmd \"cat '/srv/my secrets/imap pass'\"\n"), "{}", rc);

        cfg.paths.password_file = PathBuf::from("/srv/a\"b");
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("PassCmd \"cat '/srv/a\\\"b'\"\n"), "{}", rc);
    }

    #[test]
    fn test_stores() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("IMAPStore primary-remote\n"));
        assert!(rc.contains("MaildirStore primary-local\n"));
        let account_dir = cfg.paths.maildir_root.join("primary");
        assert!(rc.contains(&format!("Path {}/\n", account_dir.display())));
    }

    #[test]
    fn test_channels_per_folder() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("Channel primary-INBOX\n"));
        assert!(rc.contains("Channel primary-Archive\n"));
        assert!(rc.contains("Far :primary-remote:\"INBOX\"\n"));
        assert!(rc.contains("Far :primary-remote:\"Archive\"\n"));
        assert!(rc.contains("Group primary\n"));
    }

    #[test]
    fn test_block_counts_match_accounts_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        add_gmail_account(&mut cfg);
        let rc = render_mbsyncrc(&cfg);

        let count = |prefix: &str| rc.lines().filter(|l| l.starts_with(prefix)).count();
        let folders: usize = cfg.accounts.values().map(|a| a.folders.len()).sum();
        assert_eq!(count("IMAPAccount "), 2);
        assert_eq!(count("IMAPStore "), 2);
        assert_eq!(count("MaildirStore "), 2);
        assert_eq!(count("Group "), 2);
        // Channel lines appear once as a block header and once inside the group
        assert_eq!(count("Channel "), folders * 2);
        assert_eq!(count("Far :"), folders);
    }

    #[test]
    fn test_gmail_folders_keep_real_remote_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        add_gmail_account(&mut cfg);
        let rc = render_mbsyncrc(&cfg);
        assert!(rc.contains("Channel gmail-Gmail--All-Mail\n"));
        assert!(rc.contains("Far :gmail-remote:\"[Gmail]/All Mail\"\n"));
        assert!(rc.contains("Near :gmail-local:\"[Gmail]/All Mail\"\n"));
    }

    #[test]
    fn test_accounts_rendered_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        add_gmail_account(&mut cfg);
        let rc = render_mbsyncrc(&cfg);
        let primary = rc.find("IMAPAccount primary").unwrap();
        let gmail = rc.find("IMAPAccount gmail").unwrap();
        assert!(primary < gmail);
    }

    #[test]
    fn test_notmuch_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        add_gmail_account(&mut cfg);
        let nm = render_notmuch_config(&cfg);
        assert!(nm.contains(&format!("path={}\n", cfg.paths.maildir_root.display())));
        assert!(nm.contains("primary_email=user@example.com\n"));
        assert!(nm.contains("other_email=other@gmail.com\n"));
        for section in ["[database]", "[user]", "[new]", "[search]", "[maildir]"] {
            assert_eq!(nm.matches(section).count(), 1, "{}", section);
        }
    }

    #[test]
    fn test_write_generated_configs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let paths = write_generated_configs(&cfg).unwrap();
        assert!(paths.mbsyncrc.is_file());
        assert!(paths.notmuch_config.is_file());
        assert_eq!(paths.mbsyncrc.file_name().unwrap(), "mbsyncrc");
        assert_eq!(paths.notmuch_config.file_name().unwrap(), "notmuch-config");
        assert_eq!(
            paths.mbsyncrc.parent().unwrap(),
            cfg.paths.generated_config_dir
        );
        assert_eq!(
            fs::read_to_string(&paths.mbsyncrc).unwrap(),
            render_mbsyncrc(&cfg)
        );
    }

    #[test]
    fn test_write_generated_configs_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let first = write_generated_configs(&cfg).unwrap();
        let rc1 = fs::read(&first.mbsyncrc).unwrap();
        let nm1 = fs::read(&first.notmuch_config).unwrap();

        let second = write_generated_configs(&cfg).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second.mbsyncrc).unwrap(), rc1);
        assert_eq!(fs::read(&second.notmuch_config).unwrap(), nm1);
    }

    #[test]
    fn test_ensure_notmuch_init_skips_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::create_dir_all(cfg.paths.maildir_root.join(".notmuch")).unwrap();
        assert!(ensure_notmuch_init(&cfg, Path::new("/unused")).is_none());
    }
}
