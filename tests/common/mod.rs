//! Fake mbsync/notmuch installations for driving the full pipeline.

use std::fs;
use std::path::{Path, PathBuf};

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
    pub backup_marker: PathBuf,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn verification_dir(&self) -> PathBuf {
        self.root().join("state/verification")
    }
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let mut file = fs::File::create(path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.sync_all().unwrap();
    drop(file);
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Fake tools whose notmuch reports `count` messages. With a zero count the
/// searches return no threads.
#[cfg(unix)]
pub fn fixture(count: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();

    let mbsync = bin.join("mbsync");
    write_script(
        &mbsync,
        "#!/bin/sh\n[ \"$1\" = \"-c\" ] && [ -f \"$2\" ] || exit 9\necho \"synced\"\n",
    );

    let (oldest, newest) = if count == 0 {
        ("[]".to_string(), "[]".to_string())
    } else {
        (
            r#"[{"thread":"1","timestamp":1577836800,"date_relative":"2020-01-01"}]"#.to_string(),
            r#"[{"thread":"2","timestamp":1700000000,"date_relative":"Nov 14"}]"#.to_string(),
        )
    };
    let notmuch = bin.join("notmuch");
    write_script(
        &notmuch,
        &format!(
            "#!/bin/sh\n\
             [ -f \"$NOTMUCH_CONFIG\" ] || exit 9\n\
             case \"$1\" in\n\
             new) mkdir -p '{root}/mail/.notmuch'; echo 'No new mail.' ;;\n\
             count) echo {count} ;;\n\
             search)\n\
             case \"$3\" in\n\
             --sort=oldest-first) echo '{oldest}' ;;\n\
             *) echo '{newest}' ;;\n\
             esac ;;\n\
             *) exit 2 ;;\n\
             esac\n",
            root = root.display(),
        ),
    );

    let backup_marker = root.join("backup-ran");
    let config_path = root.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[account.primary]
email = "user@example.com"
imap_host = "imap.example.com"
imap_user = "user@example.com"
folders = ["INBOX", "[Gmail]/All Mail"]

[paths]
maildir_root = "{root}/mail"
state_dir = "{root}/state"
password_file = "{root}/password"

[tools]
mbsync = "{mbsync}"
notmuch = "{notmuch}"

[backup]
command = "touch '{marker}'"

[orchestration]
backup_after_verify = true
timeout_seconds = 30
"#,
            root = root.display(),
            mbsync = mbsync.display(),
            notmuch = notmuch.display(),
            marker = backup_marker.display(),
        ),
    )
    .unwrap();

    Fixture {
        dir,
        config_path,
        backup_marker,
    }
}

pub fn reports(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
