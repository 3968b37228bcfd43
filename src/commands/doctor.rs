use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub level: CheckLevel,
    pub message: String,
}

impl Check {
    fn new(level: CheckLevel, message: String) -> Self {
        Self { level, message }
    }

    fn render(&self) -> String {
        let tag = match self.level {
            CheckLevel::Ok => "OK",
            CheckLevel::Warn => "WARN",
            CheckLevel::Fail => "FAIL",
        };
        format!("  {:<4}  {}", tag, self.message)
    }
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Locate a program the way a shell would: as given when it contains a path
/// separator, otherwise by searching `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

pub fn check_binary(program: &str) -> Check {
    match find_program(program) {
        Some(path) => Check::new(
            CheckLevel::Ok,
            format!("{} found at {}", program, path.display()),
        ),
        None => Check::new(CheckLevel::Fail, format!("{} not found on PATH", program)),
    }
}

/// A directory passes if it exists, warns if it can still be created
pub fn check_dir(path: &Path, label: &str) -> Check {
    if path.is_dir() {
        return Check::new(CheckLevel::Ok, format!("{}: {}", label, path.display()));
    }
    match path.parent() {
        Some(parent) if parent.is_dir() => Check::new(
            CheckLevel::Warn,
            format!("{} does not exist yet (parent exists): {}", label, path.display()),
        ),
        _ => Check::new(
            CheckLevel::Fail,
            format!("{} not accessible (parent missing): {}", label, path.display()),
        ),
    }
}

fn state_dirs(config: &Config) -> [(&'static str, &Path); 4] {
    [
        ("state_dir", &config.paths.state_dir),
        ("logs_dir", &config.paths.logs_dir),
        ("verification_dir", &config.paths.verification_dir),
        ("generated_config_dir", &config.paths.generated_config_dir),
    ]
}

/// Run every prerequisite check in order
pub fn collect_checks(config: &Config) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(check_binary(&config.tools.mbsync));
    checks.push(check_binary(&config.tools.notmuch));
    if config.backup.mode != "command" {
        checks.push(check_binary(&config.backup.mode));
    }

    // The secret may only be mounted at sync time
    let password_file = &config.paths.password_file;
    if password_file.is_file() {
        checks.push(Check::new(
            CheckLevel::Ok,
            format!("password file: {}", password_file.display()),
        ));
    } else {
        checks.push(Check::new(
            CheckLevel::Warn,
            format!("password file not found (required at sync time): {}", password_file.display()),
        ));
    }

    checks.push(check_dir(&config.paths.maildir_root, "maildir_root"));

    for (label, path) in state_dirs(config) {
        let mut check = check_dir(path, label);
        // State directories are created on demand
        if check.level == CheckLevel::Fail {
            check.level = CheckLevel::Warn;
        }
        checks.push(check);
    }
    checks
}

fn ensure_state_dirs(config: &Config) {
    for (_, dir) in state_dirs(config) {
        if dir.is_dir() || !dir.parent().is_some_and(|p| p.is_dir()) {
            continue;
        }
        match create_private_dir(dir) {
            Ok(()) => println!("  Created directory: {}", dir.display()),
            Err(e) => println!("  Could not create {}: {}", dir.display(), e),
        }
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Print all checks; true when none of them failed
pub fn run_doctor(config: &Config, verbose: bool) -> bool {
    println!("Checking prerequisites, secrets and paths...");
    if verbose {
        println!("  accounts: {}", config.account_names().join(", "));
    }
    let checks = collect_checks(config);

    println!();
    for check in &checks {
        println!("{}", check.render());
    }
    println!();

    let all_ok = checks.iter().all(|c| c.level != CheckLevel::Fail);
    if all_ok {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Please fix the issues above.");
        ensure_state_dirs(config);
    }
    all_ok
}
