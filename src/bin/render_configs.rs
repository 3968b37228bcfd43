use anyhow::{Context, Result};
use std::path::PathBuf;

use email_archiver::config::Config;
use email_archiver::generate::{render_mbsyncrc, render_notmuch_config, MBSYNCRC_FILE, NOTMUCH_CONFIG_FILE};

fn main() -> Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref()).context("Configuration error")?;

    println!("# --- {} ---", MBSYNCRC_FILE);
    print!("{}", render_mbsyncrc(&config));
    println!();
    println!("# --- {} ---", NOTMUCH_CONFIG_FILE);
    print!("{}", render_notmuch_config(&config));

    // Channel count per account, to compare with `mbsync -l`
    println!();
    for account in config.accounts.values() {
        println!("# {}: {} folder(s)", account.name, account.folders.len());
    }
    Ok(())
}
