use clap::Parser;
use tracing_subscriber::EnvFilter;

use email_archiver::cli::{self, Cli};

fn init_tracing(verbose: bool) {
    let default = if verbose { "email_archiver=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    let verbose = cli.command.as_ref().is_some_and(|c| c.common().verbose);
    init_tracing(verbose);

    std::process::exit(cli::run(cli));
}
