use std::{fs::File, io, sync::Mutex};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
    /// File to write the log to. If not specified, logs will be written to stderr.
    #[clap(long, short, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start playerctld through the bus if it is not running yet
    Daemon,
    /// Make the next player active, sending the current one to the back of the queue
    Shift,
    /// Make the least recently active player active again
    Unshift,
}

impl Args {
    /// Build the tracing subscriber using parameters from the command line arguments
    pub fn init_tracing_subscriber(&self) -> Result<()> {
        let builder = tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env());

        match self.log_file.as_ref() {
            None => builder.with_writer(io::stderr).init(),
            Some(f) => {
                let file = File::create(f).with_context(|| format!("Failed to open log file {f}"))?;
                builder.with_writer(Mutex::new(file)).init();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands() {
        let args = Args::try_parse_from(["playerctld"]).unwrap();
        assert_eq!(args.command, None);

        let args = Args::try_parse_from(["playerctld", "shift"]).unwrap();
        assert_eq!(args.command, Some(Command::Shift));

        let args = Args::try_parse_from(["playerctld", "unshift", "--log-file", "/tmp/p.log"]).unwrap();
        assert_eq!(args.command, Some(Command::Unshift));
        assert_eq!(args.log_file.as_deref(), Some("/tmp/p.log"));

        assert!(Args::try_parse_from(["playerctld", "restart"]).is_err());
    }
}
