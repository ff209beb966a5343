use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Command;
use clap::Parser as _;
use error::BrokerError;
use event_loop::event_loop;
use zbus::Connection;

mod args;
mod broker;
mod client;
mod dbus;
mod error;
mod event_loop;
mod player;
mod registry;
mod transport;
mod utils;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = args::Args::parse();
    if let Err(e) = args.init_tracing_subscriber() {
        eprintln!("{e:?}");
        return ExitCode::FAILURE;
    }

    let connection = match Connection::session()
        .await
        .context("Failed to connect to the session bus")
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(?e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        None => exit_code(run(connection).await),
        Some(Command::Daemon) => client::start_daemon(&connection).await,
        Some(command) => client::rotate(&connection, command).await,
    }
}

async fn run(connection: Connection) -> Result<()> {
    tracing::info!("Starting playerctld");
    event_loop(connection).await
}

fn exit_code(result: Result<()>) -> ExitCode {
    let Err(e) = result else {
        return ExitCode::SUCCESS;
    };
    tracing::error!(?e, "playerctld stopped");
    match e.downcast_ref::<BrokerError>() {
        Some(broker_error) => ExitCode::from(broker_error.exit_code()),
        None => ExitCode::FAILURE,
    }
}
