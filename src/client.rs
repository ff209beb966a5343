//! One-shot sub-commands that talk to a running broker instead of being one.

use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::{Context as _, Result};
use zbus::{
    fdo::{self, DBusProxy},
    names::WellKnownName,
    Connection,
};

use crate::{args::Command, dbus::playerctld::PlayerctldProxy, dbus::PLAYERCTLD_NAME};

/// What `StartServiceByName` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl StartOutcome {
    fn from_reply(code: u32) -> Self {
        match code {
            1 => Self::Started,
            2 => Self::AlreadyRunning,
            other => {
                tracing::warn!(code = other, "Got unknown result from StartServiceByName");
                Self::Started
            }
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::Started => "playerctld successfully started with DBus service activation",
            Self::AlreadyRunning => "playerctld DBus service is already running",
        }
    }
}

/// Ask the bus to activate the broker. Already running counts as success.
pub async fn start_daemon(conn: &Connection) -> ExitCode {
    match request_start(conn).await {
        Ok(outcome) => {
            eprintln!("{}", outcome.message());
            ExitCode::SUCCESS
        }
        Err(e) => {
            if matches!(
                e.downcast_ref::<fdo::Error>(),
                Some(fdo::Error::ServiceUnknown(_))
            ) {
                eprintln!(
                    "org.freedesktop.DBus.Error.ServiceUnknown: DBus service activation of playerctld is not supported"
                );
            } else {
                eprintln!("could not activate playerctld service: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn request_start(conn: &Connection) -> Result<StartOutcome> {
    let proxy = DBusProxy::new(conn)
        .await
        .context("Failed to create DBusProxy")?;
    let name = WellKnownName::from_static_str(PLAYERCTLD_NAME)?;
    let code: u32 = proxy.start_service_by_name(name, 0).await?;
    Ok(StartOutcome::from_reply(code))
}

/// Run `shift` or `unshift` against the broker and print the new active player.
pub async fn rotate(conn: &Connection, command: Command) -> ExitCode {
    let (verb, result) = match command {
        Command::Shift => ("shift", call(conn, true).await),
        Command::Unshift => ("unshift", call(conn, false).await),
        Command::Daemon => return start_daemon(conn).await,
    };
    match result {
        Ok(name) => {
            if writeln!(io::stdout().lock(), "{name}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", rotate_failure(verb, &e));
            ExitCode::FAILURE
        }
    }
}

fn rotate_failure(verb: &str, e: &zbus::Error) -> String {
    format!("Cannot {verb}: {e}")
}

async fn call(conn: &Connection, forward: bool) -> zbus::Result<String> {
    let proxy = PlayerctldProxy::new(conn).await?;
    if forward {
        proxy.shift().await
    } else {
        proxy.unshift().await
    }
}
