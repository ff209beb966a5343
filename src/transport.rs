//! The broker's only view of the message bus.
//!
//! [`Broker`](crate::broker::Broker) is generic over [`Bus`] so its election logic can run
//! without a bus daemon. [`DBusTransport`] is the real thing.

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use zbus::{
    names::BusName,
    proxy::CacheProperties,
    zvariant::{DynamicType, Value},
    Connection,
};

use crate::{
    dbus::{
        properties::PlayerPropertiesProxy, MprisInterface, MPRIS_PATH, PLAYERCTLD_INTERFACE,
        PROPERTIES_INTERFACE,
    },
    player::PlayerId,
    utils::{extract_i64, PropertyMap},
};

/// A signal the broker emits from its own object
#[derive(Debug)]
pub enum Emission<'a> {
    ActivePlayerChangeBegin(&'a str),
    PropertiesChanged {
        interface: &'a str,
        changed: HashMap<&'a str, &'a Value<'a>>,
        invalidated: Vec<&'a str>,
    },
    Seeked(i64),
    ActivePlayerChangeEnd(&'a str),
}

/// Ask for the full property snapshot of one interface of a player
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: PlayerId,
    pub unique: String,
    pub interface: MprisInterface,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub id: PlayerId,
    pub interface: MprisInterface,
    pub result: Result<PropertyMap>,
}

pub trait Bus {
    /// Emit a signal from the broker's object
    async fn emit(&self, emission: Emission<'_>) -> Result<()>;

    /// Read the current position of a player, waiting for the answer
    async fn position(&self, unique: &str) -> Result<i64>;

    /// Start fetching a property snapshot in the background. The result is delivered later as a
    /// [`FetchOutcome`].
    fn fetch_properties(&self, request: FetchRequest);
}

pub struct DBusTransport {
    conn: Connection,
    fetch_sender: mpsc::Sender<FetchOutcome>,
}

impl DBusTransport {
    pub const fn new(conn: Connection, fetch_sender: mpsc::Sender<FetchOutcome>) -> Self {
        Self { conn, fetch_sender }
    }

    async fn signal<B>(&self, interface: &str, member: &str, body: &B) -> Result<()>
    where
        B: Serialize + DynamicType,
    {
        self.conn
            .emit_signal(None::<BusName<'_>>, MPRIS_PATH, interface, member, body)
            .await
            .with_context(|| format!("Failed to emit {interface}.{member}"))
    }
}

async fn properties_proxy<'a>(
    conn: &Connection,
    unique: &'a str,
) -> Result<PlayerPropertiesProxy<'a>> {
    PlayerPropertiesProxy::builder(conn)
        .destination(unique)?
        .path(MPRIS_PATH)?
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .context("Failed to create properties proxy")
}

async fn fetch_all(conn: &Connection, unique: &str, interface: MprisInterface) -> Result<PropertyMap> {
    properties_proxy(conn, unique)
        .await?
        .get_all(interface.name())
        .await
        .with_context(|| format!("Failed to get {} properties", interface.name()))
}

impl Bus for DBusTransport {
    async fn emit(&self, emission: Emission<'_>) -> Result<()> {
        match emission {
            Emission::ActivePlayerChangeBegin(name) => {
                self.signal(PLAYERCTLD_INTERFACE, "ActivePlayerChangeBegin", &name)
                    .await
            }
            Emission::PropertiesChanged {
                interface,
                changed,
                invalidated,
            } => {
                self.signal(
                    PROPERTIES_INTERFACE,
                    "PropertiesChanged",
                    &(interface, changed, invalidated),
                )
                .await
            }
            Emission::Seeked(position) => {
                self.signal(MprisInterface::Player.name(), "Seeked", &position)
                    .await
            }
            Emission::ActivePlayerChangeEnd(name) => {
                self.signal(PLAYERCTLD_INTERFACE, "ActivePlayerChangeEnd", &name)
                    .await
            }
        }
    }

    async fn position(&self, unique: &str) -> Result<i64> {
        let value = properties_proxy(&self.conn, unique)
            .await?
            .get(MprisInterface::Player.name(), "Position")
            .await
            .context("Failed to get player position")?;
        extract_i64(&value).with_context(|| format!("Position {value:?} is not an int64"))
    }

    fn fetch_properties(&self, request: FetchRequest) {
        let conn = self.conn.clone();
        let sender = self.fetch_sender.clone();
        tokio::spawn(async move {
            let result = fetch_all(&conn, &request.unique, request.interface).await;
            let outcome = FetchOutcome {
                id: request.id,
                interface: request.interface,
                result,
            };
            if sender.send(outcome).await.is_err() {
                tracing::debug!(id = %request.id, "Broker stopped before properties arrived");
            }
        });
    }
}
