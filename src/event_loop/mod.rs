mod introspection;
mod method_proxy;
mod signals;

use std::pin::pin;

use anyhow::{bail, Context as _, Result};
use futures_lite::StreamExt as _;
use tokio::{select, sync::mpsc};
use zbus::{
    fdo::RequestNameFlags,
    message::{Message, Type},
    Connection, MatchRule, MessageStream,
};

use crate::{
    broker::Broker,
    dbus::{player_buses, BusActivity, BusChange, MPRIS_PATH, PLAYERCTLD_NAME},
    error::BrokerError,
    transport::DBusTransport,
};

use method_proxy::handle_call;
use signals::parse_player_signal;

pub async fn event_loop(conn: Connection) -> Result<()> {
    // Everything is subscribed before the name is claimed, so no call or signal sent to the
    // broker once it is visible is missed.
    let mut dbus_stream = pin!(player_buses(&conn).await?);

    let rule = MatchRule::builder()
        .msg_type(Type::Signal)
        .path(MPRIS_PATH)?
        .build();
    let mut signal_stream = MessageStream::for_match_rule(rule, &conn, None)
        .await
        .context("Failed to listen for player signals")?;
    let mut call_stream = MessageStream::from(&conn);

    let (fetch_sender, mut fetch_receiver) = mpsc::channel(16);
    claim_name(&conn).await?;

    let mut broker = Broker::new(DBusTransport::new(conn.clone(), fetch_sender));

    loop {
        select! {
            bus_change = dbus_stream.next() => {
                let Some(BusChange { name, activity }) = bus_change else {
                    bail!("DBus NameOwnerChanged stream closed");
                };
                tracing::debug!(%name, ?activity, "Bus change event received");
                match activity {
                    BusActivity::Created { owner } => broker.on_player_appeared(name.as_str(), &owner).await,
                    BusActivity::Destroyed => broker.on_player_vanished(name.as_str()).await,
                }
            }
            signal = signal_stream.next() => {
                let Some(signal) = signal else {
                    bail!("Player signal stream closed");
                };
                match signal {
                    Ok(msg) => handle_signal(&mut broker, &msg).await,
                    Err(e) => tracing::warn!(?e, "Failed to receive signal"),
                }
            }
            call = call_stream.next() => {
                let Some(call) = call else {
                    bail!("Method call stream closed");
                };
                match call {
                    Ok(msg) if msg.message_type() == Type::MethodCall => {
                        if let Err(e) = handle_call(&conn, &mut broker, msg).await {
                            tracing::warn!(?e, "Failed to answer method call");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(?e, "Failed to receive method call"),
                }
            }
            Some(outcome) = fetch_receiver.recv() => {
                broker.on_properties_fetched(outcome).await;
            }
        }
    }
}

async fn claim_name(conn: &Connection) -> Result<()> {
    match conn
        .request_name_with_flags(PLAYERCTLD_NAME, RequestNameFlags::DoNotQueue.into())
        .await
    {
        Ok(reply) => {
            tracing::info!(?reply, name = PLAYERCTLD_NAME, "Acquired bus name");
            Ok(())
        }
        Err(zbus::Error::NameTaken) => Err(BrokerError::NameTaken(PLAYERCTLD_NAME.to_owned()).into()),
        Err(e) => Err(e).context("Failed to request bus name"),
    }
}

async fn handle_signal(broker: &mut Broker<DBusTransport>, msg: &Message) {
    match parse_player_signal(msg) {
        Ok(Some((sender, signal))) => broker.on_player_signal(&sender, signal).await,
        Ok(None) => {}
        Err(e) => tracing::warn!(?e, "Ignoring malformed player signal"),
    }
}
