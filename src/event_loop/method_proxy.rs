use std::collections::HashMap;

use anyhow::{Context as _, Result};
use zbus::{
    message::{Header, Message},
    zvariant::{OwnedValue, Structure, Value},
    Connection,
};

use super::introspection::{ancestor_node, OBJECT_XML};
use crate::{
    broker::Broker,
    dbus::{
        MprisInterface, INTROSPECTABLE_INTERFACE, MPRIS_PATH, PEER_INTERFACE,
        PLAYERCTLD_INTERFACE, PROPERTIES_INTERFACE,
    },
    error::CallError,
    player::Player,
    transport::DBusTransport,
};

const PLAYER_NAMES: &str = "PlayerNames";
const FAILED: &str = "org.freedesktop.DBus.Error.Failed";

/// The parts of an incoming call that decide who answers it
#[derive(Debug, PartialEq, Eq)]
pub struct CallInfo {
    pub path: String,
    pub interface: String,
    pub member: String,
    /// Interface and property named in the arguments of a `Properties` call
    pub target: Option<(String, Option<String>)>,
}

impl CallInfo {
    pub fn from_message(msg: &Message) -> Result<Self, CallError> {
        let header = msg.header();
        let path = header.path().map(ToString::to_string).unwrap_or_default();
        let interface = header
            .interface()
            .map(ToString::to_string)
            .unwrap_or_default();
        let member = header.member().map(ToString::to_string).unwrap_or_default();

        let target = if interface == PROPERTIES_INTERFACE {
            let body = msg.body();
            let parsed = match member.as_str() {
                "GetAll" => body.deserialize::<String>().map(|i| (i, None)),
                "Get" => body
                    .deserialize::<(String, String)>()
                    .map(|(i, p)| (i, Some(p))),
                "Set" => body
                    .deserialize::<(String, String, OwnedValue)>()
                    .map(|(i, p, _)| (i, Some(p))),
                _ => return Err(CallError::UnknownMethod(member)),
            };
            Some(parsed.map_err(|e| CallError::InvalidArgs(e.to_string()))?)
        } else {
            None
        };

        Ok(Self {
            path,
            interface,
            member,
            target,
        })
    }
}

/// Who answers a call
#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    /// Resend to the active player at this unique name
    Forward(String),
    Shift,
    Unshift,
    GetPlayerNames,
    GetAllOwn,
    Introspect,
    IntrospectAncestor(String),
    Ping,
}

/// Decide how to answer a call, given the current active player
pub fn route(call: &CallInfo, head: Option<&Player>) -> Result<Route, CallError> {
    let interface = call.interface.as_str();
    let member = call.member.as_str();

    if interface == PEER_INTERFACE {
        return match member {
            "Ping" => Ok(Route::Ping),
            _ => Err(CallError::UnknownMethod(call.member.clone())),
        };
    }
    if call.path != MPRIS_PATH {
        return match (interface, member, ancestor_node(&call.path)) {
            (INTROSPECTABLE_INTERFACE, "Introspect", Some(xml)) => Ok(Route::IntrospectAncestor(xml)),
            _ => Err(CallError::UnknownObject(call.path.clone())),
        };
    }

    match interface {
        INTROSPECTABLE_INTERFACE if member == "Introspect" => Ok(Route::Introspect),
        PLAYERCTLD_INTERFACE => match member {
            "Shift" => Ok(Route::Shift),
            "Unshift" => Ok(Route::Unshift),
            _ => Err(CallError::InvalidMethod),
        },
        PROPERTIES_INTERFACE => {
            let Some((target, property)) = &call.target else {
                return Err(CallError::InvalidArgs("Missing interface name".to_owned()));
            };
            if target == PLAYERCTLD_INTERFACE {
                return own_property(member, property.as_deref());
            }
            let Some(target) = MprisInterface::from_name(target) else {
                return Err(CallError::UnknownInterface(target.clone()));
            };
            forward_to(target, head)
        }
        _ => {
            let Some(target) = MprisInterface::from_name(interface) else {
                return Err(CallError::UnknownInterface(call.interface.clone()));
            };
            if !target.methods().contains(&member) {
                return Err(CallError::UnknownMethod(call.member.clone()));
            }
            forward_to(target, head)
        }
    }
}

fn own_property(member: &str, property: Option<&str>) -> Result<Route, CallError> {
    match (member, property) {
        ("GetAll", _) => Ok(Route::GetAllOwn),
        ("Get", Some(PLAYER_NAMES)) => Ok(Route::GetPlayerNames),
        ("Set", Some(PLAYER_NAMES)) => Err(CallError::PropertyReadOnly(PLAYER_NAMES.to_owned())),
        (_, property) => Err(CallError::UnknownProperty(
            property.unwrap_or_default().to_owned(),
        )),
    }
}

fn forward_to(interface: MprisInterface, head: Option<&Player>) -> Result<Route, CallError> {
    let head = head.ok_or(CallError::NoActivePlayer)?;
    if !head.implements(interface) {
        return Err(CallError::NotSupported(interface.name().to_owned()));
    }
    Ok(Route::Forward(head.unique.clone()))
}

/// Answer a method call addressed to the broker.
///
/// Calls meant for the active player are resent on a separate task, and its reply is relayed
/// once it arrives.
pub async fn handle_call(
    conn: &Connection,
    broker: &mut Broker<DBusTransport>,
    msg: Message,
) -> Result<()> {
    let header = msg.header();
    let decision = CallInfo::from_message(&msg).and_then(|call| {
        tracing::debug!(?call, "Got method call");
        route(&call, broker.active_player())
    });

    match decision {
        Err(e) => reply_error(conn, &header, &e).await,
        Ok(Route::Forward(destination)) => {
            let conn = conn.clone();
            let call = msg.clone();
            tokio::spawn(async move {
                if let Err(e) = forward_call(&conn, &destination, &call).await {
                    tracing::warn!(%destination, ?e, "Could not relay reply");
                }
            });
            Ok(())
        }
        Ok(Route::Shift) => match broker.shift().await {
            Some(name) => reply(conn, &header, &name).await,
            None => reply_error(conn, &header, &CallError::NoActivePlayer).await,
        },
        Ok(Route::Unshift) => match broker.unshift().await {
            Some(name) => reply(conn, &header, &name).await,
            None => reply_error(conn, &header, &CallError::NoActivePlayer).await,
        },
        Ok(Route::GetPlayerNames) => {
            let names = Value::from(broker.player_names());
            reply(conn, &header, &names).await
        }
        Ok(Route::GetAllOwn) => {
            let properties = HashMap::from([(PLAYER_NAMES, Value::from(broker.player_names()))]);
            reply(conn, &header, &properties).await
        }
        Ok(Route::Introspect) => reply(conn, &header, &OBJECT_XML).await,
        Ok(Route::IntrospectAncestor(xml)) => reply(conn, &header, &xml).await,
        Ok(Route::Ping) => reply(conn, &header, &()).await,
    }
}

async fn reply<B>(conn: &Connection, header: &Header<'_>, body: &B) -> Result<()>
where
    B: serde::Serialize + zbus::zvariant::DynamicType,
{
    conn.reply(header, body).await.context("Failed to reply")?;
    Ok(())
}

async fn reply_error(conn: &Connection, header: &Header<'_>, e: &CallError) -> Result<()> {
    tracing::debug!(name = e.error_name(), %e, "Refusing method call");
    conn.reply_error(header, e.error_name(), &e.to_string())
        .await
        .context("Failed to send error reply")?;
    Ok(())
}

/// Resend `call` to `destination` and pass whatever comes back to the original caller
async fn forward_call(conn: &Connection, destination: &str, call: &Message) -> Result<()> {
    let header = call.header();
    let path = header.path().context("Method call without path")?.clone();
    let member = header.member().context("Method call without member")?.clone();
    let interface = header.interface().cloned();

    let body = call.body();
    let sent = if body.signature().to_string().is_empty() {
        conn.call_method(Some(destination), path, interface, member, &())
            .await
    } else {
        let args: Structure<'_> = body.deserialize().context("Failed to read call arguments")?;
        conn.call_method(Some(destination), path, interface, member, &args)
            .await
    };

    match sent {
        Ok(answer) => {
            let body = answer.body();
            if body.signature().to_string().is_empty() {
                reply(conn, &header, &()).await
            } else {
                let values: Structure<'_> =
                    body.deserialize().context("Failed to read reply")?;
                reply(conn, &header, &values).await
            }
        }
        Err(zbus::Error::MethodError(name, description, _)) => {
            tracing::debug!(%name, "Player answered with an error");
            let description = description.unwrap_or_else(|| "Failed to call method".to_owned());
            conn.reply_error(&header, name.as_str(), &description)
                .await
                .context("Failed to relay error")?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(%destination, ?e, "Failed to call method on player");
            conn.reply_error(&header, FAILED, &e.to_string())
                .await
                .context("Failed to relay error")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{player::PlayerId, utils::PropertyMap};

    fn call(interface: &str, member: &str) -> CallInfo {
        CallInfo {
            path: MPRIS_PATH.to_owned(),
            interface: interface.to_owned(),
            member: member.to_owned(),
            target: None,
        }
    }

    fn properties_call(member: &str, target: &str, property: Option<&str>) -> CallInfo {
        CallInfo {
            target: Some((target.to_owned(), property.map(ToOwned::to_owned))),
            ..call(PROPERTIES_INTERFACE, member)
        }
    }

    fn head(track_list: bool) -> Player {
        let mut player = Player::new(PlayerId(3), ":1.8", "org.mpris.MediaPlayer2.vlc");
        player.player_properties = Some(PropertyMap::new());
        player.root_properties = Some(PropertyMap::new());
        player.set_supported(MprisInterface::TrackList, track_list);
        player
    }

    #[test]
    fn player_methods_go_to_the_active_player() {
        let head = head(false);
        assert_eq!(
            route(&call(MprisInterface::Player.name(), "PlayPause"), Some(&head)),
            Ok(Route::Forward(":1.8".to_owned()))
        );
        assert_eq!(
            route(&call(MprisInterface::Root.name(), "Raise"), Some(&head)),
            Ok(Route::Forward(":1.8".to_owned()))
        );
    }

    #[test]
    fn no_active_player() {
        assert_eq!(
            route(&call(MprisInterface::Player.name(), "Next"), None),
            Err(CallError::NoActivePlayer)
        );
        assert_eq!(
            route(
                &properties_call("Get", MprisInterface::Player.name(), Some("Volume")),
                None
            ),
            Err(CallError::NoActivePlayer)
        );
    }

    #[test]
    fn unknown_methods_never_reach_a_player() {
        let head = head(true);
        assert_eq!(
            route(&call(MprisInterface::Player.name(), "Explode"), Some(&head)),
            Err(CallError::UnknownMethod("Explode".to_owned()))
        );
        assert_eq!(
            route(&call(PLAYERCTLD_INTERFACE, "Rotate"), Some(&head)),
            Err(CallError::InvalidMethod)
        );
        assert_eq!(
            route(&call("org.example.Nope", "Do"), Some(&head)),
            Err(CallError::UnknownInterface("org.example.Nope".to_owned()))
        );
    }

    #[test]
    fn optional_interfaces_need_support() {
        let without = head(false);
        let with = head(true);
        let go_to = call(MprisInterface::TrackList.name(), "GoTo");
        assert_eq!(
            route(&go_to, Some(&without)),
            Err(CallError::NotSupported(
                MprisInterface::TrackList.name().to_owned()
            ))
        );
        assert_eq!(
            route(&go_to, Some(&with)),
            Ok(Route::Forward(":1.8".to_owned()))
        );
        assert!(route(
            &properties_call("GetAll", MprisInterface::Playlists.name(), None),
            Some(&with)
        )
        .is_err());
    }

    #[test]
    fn own_interface() {
        assert_eq!(route(&call(PLAYERCTLD_INTERFACE, "Shift"), None), Ok(Route::Shift));
        assert_eq!(
            route(&call(PLAYERCTLD_INTERFACE, "Unshift"), None),
            Ok(Route::Unshift)
        );
        assert_eq!(
            route(
                &properties_call("Get", PLAYERCTLD_INTERFACE, Some("PlayerNames")),
                None
            ),
            Ok(Route::GetPlayerNames)
        );
        assert_eq!(
            route(&properties_call("GetAll", PLAYERCTLD_INTERFACE, None), None),
            Ok(Route::GetAllOwn)
        );
        assert_eq!(
            route(
                &properties_call("Set", PLAYERCTLD_INTERFACE, Some("PlayerNames")),
                None
            ),
            Err(CallError::PropertyReadOnly("PlayerNames".to_owned()))
        );
        assert_eq!(
            route(
                &properties_call("Get", PLAYERCTLD_INTERFACE, Some("Volume")),
                None
            ),
            Err(CallError::UnknownProperty("Volume".to_owned()))
        );
    }

    #[test]
    fn object_housekeeping() {
        assert_eq!(
            route(&call(INTROSPECTABLE_INTERFACE, "Introspect"), None),
            Ok(Route::Introspect)
        );
        assert_eq!(route(&call(PEER_INTERFACE, "Ping"), None), Ok(Route::Ping));

        let above = CallInfo {
            path: "/org/mpris".to_owned(),
            ..call(INTROSPECTABLE_INTERFACE, "Introspect")
        };
        assert!(matches!(route(&above, None), Ok(Route::IntrospectAncestor(_))));

        let elsewhere = CallInfo {
            path: "/org/other".to_owned(),
            ..call(MprisInterface::Player.name(), "Play")
        };
        assert_eq!(
            route(&elsewhere, Some(&head(true))),
            Err(CallError::UnknownObject("/org/other".to_owned()))
        );
    }

    #[test]
    fn properties_arguments_are_read() {
        let msg = Message::method_call(MPRIS_PATH, "Get")
            .unwrap()
            .interface(PROPERTIES_INTERFACE)
            .unwrap()
            .build(&(MprisInterface::Player.name(), "Volume"))
            .unwrap();
        let info = CallInfo::from_message(&msg).unwrap();
        assert_eq!(
            info.target,
            Some((
                MprisInterface::Player.name().to_owned(),
                Some("Volume".to_owned())
            ))
        );

        let msg = Message::method_call(MPRIS_PATH, "Get")
            .unwrap()
            .interface(PROPERTIES_INTERFACE)
            .unwrap()
            .build(&42_u32)
            .unwrap();
        assert!(matches!(
            CallInfo::from_message(&msg),
            Err(CallError::InvalidArgs(_))
        ));
    }
}
