use std::collections::HashMap;

use anyhow::{Context as _, Result};
use zbus::{message::Message, zvariant::OwnedValue};

use crate::{
    broker::PlayerSignal,
    dbus::{MprisInterface, PROPERTIES_INTERFACE},
};

/// Turn a signal from a player object into a [`PlayerSignal`] along with its sender.
///
/// Signals the broker does not follow give `Ok(None)`. A known signal with a body of the wrong
/// shape is an error.
pub fn parse_player_signal(msg: &Message) -> Result<Option<(String, PlayerSignal)>> {
    let header = msg.header();
    let (Some(sender), Some(interface), Some(member)) =
        (header.sender(), header.interface(), header.member())
    else {
        return Ok(None);
    };

    let signal = match (interface.as_str(), member.as_str()) {
        (i, "Seeked") if i == MprisInterface::Player.name() => {
            let position: i64 = msg
                .body()
                .deserialize()
                .context("Malformed Seeked signal")?;
            PlayerSignal::Seeked(position)
        }
        (PROPERTIES_INTERFACE, "PropertiesChanged") => {
            let (interface, changed, invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
                msg.body()
                    .deserialize()
                    .context("Malformed PropertiesChanged signal")?;
            let Some(interface) = MprisInterface::from_name(&interface) else {
                return Ok(None);
            };
            PlayerSignal::PropertiesChanged {
                interface,
                changed,
                invalidated,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some((sender.to_string(), signal)))
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::Value;

    use super::*;
    use crate::dbus::MPRIS_PATH;

    fn signal<B>(interface: &str, member: &str, body: &B) -> Message
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        Message::signal(MPRIS_PATH, interface, member)
            .unwrap()
            .sender(":1.42")
            .unwrap()
            .build(body)
            .unwrap()
    }

    #[test]
    fn seeked() {
        let msg = signal(MprisInterface::Player.name(), "Seeked", &1_500_000_i64);
        let (sender, parsed) = parse_player_signal(&msg).unwrap().unwrap();
        assert_eq!(sender, ":1.42");
        assert!(matches!(parsed, PlayerSignal::Seeked(1_500_000)));
    }

    #[test]
    fn properties_changed() {
        let changed = HashMap::from([("PlaybackStatus", Value::from("Playing"))]);
        let msg = signal(
            PROPERTIES_INTERFACE,
            "PropertiesChanged",
            &(MprisInterface::Player.name(), changed, vec!["Metadata"]),
        );
        let (_, parsed) = parse_player_signal(&msg).unwrap().unwrap();
        let PlayerSignal::PropertiesChanged {
            interface,
            changed,
            invalidated,
        } = parsed
        else {
            panic!("expected PropertiesChanged, got {parsed:?}");
        };
        assert_eq!(interface, MprisInterface::Player);
        assert_eq!(
            changed.get("PlaybackStatus").map(|v| &**v),
            Some(&Value::from("Playing"))
        );
        assert_eq!(invalidated, ["Metadata"]);
    }

    #[test]
    fn foreign_interfaces_are_skipped() {
        let changed: HashMap<&str, Value<'_>> = HashMap::new();
        let msg = signal(
            PROPERTIES_INTERFACE,
            "PropertiesChanged",
            &("org.example.Other", changed, Vec::<&str>::new()),
        );
        assert!(parse_player_signal(&msg).unwrap().is_none());

        let msg = signal(MprisInterface::TrackList.name(), "TrackRemoved", &"/track/1");
        assert!(parse_player_signal(&msg).unwrap().is_none());
    }

    #[test]
    fn wrong_body_is_an_error() {
        let msg = signal(MprisInterface::Player.name(), "Seeked", &"soon");
        assert!(parse_player_signal(&msg).is_err());
    }
}
