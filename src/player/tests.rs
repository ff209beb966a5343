use zbus::zvariant::{OwnedValue, Value};

use super::*;

fn update(entries: Vec<(&str, Value<'static>)>) -> PropertyMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_owned(), OwnedValue::try_from(v).unwrap()))
        .collect()
}

fn player() -> Player {
    Player::new(PlayerId(1), ":1.1", "org.mpris.MediaPlayer2.vlc")
}

#[test]
fn merging_same_snapshot_twice_is_unchanged() {
    let mut player = player();
    let snapshot = || {
        update(vec![
            ("PlaybackStatus", Value::from("Playing")),
            ("Volume", Value::from(0.5)),
        ])
    };

    assert!(player.apply_update(MprisInterface::Player, snapshot()));
    assert!(!player.apply_update(MprisInterface::Player, snapshot()));
}

#[test]
fn changed_value_is_detected() {
    let mut player = player();
    player.apply_update(
        MprisInterface::Player,
        update(vec![("PlaybackStatus", Value::from("Playing"))]),
    );

    assert!(player.apply_update(
        MprisInterface::Player,
        update(vec![("PlaybackStatus", Value::from("Paused"))]),
    ));
    let cached = &player.player_properties.as_ref().unwrap()["PlaybackStatus"];
    assert_eq!(extract_str(cached).map(|s| s.as_str()), Some("Paused"));
}

#[test]
fn position_is_stored_aside() {
    let mut player = player();
    player.apply_update(
        MprisInterface::Player,
        update(vec![("PlaybackStatus", Value::from("Playing"))]),
    );

    assert!(!player.apply_update(
        MprisInterface::Player,
        update(vec![("Position", Value::from(42_000_000_i64))]),
    ));
    assert_eq!(player.position, 42_000_000);
    assert!(!player
        .player_properties
        .as_ref()
        .unwrap()
        .contains_key("Position"));
}

#[test]
fn position_key_on_other_interfaces_is_a_property() {
    let mut player = player();
    assert!(player.apply_update(
        MprisInterface::Root,
        update(vec![("Position", Value::from(1_i64))]),
    ));
    assert_eq!(player.position, 0);
}

#[test]
fn readiness_needs_both_mandatory_snapshots() {
    let mut player = player();
    assert!(!player.is_ready());
    player.apply_update(MprisInterface::Player, PropertyMap::new());
    assert!(!player.is_ready());
    player.apply_update(MprisInterface::Root, PropertyMap::new());
    assert!(player.is_ready());
}

#[test]
fn unsupported_optional_interface_still_applies() {
    let mut player = player();
    assert!(player.apply_update(
        MprisInterface::TrackList,
        update(vec![("CanEditTracks", Value::from(false))]),
    ));
    assert!(!player.implements(MprisInterface::TrackList));
    assert!(player.properties(MprisInterface::TrackList).is_none());

    player.set_supported(MprisInterface::TrackList, true);
    assert!(player.implements(MprisInterface::TrackList));
    assert!(player
        .properties(MprisInterface::TrackList)
        .unwrap()
        .contains_key("CanEditTracks"));
}

#[test]
fn identity_falls_back_to_bus_name() {
    let mut player = player();
    assert_eq!(player.identity(), "org.mpris.MediaPlayer2.vlc");
    player.apply_update(
        MprisInterface::Root,
        update(vec![("Identity", Value::from("VLC media player"))]),
    );
    assert_eq!(player.identity(), "VLC media player");
}
