#[cfg(test)]
mod tests;

use std::{fmt, ops::Deref};

use crate::{
    dbus::MprisInterface,
    utils::{extract_i64, extract_str, PropertyMap},
};

/// Identifies one instance of a player for as long as the broker tracks it.
///
/// A backend that disappears and comes back gets a fresh id, so results of requests made to the
/// old instance can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cached properties of an interface that not every player implements
#[derive(Debug, Default)]
pub struct OptionalInterface {
    pub supported: bool,
    pub properties: PropertyMap,
}

/// A MPRIS player tracked by the broker, with its cached MPRIS properties
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    /// Unique connection name, e.g. `:1.42`
    pub unique: String,
    /// Well-known name, e.g. `org.mpris.MediaPlayer2.vlc`
    pub well_known: String,
    /// Last known position in microseconds, refreshed from the player and never extrapolated
    pub position: i64,
    pub player_properties: Option<PropertyMap>,
    pub root_properties: Option<PropertyMap>,
    pub track_list: OptionalInterface,
    pub playlists: OptionalInterface,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, unique: impl Into<String>, well_known: impl Into<String>) -> Self {
        Self {
            id,
            unique: unique.into(),
            well_known: well_known.into(),
            position: 0,
            player_properties: None,
            root_properties: None,
            track_list: OptionalInterface::default(),
            playlists: OptionalInterface::default(),
        }
    }

    /// Both mandatory snapshots have arrived
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.player_properties.is_some() && self.root_properties.is_some()
    }

    #[must_use]
    pub const fn implements(&self, interface: MprisInterface) -> bool {
        match interface {
            MprisInterface::Root | MprisInterface::Player => true,
            MprisInterface::TrackList => self.track_list.supported,
            MprisInterface::Playlists => self.playlists.supported,
        }
    }

    /// Snapshot of an interface, if the player implements it and it has been fetched
    #[must_use]
    pub fn properties(&self, interface: MprisInterface) -> Option<&PropertyMap> {
        match interface {
            MprisInterface::Root => self.root_properties.as_ref(),
            MprisInterface::Player => self.player_properties.as_ref(),
            MprisInterface::TrackList => {
                Some(&self.track_list.properties).filter(|_| self.track_list.supported)
            }
            MprisInterface::Playlists => {
                Some(&self.playlists.properties).filter(|_| self.playlists.supported)
            }
        }
    }

    /// Human readable name from the root interface, falling back to the bus name
    #[must_use]
    pub fn identity(&self) -> &str {
        self.root_properties
            .as_ref()
            .and_then(|p| p.get("Identity"))
            .map(Deref::deref)
            .and_then(extract_str)
            .map_or(self.well_known.as_str(), |s| s.as_str())
    }

    pub fn set_supported(&mut self, interface: MprisInterface, supported: bool) {
        match interface {
            MprisInterface::TrackList => self.track_list.supported = supported,
            MprisInterface::Playlists => self.playlists.supported = supported,
            MprisInterface::Root | MprisInterface::Player => {}
        }
    }

    /// Merge a property update into the cached snapshot of `interface`.
    ///
    /// Returns whether any cached value was added or changed. `Position` on the player interface
    /// is stored aside and never counts as a change.
    pub fn apply_update(&mut self, interface: MprisInterface, update: PropertyMap) -> bool {
        let cache = match interface {
            MprisInterface::Player => self.player_properties.get_or_insert_with(PropertyMap::new),
            MprisInterface::Root => self.root_properties.get_or_insert_with(PropertyMap::new),
            MprisInterface::TrackList | MprisInterface::Playlists => {
                let optional = if interface == MprisInterface::TrackList {
                    &mut self.track_list
                } else {
                    &mut self.playlists
                };
                if !optional.supported {
                    tracing::warn!(
                        player = %self.well_known,
                        interface = interface.name(),
                        "Player doesn't appear to support interface, but sent an update regarding its properties"
                    );
                }
                &mut optional.properties
            }
        };

        let mut changed = false;
        for (key, value) in update {
            if interface == MprisInterface::Player && key == "Position" {
                match extract_i64(&value) {
                    Some(position) => self.position = position,
                    None => tracing::warn!(player = %self.well_known, ?value, "Position is not an int64"),
                }
                continue;
            }
            match cache.get(&key) {
                Some(cached) if *cached == value => {}
                Some(_) => {
                    tracing::debug!(player = %self.well_known, interface = interface.name(), %key, "Changed property");
                    changed = true;
                }
                None => {
                    tracing::debug!(player = %self.well_known, interface = interface.name(), %key, "New property");
                    changed = true;
                }
            }
            cache.insert(key, value);
        }
        changed
    }
}
