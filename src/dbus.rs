use anyhow::{Context as _, Result};
use futures_lite::{stream::iter, Stream, StreamExt as _};
use zbus::{
    fdo::DBusProxy,
    names::OwnedBusName,
    Connection,
};

pub mod playerctld;
pub mod properties;

pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
pub const PLAYERCTLD_NAME: &str = "org.mpris.MediaPlayer2.playerctld";
pub const PLAYERCTLD_INTERFACE: &str = "com.github.altdesktop.playerctld";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
pub const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";

/// The four MPRIS interfaces the broker proxies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MprisInterface {
    Root,
    Player,
    TrackList,
    Playlists,
}

impl MprisInterface {
    pub const ALL: [Self; 4] = [Self::Player, Self::Root, Self::TrackList, Self::Playlists];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Root => "org.mpris.MediaPlayer2",
            Self::Player => "org.mpris.MediaPlayer2.Player",
            Self::TrackList => "org.mpris.MediaPlayer2.TrackList",
            Self::Playlists => "org.mpris.MediaPlayer2.Playlists",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// A backend that fails to answer for a mandatory interface is not a usable player.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        matches!(self, Self::Root | Self::Player)
    }

    #[must_use]
    pub const fn methods(self) -> &'static [&'static str] {
        match self {
            Self::Root => &["Raise", "Quit"],
            Self::Player => &[
                "Next",
                "Previous",
                "Pause",
                "PlayPause",
                "Stop",
                "Play",
                "Seek",
                "SetPosition",
                "OpenUri",
            ],
            Self::TrackList => &["GetTracksMetadata", "AddTrack", "RemoveTrack", "GoTo"],
            Self::Playlists => &["ActivatePlaylist", "GetPlaylists"],
        }
    }

    /// Every property of the interface, used to invalidate them all when no player is active
    #[must_use]
    pub const fn property_names(self) -> &'static [&'static str] {
        match self {
            Self::Root => &[
                "CanQuit",
                "Fullscreen",
                "CanSetFullscreen",
                "CanRaise",
                "HasTrackList",
                "Identity",
                "DesktopEntry",
                "SupportedUriSchemes",
                "SupportedMimeTypes",
            ],
            Self::Player => &[
                "CanControl",
                "CanGoNext",
                "CanGoPrevious",
                "CanPause",
                "CanPlay",
                "CanSeek",
                "Shuffle",
                "Metadata",
                "MaximumRate",
                "MinimumRate",
                "Rate",
                "Volume",
                "Position",
                "LoopStatus",
                "PlaybackStatus",
            ],
            Self::TrackList => &["Tracks", "CanEditTracks"],
            Self::Playlists => &["PlaylistCount", "Orderings", "ActivePlaylist"],
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BusActivity {
    Created { owner: String },
    Destroyed,
}

/// D-Bus's activity parsed from `NameOwnerChanged` signal
#[derive(Debug)]
pub struct BusChange {
    pub name: OwnedBusName,
    pub activity: BusActivity,
}
impl BusChange {
    pub const fn new(name: OwnedBusName, activity: BusActivity) -> Self {
        Self { name, activity }
    }
    pub fn is_mpris(&self) -> bool {
        is_managed_name(&self.name)
    }
}

/// Whether a well-known name belongs to a player the broker should track
#[must_use]
pub fn is_managed_name(name: &str) -> bool {
    name.starts_with(MPRIS_PREFIX) && !name.starts_with(PLAYERCTLD_NAME)
}

/// Classify a `NameOwnerChanged` transition. A hand-over between two owners counts as a new
/// appearance.
#[must_use]
pub fn classify_owner_change(old_owner: Option<&str>, new_owner: Option<&str>) -> Option<BusActivity> {
    match (new_owner, old_owner) {
        (Some(owner), _) => Some(BusActivity::Created {
            owner: owner.to_owned(),
        }),
        (None, Some(_)) => Some(BusActivity::Destroyed),
        (None, None) => None,
    }
}

/// Return a stream of all MPRIS players on the bus: the ones already present, then live changes.
///
/// The live subscription is made before the initial listing, so a player appearing in between
/// is reported at least once.
pub async fn player_buses(conn: &Connection) -> Result<impl Stream<Item = BusChange>> {
    let proxy = DBusProxy::new(conn)
        .await
        .context("Failed to create DBusProxy")?;

    let new_activities = proxy
        .receive_name_owner_changed()
        .await
        .context("Failed to listen for NameOwnerChanged signal on DBus")?
        .filter_map(|s| {
            let args = s
                .args()
                .inspect_err(|e| tracing::warn!(?e, "Failed to parse NameOwnerChanged argument"))
                .ok()?;
            let old_owner = (*args.old_owner).as_ref().map(ToString::to_string);
            let new_owner = (*args.new_owner).as_ref().map(ToString::to_string);
            let change = classify_owner_change(old_owner.as_deref(), new_owner.as_deref())?;
            Some(BusChange::new(args.name.into(), change))
        });

    let mut existing = Vec::new();
    for name in proxy
        .list_names()
        .await
        .context("Failed to list currently-owned names on DBus")?
    {
        if !is_managed_name(&name) {
            continue;
        }
        match proxy.get_name_owner(name.inner().clone()).await {
            Ok(owner) => existing.push(BusChange::new(
                name,
                BusActivity::Created {
                    owner: owner.to_string(),
                },
            )),
            Err(e) => tracing::warn!(%name, ?e, "Could not get owner for name"),
        }
    }
    tracing::debug!(count = existing.len(), "Found players already on the bus");

    Ok(iter(existing)
        .chain(new_activities)
        .filter(BusChange::is_mpris))
}
