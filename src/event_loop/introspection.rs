use crate::dbus::MPRIS_PATH;

/// Introspection data of the broker's object
pub const OBJECT_XML: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
 "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
  <interface name="org.freedesktop.DBus.Introspectable">
    <method name="Introspect">
      <arg name="xml_data" type="s" direction="out"/>
    </method>
  </interface>
  <interface name="org.freedesktop.DBus.Peer">
    <method name="Ping"/>
  </interface>
  <interface name="org.freedesktop.DBus.Properties">
    <method name="Get">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="property_name" type="s" direction="in"/>
      <arg name="value" type="v" direction="out"/>
    </method>
    <method name="GetAll">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="properties" type="a{sv}" direction="out"/>
    </method>
    <method name="Set">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="property_name" type="s" direction="in"/>
      <arg name="value" type="v" direction="in"/>
    </method>
    <signal name="PropertiesChanged">
      <arg name="interface_name" type="s"/>
      <arg name="changed_properties" type="a{sv}"/>
      <arg name="invalidated_properties" type="as"/>
    </signal>
  </interface>
  <interface name="com.github.altdesktop.playerctld">
    <method name="Shift">
      <arg name="Player" type="s" direction="out"/>
    </method>
    <method name="Unshift">
      <arg name="Player" type="s" direction="out"/>
    </method>
    <property name="PlayerNames" type="as" access="read"/>
    <signal name="ActivePlayerChangeBegin">
      <arg name="Name" type="s"/>
    </signal>
    <signal name="ActivePlayerChangeEnd">
      <arg name="Name" type="s"/>
    </signal>
  </interface>
  <interface name="org.mpris.MediaPlayer2">
    <method name="Raise"/>
    <method name="Quit"/>
    <property name="CanQuit" type="b" access="read"/>
    <property name="Fullscreen" type="b" access="readwrite"/>
    <property name="CanSetFullscreen" type="b" access="read"/>
    <property name="CanRaise" type="b" access="read"/>
    <property name="HasTrackList" type="b" access="read"/>
    <property name="Identity" type="s" access="read"/>
    <property name="DesktopEntry" type="s" access="read"/>
    <property name="SupportedUriSchemes" type="as" access="read"/>
    <property name="SupportedMimeTypes" type="as" access="read"/>
  </interface>
  <interface name="org.mpris.MediaPlayer2.Player">
    <method name="Next"/>
    <method name="Previous"/>
    <method name="Pause"/>
    <method name="PlayPause"/>
    <method name="Stop"/>
    <method name="Play"/>
    <method name="Seek">
      <arg name="Offset" type="x" direction="in"/>
    </method>
    <method name="SetPosition">
      <arg name="TrackId" type="o" direction="in"/>
      <arg name="Offset" type="x" direction="in"/>
    </method>
    <method name="OpenUri">
      <arg name="Uri" type="s" direction="in"/>
    </method>
    <signal name="Seeked">
      <arg name="Position" type="x"/>
    </signal>
    <property name="PlaybackStatus" type="s" access="read"/>
    <property name="LoopStatus" type="s" access="readwrite"/>
    <property name="Rate" type="d" access="readwrite"/>
    <property name="Shuffle" type="b" access="readwrite"/>
    <property name="Metadata" type="a{sv}" access="read"/>
    <property name="Volume" type="d" access="readwrite"/>
    <property name="Position" type="x" access="read"/>
    <property name="MinimumRate" type="d" access="read"/>
    <property name="MaximumRate" type="d" access="read"/>
    <property name="CanGoNext" type="b" access="read"/>
    <property name="CanGoPrevious" type="b" access="read"/>
    <property name="CanPlay" type="b" access="read"/>
    <property name="CanPause" type="b" access="read"/>
    <property name="CanSeek" type="b" access="read"/>
    <property name="CanControl" type="b" access="read"/>
  </interface>
  <interface name="org.mpris.MediaPlayer2.TrackList">
    <method name="GetTracksMetadata">
      <arg name="TrackIds" type="ao" direction="in"/>
      <arg name="Metadata" type="aa{sv}" direction="out"/>
    </method>
    <method name="AddTrack">
      <arg name="Uri" type="s" direction="in"/>
      <arg name="AfterTrack" type="o" direction="in"/>
      <arg name="SetAsCurrent" type="b" direction="in"/>
    </method>
    <method name="RemoveTrack">
      <arg name="TrackId" type="o" direction="in"/>
    </method>
    <method name="GoTo">
      <arg name="TrackId" type="o" direction="in"/>
    </method>
    <property name="Tracks" type="ao" access="read">
      <annotation name="org.freedesktop.DBus.Property.EmitsChangedSignal" value="invalidates"/>
    </property>
    <property name="CanEditTracks" type="b" access="read"/>
    <signal name="TrackListReplaced">
      <arg name="Tracks" type="ao"/>
      <arg name="CurrentTrack" type="o"/>
    </signal>
    <signal name="TrackAdded">
      <arg name="Metadata" type="a{sv}"/>
      <arg name="AfterTrack" type="o"/>
    </signal>
    <signal name="TrackRemoved">
      <arg name="TrackId" type="o"/>
    </signal>
    <signal name="TrackMetadataChanged">
      <arg name="TrackId" type="o"/>
      <arg name="Metadata" type="a{sv}"/>
    </signal>
  </interface>
  <interface name="org.mpris.MediaPlayer2.Playlists">
    <method name="ActivatePlaylist">
      <arg name="PlaylistId" type="o" direction="in"/>
    </method>
    <method name="GetPlaylists">
      <arg name="Index" type="u" direction="in"/>
      <arg name="MaxCount" type="u" direction="in"/>
      <arg name="Order" type="s" direction="in"/>
      <arg name="ReverseOrder" type="b" direction="in"/>
      <arg name="Playlists" type="a(oss)" direction="out"/>
    </method>
    <property name="PlaylistCount" type="u" access="read"/>
    <property name="Orderings" type="as" access="read"/>
    <property name="ActivePlaylist" type="(b(oss))" access="read"/>
    <signal name="PlaylistChanged">
      <arg name="Playlist" type="(oss)"/>
    </signal>
  </interface>
</node>
"#;

/// Introspection data for a path above the broker's object, listing the next segment towards it.
/// Returns [`None`] if `path` is not an ancestor.
#[must_use]
pub fn ancestor_node(path: &str) -> Option<String> {
    let rest = if path == "/" {
        MPRIS_PATH.strip_prefix('/')?
    } else {
        MPRIS_PATH.strip_prefix(path)?.strip_prefix('/')?
    };
    let child = rest.split('/').next().filter(|c| !c.is_empty())?;
    Some(format!(
        "<node>\n  <interface name=\"org.freedesktop.DBus.Introspectable\">\n    \
         <method name=\"Introspect\">\n      <arg name=\"xml_data\" type=\"s\" direction=\"out\"/>\n    \
         </method>\n  </interface>\n  <node name=\"{child}\"/>\n</node>\n"
    ))
}
