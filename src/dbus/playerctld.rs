//! Client side of the broker's own interface, used by the one-shot sub-commands.

use zbus::proxy;

#[proxy(
    interface = "com.github.altdesktop.playerctld",
    default_service = "org.mpris.MediaPlayer2.playerctld",
    default_path = "/org/mpris/MediaPlayer2",
    gen_blocking = false
)]
pub trait Playerctld {
    /// Move the active player to the back of the queue and return the new active player
    #[zbus(no_autostart)]
    fn shift(&self) -> zbus::Result<String>;

    /// Make the least recently active player active and return it
    #[zbus(no_autostart)]
    fn unshift(&self) -> zbus::Result<String>;
}
