//! `org.freedesktop.DBus.Properties` as exposed by an MPRIS player object.
//!
//! Every call carries the no-auto-start flag: addressing a player must never launch one.

use std::collections::HashMap;

use zbus::{proxy, zvariant::OwnedValue};

#[proxy(
    interface = "org.freedesktop.DBus.Properties",
    default_path = "/org/mpris/MediaPlayer2",
    gen_blocking = false
)]
pub trait PlayerProperties {
    /// GetAll method
    #[zbus(no_autostart)]
    fn get_all(&self, interface_name: &str) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Get method
    #[zbus(no_autostart)]
    fn get(&self, interface_name: &str, property_name: &str) -> zbus::Result<OwnedValue>;
}
