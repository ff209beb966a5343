use std::collections::HashMap;

use zbus::zvariant::Value;

use super::Broker;
use crate::{
    dbus::{MprisInterface, PLAYERCTLD_INTERFACE},
    transport::{Bus, Emission},
    utils::property_refs,
};

impl<B: Bus> Broker<B> {
    /// Tell clients the active player changed.
    ///
    /// Everything between `ActivePlayerChangeBegin` and `ActivePlayerChangeEnd` describes the new
    /// active player and is meant to be applied as one switch. With no active player, every
    /// property the previous one may have had is invalidated.
    pub(super) async fn broadcast_active_player_changed(&self) {
        let head = self.registry.active_head();
        let name = head.map_or("", |p| p.well_known.as_str());

        self.emit(Emission::ActivePlayerChangeBegin(name)).await;

        if let Some(player) = head {
            tracing::debug!(%name, "Emitting signals for new active player");
            for interface in MprisInterface::ALL {
                let Some(properties) = player.properties(interface) else {
                    continue;
                };
                self.emit(Emission::PropertiesChanged {
                    interface: interface.name(),
                    changed: property_refs(properties),
                    invalidated: Vec::new(),
                })
                .await;
            }
            tracing::debug!(position = player.position, "Sending Seeked signal");
            self.emit(Emission::Seeked(player.position)).await;
        } else {
            tracing::debug!("Emitting invalidated property signals, no active player");
            for interface in MprisInterface::ALL {
                self.emit(Emission::PropertiesChanged {
                    interface: interface.name(),
                    changed: HashMap::new(),
                    invalidated: interface.property_names().to_vec(),
                })
                .await;
            }
        }

        let player_names = Value::from(self.registry.player_names());
        self.emit(Emission::PropertiesChanged {
            interface: PLAYERCTLD_INTERFACE,
            changed: HashMap::from([("PlayerNames", &player_names)]),
            invalidated: Vec::new(),
        })
        .await;

        self.emit(Emission::ActivePlayerChangeEnd(name)).await;
    }
}
