use super::Broker;
use crate::{
    dbus::MprisInterface,
    registry::Lookup,
    transport::{Bus, Emission},
    utils::{property_refs, try_clone_properties, PropertyMap},
};

/// A signal sent by a player that the broker cares about
#[derive(Debug)]
pub enum PlayerSignal {
    PropertiesChanged {
        interface: MprisInterface,
        changed: PropertyMap,
        invalidated: Vec<String>,
    },
    Seeked(i64),
}

impl PlayerSignal {
    fn emission(&self) -> Emission<'_> {
        match self {
            Self::PropertiesChanged {
                interface,
                changed,
                invalidated,
            } => Emission::PropertiesChanged {
                interface: interface.name(),
                changed: property_refs(changed),
                invalidated: invalidated.iter().map(String::as_str).collect(),
            },
            Self::Seeked(position) => Emission::Seeked(*position),
        }
    }
}

impl<B: Bus> Broker<B> {
    /// Update caches from a player's signal, make the player active if it did something, and
    /// relay the signal if it comes from the active player.
    pub async fn on_player_signal(&mut self, sender: &str, signal: PlayerSignal) {
        let Some(player) = self.registry.find(Lookup::Unique(sender)) else {
            return;
        };
        let id = player.id;
        tracing::debug!(player = %player.well_known, ?signal, "Got player signal");

        if self.registry.is_pending(id) {
            // Fetch completion will capture the current state
            tracing::debug!(%id, "Dropping signal from player whose properties are still being fetched");
            return;
        }
        let Some(player) = self.registry.find_mut(Lookup::Id(id)) else {
            return;
        };

        let changed = match &signal {
            PlayerSignal::PropertiesChanged {
                interface, changed, ..
            } => match try_clone_properties(changed) {
                Ok(update) => player.apply_update(*interface, update),
                Err(e) => {
                    tracing::warn!(player = %player.well_known, ?e, "Could not copy changed properties");
                    return;
                }
            },
            PlayerSignal::Seeked(position) => {
                player.position = *position;
                true
            }
        };

        let previous = self.active_id();
        if changed && previous != Some(id) {
            tracing::info!(%id, "New active player");
            self.registry.set_active(id);
            self.settle(previous).await;
        }

        if self.active_id() == Some(id) {
            self.emit(signal.emission()).await;
        }
    }
}
