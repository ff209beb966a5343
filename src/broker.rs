mod broadcast;
mod relay;

pub use relay::PlayerSignal;

use std::time::Duration;

use anyhow::anyhow;
use tokio::time::timeout;
use tracing::instrument;

use crate::{
    dbus::MprisInterface,
    player::{Player, PlayerId},
    registry::{Lookup, Registry},
    transport::{Bus, Emission, FetchOutcome, FetchRequest},
    utils::property_refs,
};

/// Longest the reactor waits for a new active player to report its position
const POSITION_TIMEOUT: Duration = Duration::from_secs(1);

/// The broker's whole state. Every method runs to completion on the event loop, so the registry
/// is consistent whenever none of them is running.
pub struct Broker<B> {
    bus: B,
    registry: Registry,
    next_id: u64,
}

impl<B: Bus> Broker<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            registry: Registry::default(),
            next_id: 0,
        }
    }

    #[cfg(test)]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn active_player(&self) -> Option<&Player> {
        self.registry.active_head()
    }

    #[must_use]
    pub fn player_names(&self) -> Vec<String> {
        self.registry.player_names()
    }

    fn active_id(&self) -> Option<PlayerId> {
        self.registry.active_head().map(|p| p.id)
    }

    /// A player took ownership of a managed name
    #[instrument(skip(self))]
    pub async fn on_player_appeared(&mut self, well_known: &str, unique: &str) {
        if let Some(player) = self.registry.find(Lookup::WellKnown(well_known)) {
            let id = player.id;
            if self.registry.is_pending(id) {
                // Its outstanding requests went to the previous owner
                tracing::debug!(%id, "Replacing candidate that was still being fetched");
                self.registry.remove(id);
            } else {
                if let Some(player) = self.registry.find_mut(Lookup::Id(id)) {
                    player.unique = unique.to_owned();
                }
                let previous = self.active_id();
                if previous != Some(id) {
                    tracing::debug!(%id, "Player already managed, setting to active");
                    self.registry.set_active(id);
                    self.settle(previous).await;
                }
                return;
            }
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;
        tracing::info!(%id, "New player registered, fetching its properties");
        self.registry.add_pending(Player::new(id, unique, well_known));
        self.registry.set_promotion_marker(id);
        for interface in MprisInterface::ALL {
            self.bus.fetch_properties(FetchRequest {
                id,
                unique: unique.to_owned(),
                interface,
            });
        }
    }

    /// A player released its managed name
    #[instrument(skip(self))]
    pub async fn on_player_vanished(&mut self, well_known: &str) {
        let Some(id) = self
            .registry
            .find(Lookup::WellKnown(well_known))
            .map(|p| p.id)
        else {
            tracing::debug!("Name not found in queue");
            return;
        };
        let previous = self.active_id();
        self.registry.remove(id);
        tracing::info!(%id, "Player removed");
        self.settle(previous).await;
    }

    /// A background `GetAll` completed
    #[instrument(skip_all, fields(id = %outcome.id, interface = outcome.interface.name()))]
    pub async fn on_properties_fetched(&mut self, outcome: FetchOutcome) {
        let FetchOutcome {
            id,
            interface,
            result,
        } = outcome;
        let Some(player) = self.registry.find_mut(Lookup::Id(id)) else {
            tracing::debug!("Properties arrived for a player that is gone");
            return;
        };

        let properties = match result {
            Ok(p) => p,
            Err(e) if interface.is_mandatory() => {
                tracing::warn!(player = %player.well_known, ?e, "Could not get mandatory properties, dropping player");
                let previous = self.active_id();
                self.registry.remove(id);
                self.settle(previous).await;
                return;
            }
            Err(e) => {
                tracing::debug!(player = %player.well_known, ?e, "Optional interface not supported");
                player.set_supported(interface, false);
                return;
            }
        };

        tracing::debug!(player = %player.well_known, "Got all properties");
        player.set_supported(interface, true);
        player.apply_update(interface, properties);
        let ready = player.is_ready();

        if !self.registry.is_pending(id) {
            if !interface.is_mandatory() && self.active_id() == Some(id) {
                self.emit_interface_snapshot(interface).await;
            }
            return;
        }
        if !ready {
            return;
        }

        let previous = self.active_id();
        if self.registry.promotion_marker() == Some(id) {
            self.registry.set_active(id);
        } else {
            self.registry.append(id);
        }
        if let Some(player) = self.registry.find(Lookup::Id(id)) {
            tracing::info!(player = %player.well_known, identity = player.identity(), "Player is ready");
        }
        self.settle(previous).await;
    }

    /// Move the active player to the back of the queue. Returns the new active player.
    pub async fn shift(&mut self) -> Option<String> {
        let previous = self.active_id()?;
        self.registry.rotate_head_to_tail();
        self.settle(Some(previous)).await;
        self.registry.active_head().map(|p| p.well_known.clone())
    }

    /// Make the least recently active player active. Returns the new active player.
    pub async fn unshift(&mut self) -> Option<String> {
        let previous = self.active_id()?;
        self.registry.rotate_tail_to_head();
        self.settle(Some(previous)).await;
        self.registry.active_head().map(|p| p.well_known.clone())
    }

    /// Announce a new active player if the head differs from `previous`
    async fn settle(&mut self, previous: Option<PlayerId>) {
        if self.active_id() == previous {
            return;
        }
        tracing::debug!(
            active = self.registry.active_len(),
            pending = self.registry.pending_len(),
            "Active player changed"
        );
        self.refresh_active_position().await;
        self.broadcast_active_player_changed().await;
    }

    async fn refresh_active_position(&mut self) {
        let Some(unique) = self.registry.active_head().map(|p| p.unique.clone()) else {
            return;
        };
        let position = match timeout(POSITION_TIMEOUT, self.bus.position(&unique)).await {
            Ok(position) => position,
            Err(_) => Err(anyhow!("No answer within {POSITION_TIMEOUT:?}")),
        };
        let Some(head) = self.registry.active_head_mut() else {
            return;
        };
        head.position = position.unwrap_or_else(|e| {
            tracing::warn!(player = %head.well_known, ?e, "Could not update player position");
            0
        });
    }

    async fn emit_interface_snapshot(&self, interface: MprisInterface) {
        let Some(properties) = self
            .registry
            .active_head()
            .and_then(|p| p.properties(interface))
        else {
            return;
        };
        self.emit(Emission::PropertiesChanged {
            interface: interface.name(),
            changed: property_refs(properties),
            invalidated: Vec::new(),
        })
        .await;
    }

    async fn emit(&self, emission: Emission<'_>) {
        if let Err(e) = self.bus.emit(emission).await {
            tracing::warn!(?e, "Could not emit signal");
        }
    }
}
