//! Ordered bookkeeping of every player the broker knows about.
//!
//! Players live in exactly one of two containers: the active queue, whose head is the active
//! player, or the pending set of candidates whose mandatory properties are still being fetched.
//! One pending candidate may be marked for promotion, meaning it becomes head instead of being
//! appended once it is ready.

use std::collections::VecDeque;

use crate::player::{Player, PlayerId};

/// How to look a player up
#[derive(Clone, Copy, Debug)]
pub enum Lookup<'a> {
    Id(PlayerId),
    Unique(&'a str),
    WellKnown(&'a str),
}
impl Lookup<'_> {
    fn matches(&self, player: &Player) -> bool {
        match *self {
            Self::Id(id) => player.id == id,
            Self::Unique(unique) => player.unique == unique,
            Self::WellKnown(name) => player.well_known == name,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    active: VecDeque<Player>,
    pending: Vec<Player>,
    promotion: Option<PlayerId>,
}

impl Registry {
    #[must_use]
    pub fn find(&self, lookup: Lookup<'_>) -> Option<&Player> {
        self.active
            .iter()
            .chain(&self.pending)
            .find(|p| lookup.matches(p))
    }

    pub fn find_mut(&mut self, lookup: Lookup<'_>) -> Option<&mut Player> {
        self.active
            .iter_mut()
            .chain(&mut self.pending)
            .find(|p| lookup.matches(p))
    }

    #[must_use]
    pub fn active_head(&self) -> Option<&Player> {
        self.active.front()
    }

    pub fn active_head_mut(&mut self) -> Option<&mut Player> {
        self.active.front_mut()
    }

    #[must_use]
    pub fn is_pending(&self, id: PlayerId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    #[must_use]
    pub const fn promotion_marker(&self) -> Option<PlayerId> {
        self.promotion
    }

    /// Mark a pending candidate to become head as soon as it is ready
    pub fn set_promotion_marker(&mut self, id: PlayerId) {
        debug_assert!(self.is_pending(id), "only pending players can be promoted");
        self.promotion = Some(id);
    }

    /// Take a player out of both containers without touching the promotion marker
    fn take(&mut self, id: PlayerId) -> Option<Player> {
        if let Some(index) = self.active.iter().position(|p| p.id == id) {
            return self.active.remove(index);
        }
        let index = self.pending.iter().position(|p| p.id == id)?;
        Some(self.pending.remove(index))
    }

    /// Make a player the active one. Clears the promotion marker.
    ///
    /// Returns `false` if the player is unknown.
    pub fn set_active(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.take(id) else {
            return false;
        };
        self.active.push_front(player);
        self.promotion = None;
        true
    }

    /// Move a player to the back of the active queue.
    ///
    /// Returns `false` if the player is unknown.
    pub fn append(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.take(id) else {
            return false;
        };
        self.active.push_back(player);
        true
    }

    /// Track a new candidate. Any player with the same id is replaced.
    pub fn add_pending(&mut self, player: Player) {
        self.take(player.id);
        self.pending.push(player);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        if self.promotion == Some(id) {
            self.promotion = None;
        }
        self.take(id)
    }

    /// Move the head to the back of the queue and return the new head
    pub fn rotate_head_to_tail(&mut self) -> Option<&Player> {
        if let Some(head) = self.active.pop_front() {
            self.active.push_back(head);
        }
        self.active.front()
    }

    /// Move the tail to the front of the queue and return the new head
    pub fn rotate_tail_to_head(&mut self) -> Option<&Player> {
        if let Some(tail) = self.active.pop_back() {
            self.active.push_front(tail);
        }
        self.active.front()
    }

    /// Well-known names of the active queue, head first
    #[must_use]
    pub fn player_names(&self) -> Vec<String> {
        self.active.iter().map(|p| p.well_known.clone()).collect()
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn player(id: u64) -> Player {
        Player::new(
            PlayerId(id),
            format!(":1.{id}"),
            format!("org.mpris.MediaPlayer2.p{id}"),
        )
    }

    fn ids(registry: &Registry) -> Vec<u64> {
        registry.active.iter().map(|p| p.id.0).collect()
    }

    fn assert_unique(registry: &Registry) {
        let mut seen = HashSet::new();
        for p in registry.active.iter().chain(&registry.pending) {
            assert!(seen.insert(p.well_known.clone()), "{} tracked twice", p.well_known);
        }
    }

    #[test]
    fn promotion_moves_pending_to_head() {
        let mut registry = Registry::default();
        registry.add_pending(player(1));
        registry.append(PlayerId(1));
        registry.add_pending(player(2));
        registry.set_promotion_marker(PlayerId(2));

        assert!(registry.set_active(PlayerId(2)));
        assert_eq!(ids(&registry), [2, 1]);
        assert_eq!(registry.promotion_marker(), None);
        assert_eq!(registry.pending_len(), 0);
        assert_unique(&registry);
    }

    #[test]
    fn append_goes_to_tail() {
        let mut registry = Registry::default();
        for id in 1..=3 {
            registry.add_pending(player(id));
            registry.append(PlayerId(id));
        }
        assert_eq!(ids(&registry), [1, 2, 3]);

        registry.append(PlayerId(1));
        assert_eq!(ids(&registry), [2, 3, 1]);
        assert_unique(&registry);
    }

    #[test]
    fn remove_clears_promotion_marker() {
        let mut registry = Registry::default();
        registry.add_pending(player(1));
        registry.set_promotion_marker(PlayerId(1));

        let removed = registry.remove(PlayerId(1)).unwrap();
        assert_eq!(removed.id, PlayerId(1));
        assert_eq!(registry.promotion_marker(), None);
        assert!(registry.find(Lookup::Id(PlayerId(1))).is_none());
        assert!(registry.remove(PlayerId(1)).is_none());
    }

    #[test]
    fn set_active_clears_unrelated_marker() {
        let mut registry = Registry::default();
        registry.add_pending(player(1));
        registry.append(PlayerId(1));
        registry.add_pending(player(2));
        registry.set_promotion_marker(PlayerId(2));

        registry.set_active(PlayerId(1));
        assert_eq!(registry.promotion_marker(), None);
        assert!(registry.is_pending(PlayerId(2)));
    }

    #[test]
    fn rotation() {
        let mut registry = Registry::default();
        assert!(registry.rotate_head_to_tail().is_none());
        assert!(registry.rotate_tail_to_head().is_none());

        for id in 1..=3 {
            registry.add_pending(player(id));
            registry.append(PlayerId(id));
        }
        assert_eq!(registry.rotate_head_to_tail().map(|p| p.id), Some(PlayerId(2)));
        assert_eq!(ids(&registry), [2, 3, 1]);
        assert_eq!(registry.rotate_tail_to_head().map(|p| p.id), Some(PlayerId(1)));
        assert_eq!(ids(&registry), [1, 2, 3]);
        assert_unique(&registry);
    }

    #[test]
    fn rotation_of_single_player_keeps_head() {
        let mut registry = Registry::default();
        registry.add_pending(player(1));
        registry.append(PlayerId(1));
        assert_eq!(registry.rotate_head_to_tail().map(|p| p.id), Some(PlayerId(1)));
        assert_eq!(registry.rotate_tail_to_head().map(|p| p.id), Some(PlayerId(1)));
    }

    #[test]
    fn lookups() {
        let mut registry = Registry::default();
        registry.add_pending(player(1));
        registry.add_pending(player(2));
        registry.append(PlayerId(2));

        assert_eq!(registry.find(Lookup::Unique(":1.1")).map(|p| p.id), Some(PlayerId(1)));
        assert_eq!(
            registry
                .find(Lookup::WellKnown("org.mpris.MediaPlayer2.p2"))
                .map(|p| p.id),
            Some(PlayerId(2))
        );
        registry.find_mut(Lookup::Id(PlayerId(2))).unwrap().unique = ":1.9".to_owned();
        assert_eq!(registry.find(Lookup::Unique(":1.9")).map(|p| p.id), Some(PlayerId(2)));
        assert_eq!(registry.player_names(), ["org.mpris.MediaPlayer2.p2"]);
    }
}
