//! Roster state machine.
//!
//! The roster is the shared state mapping: connection id -> last-known
//! player record. It is pure state with no IO, exposed only through the
//! lifecycle operations below so a single event-loop task can own it.
//!
//! Invariant: exactly one entry per currently-connected client, none for
//! disconnected clients. There are no cross-record invariants.

use std::collections::HashMap;

use relay_shared::net::ClientId;
use relay_shared::player::PlayerRecord;

/// Mapping from connection id to last-known player record.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<ClientId, PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect: insert the default record for a fresh connection.
    /// Returns the inserted record.
    pub fn on_connect(&mut self, id: ClientId) -> PlayerRecord {
        let record = PlayerRecord::spawn_default();
        self.players.insert(id, record);
        record
    }

    /// Create-player: look up the caller's own record. A missing key is
    /// tolerated (returns `None`), never a fault.
    pub fn on_create_player(&self, id: ClientId) -> Option<PlayerRecord> {
        self.players.get(&id).copied()
    }

    /// Update-box: wholesale replacement of the caller's record. Last
    /// write wins, no merging. The record must pass validation; a
    /// rejected record leaves the mapping untouched.
    pub fn on_update_box(&mut self, id: ClientId, record: PlayerRecord) -> anyhow::Result<()> {
        record.validate()?;
        self.players.insert(id, record);
        Ok(())
    }

    /// Disconnect: remove the entry. Returns whether it was present.
    pub fn on_disconnect(&mut self, id: ClientId) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn get(&self, id: ClientId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Connected ids in stable order, for status output.
    pub fn sorted_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Clones the full mapping for an `update-players` broadcast.
    pub fn snapshot(&self) -> HashMap<ClientId, PlayerRecord> {
        self.players.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::math::{Quat, Vec3};
    use relay_shared::player::SPAWN_POSITION;

    fn record_at(pos: Vec3) -> PlayerRecord {
        PlayerRecord {
            position: pos,
            color: 0x336699,
            quaternion: Quat::IDENTITY,
        }
    }

    #[test]
    fn connect_inserts_default_record() {
        let mut roster = Roster::new();
        let id = ClientId(1);
        let rec = roster.on_connect(id);
        assert_eq!(rec.position, SPAWN_POSITION);
        assert_eq!(rec.quaternion, Quat::IDENTITY);
        assert_eq!(roster.get(id), Some(&rec));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn mapping_tracks_exactly_the_connected_ids() {
        let mut roster = Roster::new();
        let (a, b, c) = (ClientId(1), ClientId(2), ClientId(3));

        roster.on_connect(a);
        roster.on_connect(b);
        roster.on_connect(c);
        assert_eq!(roster.sorted_ids(), vec![a, b, c]);

        roster
            .on_update_box(b, record_at(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert_eq!(roster.sorted_ids(), vec![a, b, c]);

        roster.on_disconnect(a);
        assert_eq!(roster.sorted_ids(), vec![b, c]);
        assert!(!roster.contains(a));

        roster.on_disconnect(b);
        roster.on_disconnect(c);
        assert!(roster.is_empty());
    }

    #[test]
    fn update_is_last_write_wins() {
        let mut roster = Roster::new();
        let id = ClientId(1);
        roster.on_connect(id);

        let first = record_at(Vec3::new(1.0, 2.0, 3.0));
        let second = record_at(Vec3::new(9.0, 8.0, 7.0));
        roster.on_update_box(id, first).unwrap();
        roster.on_update_box(id, second).unwrap();
        assert_eq!(roster.get(id), Some(&second));
    }

    #[test]
    fn identical_update_is_idempotent() {
        let mut roster = Roster::new();
        let id = ClientId(1);
        roster.on_connect(id);

        let rec = record_at(Vec3::new(4.0, 5.0, 6.0));
        roster.on_update_box(id, rec).unwrap();
        let snap1 = roster.snapshot();
        roster.on_update_box(id, rec).unwrap();
        let snap2 = roster.snapshot();
        assert_eq!(snap1, snap2);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn create_player_tolerates_missing_key() {
        let roster = Roster::new();
        assert_eq!(roster.on_create_player(ClientId(42)), None);
    }

    #[test]
    fn rejected_update_leaves_prior_record() {
        let mut roster = Roster::new();
        let id = ClientId(1);
        let original = roster.on_connect(id);

        let mut bad = record_at(Vec3::new(0.0, 0.0, 0.0));
        bad.position.x = f32::NAN;
        assert!(roster.on_update_box(id, bad).is_err());
        assert_eq!(roster.get(id), Some(&original));
    }

    #[test]
    fn disconnected_id_absent_from_snapshot() {
        let mut roster = Roster::new();
        let (a, b) = (ClientId(1), ClientId(2));
        roster.on_connect(a);
        roster.on_connect(b);
        roster.on_disconnect(a);

        let snap = roster.snapshot();
        assert!(!snap.contains_key(&a));
        assert!(snap.contains_key(&b));
    }
}
