//! Remote roster mirroring.
//!
//! The server sends discrete full-mapping broadcasts. The client keeps
//! the last two records per remote player and interpolates positions
//! between them so remote boxes move smoothly at render rate.

use std::collections::HashMap;

use relay_shared::{math::Vec3, net::ClientId, player::PlayerRecord};

#[derive(Debug, Clone, Copy)]
struct RemoteEntry {
    prev: PlayerRecord,
    latest: PlayerRecord,
}

/// Local mirror of every other client's record.
#[derive(Debug, Default)]
pub struct RemoteRoster {
    remotes: HashMap<ClientId, RemoteEntry>,
}

impl RemoteRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `update-players` broadcast: upserts every record
    /// except our own and drops proxies for ids no longer present.
    pub fn apply(&mut self, own_id: ClientId, mapping: &HashMap<ClientId, PlayerRecord>) {
        for (&id, &record) in mapping {
            if id == own_id {
                continue;
            }
            self.remotes
                .entry(id)
                .and_modify(|e| {
                    e.prev = e.latest;
                    e.latest = record;
                })
                .or_insert(RemoteEntry {
                    prev: record,
                    latest: record,
                });
        }
        self.remotes.retain(|id, _| mapping.contains_key(id));
    }

    /// Latest known record for a remote player.
    pub fn get(&self, id: ClientId) -> Option<&PlayerRecord> {
        self.remotes.get(&id).map(|e| &e.latest)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.remotes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }

    /// Interpolated position between the two most recent broadcasts.
    ///
    /// `alpha` in $[0,1]$ where 0 = older record, 1 = newer.
    pub fn interp_position(&self, id: ClientId, alpha: f32) -> Option<Vec3> {
        self.remotes
            .get(&id)
            .map(|e| e.prev.position.lerp(e.latest.position, alpha))
    }
}
