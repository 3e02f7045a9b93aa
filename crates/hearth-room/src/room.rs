//! A single room and its member set.

use std::collections::BTreeSet;

use hearth_protocol::{ConnectionId, RoomId};

/// A named partition of the world and the connections inside it.
///
/// Members are kept ordered so that broadcasts and roster snapshots come
/// out in the same order on every run.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: BTreeSet<ConnectionId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.contains(&conn)
    }

    /// Members in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `false` if `conn` was already a member.
    pub(crate) fn insert(&mut self, conn: ConnectionId) -> bool {
        self.members.insert(conn)
    }

    /// Returns `false` if `conn` was not a member.
    pub(crate) fn remove(&mut self, conn: ConnectionId) -> bool {
        self.members.remove(&conn)
    }
}
