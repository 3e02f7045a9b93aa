//! Room manager: the fixed set of rooms and who is in each.

use std::collections::HashMap;

use hearth_protocol::{ConnectionId, RoomId};

use crate::{Room, RoomError};

/// Tracks membership for every room.
///
/// Rooms are created up front from configuration and live for the whole
/// server run. A connection may be a member of at most one room; callers
/// uphold that by only ever entering the world through
/// [`add_member`](Self::add_member) and moving with
/// [`transfer`](Self::transfer).
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
}

impl RoomManager {
    /// Creates a manager holding one empty room per id. Duplicates collapse.
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = RoomId>,
    {
        let rooms = ids
            .into_iter()
            .map(|id| (id.clone(), Room::new(id)))
            .collect();
        Self { rooms }
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn get(&self, room: &RoomId) -> Option<&Room> {
        self.rooms.get(room)
    }

    /// Adds `conn` to `room`.
    ///
    /// # Errors
    /// - [`RoomError::UnknownRoom`] if `room` does not exist
    /// - [`RoomError::AlreadyMember`] if `conn` is already inside
    pub fn add_member(
        &mut self,
        room: &RoomId,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        let target = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| RoomError::UnknownRoom(room.clone()))?;
        if !target.insert(conn) {
            return Err(RoomError::AlreadyMember(conn, room.clone()));
        }
        tracing::debug!(%conn, %room, members = target.len(), "joined room");
        Ok(())
    }

    /// Removes `conn` from `room`.
    ///
    /// # Errors
    /// - [`RoomError::UnknownRoom`] if `room` does not exist
    /// - [`RoomError::NotMember`] if `conn` was not inside
    pub fn remove_member(
        &mut self,
        room: &RoomId,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        let target = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| RoomError::UnknownRoom(room.clone()))?;
        if !target.remove(conn) {
            return Err(RoomError::NotMember(conn, room.clone()));
        }
        tracing::debug!(%conn, %room, members = target.len(), "left room");
        Ok(())
    }

    /// Moves `conn` from `from` to `to`.
    ///
    /// Every precondition is checked before anything changes, so on error
    /// both rooms are exactly as they were.
    ///
    /// # Errors
    /// - [`RoomError::UnknownRoom`] if either room does not exist
    /// - [`RoomError::NotMember`] if `conn` is not in `from`
    /// - [`RoomError::AlreadyMember`] if `from == to`
    pub fn transfer(
        &mut self,
        conn: ConnectionId,
        from: &RoomId,
        to: &RoomId,
    ) -> Result<(), RoomError> {
        let source = self
            .rooms
            .get(from)
            .ok_or_else(|| RoomError::UnknownRoom(from.clone()))?;
        let dest = self
            .rooms
            .get(to)
            .ok_or_else(|| RoomError::UnknownRoom(to.clone()))?;
        if !source.contains(conn) {
            return Err(RoomError::NotMember(conn, from.clone()));
        }
        if dest.contains(conn) {
            return Err(RoomError::AlreadyMember(conn, to.clone()));
        }

        if let Some(source) = self.rooms.get_mut(from) {
            source.remove(conn);
        }
        if let Some(dest) = self.rooms.get_mut(to) {
            dest.insert(conn);
        }
        tracing::info!(%conn, %from, %to, "room transfer");
        Ok(())
    }

    /// Members of `room` in ascending id order; empty for unknown rooms.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|r| r.members().collect())
            .unwrap_or_default()
    }

    /// The room `conn` is in, if any. Linear in the number of rooms.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.rooms
            .values()
            .find(|r| r.contains(conn))
            .map(Room::id)
    }

    /// Total membership across all rooms.
    pub fn member_count(&self) -> usize {
        self.rooms.values().map(Room::len).sum()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
