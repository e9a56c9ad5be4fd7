use dashmap::DashSet;

use wstether_core::protocol::Envelope;

/// Rooms this client asked to join and has not left.
///
/// Optimistic: a room is recorded on request, whether or not the request
/// reached the server. Writes happen under the connection manager's lock;
/// reads are lock-free.
#[derive(Default)]
pub struct RoomMembership {
    rooms: DashSet<String>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self {
            rooms: DashSet::new(),
        }
    }

    /// Returns true if the room was not already recorded.
    pub fn join(&self, room_id: &str) -> bool {
        self.rooms.insert(room_id.to_string())
    }

    /// Returns true if the room was recorded.
    pub fn leave(&self, room_id: &str) -> bool {
        self.rooms.remove(room_id).is_some()
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn clear(&self) {
        self.rooms.clear();
    }

    /// Sorted copy of the current set.
    pub fn snapshot(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.rooms.iter().map(|r| r.key().clone()).collect();
        rooms.sort();
        rooms
    }

    /// JOIN_ROOM envelopes for every recorded room, for an application that
    /// chooses to replay membership after a reconnect.
    pub fn replay_envelopes(&self) -> Vec<Envelope> {
        self.snapshot().into_iter().map(Envelope::join_room).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wstether_core::protocol::EnvelopeKind;

    #[test]
    fn join_and_leave_are_idempotent() {
        let m = RoomMembership::new();
        assert!(m.join("room-42"));
        assert!(!m.join("room-42"));
        assert_eq!(m.len(), 1);
        assert!(m.leave("room-42"));
        assert!(!m.leave("room-42"));
        assert!(m.is_empty());
    }

    #[test]
    fn snapshot_is_sorted() {
        let m = RoomMembership::new();
        m.join("b");
        m.join("c");
        m.join("a");
        assert_eq!(m.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn replay_builds_join_envelopes() {
        let m = RoomMembership::new();
        m.join("lobby");
        m.join("dev");
        let replay = m.replay_envelopes();
        assert_eq!(replay.len(), 2);
        assert!(replay.iter().all(|e| e.kind() == &EnvelopeKind::JoinRoom));
        assert_eq!(replay[0].room_id(), Some("dev"));
        assert_eq!(replay[1].room_id(), Some("lobby"));
    }
}
