//! Room Registry: room id → Room, with create-on-first-join and
//! destroy-on-last-leave lifecycle.
//!
//! レジストリのロックは Room 自身のロックとは別物です。ロック順序は常に
//! 「レジストリ → Room」で、join と release_if_empty は同じレジストリロックの下で
//! 実行されるため、最後の切断と新規接続が競合しても接続が失われることはありません。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use super::{ConnectionId, Room, RoomId, SharedConnection, Timestamp, UserId};

/// Diagnostic view of one active room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRoom {
    pub room_id: RoomId,
    pub participant_ids: Vec<UserId>,
    pub last_activity: Timestamp,
}

/// Result of [`RoomRegistry::join`]
pub struct Joined {
    pub room: Arc<Room>,
    /// The room did not exist and was created by this join
    pub created: bool,
    /// Connection of the same user that was replaced and closed
    pub evicted: Option<ConnectionId>,
}

/// Concurrency-safe map of the rooms that currently have connections
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the room and register `connection` in it.
    ///
    /// The registration happens under the registry lock so that a concurrent
    /// [`release_if_empty`](Self::release_if_empty) cannot drop the room in
    /// between.
    pub async fn join(
        &self,
        room_id: RoomId,
        user_id: UserId,
        connection: SharedConnection,
        now: Timestamp,
    ) -> Joined {
        let mut rooms = self.rooms.lock().await;
        let mut created = false;
        let room = rooms
            .entry(room_id)
            .or_insert_with(|| {
                created = true;
                Arc::new(Room::new(room_id, now))
            })
            .clone();
        let evicted = room.add_connection(user_id, connection, now).await;
        if created {
            tracing::info!("Room '{}' activated", room_id);
        }
        Joined {
            room,
            created,
            evicted,
        }
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    pub async fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    /// Drop the room if it has no open connection left.
    ///
    /// Returns true if the room was removed.
    pub async fn release_if_empty(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room_id) else {
            return false;
        };
        if !room.is_empty().await {
            return false;
        }
        rooms.remove(room_id);
        tracing::info!("Room '{}' released (no connections left)", room_id);
        true
    }

    /// Number of active rooms
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    /// Snapshot of every active room, sorted by room id
    pub async fn snapshot(&self) -> Vec<ActiveRoom> {
        let rooms: Vec<Arc<Room>> = self.rooms.lock().await.values().cloned().collect();
        let mut active = Vec::with_capacity(rooms.len());
        for room in rooms {
            active.push(ActiveRoom {
                room_id: room.id(),
                participant_ids: room.participant_ids().await,
                last_activity: room.last_activity().await,
            });
        }
        active.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        active
    }
}
