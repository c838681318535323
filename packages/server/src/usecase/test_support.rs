//! Shared fixtures for the use case tests.

use std::{sync::Arc, time::Duration};

use hiroba_shared::time::FixedClock;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatEvent, RoomId, RoomRegistry},
    infrastructure::repository::{InMemoryMessageStore, InMemoryRoomDirectory},
};

use super::{
    ConnectParticipantUseCase, DisconnectParticipantUseCase, GetMessagesUseCase,
    SendMessageUseCase,
};

pub(crate) struct Fixture {
    pub registry: Arc<RoomRegistry>,
    pub store: Arc<InMemoryMessageStore>,
    pub directory: Arc<InMemoryRoomDirectory>,
    pub clock: Arc<FixedClock>,
    /// A room known to the directory
    pub room_id: RoomId,
}

impl Fixture {
    pub const NOW: i64 = 1_700_000_000_000;
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        let room_id = RoomId::generate();
        Self {
            registry: Arc::new(RoomRegistry::new()),
            store: Arc::new(InMemoryMessageStore::new()),
            directory: Arc::new(InMemoryRoomDirectory::with_rooms([room_id])),
            clock: Arc::new(FixedClock::new(Self::NOW)),
            room_id,
        }
    }

    pub fn connect_usecase(&self) -> ConnectParticipantUseCase {
        ConnectParticipantUseCase::new(
            self.registry.clone(),
            self.directory.clone(),
            self.store.clone(),
            self.clock.clone(),
            Self::TIMEOUT,
        )
    }

    pub fn disconnect_usecase(&self) -> DisconnectParticipantUseCase {
        DisconnectParticipantUseCase::new(
            self.registry.clone(),
            self.store.clone(),
            self.clock.clone(),
            Self::TIMEOUT,
        )
    }

    pub fn send_usecase(&self) -> SendMessageUseCase {
        SendMessageUseCase::new(
            self.registry.clone(),
            self.store.clone(),
            self.clock.clone(),
            Self::TIMEOUT,
        )
    }

    pub fn get_messages_usecase(&self) -> GetMessagesUseCase {
        GetMessagesUseCase::new(self.store.clone(), Self::TIMEOUT)
    }
}

/// Take every event currently queued on a channel connection
pub(crate) fn drain(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
