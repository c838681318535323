//! Collaborator implementations.

pub mod inmemory;

pub use inmemory::{InMemoryMessageStore, InMemoryRoomDirectory, InMemoryTokenValidator};
