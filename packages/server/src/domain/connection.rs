//! Connection capability.
//!
//! A connection is anything that can carry [`ChatEvent`]s to one client
//! session. The room and the use cases only ever see this trait, so the
//! websocket adapter and the in-process channel connection are
//! interchangeable.

use std::sync::Arc;

use super::{ChatEvent, ConnectionError, ConnectionId};

/// Handle for sending events to and closing one client session
///
/// No method may block the caller: `send` either enqueues the event or fails
/// fast.
pub trait Connection: Send + Sync {
    /// Identity of this session
    fn id(&self) -> ConnectionId;

    /// Enqueue an event for delivery.
    ///
    /// Returns [`ConnectionError::Closed`] once the connection is closed.
    fn send(&self, event: ChatEvent) -> Result<(), ConnectionError>;

    /// Close the connection. A second call is a no-op success.
    fn close(&self) -> Result<(), ConnectionError>;

    fn is_closed(&self) -> bool;
}

/// Connections are shared between the room that owns them and the transport
/// task that drives them.
pub type SharedConnection = Arc<dyn Connection>;
