//! Live sessions keyed by device.

use std::sync::Arc;

use dashmap::DashMap;
use ofswitch_types::DeviceRef;
use tracing::info;

use crate::error::{SessionError, SessionResult};
use crate::session::DeviceSession;

/// Registry of connected devices.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<DeviceRef, Arc<DeviceSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, closing any previous session for the same device.
    pub fn insert(&self, session: Arc<DeviceSession>) {
        let device = session.device();
        if let Some(previous) = self.sessions.insert(device, session) {
            info!(%device, "replacing existing session");
            previous.on_disconnect();
        }
    }

    /// Returns the live session for `device`.
    pub fn get(&self, device: DeviceRef) -> SessionResult<Arc<DeviceSession>> {
        self.sessions
            .get(&device)
            .map(|s| Arc::clone(s.value()))
            .filter(|s| !s.is_closed())
            .ok_or_else(|| SessionError::not_connected(device))
    }

    /// Removes and closes the session for `device`.
    pub fn remove(&self, device: DeviceRef) -> bool {
        match self.sessions.remove(&device) {
            Some((_, session)) => {
                session.on_disconnect();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
