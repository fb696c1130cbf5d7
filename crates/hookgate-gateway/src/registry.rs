//! Connection registry
//!
//! The single source of truth for "is this connection open". An identity is
//! present exactly while its connection is in the OPEN state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::connection::ConnectionHandle;

/// Concurrency-safe map of connection ID to live connection handle
///
/// Cloning is cheap and every clone sees the same connections. Operations on
/// one identity are atomic with respect to each other; different identities
/// live in different shards and do not contend.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new connection; its identity must not already be present
    pub fn register(&self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        match self.connections.entry(handle.id().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateIdentity(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Get a connection by ID
    pub fn lookup(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove a connection; removing an absent identity is a no-op
    pub fn remove(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .remove(connection_id)
            .map(|(_, handle)| handle)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Get all connection IDs
    pub fn ids(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Registry-related errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection identity already registered: {0}")]
    DuplicateIdentity(String),
}
