use system::{ConnectionId, DocumentLimits, SessionDocument};

/// A session as the server sees it: the shared document plus the broadcast
/// group of connections that joined it.
pub struct Session {
    pub connections: Vec<ConnectionId>,
    pub document: SessionDocument,
}

impl Session {
    pub fn new(limits: &DocumentLimits) -> Self {
        Self {
            connections: Vec::new(),
            document: SessionDocument::new(limits),
        }
    }

    pub fn add_connection(&mut self, connection_id: ConnectionId) {
        if !self.connections.contains(&connection_id) {
            self.connections.push(connection_id);
        }
    }

    pub fn remove_connection(&mut self, connection_id: &ConnectionId) {
        self.connections.retain(|c| c != connection_id);
    }
}
