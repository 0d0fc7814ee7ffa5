use crate::connection::ConnectionEvent;
use std::collections::HashMap;
use system::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Fire-and-forget: a full or closed queue drops the event. Returns
    /// `false` once the receiving side of the queue is gone.
    pub fn send(&mut self, to: &ConnectionId, message: ConnectionEvent) -> bool {
        if let Some(tx) = self.connection_txs.get_mut(to) {
            match tx.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Outbound queue of connection {} is full, dropping event", to);
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Connection {} is already closed, dropping event", to);
                    false
                }
            }
        } else {
            log::warn!("Unknown connection {}, dropping event", to);
            false
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }
}
