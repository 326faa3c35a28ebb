//! Event channel between the session core and connected sockets.
//!
//! Each connection registers an unbounded sender; the socket task drains
//! the matching receiver. Sends never block, so they are safe to issue
//! while the session registry lock is held.

use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;
pub type ClientReceiver = mpsc::UnboundedReceiver<ServerMessage>;

#[derive(Clone, Default)]
pub struct Broadcaster {
    clients: Arc<RwLock<HashMap<ConnectionId, ClientSender>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiver its socket task drains
    pub fn register(&self, connection_id: &str) -> ClientReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(connection_id.to_string(), tx);
        }
        rx
    }

    pub fn unregister(&self, connection_id: &str) {
        if let Ok(mut clients) = self.clients.write() {
            clients.remove(connection_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Deliver a message to one connection
    pub fn send_to(&self, connection_id: &str, msg: ServerMessage) {
        let Ok(clients) = self.clients.read() else {
            return;
        };
        if let Some(tx) = clients.get(connection_id) {
            // A closed receiver means the socket is going away; its
            // disconnect handling will clean up membership.
            if tx.send(msg).is_err() {
                tracing::debug!("Dropped message for closed connection {}", connection_id);
            }
        }
    }

    /// Deliver a message to every listed connection
    pub fn send_to_all<'a, I>(&self, members: I, msg: &ServerMessage)
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let Ok(clients) = self.clients.read() else {
            return;
        };
        for id in members {
            if let Some(tx) = clients.get(id) {
                let _ = tx.send(msg.clone());
            }
        }
    }
}
