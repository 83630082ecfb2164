use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};

use common::{PlayerId, ServerMessage, log};

use crate::games::GameBroadcaster;

pub type ClientSender = mpsc::Sender<ServerMessage>;

pub type ConnectionId = u64;

struct Binding {
    connection_id: ConnectionId,
    sender: ClientSender,
}

/// Routes messages addressed to an identity to whichever connection is
/// currently bound to it. At most one connection per identity.
#[derive(Clone)]
pub struct Broadcaster {
    clients: Arc<Mutex<HashMap<PlayerId, Binding>>>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster").finish()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Binds `player` to the connection, returning the connection it replaced.
    pub async fn register(
        &self,
        player: PlayerId,
        connection_id: ConnectionId,
        sender: ClientSender,
    ) -> Option<ConnectionId> {
        let previous = self
            .clients
            .lock()
            .await
            .insert(player, Binding { connection_id, sender });
        previous
            .map(|binding| binding.connection_id)
            .filter(|&previous_id| previous_id != connection_id)
    }

    /// Clears the binding only if it still belongs to `connection_id`.
    pub async fn unregister(&self, player: &PlayerId, connection_id: ConnectionId) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.get(player) {
            Some(binding) if binding.connection_id == connection_id => {
                clients.remove(player);
                true
            }
            _ => false,
        }
    }

    /// Returns true while `connection_id` is the one bound to `player`.
    pub async fn owns_binding(&self, player: &PlayerId, connection_id: ConnectionId) -> bool {
        self.clients
            .lock()
            .await
            .get(player)
            .is_some_and(|binding| binding.connection_id == connection_id)
    }

    /// Never waits on a recipient: a full outbound queue drops the message.
    pub async fn broadcast_to_players(&self, players: &[PlayerId], message: ServerMessage) {
        let clients = self.clients.lock().await;
        for player in players {
            let Some(binding) = clients.get(player) else {
                continue;
            };
            match binding.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log!(
                        "[conn:{}] Outbound queue of {} is full, message dropped",
                        binding.connection_id,
                        player
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    log!("[conn:{}] Connection of {} is closed", binding.connection_id, player);
                }
            }
        }
    }
}

impl GameBroadcaster for Broadcaster {
    async fn send_to_players(&self, recipients: Vec<PlayerId>, message: ServerMessage) {
        self.broadcast_to_players(&recipients, message).await;
    }
}
