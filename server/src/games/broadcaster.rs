use std::future::Future;

use common::{PlayerId, ServerMessage};

/// Outbound side of a game session. Recipients without a live connection are skipped.
pub trait GameBroadcaster: Send + Sync + Clone + 'static {
    fn send_to_players(
        &self,
        recipients: Vec<PlayerId>,
        message: ServerMessage,
    ) -> impl Future<Output = ()> + Send;
}
