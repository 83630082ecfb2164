use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use prost::Message as ProstMessage;
use tokio::sync::mpsc;

use common::{
    ClientMessage, JoinRequest, MoveRequest, PingRequest, PlayerId, PongResponse,
    ReconnectRequest, ServerMessage, SessionId, client_message, log, server_message,
};

use crate::broadcaster::{ClientSender, ConnectionId};
use crate::error::GameError;
use crate::web_server::WebServerState;

/// Per-connection state: which identity, if any, this socket speaks for.
struct Connection {
    id: ConnectionId,
    sender: ClientSender,
    player: Option<PlayerId>,
}

pub async fn handle_websocket(socket: WebSocket, state: WebServerState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(128);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let buf = message.encode_to_vec();
            if ws_sender.send(Message::Binary(buf.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection {
        id: state.next_connection_id.fetch_add(1, Ordering::Relaxed),
        sender: tx,
        player: None,
    };
    log!("[conn:{}] WebSocket connected", connection.id);

    while let Some(result) = ws_receiver.next().await {
        let data = match result {
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log!("[conn:{}] WebSocket error: {}", connection.id, e);
                break;
            }
        };

        let message = match ClientMessage::decode(data.as_ref()) {
            Ok(ClientMessage { message: Some(message) }) => message,
            Ok(ClientMessage { message: None }) => {
                reject(&connection, GameError::MalformedMessage("empty message".to_string())).await;
                continue;
            }
            Err(e) => {
                log!("[conn:{}] Failed to decode ClientMessage: {}", connection.id, e);
                reject(&connection, GameError::MalformedMessage(e.to_string())).await;
                continue;
            }
        };

        let outcome = match message {
            client_message::Message::Join(req) => handle_join(&state, &mut connection, req).await,
            client_message::Message::Move(req) => handle_move(&state, &connection, req).await,
            client_message::Message::Reconnect(req) => {
                handle_reconnect(&state, &mut connection, req).await
            }
            client_message::Message::Ping(req) => {
                handle_ping(&connection, req).await;
                Ok(())
            }
        };

        if let Err(e) = outcome {
            reject(&connection, e).await;
        }
    }

    if let Some(player) = connection.player.take() {
        release_binding(&state, &connection, &player).await;
    }
    log!("[conn:{}] WebSocket closed", connection.id);
    send_task.abort();
}

async fn handle_join(
    state: &WebServerState,
    connection: &mut Connection,
    req: JoinRequest,
) -> Result<(), GameError> {
    let player = bind_identity(state, connection, &req.identity).await?;
    let outcome = state.session_manager.request_match(&player).await?;
    log!("[conn:{}] {} requested a match: {:?}", connection.id, player, outcome);
    Ok(())
}

async fn handle_move(
    state: &WebServerState,
    connection: &Connection,
    req: MoveRequest,
) -> Result<(), GameError> {
    let player = connection.player.as_ref().ok_or(GameError::NotJoined)?;
    if !state.broadcaster.owns_binding(player, connection.id).await {
        return Err(GameError::NotJoined);
    }
    state
        .session_manager
        .request_move(player, &SessionId::new(req.session_id), req.column)
        .await
}

async fn handle_reconnect(
    state: &WebServerState,
    connection: &mut Connection,
    req: ReconnectRequest,
) -> Result<(), GameError> {
    let player = bind_identity(state, connection, &req.identity).await?;
    if !state.session_manager.request_reconnect(&player).await {
        log!("[conn:{}] {} has no game to resume", connection.id, player);
    }
    Ok(())
}

async fn handle_ping(connection: &Connection, req: PingRequest) {
    let pong = ServerMessage {
        message: Some(server_message::Message::Pong(PongResponse {
            ping_id: req.ping_id,
            client_timestamp_ms: req.client_timestamp_ms,
        })),
    };
    send(connection, pong).await;
}

/// Validates the identity and points its outbound traffic at this connection.
/// A connection speaks for one identity for its whole lifetime, but may
/// reclaim that identity after another connection took it over.
async fn bind_identity(
    state: &WebServerState,
    connection: &mut Connection,
    raw_identity: &str,
) -> Result<PlayerId, GameError> {
    let player = PlayerId::parse(raw_identity).map_err(GameError::InvalidIdentity)?;

    if let Some(current) = &connection.player
        && current != &player
    {
        return Err(GameError::InvalidIdentity(format!(
            "connection already identified as '{}'",
            current
        )));
    }

    if let Some(replaced) = state
        .broadcaster
        .register(player.clone(), connection.id, connection.sender.clone())
        .await
    {
        log!("[conn:{}] {} took over from connection {}", connection.id, player, replaced);
    }
    connection.player = Some(player.clone());
    Ok(player)
}

async fn release_binding(state: &WebServerState, connection: &Connection, player: &PlayerId) {
    if state.broadcaster.unregister(player, connection.id).await {
        log!("[conn:{}] {} disconnected", connection.id, player);
        state.session_manager.handle_disconnect(player).await;
    }
}

async fn reject(connection: &Connection, error: GameError) {
    log!(
        "[conn:{}] Rejected request ({:?}): {}",
        connection.id,
        error.kind(),
        error
    );
    send(connection, error.to_server_message()).await;
}

async fn send(connection: &Connection, message: ServerMessage) {
    if let Err(e) = connection.sender.send(message).await {
        log!("[conn:{}] Failed to queue message: {}", connection.id, e);
    }
}
