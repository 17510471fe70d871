//! Chat-Handler – persistiert die Nachricht und verteilt sie im Raum

use std::sync::Arc;

use bidcast_core::types::ConnectionId;
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{ChatSendenRequest, ControlMessage, ControlPayload};

use crate::server_state::SignalingState;

/// Chat-Nachricht entgegennehmen
///
/// Der Absender bekommt die gespeicherte Nachricht als Antwort (mit
/// aufgeloestem Nickname und Server-Zeitstempel), der Rest des Raums
/// als Broadcast.
pub async fn handle_chat_senden<S: BidcastStore, E: MediaEngine>(
    req: ChatSendenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let nachricht = match state
        .chat
        .nachricht_senden(req.auktion, &req.login, &req.inhalt)
        .await
    {
        Ok(nachricht) => nachricht,
        Err(e) => return super::chat_fehler(request_id, e),
    };

    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::ChatNachricht(nachricht.clone())),
    );

    ControlMessage::new(request_id, ControlPayload::ChatNachricht(nachricht))
}
