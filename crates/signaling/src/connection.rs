//! Client-Connection – verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Verbindung wird sofort beim Aufbau im Broadcaster und
//! in der Room-Registry registriert und bekommt als erste Nachricht ihre
//! eigene `ConnectionId` mitgeteilt.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Client muss innerhalb von `verbindungs_timeout_sek` irgendetwas senden
//! - Bei Timeout wird die Verbindung getrennt
//!
//! ## Verdraengung
//! Wird der Login der Verbindung woanders registriert, entfernt der
//! Handler die Verbindung aus dem Broadcaster; die Empfangs-Queue
//! schliesst sich und die Schleife endet.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use bidcast_core::types::ConnectionId;
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{ControlMessage, ControlPayload, ErrorCode, Willkommen};
use bidcast_protocol::wire::FrameCodec;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an `MessageDispatcher` und
/// sendet Antworten und Broadcasts zurueck.
pub struct ClientConnection<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    state: Arc<SignalingState<S, E>>,
    peer_addr: SocketAddr,
}

impl<S, E> ClientConnection<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    pub fn neu(state: Arc<SignalingState<S, E>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, die Verbindung verdraengt wird oder
    /// ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        let connection_id = ConnectionId::new();
        tracing::info!(peer = %peer_addr, connection_id = %connection_id, "Neue Verbindung");

        let mut framed = Framed::new(stream, FrameCodec::new());

        // Sofort registrieren: Broadcasts erreichen die Verbindung ab jetzt
        let mut recv_queue = self.state.broadcaster.client_registrieren(connection_id);
        self.state.rooms.verbindung_registrieren(connection_id);

        let ctx = DispatcherContext {
            connection_id,
            peer_addr,
        };
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        // Der Client braucht seine ConnectionId fuer das Medien-Signaling
        let willkommen =
            ControlMessage::broadcast(ControlPayload::Willkommen(Willkommen {
                connection: connection_id,
            }));
        if let Err(e) = framed.send(willkommen).await {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Begruessung fehlgeschlagen");
            dispatcher.verbindung_cleanup(connection_id).await;
            return;
        }

        let mut letzter_empfang = Instant::now();
        let mut naechster_ping = Instant::now() + keepalive_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, connection_id = %connection_id, "Verbindungs-Timeout");
                break;
            }

            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                "Nachricht empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, &ctx).await {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Senden fehlgeschlagen"
                                    );
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                ausgehend = recv_queue.recv() => {
                    match ausgehend {
                        Some(nachricht) => {
                            if let Err(e) = framed.send(nachricht).await {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    fehler = %e,
                                    "Broadcast-Senden fehlgeschlagen"
                                );
                                break;
                            }
                        }
                        // Queue geschlossen: die Verbindung wurde verdraengt
                        None => {
                            tracing::info!(
                                peer = %peer_addr,
                                connection_id = %connection_id,
                                "Verbindung serverseitig ersetzt"
                            );
                            break;
                        }
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        ping_request_id = ping_request_id.wrapping_add(1);
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        let ping = ControlMessage::ping(ping_request_id, ts);

                        if let Err(e) = framed.send(ping).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = ControlMessage::error(
                            0,
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        dispatcher.verbindung_cleanup(connection_id).await;
        tracing::info!(peer = %peer_addr, connection_id = %connection_id, "Verbindungs-Task beendet");
    }
}
