//! Message-Dispatcher – routet Control-Nachrichten an die Handler
//!
//! Pro Verbindung existiert ein Dispatcher-Aufruf je eingehender
//! Nachricht; die Handler selbst sind zustandslos und arbeiten auf dem
//! geteilten [`SignalingState`].

use std::net::SocketAddr;
use std::sync::Arc;

use bidcast_core::types::ConnectionId;
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{
    ControlMessage, ControlPayload, ErrorCode, GastAnzahlUpdate, LedgerUpdate,
    ProduzentGeschlossen, UserCountUpdate,
};

use crate::handlers;
use crate::server_state::SignalingState;

/// Verbindungs-Kontext fuer die Handler
#[derive(Debug, Clone)]
pub struct DispatcherContext {
    pub connection_id: ConnectionId,
    pub peer_addr: SocketAddr,
}

/// Routet eingehende Nachrichten an die zustaendigen Handler
pub struct MessageDispatcher<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    state: Arc<SignalingState<S, E>>,
}

impl<S, E> MessageDispatcher<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    pub fn neu(state: Arc<SignalingState<S, E>>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<SignalingState<S, E>> {
        &self.state
    }

    /// Verarbeitet eine eingehende Nachricht
    ///
    /// Gibt `None` zurueck wenn keine direkte Antwort faellig ist
    /// (eingehende Pongs).
    pub async fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &DispatcherContext,
    ) -> Option<ControlMessage> {
        let id = message.request_id;
        let cid = ctx.connection_id;
        let state = &self.state;

        let antwort = match message.payload {
            // Raum und Login
            ControlPayload::AuktionBeitreten(req) => {
                handlers::raum_handler::handle_beitreten(req, id, cid, state).await
            }
            ControlPayload::GastAnzahlen(req) => {
                handlers::raum_handler::handle_gast_anzahlen(req, id, state)
            }
            ControlPayload::LoginRegistrieren(req) => {
                handlers::raum_handler::handle_login_registrieren(req, id, cid, state).await
            }

            // Medien-Signaling
            ControlPayload::RouterFaehigkeiten => {
                handlers::media_handler::handle_router_faehigkeiten(id, state).await
            }
            ControlPayload::TransportErstellen(req) => {
                handlers::media_handler::handle_transport_erstellen(req, id, cid, state).await
            }
            ControlPayload::TransportVerbinden(req) => {
                handlers::media_handler::handle_transport_verbinden(req, id, cid, state).await
            }
            ControlPayload::Produzieren(req) => {
                handlers::media_handler::handle_produzieren(req, id, cid, state).await
            }
            ControlPayload::Konsumieren(req) => {
                handlers::media_handler::handle_konsumieren(req, id, cid, state).await
            }
            ControlPayload::ConsumerFortsetzen(req) => {
                handlers::media_handler::handle_consumer_fortsetzen(req, id, cid, state).await
            }
            ControlPayload::VorhandeneProduzenten(req) => {
                handlers::media_handler::handle_vorhandene_produzenten(req, id, cid, state)
            }
            ControlPayload::ProduzentenSchliessen(req) => {
                handlers::media_handler::handle_produzenten_schliessen(req, id, cid, state).await
            }

            // Gebote
            ControlPayload::ProduktAuswaehlen(req) => {
                handlers::gebot_handler::handle_produkt_auswaehlen(req, id, cid, state).await
            }
            ControlPayload::GebotAbgeben(req) => {
                handlers::gebot_handler::handle_gebot_abgeben(req, id, cid, state).await
            }
            ControlPayload::GebotFinalisieren(req) => {
                handlers::gebot_handler::handle_finalisieren(req, id, cid, state).await
            }
            ControlPayload::GebotZuruecksetzen(req) => {
                handlers::gebot_handler::handle_zuruecksetzen(req, id, cid, state).await
            }

            // Chat und Lifecycle
            ControlPayload::ChatSenden(req) => {
                handlers::chat_handler::handle_chat_senden(req, id, cid, state).await
            }
            ControlPayload::AuktionBeenden(req) => {
                handlers::gebot_handler::handle_auktion_beenden(req, id, cid, state).await
            }

            // Keepalive
            ControlPayload::Ping(ping) => {
                let jetzt = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                ControlMessage::pong(id, ping.timestamp_ms, jetzt)
            }
            ControlPayload::Pong(_) => {
                tracing::trace!(connection_id = %cid, "Pong empfangen");
                return None;
            }

            // Server -> Client Nachrichten sind als Request ungueltig
            ControlPayload::AuktionBeitretenResponse(_)
            | ControlPayload::GastAnzahlenResponse(_)
            | ControlPayload::LoginRegistrierenResponse
            | ControlPayload::RouterFaehigkeitenResponse { .. }
            | ControlPayload::TransportErstellenResponse(_)
            | ControlPayload::TransportVerbindenResponse
            | ControlPayload::ProduzierenResponse(_)
            | ControlPayload::KonsumierenResponse(_)
            | ControlPayload::ConsumerFortsetzenResponse
            | ControlPayload::VorhandeneProduzentenResponse(_)
            | ControlPayload::ProduzentenSchliessenResponse
            | ControlPayload::GebotAkzeptiert
            | ControlPayload::GebotAbgelehnt(_)
            | ControlPayload::Willkommen(_)
            | ControlPayload::UserCountUpdate(_)
            | ControlPayload::GastAnzahlUpdate(_)
            | ControlPayload::LedgerUpdate(_)
            | ControlPayload::NeuerProduzent(_)
            | ControlPayload::ProduzentGeschlossen(_)
            | ControlPayload::HostVerfuegbar(_)
            | ControlPayload::ProduktAusgewaehlt(_)
            | ControlPayload::GebotUpdate(_)
            | ControlPayload::GebotStatus(_)
            | ControlPayload::ChatNachricht(_)
            | ControlPayload::AuktionBeendet(_)
            | ControlPayload::VerbindungErsetzt
            | ControlPayload::Error(_) => {
                tracing::warn!(
                    connection_id = %cid,
                    peer = %ctx.peer_addr,
                    "Server-Nachricht als Request empfangen"
                );
                ControlMessage::error(
                    id,
                    ErrorCode::InvalidRequest,
                    "Dieser Nachrichtentyp ist nur vom Server aus gueltig",
                )
            }
        };

        Some(antwort)
    }

    /// Abbau-Kaskade beim Verbindungsende
    ///
    /// Reihenfolge: Ledger-Eintrag raus (Raum sieht den frischen Stand),
    /// Raum-Zaehler runter, Medien-Ressourcen freigeben, Login-Bindung
    /// loesen, zuletzt die Send-Queue schliessen.
    pub async fn verbindung_cleanup(&self, connection_id: ConnectionId) {
        let state = &self.state;

        if let Some(raum) = state.arbiter.ledger().verbindung_entfernen(connection_id) {
            state.broadcaster.an_raum_senden(
                &raum,
                ControlMessage::broadcast(ControlPayload::LedgerUpdate(LedgerUpdate {
                    auktion: raum,
                    eintraege: state.arbiter.ledger().ledger_von(raum),
                })),
            );
        }

        if let Some((raum, anzahl)) = state.rooms.verbindung_entfernen(&connection_id) {
            state.broadcaster.an_raum_senden(
                &raum,
                ControlMessage::broadcast(ControlPayload::UserCountUpdate(UserCountUpdate {
                    auktion: raum,
                    user_count: anzahl,
                })),
            );
            state
                .broadcaster
                .an_alle_senden(ControlMessage::broadcast(ControlPayload::GastAnzahlUpdate(
                    GastAnzahlUpdate {
                        auktion: raum,
                        anzahl,
                    },
                )));
        }

        let bericht = state.media.alles_freigeben(connection_id).await;
        for abgang in &bericht.producer_abgaenge {
            state.broadcaster.an_raum_senden(
                &abgang.raum,
                ControlMessage::broadcast(ControlPayload::ProduzentGeschlossen(
                    ProduzentGeschlossen {
                        connection: connection_id,
                        producer_id: abgang.producer_id,
                    },
                )),
            );
        }

        if let Some(login) = state.sessions.verbindung_getrennt(&connection_id) {
            tracing::debug!(
                connection_id = %connection_id,
                login = %login.als_str(),
                "Login-Bindung geloest"
            );
        }

        state.broadcaster.client_entfernen(&connection_id);
        tracing::info!(connection_id = %connection_id, "Verbindung abgebaut");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bidcast_core::types::{AuctionId, LoginId, ProductKey};
    use bidcast_db::SqliteDb;
    use bidcast_media::LoopbackEngine;
    use bidcast_protocol::control::{
        AuktionBeitretenRequest, GebotAbgebenRequest, LoginRegistrierenRequest,
        ProduktAuswaehlenRequest, ProduktInfo,
    };

    use crate::server_state::SignalingConfig;

    async fn test_umgebung() -> (
        MessageDispatcher<SqliteDb, LoopbackEngine>,
        AuctionId,
        ProductKey,
    ) {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());

        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('host1', 'Heinz')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('kaeufer1', 'Anna')")
            .execute(db.pool())
            .await
            .unwrap();
        let auktion: (i64,) = sqlx::query_as(
            "INSERT INTO auktionen (host_login, titel, status) \
             VALUES ('host1', 'Abendauktion', 'laufend') RETURNING auction_id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        let produkt: (i64,) = sqlx::query_as(
            "INSERT INTO produkte (auction_id, prod_name, unit_value, init_price) \
             VALUES (?, 'Vase', 500, 1000) RETURNING prod_key",
        )
        .bind(auktion.0)
        .fetch_one(db.pool())
        .await
        .unwrap();

        let state = SignalingState::neu(SignalingConfig::default(), db, LoopbackEngine::neu());
        (
            MessageDispatcher::neu(state),
            AuctionId(auktion.0),
            ProductKey(produkt.0),
        )
    }

    fn test_ctx(dispatcher: &MessageDispatcher<SqliteDb, LoopbackEngine>) -> DispatcherContext {
        let connection_id = ConnectionId::new();
        dispatcher.state().rooms.verbindung_registrieren(connection_id);
        let _rx = dispatcher.state().broadcaster.client_registrieren(connection_id);
        DispatcherContext {
            connection_id,
            peer_addr: "127.0.0.1:4000".parse().unwrap(),
        }
    }

    async fn beitreten(
        dispatcher: &MessageDispatcher<SqliteDb, LoopbackEngine>,
        ctx: &DispatcherContext,
        auktion: AuctionId,
        login: &str,
    ) {
        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    1,
                    ControlPayload::AuktionBeitreten(AuktionBeitretenRequest {
                        auktion,
                        login: LoginId::from(login),
                    }),
                ),
                ctx,
            )
            .await
            .unwrap();
        assert!(matches!(
            antwort.payload,
            ControlPayload::AuktionBeitretenResponse(_)
        ));
    }

    #[tokio::test]
    async fn ping_wird_mit_pong_beantwortet() {
        let (dispatcher, _, _) = test_umgebung().await;
        let ctx = test_ctx(&dispatcher);

        let antwort = dispatcher
            .dispatch(ControlMessage::ping(7, 123456), &ctx)
            .await
            .unwrap();
        assert_eq!(antwort.request_id, 7);
        match antwort.payload {
            ControlPayload::Pong(pong) => assert_eq!(pong.echo_timestamp_ms, 123456),
            other => panic!("Pong erwartet, bekam {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_nachricht_als_request_ist_ungueltig() {
        let (dispatcher, _, _) = test_umgebung().await;
        let ctx = test_ctx(&dispatcher);

        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(3, ControlPayload::GebotAkzeptiert),
                &ctx,
            )
            .await
            .unwrap();
        match antwort.payload {
            ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
            other => panic!("Error erwartet, bekam {other:?}"),
        }
    }

    #[tokio::test]
    async fn beitritt_unbekannter_auktion_schlaegt_fehl() {
        let (dispatcher, _, _) = test_umgebung().await;
        let ctx = test_ctx(&dispatcher);

        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    1,
                    ControlPayload::AuktionBeitreten(AuktionBeitretenRequest {
                        auktion: AuctionId(999),
                        login: LoginId::from("kaeufer1"),
                    }),
                ),
                &ctx,
            )
            .await
            .unwrap();
        match antwort.payload {
            ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::AuctionNotFound),
            other => panic!("Error erwartet, bekam {other:?}"),
        }
    }

    #[tokio::test]
    async fn produkt_auswaehlen_nur_als_host() {
        let (dispatcher, auktion, produkt) = test_umgebung().await;
        let ctx = test_ctx(&dispatcher);
        beitreten(&dispatcher, &ctx, auktion, "kaeufer1").await;

        let info = ProduktInfo {
            prod_key: produkt,
            auktion,
            name: "Vase".into(),
            detail: None,
            unit_value: 500,
            init_price: 1000,
            current_price: None,
            final_price: None,
            winner: None,
            status: "W".into(),
            file_url: None,
        };

        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    2,
                    ControlPayload::ProduktAuswaehlen(ProduktAuswaehlenRequest {
                        auktion,
                        produkt: info,
                    }),
                ),
                &ctx,
            )
            .await
            .unwrap();
        match antwort.payload {
            ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::PermissionDenied),
            other => panic!("Error erwartet, bekam {other:?}"),
        }
    }

    #[tokio::test]
    async fn gebots_ablauf_ueber_den_dispatcher() {
        let (dispatcher, auktion, produkt) = test_umgebung().await;

        // Host meldet sich an und ruft das Produkt auf
        let host_ctx = test_ctx(&dispatcher);
        beitreten(&dispatcher, &host_ctx, auktion, "host1").await;
        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    2,
                    ControlPayload::LoginRegistrieren(LoginRegistrierenRequest {
                        login: LoginId::from("host1"),
                        auktion,
                    }),
                ),
                &host_ctx,
            )
            .await
            .unwrap();
        assert!(matches!(
            antwort.payload,
            ControlPayload::LoginRegistrierenResponse
        ));

        let info = ProduktInfo {
            prod_key: produkt,
            auktion,
            name: "Vase".into(),
            detail: None,
            unit_value: 500,
            init_price: 1000,
            current_price: None,
            final_price: None,
            winner: None,
            status: "W".into(),
            file_url: None,
        };
        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    3,
                    ControlPayload::ProduktAuswaehlen(ProduktAuswaehlenRequest {
                        auktion,
                        produkt: info,
                    }),
                ),
                &host_ctx,
            )
            .await
            .unwrap();
        assert!(matches!(
            antwort.payload,
            ControlPayload::ProduktAusgewaehlt(_)
        ));

        // Bieterin tritt bei und bietet den Startpreis
        let bieter_ctx = test_ctx(&dispatcher);
        beitreten(&dispatcher, &bieter_ctx, auktion, "kaeufer1").await;

        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    4,
                    ControlPayload::GebotAbgeben(GebotAbgebenRequest {
                        auktion,
                        produkt,
                        betrag: 1000,
                        login: LoginId::from("kaeufer1"),
                    }),
                ),
                &bieter_ctx,
            )
            .await
            .unwrap();
        assert!(matches!(antwort.payload, ControlPayload::GebotAkzeptiert));

        // Unterbietung wird regulaer abgelehnt, nicht als Fehler
        let antwort = dispatcher
            .dispatch(
                ControlMessage::new(
                    5,
                    ControlPayload::GebotAbgeben(GebotAbgebenRequest {
                        auktion,
                        produkt,
                        betrag: 1200,
                        login: LoginId::from("kaeufer1"),
                    }),
                ),
                &bieter_ctx,
            )
            .await
            .unwrap();
        assert!(matches!(antwort.payload, ControlPayload::GebotAbgelehnt(_)));
    }

    #[tokio::test]
    async fn cleanup_entfernt_verbindung_ueberall() {
        let (dispatcher, auktion, _) = test_umgebung().await;
        let ctx = test_ctx(&dispatcher);
        beitreten(&dispatcher, &ctx, auktion, "kaeufer1").await;

        dispatcher.verbindung_cleanup(ctx.connection_id).await;

        let state = dispatcher.state();
        assert!(!state.rooms.ist_verbunden(&ctx.connection_id));
        assert!(!state.broadcaster.ist_registriert(&ctx.connection_id));
        assert_eq!(state.rooms.gast_anzahl(&auktion), 0);
        assert!(state.arbiter.ledger().ledger_von(auktion).is_empty());
    }
}
