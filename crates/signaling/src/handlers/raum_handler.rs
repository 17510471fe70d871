//! Raum-Handler – Beitritt, Zuschauerzahlen, Login-Bindung

use std::sync::Arc;

use bidcast_core::types::ConnectionId;
use bidcast_db::models::AuktionStatus;
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{
    AuktionBeitretenRequest, AuktionBeitretenResponse, ControlMessage, ControlPayload, ErrorCode,
    GastAnzahl, GastAnzahlUpdate, GastAnzahlenRequest, GastAnzahlenResponse, HostVerfuegbar,
    LedgerUpdate, LoginRegistrierenRequest, ProduzentGeschlossen, UserCountUpdate,
};

use crate::server_state::SignalingState;

/// Verarbeitet den Beitritt zu einem Auktionsraum
///
/// Ablauf wie beim Raumwechsel eines Zuschauers: Medien-Ressourcen des
/// alten Raums abbauen, Raeume wechseln, Zaehler beider Raeume
/// broadcasten, Ledger-Eintrag wiederherstellen und dem Beitretenden
/// Verlauf, Host und aufgerufenes Produkt mitgeben.
pub async fn handle_beitreten<S: BidcastStore, E: MediaEngine>(
    req: AuktionBeitretenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let auktion = match state.db.auktion_laden(req.auktion).await {
        Ok(Some(a)) => a,
        Ok(None) => {
            return ControlMessage::error(
                request_id,
                ErrorCode::AuctionNotFound,
                format!("Auktion {} existiert nicht", req.auktion),
            );
        }
        Err(e) => return super::db_fehler(request_id, e),
    };

    // Der Beitritt des eingetragenen Hosts startet die Auktion
    if auktion.host_login == req.login {
        match state
            .db
            .auktion_status_wechseln(req.auktion, AuktionStatus::Geplant, AuktionStatus::Laufend)
            .await
        {
            Ok(true) => tracing::info!(auktion = %req.auktion, "Auktion gestartet"),
            Ok(false) => {}
            Err(e) => return super::db_fehler(request_id, e),
        }
    }

    // Beim Raumwechsel zuerst die Medien des alten Raums abbauen
    if let Some(alter_raum) = state.rooms.raum_von(&connection_id) {
        if alter_raum != req.auktion {
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
        }
    }

    let ergebnis = state.rooms.beitreten(connection_id, req.auktion);

    // Zaehler des verlassenen Raums aktualisieren
    if let Some((alter_raum, anzahl)) = ergebnis.alter_raum {
        state.broadcaster.an_raum_senden(
            &alter_raum,
            ControlMessage::broadcast(ControlPayload::UserCountUpdate(UserCountUpdate {
                auktion: alter_raum,
                user_count: anzahl,
            })),
        );
        state
            .broadcaster
            .an_alle_senden(ControlMessage::broadcast(ControlPayload::GastAnzahlUpdate(
                GastAnzahlUpdate {
                    auktion: alter_raum,
                    anzahl,
                },
            )));
    }

    // Zaehler des neuen Raums an Mitglieder und Dashboards
    state.broadcaster.an_raum_senden(
        &req.auktion,
        ControlMessage::broadcast(ControlPayload::UserCountUpdate(UserCountUpdate {
            auktion: req.auktion,
            user_count: ergebnis.user_count,
        })),
    );
    state
        .broadcaster
        .an_alle_senden(ControlMessage::broadcast(ControlPayload::GastAnzahlUpdate(
            GastAnzahlUpdate {
                auktion: req.auktion,
                anzahl: ergebnis.user_count,
            },
        )));

    // Ledger-Eintrag anlegen bzw. aus der Gebots-Historie wiederherstellen
    let ledger = match state
        .arbiter
        .eintrag_sicherstellen(connection_id, req.auktion, &req.login)
        .await
    {
        Ok(ledger) => ledger,
        Err(e) => return super::auktions_fehler(request_id, e),
    };
    state.broadcaster.an_raum_senden(
        &req.auktion,
        ControlMessage::broadcast(ControlPayload::LedgerUpdate(LedgerUpdate {
            auktion: req.auktion,
            eintraege: ledger,
        })),
    );

    let chat_verlauf = match state.chat.verlauf(req.auktion).await {
        Ok(verlauf) => verlauf,
        Err(e) => return super::chat_fehler(request_id, e),
    };

    ControlMessage::new(
        request_id,
        ControlPayload::AuktionBeitretenResponse(AuktionBeitretenResponse {
            host_connection: state.sessions.host_aufloesen(&req.auktion),
            host_login: auktion.host_login,
            user_count: ergebnis.user_count,
            chat_verlauf,
            ausgewaehltes_produkt: state.arbiter.ausgewaehltes_produkt(req.auktion),
        }),
    )
}

/// Batch-Abfrage der Zuschauerzahlen (Dashboard-Bootstrap)
pub fn handle_gast_anzahlen<S: BidcastStore, E: MediaEngine>(
    req: GastAnzahlenRequest,
    request_id: u32,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let anzahlen = state
        .rooms
        .gast_anzahlen(&req.auktionen)
        .into_iter()
        .map(|(auktion, anzahl)| GastAnzahl { auktion, anzahl })
        .collect();

    ControlMessage::new(
        request_id,
        ControlPayload::GastAnzahlenResponse(GastAnzahlenResponse { anzahlen }),
    )
}

/// Bindet einen Login an die Verbindung
///
/// War der Login bereits woanders aktiv, bekommt die alte Verbindung
/// eine Abschieds-Nachricht und wird aus dem Broadcaster entfernt;
/// damit bricht ihre Sende-Schleife ab und der Verbindungs-Task endet.
/// Ist der Login der eingetragene Host der Auktion, wird er als Host
/// gebunden und der Raum informiert.
pub async fn handle_login_registrieren<S: BidcastStore, E: MediaEngine>(
    req: LoginRegistrierenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    if let Some(verdraengt) = state
        .sessions
        .login_registrieren(req.login.clone(), connection_id)
    {
        state
            .broadcaster
            .an_verbindung_senden(&verdraengt, ControlMessage::broadcast(ControlPayload::VerbindungErsetzt));
        state.broadcaster.client_entfernen(&verdraengt);
    }

    match state.db.ist_host(req.auktion, &req.login).await {
        Ok(true) => {
            state.sessions.host_binden(req.auktion, req.login);
            state.broadcaster.an_raum_senden(
                &req.auktion,
                ControlMessage::broadcast(ControlPayload::HostVerfuegbar(HostVerfuegbar {
                    auktion: req.auktion,
                    host_connection: connection_id,
                })),
            );
        }
        Ok(false) => {}
        Err(e) => return super::db_fehler(request_id, e),
    }

    ControlMessage::new(request_id, ControlPayload::LoginRegistrierenResponse)
}
