//! Gebots-Handler – Produktaufruf, Gebote, Finalisierung, Auktionsende
//!
//! Host-Operationen werden gegen den HostSessionTracker geprueft; die
//! eigentliche Preislogik liegt im BidArbiter. Jede erfolgreiche
//! Mutation erzeugt die passenden Raum-Broadcasts und die Antwort an
//! den Aufrufer traegt denselben Payload mit der request_id.

use std::sync::Arc;

use bidcast_auction::AuktionError;
use bidcast_core::types::{ConnectionId, UserKey};
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{
    AuktionBeendenRequest, AuktionBeendet, BieterInfo, ControlMessage, ControlPayload,
    GebotAbgebenRequest, GebotAbgelehnt, GebotFinalisierenRequest, GebotStatus, GebotUpdate,
    GebotZuruecksetzenRequest, LedgerUpdate, ProduktAuswaehlenRequest, ProduktAusgewaehlt,
};

use crate::server_state::SignalingState;

/// Host ruft das naechste Produkt zur Versteigerung auf
pub async fn handle_produkt_auswaehlen<S: BidcastStore, E: MediaEngine>(
    req: ProduktAuswaehlenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    if !state.sessions.ist_host(&req.auktion, &connection_id) {
        return super::nur_host(request_id);
    }

    let produkt = match state.arbiter.produkt_auswaehlen(req.auktion, req.produkt).await {
        Ok(produkt) => produkt,
        Err(e) => return super::auktions_fehler(request_id, e),
    };

    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::ProduktAusgewaehlt(ProduktAusgewaehlt {
            produkt: produkt.clone(),
        })),
    );

    ControlMessage::new(
        request_id,
        ControlPayload::ProduktAusgewaehlt(ProduktAusgewaehlt { produkt }),
    )
}

/// Gebotsversuch eines Bieters
///
/// Ein zu niedriges Gebot ist kein Protokollfehler: der Bieter bekommt
/// eine Ablehnung mit dem aktuellen Minimum, der Raum sieht nichts.
pub async fn handle_gebot_abgeben<S: BidcastStore, E: MediaEngine>(
    req: GebotAbgebenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let ergebnis = match state
        .arbiter
        .gebot_verarbeiten(connection_id, req.auktion, req.produkt, req.betrag, &req.login)
        .await
    {
        Ok(ergebnis) => ergebnis,
        Err(AuktionError::GebotZuNiedrig { minimum }) => {
            return ControlMessage::new(
                request_id,
                ControlPayload::GebotAbgelehnt(GebotAbgelehnt {
                    grund: format!("Gebot zu niedrig, Minimum ist {minimum}"),
                }),
            );
        }
        Err(e) => return super::auktions_fehler(request_id, e),
    };

    // Der ganze Raum (inklusive Bieter) sieht Preis und Ledger
    state.broadcaster.an_raum_senden(
        &req.auktion,
        ControlMessage::broadcast(ControlPayload::GebotUpdate(GebotUpdate {
            produkt: ergebnis.produkt,
            bieter: ergebnis.bieter,
        })),
    );
    state.broadcaster.an_raum_senden(
        &req.auktion,
        ControlMessage::broadcast(ControlPayload::LedgerUpdate(LedgerUpdate {
            auktion: req.auktion,
            eintraege: ergebnis.ledger,
        })),
    );

    ControlMessage::new(request_id, ControlPayload::GebotAkzeptiert)
}

/// Host finalisiert das aufgerufene Produkt (Zuschlag oder Rueckgabe)
pub async fn handle_finalisieren<S: BidcastStore, E: MediaEngine>(
    req: GebotFinalisierenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    if !state.sessions.ist_host(&req.auktion, &connection_id) {
        return super::nur_host(request_id);
    }

    let (produkt, ledger) = match state
        .arbiter
        .finalisieren(req.auktion, req.produkt, req.ausgang)
        .await
    {
        Ok(ergebnis) => ergebnis,
        Err(e) => return super::auktions_fehler(request_id, e),
    };

    let (gewinner_login, gewinner_nickname) =
        match gewinner_aufloesen(state, produkt.winner).await {
            Ok(gewinner) => gewinner,
            Err(e) => return super::db_fehler(request_id, e),
        };

    let status = GebotStatus {
        produkt: req.produkt,
        gewinner_login,
        gewinner_nickname,
        ausgang: req.ausgang,
    };

    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::GebotStatus(status.clone())),
    );
    state.broadcaster.an_raum_senden(
        &req.auktion,
        ControlMessage::broadcast(ControlPayload::LedgerUpdate(LedgerUpdate {
            auktion: req.auktion,
            eintraege: ledger,
        })),
    );

    ControlMessage::new(request_id, ControlPayload::GebotStatus(status))
}

/// Host korrigiert Preis und Gewinner eines Produkts direkt
pub async fn handle_zuruecksetzen<S: BidcastStore, E: MediaEngine>(
    req: GebotZuruecksetzenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    if !state.sessions.ist_host(&req.auktion, &connection_id) {
        return super::nur_host(request_id);
    }

    let produkt = match state
        .arbiter
        .gebot_zuruecksetzen(req.auktion, req.produkt, req.final_preis, req.gewinner)
        .await
    {
        Ok(produkt) => produkt,
        Err(e) => return super::auktions_fehler(request_id, e),
    };

    let (login, nickname) = match gewinner_aufloesen(state, produkt.winner).await {
        Ok(gewinner) => gewinner,
        Err(e) => return super::db_fehler(request_id, e),
    };

    // Korrekturen kommen vom Host, nicht von einer Bieter-Verbindung
    let update = GebotUpdate {
        produkt,
        bieter: BieterInfo {
            user_key: req.gewinner,
            login,
            nickname,
            connection: None,
        },
    };

    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::GebotUpdate(update.clone())),
    );

    ControlMessage::new(request_id, ControlPayload::GebotUpdate(update))
}

/// Host beendet die Auktion
pub async fn handle_auktion_beenden<S: BidcastStore, E: MediaEngine>(
    req: AuktionBeendenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    if !state.sessions.ist_host(&req.auktion, &connection_id) {
        return super::nur_host(request_id);
    }

    if let Err(e) = state.arbiter.auktion_beenden(req.auktion).await {
        return super::auktions_fehler(request_id, e);
    }
    state.sessions.host_entbinden(&req.auktion);

    let beendet = AuktionBeendet {
        auktion: req.auktion,
        nachricht: "Die Auktion wurde vom Veranstalter beendet".to_string(),
    };

    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::AuktionBeendet(beendet.clone())),
    );

    ControlMessage::new(request_id, ControlPayload::AuktionBeendet(beendet))
}

type GewinnerFelder = (Option<bidcast_core::types::LoginId>, Option<String>);

async fn gewinner_aufloesen<S: BidcastStore, E: MediaEngine>(
    state: &Arc<SignalingState<S, E>>,
    gewinner: Option<UserKey>,
) -> Result<GewinnerFelder, bidcast_db::DbError> {
    let Some(user_key) = gewinner else {
        return Ok((None, None));
    };
    Ok(state
        .db
        .benutzer_nach_key(user_key)
        .await?
        .map(|b| (Some(b.login_id), Some(b.nickname)))
        .unwrap_or((None, None)))
}
