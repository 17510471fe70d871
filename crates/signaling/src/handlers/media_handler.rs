//! Media-Handler – Transport-, Producer- und Consumer-Signaling
//!
//! Die Handler reichen die opaken Parameter-Blobs zwischen Client und
//! Engine durch; Eigentum und Lebenszyklus verwaltet der
//! `MediaResourceManager`.

use std::sync::Arc;

use bidcast_core::types::ConnectionId;
use bidcast_db::BidcastStore;
use bidcast_media::MediaEngine;
use bidcast_protocol::control::{
    ConsumerBeschreibung, ConsumerFortsetzenRequest, ControlMessage, ControlPayload,
    KonsumierenRequest, NeuerProduzent, ProducerInfo, ProduzentGeschlossen, ProduzierenRequest,
    ProduzierenResponse, ProduzentenSchliessenRequest, TransportBeschreibung,
    TransportErstellenRequest, TransportVerbindenRequest, VorhandeneProduzentenRequest,
    VorhandeneProduzentenResponse,
};

use crate::server_state::SignalingState;

/// RTP-Faehigkeiten des Routers abfragen
pub async fn handle_router_faehigkeiten<S: BidcastStore, E: MediaEngine>(
    request_id: u32,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    match state.media.router_faehigkeiten().await {
        Ok(rtp_faehigkeiten) => ControlMessage::new(
            request_id,
            ControlPayload::RouterFaehigkeitenResponse { rtp_faehigkeiten },
        ),
        Err(e) => super::media_fehler(request_id, e),
    }
}

/// Transport anlegen
pub async fn handle_transport_erstellen<S: BidcastStore, E: MediaEngine>(
    req: TransportErstellenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    match state
        .media
        .transport_erstellen(connection_id, req.richtung)
        .await
    {
        Ok((transport_id, beschreibung)) => ControlMessage::new(
            request_id,
            ControlPayload::TransportErstellenResponse(TransportBeschreibung {
                transport_id,
                ice_parameter: beschreibung.ice_parameter,
                ice_kandidaten: beschreibung.ice_kandidaten,
                dtls_parameter: beschreibung.dtls_parameter,
            }),
        ),
        Err(e) => super::media_fehler(request_id, e),
    }
}

/// DTLS-Verhandlung eines Transports abschliessen
pub async fn handle_transport_verbinden<S: BidcastStore, E: MediaEngine>(
    req: TransportVerbindenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    match state
        .media
        .transport_verbinden(connection_id, req.transport_id, req.dtls_parameter)
        .await
    {
        Ok(()) => ControlMessage::new(request_id, ControlPayload::TransportVerbindenResponse),
        Err(e) => super::media_fehler(request_id, e),
    }
}

/// Ausgehenden Medienstrom anlegen und dem Raum ankuendigen
pub async fn handle_produzieren<S: BidcastStore, E: MediaEngine>(
    req: ProduzierenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let producer_id = match state
        .media
        .produzieren(
            connection_id,
            req.auktion,
            req.transport_id,
            req.kind,
            req.rtp_parameter,
        )
        .await
    {
        Ok(id) => id,
        Err(e) => return super::media_fehler(request_id, e),
    };

    // Alle anderen Raum-Mitglieder koennen jetzt konsumieren
    state.broadcaster.an_raum_ausser_senden(
        &req.auktion,
        &connection_id,
        ControlMessage::broadcast(ControlPayload::NeuerProduzent(NeuerProduzent {
            producer_id,
            connection: connection_id,
            kind: req.kind,
        })),
    );

    ControlMessage::new(
        request_id,
        ControlPayload::ProduzierenResponse(ProduzierenResponse { producer_id }),
    )
}

/// Fremden Medienstrom konsumieren
pub async fn handle_konsumieren<S: BidcastStore, E: MediaEngine>(
    req: KonsumierenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    match state
        .media
        .konsumieren(
            connection_id,
            req.auktion,
            req.transport_id,
            req.producer_id,
            req.rtp_faehigkeiten,
            req.pausiert,
        )
        .await
    {
        Ok((consumer_id, consumer)) => ControlMessage::new(
            request_id,
            ControlPayload::KonsumierenResponse(ConsumerBeschreibung {
                consumer_id,
                producer_id: req.producer_id,
                kind: consumer.art,
                rtp_parameter: consumer.rtp_parameter,
            }),
        ),
        Err(e) => super::media_fehler(request_id, e),
    }
}

/// Pausierten Consumer fortsetzen
///
/// Ein unbekannter Consumer (z.B. schon weggeraeumt) ist kein Fehler
/// fuer den Client; die Fortsetzung verpufft.
pub async fn handle_consumer_fortsetzen<S: BidcastStore, E: MediaEngine>(
    req: ConsumerFortsetzenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    match state
        .media
        .consumer_fortsetzen(connection_id, req.consumer_id)
        .await
    {
        Ok(()) => ControlMessage::new(request_id, ControlPayload::ConsumerFortsetzenResponse),
        Err(bidcast_media::MediaError::NichtGefunden(msg)) => {
            tracing::warn!(consumer_id = %req.consumer_id, grund = %msg, "Consumer-Fortsetzen ohne Ziel");
            ControlMessage::new(request_id, ControlPayload::ConsumerFortsetzenResponse)
        }
        Err(e) => super::media_fehler(request_id, e),
    }
}

/// Alle aktiven Producer eines Raums abfragen (ohne die eigenen)
pub fn handle_vorhandene_produzenten<S: BidcastStore, E: MediaEngine>(
    req: VorhandeneProduzentenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let produzenten = state
        .media
        .produzenten_in_raum(req.auktion, Some(connection_id))
        .into_iter()
        .map(|p| ProducerInfo {
            producer_id: p.producer_id,
            connection: p.connection,
            kind: p.art,
        })
        .collect();

    ControlMessage::new(
        request_id,
        ControlPayload::VorhandeneProduzentenResponse(VorhandeneProduzentenResponse {
            produzenten,
            host_connection: state.sessions.host_aufloesen(&req.auktion),
        }),
    )
}

/// Eigene Producer in einem Raum schliessen (Sendung beenden)
pub async fn handle_produzenten_schliessen<S: BidcastStore, E: MediaEngine>(
    req: ProduzentenSchliessenRequest,
    request_id: u32,
    connection_id: ConnectionId,
    state: &Arc<SignalingState<S, E>>,
) -> ControlMessage {
    let eigene: Vec<_> = state
        .media
        .produzenten_in_raum(req.auktion, None)
        .into_iter()
        .filter(|p| p.connection == connection_id)
        .collect();

    for producer in eigene {
        if let Err(e) = state
            .media
            .produzenten_schliessen(connection_id, req.auktion, producer.producer_id)
            .await
        {
            return super::media_fehler(request_id, e);
        }

        state.broadcaster.an_raum_ausser_senden(
            &req.auktion,
            &connection_id,
            ControlMessage::broadcast(ControlPayload::ProduzentGeschlossen(ProduzentGeschlossen {
                connection: connection_id,
                producer_id: producer.producer_id,
            })),
        );
    }

    ControlMessage::new(request_id, ControlPayload::ProduzentenSchliessenResponse)
}
