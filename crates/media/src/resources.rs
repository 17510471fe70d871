//! Eigentumsverwaltung fuer Medien-Ressourcen
//!
//! Drei Arenen: Transports, Producer (pro Raum gruppiert) und Consumer.
//! Jede Ressource gehoert genau einer Verbindung; jede Operation prueft
//! das Eigentum bevor sie die Engine anfasst.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use bidcast_core::types::{AuctionId, ConnectionId, ConsumerId, ProducerId, TransportId};
use bidcast_protocol::control::{MedienArt, TransportRichtung};

use crate::engine::{EngineConsumer, EngineTransport, MediaEngine};
use crate::error::MediaError;

// ---------------------------------------------------------------------------
// Arena-Eintraege
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TransportEintrag {
    connection: ConnectionId,
    richtung: TransportRichtung,
    engine_id: String,
}

#[derive(Debug, Clone)]
struct ProducerEintrag {
    connection: ConnectionId,
    art: MedienArt,
    engine_id: String,
}

#[derive(Debug, Clone)]
struct ConsumerEintrag {
    connection: ConnectionId,
    engine_id: String,
}

// ---------------------------------------------------------------------------
// Oeffentliche Ergebnistypen
// ---------------------------------------------------------------------------

/// Ein aktiver Producer aus Sicht eines Raum-Mitglieds
#[derive(Debug, Clone)]
pub struct RaumProducer {
    pub producer_id: ProducerId,
    pub connection: ConnectionId,
    pub art: MedienArt,
}

/// Ein durch die Freigabe-Kaskade geschlossener Producer
#[derive(Debug, Clone)]
pub struct ProducerAbgang {
    pub raum: AuctionId,
    pub producer_id: ProducerId,
}

/// Ergebnis von [`MediaResourceManager::alles_freigeben`]
///
/// Der Aufrufer benachrichtigt pro Abgang die Raum-Mitglieder.
#[derive(Debug, Clone, Default)]
pub struct FreigabeBericht {
    pub producer_abgaenge: Vec<ProducerAbgang>,
    pub transports_geschlossen: usize,
    pub consumers_geschlossen: usize,
}

// ---------------------------------------------------------------------------
// MediaResourceManager
// ---------------------------------------------------------------------------

struct ManagerInner<E> {
    engine: E,
    transports: DashMap<TransportId, TransportEintrag>,
    producers: DashMap<AuctionId, HashMap<ProducerId, ProducerEintrag>>,
    consumers: DashMap<ConsumerId, ConsumerEintrag>,
}

/// Verwaltet das Eigentum aller Medien-Ressourcen
pub struct MediaResourceManager<E> {
    inner: Arc<ManagerInner<E>>,
}

impl<E> Clone for MediaResourceManager<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: MediaEngine> MediaResourceManager<E> {
    pub fn neu(engine: E) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                engine,
                transports: DashMap::new(),
                producers: DashMap::new(),
                consumers: DashMap::new(),
            }),
        }
    }

    /// RTP-Faehigkeiten des Routers (Passthrough zur Engine)
    pub async fn router_faehigkeiten(&self) -> Result<Value, MediaError> {
        self.inner.engine.router_faehigkeiten().await
    }

    /// Erstellt einen Transport und registriert ihn auf die Verbindung
    pub async fn transport_erstellen(
        &self,
        connection: ConnectionId,
        richtung: TransportRichtung,
    ) -> Result<(TransportId, EngineTransport), MediaError> {
        let beschreibung = self.inner.engine.transport_erstellen(richtung).await?;
        let id = TransportId::new();

        self.inner.transports.insert(
            id,
            TransportEintrag {
                connection,
                richtung,
                engine_id: beschreibung.engine_id.clone(),
            },
        );

        debug!(transport_id = %id, connection_id = %connection, ?richtung, "Transport erstellt");
        Ok((id, beschreibung))
    }

    /// Schliesst den DTLS-Handshake ab; nur der Eigentuemer darf verbinden
    pub async fn transport_verbinden(
        &self,
        connection: ConnectionId,
        transport: TransportId,
        dtls_parameter: Value,
    ) -> Result<(), MediaError> {
        let engine_id = self.transport_pruefen(connection, transport, None)?;
        self.inner
            .engine
            .transport_verbinden(&engine_id, dtls_parameter)
            .await
    }

    /// Startet einen Medienfluss; der Transport muss ein Send-Transport
    /// der aufrufenden Verbindung sein
    pub async fn produzieren(
        &self,
        connection: ConnectionId,
        raum: AuctionId,
        transport: TransportId,
        art: MedienArt,
        rtp_parameter: Value,
    ) -> Result<ProducerId, MediaError> {
        let engine_id =
            self.transport_pruefen(connection, transport, Some(TransportRichtung::Send))?;

        let producer = self
            .inner
            .engine
            .produzieren(&engine_id, art, rtp_parameter)
            .await?;

        let id = ProducerId::new();
        self.inner.producers.entry(raum).or_default().insert(
            id,
            ProducerEintrag {
                connection,
                art: producer.art,
                engine_id: producer.engine_id,
            },
        );

        debug!(producer_id = %id, connection_id = %connection, raum = %raum, "Producer gestartet");
        Ok(id)
    }

    /// Alle aktiven Producer eines Raums, optional ohne die eigene Verbindung
    pub fn produzenten_in_raum(
        &self,
        raum: AuctionId,
        ausser: Option<ConnectionId>,
    ) -> Vec<RaumProducer> {
        let Some(raum_producer) = self.inner.producers.get(&raum) else {
            return Vec::new();
        };

        raum_producer
            .iter()
            .filter(|(_, eintrag)| Some(eintrag.connection) != ausser)
            .map(|(id, eintrag)| RaumProducer {
                producer_id: *id,
                connection: eintrag.connection,
                art: eintrag.art,
            })
            .collect()
    }

    /// Erstellt einen Consumer fuer einen fremden Producer
    ///
    /// Schlaegt mit [`MediaError::Verhandlung`] fehl wenn die Engine die
    /// RTP-Faehigkeiten des Clients nicht mit dem Producer vereinbaren kann.
    pub async fn konsumieren(
        &self,
        connection: ConnectionId,
        raum: AuctionId,
        transport: TransportId,
        producer: ProducerId,
        rtp_faehigkeiten: Value,
        pausiert: bool,
    ) -> Result<(ConsumerId, EngineConsumer), MediaError> {
        let transport_engine_id =
            self.transport_pruefen(connection, transport, Some(TransportRichtung::Recv))?;

        let producer_engine_id = self
            .inner
            .producers
            .get(&raum)
            .and_then(|m| m.get(&producer).map(|e| e.engine_id.clone()))
            .ok_or_else(|| MediaError::nicht_gefunden(format!("Producer {producer}")))?;

        if !self
            .inner
            .engine
            .kann_konsumieren(&producer_engine_id, &rtp_faehigkeiten)
            .await?
        {
            return Err(MediaError::Verhandlung(format!(
                "Client kann Producer {producer} nicht empfangen"
            )));
        }

        let consumer = self
            .inner
            .engine
            .konsumieren(
                &transport_engine_id,
                &producer_engine_id,
                rtp_faehigkeiten,
                pausiert,
            )
            .await?;

        let id = ConsumerId::new();
        self.inner.consumers.insert(
            id,
            ConsumerEintrag {
                connection,
                engine_id: consumer.engine_id.clone(),
            },
        );

        debug!(consumer_id = %id, producer_id = %producer, connection_id = %connection, "Consumer erstellt");
        Ok((id, consumer))
    }

    /// Setzt einen pausiert erstellten Consumer fort
    pub async fn consumer_fortsetzen(
        &self,
        connection: ConnectionId,
        consumer: ConsumerId,
    ) -> Result<(), MediaError> {
        let engine_id = {
            let eintrag = self
                .inner
                .consumers
                .get(&consumer)
                .ok_or_else(|| MediaError::nicht_gefunden(format!("Consumer {consumer}")))?;
            if eintrag.connection != connection {
                return Err(MediaError::FremdeRessource(format!("Consumer {consumer}")));
            }
            eintrag.engine_id.clone()
        };

        self.inner.engine.consumer_fortsetzen(&engine_id).await
    }

    /// Schliesst einen einzelnen Producer des Aufrufers
    ///
    /// Consumer die diesen Producer empfangen bleiben registriert; ihre
    /// Verwaisung behandelt die Engine selbst.
    pub async fn produzenten_schliessen(
        &self,
        connection: ConnectionId,
        raum: AuctionId,
        producer: ProducerId,
    ) -> Result<(), MediaError> {
        let engine_id = {
            let mut raum_producer = self
                .inner
                .producers
                .get_mut(&raum)
                .ok_or_else(|| MediaError::nicht_gefunden(format!("Producer {producer}")))?;

            let eintrag = raum_producer
                .get(&producer)
                .ok_or_else(|| MediaError::nicht_gefunden(format!("Producer {producer}")))?;
            if eintrag.connection != connection {
                return Err(MediaError::FremdeRessource(format!("Producer {producer}")));
            }

            let eintrag = raum_producer.remove(&producer).unwrap();
            eintrag.engine_id
        };
        self.raum_aufraumen(raum);

        self.inner.engine.producer_schliessen(&engine_id).await?;
        debug!(producer_id = %producer, raum = %raum, "Producer geschlossen");
        Ok(())
    }

    /// Gibt alle Ressourcen einer Verbindung frei
    ///
    /// Idempotent: ein zweiter Aufruf fuer dieselbe Verbindung findet
    /// nichts mehr und liefert einen leeren Bericht. Engine-Fehler beim
    /// Schliessen werden protokolliert, brechen die Kaskade aber nicht ab.
    pub async fn alles_freigeben(&self, connection: ConnectionId) -> FreigabeBericht {
        // Erst alle Eintraege aus den Arenen loesen, dann die Engine rufen.
        // DashMap-Guards duerfen nicht ueber await-Punkte gehalten werden.
        let consumer_ids: Vec<ConsumerId> = self
            .inner
            .consumers
            .iter()
            .filter(|e| e.value().connection == connection)
            .map(|e| *e.key())
            .collect();
        let mut consumer_engine_ids = Vec::new();
        for id in consumer_ids {
            if let Some((_, eintrag)) = self.inner.consumers.remove(&id) {
                consumer_engine_ids.push(eintrag.engine_id);
            }
        }

        let mut producer_abgaenge = Vec::new();
        let mut producer_engine_ids = Vec::new();
        let raeume: Vec<AuctionId> = self.inner.producers.iter().map(|e| *e.key()).collect();
        for raum in raeume {
            if let Some(mut raum_producer) = self.inner.producers.get_mut(&raum) {
                let eigene: Vec<ProducerId> = raum_producer
                    .iter()
                    .filter(|(_, e)| e.connection == connection)
                    .map(|(id, _)| *id)
                    .collect();
                for id in eigene {
                    if let Some(eintrag) = raum_producer.remove(&id) {
                        producer_abgaenge.push(ProducerAbgang {
                            raum,
                            producer_id: id,
                        });
                        producer_engine_ids.push(eintrag.engine_id);
                    }
                }
            }
            self.raum_aufraumen(raum);
        }

        let transport_ids: Vec<TransportId> = self
            .inner
            .transports
            .iter()
            .filter(|e| e.value().connection == connection)
            .map(|e| *e.key())
            .collect();
        let mut transport_engine_ids = Vec::new();
        for id in transport_ids {
            if let Some((_, eintrag)) = self.inner.transports.remove(&id) {
                transport_engine_ids.push(eintrag.engine_id);
            }
        }

        let bericht = FreigabeBericht {
            producer_abgaenge,
            transports_geschlossen: transport_engine_ids.len(),
            consumers_geschlossen: consumer_engine_ids.len(),
        };

        for engine_id in consumer_engine_ids {
            if let Err(e) = self.inner.engine.consumer_schliessen(&engine_id).await {
                warn!(%engine_id, fehler = %e, "Consumer-Freigabe fehlgeschlagen");
            }
        }
        for engine_id in producer_engine_ids {
            if let Err(e) = self.inner.engine.producer_schliessen(&engine_id).await {
                warn!(%engine_id, fehler = %e, "Producer-Freigabe fehlgeschlagen");
            }
        }
        for engine_id in transport_engine_ids {
            if let Err(e) = self.inner.engine.transport_schliessen(&engine_id).await {
                warn!(%engine_id, fehler = %e, "Transport-Freigabe fehlgeschlagen");
            }
        }

        if !bericht.ist_leer() {
            debug!(
                connection_id = %connection,
                producer = bericht.producer_abgaenge.len(),
                transports = bericht.transports_geschlossen,
                consumers = bericht.consumers_geschlossen,
                "Medien-Ressourcen freigegeben"
            );
        }

        bericht
    }

    fn transport_pruefen(
        &self,
        connection: ConnectionId,
        transport: TransportId,
        erwartete_richtung: Option<TransportRichtung>,
    ) -> Result<String, MediaError> {
        let eintrag = self
            .inner
            .transports
            .get(&transport)
            .ok_or_else(|| MediaError::nicht_gefunden(format!("Transport {transport}")))?;

        if eintrag.connection != connection {
            return Err(MediaError::FremdeRessource(format!("Transport {transport}")));
        }
        if let Some(richtung) = erwartete_richtung {
            if eintrag.richtung != richtung {
                return Err(MediaError::nicht_gefunden(format!(
                    "Transport {transport} hat Richtung {:?}",
                    eintrag.richtung
                )));
            }
        }

        Ok(eintrag.engine_id.clone())
    }

    fn raum_aufraumen(&self, raum: AuctionId) {
        self.inner
            .producers
            .remove_if(&raum, |_, producer| producer.is_empty());
    }
}

impl FreigabeBericht {
    pub fn ist_leer(&self) -> bool {
        self.producer_abgaenge.is_empty()
            && self.transports_geschlossen == 0
            && self.consumers_geschlossen == 0
    }
}
