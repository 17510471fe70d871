//! Schnittstelle zur externen Medien-Engine
//!
//! Die Engine kapselt den kompletten WebRTC-Stack. Alle Parameter-Blobs
//! (ICE, DTLS, RTP) sind fuer die Koordinations-Schicht opak und werden
//! als `serde_json::Value` durchgereicht.

use serde_json::Value;

use bidcast_protocol::control::{MedienArt, TransportRichtung};

use crate::error::MediaError;

/// Engine-seitige Beschreibung eines frisch erstellten Transports
#[derive(Debug, Clone)]
pub struct EngineTransport {
    /// Engine-interner Handle
    pub engine_id: String,
    pub ice_parameter: Value,
    pub ice_kandidaten: Value,
    pub dtls_parameter: Value,
}

/// Engine-seitiger Producer-Handle
#[derive(Debug, Clone)]
pub struct EngineProducer {
    pub engine_id: String,
    pub art: MedienArt,
}

/// Engine-seitiger Consumer-Handle
#[derive(Debug, Clone)]
pub struct EngineConsumer {
    pub engine_id: String,
    pub art: MedienArt,
    /// RTP-Parameter die der Client zum Empfangen braucht
    pub rtp_parameter: Value,
}

/// Abstraktion ueber die WebRTC-Engine
///
/// Der [`MediaResourceManager`](crate::resources::MediaResourceManager)
/// ruft diese Operationen auf und verwaltet die zurueckgegebenen Handles;
/// er interpretiert ihre Inhalte nie.
#[allow(async_fn_in_trait)]
pub trait MediaEngine: Send + Sync + 'static {
    /// RTP-Faehigkeiten des Routers (fuer die Client-Initialisierung)
    async fn router_faehigkeiten(&self) -> Result<Value, MediaError>;

    /// Erstellt einen WebRTC-Transport in der angegebenen Richtung
    async fn transport_erstellen(
        &self,
        richtung: TransportRichtung,
    ) -> Result<EngineTransport, MediaError>;

    /// Schliesst den DTLS-Handshake eines Transports ab
    async fn transport_verbinden(
        &self,
        engine_id: &str,
        dtls_parameter: Value,
    ) -> Result<(), MediaError>;

    /// Startet einen Medienfluss auf einem Send-Transport
    async fn produzieren(
        &self,
        transport_engine_id: &str,
        art: MedienArt,
        rtp_parameter: Value,
    ) -> Result<EngineProducer, MediaError>;

    /// Prueft ob die RTP-Faehigkeiten des Clients den Producer empfangen koennen
    async fn kann_konsumieren(
        &self,
        producer_engine_id: &str,
        rtp_faehigkeiten: &Value,
    ) -> Result<bool, MediaError>;

    /// Erstellt einen Consumer auf einem Recv-Transport
    async fn konsumieren(
        &self,
        transport_engine_id: &str,
        producer_engine_id: &str,
        rtp_faehigkeiten: Value,
        pausiert: bool,
    ) -> Result<EngineConsumer, MediaError>;

    /// Setzt einen pausiert erstellten Consumer fort
    async fn consumer_fortsetzen(&self, engine_id: &str) -> Result<(), MediaError>;

    /// Schliesst einen Transport samt allem was darauf lebt
    async fn transport_schliessen(&self, engine_id: &str) -> Result<(), MediaError>;

    /// Schliesst einen einzelnen Producer
    async fn producer_schliessen(&self, engine_id: &str) -> Result<(), MediaError>;

    /// Schliesst einen einzelnen Consumer
    async fn consumer_schliessen(&self, engine_id: &str) -> Result<(), MediaError>;
}
