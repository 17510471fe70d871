//! In-Prozess-Engine ohne echten WebRTC-Stack
//!
//! Dient als Integrations-Naht: Handles werden erzeugt und validiert,
//! die Parameter-Blobs unveraendert zurueckgespiegelt. Eine echte
//! SFU-Anbindung implementiert denselben Trait.

use dashmap::DashMap;
use serde_json::{json, Value};
use uuid::Uuid;

use bidcast_protocol::control::{MedienArt, TransportRichtung};

use crate::engine::{EngineConsumer, EngineProducer, EngineTransport, MediaEngine};
use crate::error::MediaError;

/// Medien-Engine die alle Signaling-Ablaeufe in-Prozess beantwortet
#[derive(Default)]
pub struct LoopbackEngine {
    transports: DashMap<String, TransportRichtung>,
    producers: DashMap<String, (MedienArt, Value)>,
    consumers: DashMap<String, bool>,
}

impl LoopbackEngine {
    pub fn neu() -> Self {
        Self::default()
    }

    fn handle(prefix: &str) -> String {
        format!("{prefix}:{}", Uuid::new_v4())
    }
}

impl MediaEngine for LoopbackEngine {
    async fn router_faehigkeiten(&self) -> Result<Value, MediaError> {
        Ok(json!({
            "codecs": [
                { "kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2 },
                { "kind": "video", "mimeType": "video/VP8", "clockRate": 90000 }
            ],
            "headerExtensions": []
        }))
    }

    async fn transport_erstellen(
        &self,
        richtung: TransportRichtung,
    ) -> Result<EngineTransport, MediaError> {
        let engine_id = Self::handle("transport");
        self.transports.insert(engine_id.clone(), richtung);

        Ok(EngineTransport {
            engine_id,
            ice_parameter: json!({ "usernameFragment": Uuid::new_v4(), "iceLite": true }),
            ice_kandidaten: json!([]),
            dtls_parameter: json!({ "role": "auto", "fingerprints": [] }),
        })
    }

    async fn transport_verbinden(
        &self,
        engine_id: &str,
        _dtls_parameter: Value,
    ) -> Result<(), MediaError> {
        if !self.transports.contains_key(engine_id) {
            return Err(MediaError::nicht_gefunden(format!(
                "Transport {engine_id}"
            )));
        }
        Ok(())
    }

    async fn produzieren(
        &self,
        transport_engine_id: &str,
        art: MedienArt,
        rtp_parameter: Value,
    ) -> Result<EngineProducer, MediaError> {
        if !self.transports.contains_key(transport_engine_id) {
            return Err(MediaError::nicht_gefunden(format!(
                "Transport {transport_engine_id}"
            )));
        }

        let engine_id = Self::handle("producer");
        self.producers
            .insert(engine_id.clone(), (art, rtp_parameter));
        Ok(EngineProducer { engine_id, art })
    }

    async fn kann_konsumieren(
        &self,
        producer_engine_id: &str,
        _rtp_faehigkeiten: &Value,
    ) -> Result<bool, MediaError> {
        Ok(self.producers.contains_key(producer_engine_id))
    }

    async fn konsumieren(
        &self,
        transport_engine_id: &str,
        producer_engine_id: &str,
        _rtp_faehigkeiten: Value,
        pausiert: bool,
    ) -> Result<EngineConsumer, MediaError> {
        if !self.transports.contains_key(transport_engine_id) {
            return Err(MediaError::nicht_gefunden(format!(
                "Transport {transport_engine_id}"
            )));
        }
        let (art, rtp_parameter) = self
            .producers
            .get(producer_engine_id)
            .map(|e| e.clone())
            .ok_or_else(|| {
                MediaError::nicht_gefunden(format!("Producer {producer_engine_id}"))
            })?;

        let engine_id = Self::handle("consumer");
        self.consumers.insert(engine_id.clone(), pausiert);
        Ok(EngineConsumer {
            engine_id,
            art,
            rtp_parameter,
        })
    }

    async fn consumer_fortsetzen(&self, engine_id: &str) -> Result<(), MediaError> {
        match self.consumers.get_mut(engine_id) {
            Some(mut pausiert) => {
                *pausiert = false;
                Ok(())
            }
            None => Err(MediaError::nicht_gefunden(format!("Consumer {engine_id}"))),
        }
    }

    async fn transport_schliessen(&self, engine_id: &str) -> Result<(), MediaError> {
        self.transports.remove(engine_id);
        Ok(())
    }

    async fn producer_schliessen(&self, engine_id: &str) -> Result<(), MediaError> {
        self.producers.remove(engine_id);
        Ok(())
    }

    async fn consumer_schliessen(&self, engine_id: &str) -> Result<(), MediaError> {
        self.consumers.remove(engine_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn voller_signaling_ablauf() {
        let engine = LoopbackEngine::neu();

        let send = engine
            .transport_erstellen(TransportRichtung::Send)
            .await
            .unwrap();
        engine
            .transport_verbinden(&send.engine_id, json!({}))
            .await
            .unwrap();

        let producer = engine
            .produzieren(&send.engine_id, MedienArt::Video, json!({ "codecs": [] }))
            .await
            .unwrap();
        assert!(engine
            .kann_konsumieren(&producer.engine_id, &json!({}))
            .await
            .unwrap());

        let recv = engine
            .transport_erstellen(TransportRichtung::Recv)
            .await
            .unwrap();
        let consumer = engine
            .konsumieren(&recv.engine_id, &producer.engine_id, json!({}), true)
            .await
            .unwrap();
        assert_eq!(consumer.art, MedienArt::Video);
        engine.consumer_fortsetzen(&consumer.engine_id).await.unwrap();
    }

    #[tokio::test]
    async fn unbekannte_handles_werden_abgelehnt() {
        let engine = LoopbackEngine::neu();

        assert!(engine
            .transport_verbinden("transport:fehlt", json!({}))
            .await
            .is_err());
        assert!(engine
            .produzieren("transport:fehlt", MedienArt::Audio, json!({}))
            .await
            .is_err());
        assert!(!engine.kann_konsumieren("producer:fehlt", &json!({})).await.unwrap());
        assert!(engine.consumer_fortsetzen("consumer:fehlt").await.is_err());
    }
}
