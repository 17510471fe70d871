//! bidcast-media – Medien-Ressourcenverwaltung
//!
//! Dieses Crate besitzt die Zuordnung zwischen Verbindungen und ihren
//! Medien-Ressourcen (Transports, Producer, Consumer). Die eigentliche
//! WebRTC-Maschinerie (ICE, DTLS, RTP) lebt in einer externen Engine
//! hinter dem [`MediaEngine`]-Trait; hier wird nur Eigentum verwaltet
//! und die Freigabe-Kaskade beim Verbindungsabbau ausgefuehrt.

pub mod engine;
pub mod error;
pub mod loopback;
pub mod resources;

pub use engine::{EngineConsumer, EngineProducer, EngineTransport, MediaEngine};
pub use error::MediaError;
pub use loopback::LoopbackEngine;
pub use resources::{FreigabeBericht, MediaResourceManager, ProducerAbgang, RaumProducer};
