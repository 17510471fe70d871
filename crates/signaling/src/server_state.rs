//! Gemeinsamer Server-Zustand fuer die Signaling-Schicht
//!
//! Haelt alle geteilten Services und Zustands-Manager als Arc-Referenzen,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use std::sync::Arc;

use bidcast_auction::{BidArbiter, GebotsLedger};
use bidcast_chat::ChatRelay;
use bidcast_db::BidcastStore;
use bidcast_media::{MediaEngine, MediaResourceManager};

use crate::broadcast::EventBroadcaster;
use crate::rooms::RoomRegistry;
use crate::session::HostSessionTracker;

/// Konfiguration fuer die Signaling-Schicht
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Bidcast Server".to_string(),
            max_clients: 2048,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Persistenter Store (Auktionen, Benutzer, Produkte, Chat, Gebote)
    pub db: Arc<S>,
    /// Medien-Ressourcenverwaltung (Transports, Producer, Consumer)
    pub media: MediaResourceManager<E>,
    /// Gebots-Arbitrierung (Auswahl, Gebote, Finalisierung)
    pub arbiter: BidArbiter<S>,
    /// Chat-Persistenz und Verlauf
    pub chat: ChatRelay<S>,
    /// Raum-Zugehoerigkeit aller Verbindungen
    pub rooms: RoomRegistry,
    /// Login-Bindungen und Host-Zuordnung
    pub sessions: HostSessionTracker,
    /// Nachrichten-Zustellung an Verbindungen
    pub broadcaster: EventBroadcaster,
}

impl<S, E> SignalingState<S, E>
where
    S: BidcastStore + 'static,
    E: MediaEngine,
{
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, db: Arc<S>, engine: E) -> Arc<Self> {
        let rooms = RoomRegistry::neu();
        Arc::new(Self {
            config: Arc::new(config),
            arbiter: BidArbiter::neu(db.clone(), GebotsLedger::neu()),
            chat: ChatRelay::neu(db.clone()),
            db,
            media: MediaResourceManager::neu(engine),
            broadcaster: EventBroadcaster::neu(rooms.clone()),
            rooms,
            sessions: HostSessionTracker::neu(),
        })
    }
}
