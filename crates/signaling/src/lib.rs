//! bidcast-signaling – TCP Control Layer
//!
//! Dieses Crate implementiert die Koordinations-Schicht von Bidcast:
//! TCP-Verbindungen, Auktionsraeume, Gebots-Routing, Chat-Zustellung
//! und Medien-Signaling.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (AuctionServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- RaumHandler   (Beitreten, Zuschauerzahlen, Login-Bindung)
//!     +-- MediaHandler  (Transports, Producer, Consumer)
//!     +-- GebotHandler  (Auswahl, Gebote, Finalisierung, Auktionsende)
//!     +-- ChatHandler   (Nachrichten, Verlauf)
//!
//! RoomRegistry       – Wer ist verbunden, in welchem Raum
//! HostSessionTracker – Login-Bindungen, Host pro Auktion
//! EventBroadcaster   – Nachrichten an Verbindungen zustellen
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod rooms;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use rooms::RoomRegistry;
pub use server_state::{SignalingConfig, SignalingState};
pub use session::HostSessionTracker;
pub use tcp::AuctionServer;
