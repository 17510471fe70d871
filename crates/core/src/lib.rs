//! bidcast-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die fundamentalen Identifikationstypen bereit, die
//! von allen anderen Bidcast-Crates gemeinsam genutzt werden. Fehlertypen
//! leben in den jeweiligen Fach-Crates.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{
    AuctionId, ConnectionId, ConsumerId, LoginId, ProducerId, ProductKey, TransportId, UserKey,
};
