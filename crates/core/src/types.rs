//! Gemeinsame Identifikationstypen fuer Bidcast
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.
//!
//! Zwei Familien:
//! - Ephemere Laufzeit-IDs (`ConnectionId`, `TransportId`, `ProducerId`,
//!   `ConsumerId`) – frische UUIDs, gelten nur solange der Prozess lebt.
//! - Persistente Store-Schluessel (`AuctionId`, `UserKey`, `ProductKey`)
//!   und die externe Login-Kennung (`LoginId`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige ID einer aktiven Client-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Eindeutige ID eines Medien-Transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportId(pub Uuid);

impl TransportId {
    /// Erstellt eine neue zufaellige TransportId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport:{}", self.0)
    }
}

/// Eindeutige ID eines ausgehenden Medienstroms (Producer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerId(pub Uuid);

impl ProducerId {
    /// Erstellt eine neue zufaellige ProducerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ProducerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "producer:{}", self.0)
    }
}

/// Eindeutige ID eines eingehenden Medienstroms (Consumer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerId(pub Uuid);

impl ConsumerId {
    /// Erstellt eine neue zufaellige ConsumerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer:{}", self.0)
    }
}

/// Externe Login-Kennung eines Benutzers
///
/// Wird vom Login-System vergeben und ist ueber Verbindungen hinweg stabil.
/// Pro LoginId ist hoechstens eine Verbindung gleichzeitig aktiv
/// (Single-Active-Session-Invariante, siehe HostSessionTracker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoginId(pub String);

impl LoginId {
    /// Erstellt eine LoginId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die Kennung als &str zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "login:{}", self.0)
    }
}

impl From<&str> for LoginId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Persistenter Benutzer-Schluessel aus dem Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey(pub i64);

impl UserKey {
    /// Gibt den inneren Schluessel zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Persistenter Auktions-Schluessel – identifiziert zugleich den Raum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuctionId(pub i64);

impl AuctionId {
    /// Gibt den inneren Schluessel zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AuctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "auktion:{}", self.0)
    }
}

/// Persistenter Produkt-Schluessel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey(pub i64);

impl ProductKey {
    /// Gibt den inneren Schluessel zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "produkt:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn producer_id_eindeutig() {
        let a = ProducerId::new();
        let b = ProducerId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn auction_id_display() {
        let id = AuctionId(7);
        assert_eq!(id.to_string(), "auktion:7");
    }

    #[test]
    fn login_id_aus_str() {
        let login: LoginId = "haendler42".into();
        assert_eq!(login.als_str(), "haendler42");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let tid = TransportId::new();
        let json = serde_json::to_string(&tid).unwrap();
        let tid2: TransportId = serde_json::from_str(&json).unwrap();
        assert_eq!(tid, tid2);

        let pk = ProductKey(99);
        let json = serde_json::to_string(&pk).unwrap();
        let pk2: ProductKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, pk2);
    }
}
