//! Datenbankmodelle fuer Bidcast
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Protokoll-Typen getrennt und dienen als reine
//! Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bidcast_core::types::{AuctionId, LoginId, ProductKey, UserKey};

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Benutzer-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub user_key: UserKey,
    pub login_id: LoginId,
    pub nickname: String,
}

// ---------------------------------------------------------------------------
// Auktionen
// ---------------------------------------------------------------------------

/// Status einer Auktion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuktionStatus {
    /// Angelegt, aber noch nicht gestartet
    Geplant,
    /// Der Host ist beigetreten, die Auktion laeuft
    Laufend,
    /// Vom Host beendet
    Beendet,
}

impl AuktionStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Geplant => "geplant",
            Self::Laufend => "laufend",
            Self::Beendet => "beendet",
        }
    }
}

impl std::str::FromStr for AuktionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geplant" => Ok(Self::Geplant),
            "laufend" => Ok(Self::Laufend),
            "beendet" => Ok(Self::Beendet),
            other => Err(format!("Unbekannter Auktions-Status: {other}")),
        }
    }
}

/// Auktions-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuktionRecord {
    pub auction_id: AuctionId,
    pub host_login: LoginId,
    pub titel: String,
    pub status: AuktionStatus,
    pub end_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Produkte
// ---------------------------------------------------------------------------

/// Status eines Produkts im Auktionsverlauf
///
/// Zustandsmaschine: Wartend -> InBearbeitung -> Zugeschlagen | Zurueckgegeben
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProduktStatus {
    /// Noch nicht aufgerufen
    Wartend,
    /// Vom Host ausgewaehlt, Gebote laufen
    InBearbeitung,
    /// Finalisiert mit Zuschlag
    Zugeschlagen,
    /// Finalisiert ohne Zuschlag
    Zurueckgegeben,
}

impl ProduktStatus {
    /// Einbuchstabiger Code wie er in der Spalte `prod_status` liegt
    pub fn als_code(&self) -> &'static str {
        match self {
            Self::Wartend => "W",
            Self::InBearbeitung => "P",
            Self::Zugeschlagen => "C",
            Self::Zurueckgegeben => "F",
        }
    }

    pub fn aus_code(code: &str) -> Result<Self, String> {
        match code {
            "W" => Ok(Self::Wartend),
            "P" => Ok(Self::InBearbeitung),
            "C" => Ok(Self::Zugeschlagen),
            "F" => Ok(Self::Zurueckgegeben),
            other => Err(format!("Unbekannter Produkt-Status: {other}")),
        }
    }
}

/// Produkt-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduktRecord {
    pub prod_key: ProductKey,
    pub auction_id: AuctionId,
    pub prod_name: String,
    pub prod_detail: Option<String>,
    /// Mindest-Erhoehungsschritt pro Gebot
    pub unit_value: i64,
    /// Startpreis (Minimum fuer das erste Gebot)
    pub init_price: i64,
    pub current_price: Option<i64>,
    pub final_price: Option<i64>,
    pub winner_key: Option<UserKey>,
    pub prod_status: ProduktStatus,
    pub file_url: Option<String>,
}

/// Preis-Schnappschuss fuer die Gebotspruefung
///
/// Enthaelt genau die drei Felder die der BidArbiter fuer die
/// Minimum-Berechnung braucht.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreisStand {
    pub current_price: Option<i64>,
    pub init_price: i64,
    pub unit_value: i64,
}

impl PreisStand {
    /// Berechnet das minimale gueltige Gebot
    pub fn minimum(&self) -> i64 {
        match self.current_price {
            None => self.init_price,
            Some(aktuell) => aktuell + self.unit_value,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Daten fuer eine neue Chat-Nachricht
#[derive(Debug, Clone)]
pub struct NeueChatNachricht<'a> {
    pub auction_id: AuctionId,
    pub user_key: UserKey,
    pub inhalt: &'a str,
}

/// Chat-Nachricht aus der Datenbank (mit aufgeloestem Nickname)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNachrichtRecord {
    pub auction_id: AuctionId,
    pub user_key: UserKey,
    pub nickname: String,
    pub inhalt: String,
    pub reg_date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gebots-Historie
// ---------------------------------------------------------------------------

/// Daten fuer einen neuen Historien-Eintrag
#[derive(Debug, Clone, Copy)]
pub struct NeuesGebot {
    pub user_key: UserKey,
    pub prod_key: ProductKey,
    pub betrag: i64,
    pub auction_id: AuctionId,
}

/// Hoechstgebot eines Benutzers auf ein Produkt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hoechstgebot {
    pub prod_key: ProductKey,
    pub betrag: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preis_stand_minimum_ohne_gebot() {
        let stand = PreisStand {
            current_price: None,
            init_price: 1000,
            unit_value: 500,
        };
        assert_eq!(stand.minimum(), 1000);
    }

    #[test]
    fn preis_stand_minimum_mit_gebot() {
        let stand = PreisStand {
            current_price: Some(1000),
            init_price: 1000,
            unit_value: 500,
        };
        assert_eq!(stand.minimum(), 1500);
    }

    #[test]
    fn produkt_status_codes() {
        assert_eq!(ProduktStatus::InBearbeitung.als_code(), "P");
        assert_eq!(
            ProduktStatus::aus_code("C").unwrap(),
            ProduktStatus::Zugeschlagen
        );
        assert!(ProduktStatus::aus_code("X").is_err());
    }

    #[test]
    fn auktion_status_round_trip() {
        for status in [
            AuktionStatus::Geplant,
            AuktionStatus::Laufend,
            AuktionStatus::Beendet,
        ] {
            assert_eq!(status.als_str().parse::<AuktionStatus>().unwrap(), status);
        }
    }
}
