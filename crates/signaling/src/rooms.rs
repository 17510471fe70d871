//! Room-Registry – verwaltet die Raum-Zugehoerigkeit aller Verbindungen
//!
//! Wer ist verbunden, in welchem Auktionsraum? Eine Verbindung ist immer
//! in hoechstens einem Raum; ein Beitritt wechselt implizit. Die
//! Zuschauerzahlen der Dashboards kommen aus derselben Arena.

use dashmap::DashMap;
use std::sync::Arc;

use bidcast_core::types::{AuctionId, ConnectionId};

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Zustand einer registrierten Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsInfo {
    pub connection_id: ConnectionId,
    pub raum: Option<AuctionId>,
}

/// Ergebnis eines Beitritts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeitrittErgebnis {
    /// Verlassener Raum mit seiner neuen Mitgliederzahl (bei Raumwechsel)
    pub alter_raum: Option<(AuctionId, usize)>,
    /// Mitgliederzahl des neuen Raums inklusive des Beitretenden
    pub user_count: usize,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Verwaltet die Raum-Zugehoerigkeit aller Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

struct RoomRegistryInner {
    /// Alle Verbindungen, indiziert nach ConnectionId
    verbindungen: DashMap<ConnectionId, VerbindungsInfo>,
    /// Raum -> Liste der Verbindungen in diesem Raum
    raum_mitglieder: DashMap<AuctionId, Vec<ConnectionId>>,
}

impl RoomRegistry {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                verbindungen: DashMap::new(),
                raum_mitglieder: DashMap::new(),
            }),
        }
    }

    /// Registriert eine neue Verbindung (noch ohne Raum)
    pub fn verbindung_registrieren(&self, connection_id: ConnectionId) {
        self.inner.verbindungen.insert(
            connection_id,
            VerbindungsInfo {
                connection_id,
                raum: None,
            },
        );
        tracing::info!(connection_id = %connection_id, "Verbindung online");
    }

    /// Entfernt eine Verbindung; gibt ihren letzten Raum samt neuer
    /// Mitgliederzahl zurueck
    pub fn verbindung_entfernen(&self, connection_id: &ConnectionId) -> Option<(AuctionId, usize)> {
        let info = self.inner.verbindungen.remove(connection_id)?.1;
        tracing::info!(connection_id = %connection_id, "Verbindung offline");

        let raum = info.raum?;
        self.aus_raum_entfernen_intern(connection_id, &raum);
        Some((raum, self.gast_anzahl(&raum)))
    }

    /// Fuegt eine Verbindung einem Raum hinzu
    ///
    /// Bei einem Raumwechsel wird die Verbindung zuerst aus ihrem alten
    /// Raum entfernt; der Aufrufer broadcastet dessen neuen Zaehlerstand.
    pub fn beitreten(&self, connection_id: ConnectionId, raum: AuctionId) -> BeitrittErgebnis {
        let alter_raum = {
            let mut entry = self
                .inner
                .verbindungen
                .entry(connection_id)
                .or_insert_with(|| VerbindungsInfo {
                    connection_id,
                    raum: None,
                });
            let alter = entry.raum;
            entry.raum = Some(raum);
            alter
        };

        let alter_raum = match alter_raum {
            Some(alter) if alter != raum => {
                self.aus_raum_entfernen_intern(&connection_id, &alter);
                Some((alter, self.gast_anzahl(&alter)))
            }
            Some(_) => {
                // Beitritt in den eigenen Raum: Zaehler unveraendert
                return BeitrittErgebnis {
                    alter_raum: None,
                    user_count: self.gast_anzahl(&raum),
                };
            }
            None => None,
        };

        self.inner
            .raum_mitglieder
            .entry(raum)
            .or_default()
            .push(connection_id);

        tracing::debug!(connection_id = %connection_id, raum = %raum, "Raum beigetreten");
        BeitrittErgebnis {
            alter_raum,
            user_count: self.gast_anzahl(&raum),
        }
    }

    /// Entfernt eine Verbindung aus ihrem Raum; gibt Raum und neue
    /// Mitgliederzahl zurueck
    pub fn verlassen(&self, connection_id: &ConnectionId) -> Option<(AuctionId, usize)> {
        let raum = self.inner.verbindungen.get_mut(connection_id)?.raum.take()?;

        self.aus_raum_entfernen_intern(connection_id, &raum);
        tracing::debug!(connection_id = %connection_id, raum = %raum, "Raum verlassen");
        Some((raum, self.gast_anzahl(&raum)))
    }

    /// Aktueller Raum einer Verbindung
    pub fn raum_von(&self, connection_id: &ConnectionId) -> Option<AuctionId> {
        self.inner.verbindungen.get(connection_id)?.raum
    }

    /// Alle Verbindungen eines Raums
    pub fn mitglieder(&self, raum: &AuctionId) -> Vec<ConnectionId> {
        self.inner
            .raum_mitglieder
            .get(raum)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Aktuelle Zuschauerzahl eines Raums
    pub fn gast_anzahl(&self, raum: &AuctionId) -> usize {
        self.inner
            .raum_mitglieder
            .get(raum)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Zuschauerzahlen fuer eine Liste von Auktionen (Dashboard-Bootstrap)
    pub fn gast_anzahlen(&self, raeume: &[AuctionId]) -> Vec<(AuctionId, usize)> {
        raeume
            .iter()
            .map(|raum| (*raum, self.gast_anzahl(raum)))
            .collect()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_verbunden(&self, connection_id: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(connection_id)
    }

    /// Anzahl aller registrierten Verbindungen
    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn aus_raum_entfernen_intern(&self, connection_id: &ConnectionId, raum: &AuctionId) {
        if let Some(mut ids) = self.inner.raum_mitglieder.get_mut(raum) {
            ids.retain(|cid| cid != connection_id);
            let ist_leer = ids.is_empty();
            drop(ids);
            if ist_leer {
                self.inner.raum_mitglieder.remove(raum);
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbinden_und_trennen() {
        let registry = RoomRegistry::neu();
        let cid = ConnectionId::new();

        registry.verbindung_registrieren(cid);
        assert!(registry.ist_verbunden(&cid));
        assert_eq!(registry.verbindungs_anzahl(), 1);

        assert_eq!(registry.verbindung_entfernen(&cid), None);
        assert!(!registry.ist_verbunden(&cid));
    }

    #[test]
    fn beitreten_und_verlassen() {
        let registry = RoomRegistry::neu();
        let cid = ConnectionId::new();
        let raum = AuctionId(1);

        registry.verbindung_registrieren(cid);
        let ergebnis = registry.beitreten(cid, raum);
        assert_eq!(ergebnis.alter_raum, None);
        assert_eq!(ergebnis.user_count, 1);
        assert_eq!(registry.raum_von(&cid), Some(raum));

        let (verlassen, anzahl) = registry.verlassen(&cid).unwrap();
        assert_eq!(verlassen, raum);
        assert_eq!(anzahl, 0);
        assert_eq!(registry.raum_von(&cid), None);
    }

    #[test]
    fn raumwechsel_meldet_alten_raum() {
        let registry = RoomRegistry::neu();
        let cid = ConnectionId::new();
        let bleibt = ConnectionId::new();

        registry.verbindung_registrieren(cid);
        registry.verbindung_registrieren(bleibt);
        registry.beitreten(bleibt, AuctionId(1));
        registry.beitreten(cid, AuctionId(1));

        let ergebnis = registry.beitreten(cid, AuctionId(2));
        assert_eq!(ergebnis.alter_raum, Some((AuctionId(1), 1)));
        assert_eq!(ergebnis.user_count, 1);
        assert_eq!(registry.gast_anzahl(&AuctionId(1)), 1);
        assert_eq!(registry.gast_anzahl(&AuctionId(2)), 1);
    }

    #[test]
    fn doppelter_beitritt_in_denselben_raum() {
        let registry = RoomRegistry::neu();
        let cid = ConnectionId::new();
        let raum = AuctionId(1);

        registry.verbindung_registrieren(cid);
        registry.beitreten(cid, raum);
        let ergebnis = registry.beitreten(cid, raum);

        assert_eq!(ergebnis.alter_raum, None);
        assert_eq!(ergebnis.user_count, 1);
        assert_eq!(registry.mitglieder(&raum).len(), 1);
    }

    #[test]
    fn trennung_meldet_letzten_raum() {
        let registry = RoomRegistry::neu();
        let cid = ConnectionId::new();
        let raum = AuctionId(5);

        registry.verbindung_registrieren(cid);
        registry.beitreten(cid, raum);

        let (gemeldet, anzahl) = registry.verbindung_entfernen(&cid).unwrap();
        assert_eq!(gemeldet, raum);
        assert_eq!(anzahl, 0);
        assert!(registry.mitglieder(&raum).is_empty());
    }

    #[test]
    fn gast_anzahlen_batch() {
        let registry = RoomRegistry::neu();
        for _ in 0..3 {
            let cid = ConnectionId::new();
            registry.verbindung_registrieren(cid);
            registry.beitreten(cid, AuctionId(1));
        }

        let anzahlen = registry.gast_anzahlen(&[AuctionId(1), AuctionId(2)]);
        assert_eq!(anzahlen, vec![(AuctionId(1), 3), (AuctionId(2), 0)]);
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let r1 = RoomRegistry::neu();
        let r2 = r1.clone();
        let cid = ConnectionId::new();

        r1.verbindung_registrieren(cid);
        assert!(r2.ist_verbunden(&cid));
    }
}
