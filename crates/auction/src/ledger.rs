//! Fluechtiger Gebots-Ledger pro Verbindung
//!
//! Der Ledger existiert nur im Speicher: er zeigt dem Host live wer in
//! seinem Raum sitzt und was jede Verbindung zuletzt pro Produkt geboten
//! hat. Beim Beitritt wird er aus der Gebots-Historie des Stores
//! wiederhergestellt, beim Verbindungsabbau geleert.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use bidcast_core::types::{AuctionId, ConnectionId, ProductKey, UserKey};
use bidcast_protocol::control::{GebotEintrag, LedgerEintragInfo};

#[derive(Debug, Clone)]
struct LedgerEintrag {
    raum: AuctionId,
    user_key: Option<UserKey>,
    nickname: String,
    gebote: HashMap<ProductKey, i64>,
}

/// Sitzungs-Ledger aller Verbindungen, raumuebergreifend gehalten
#[derive(Clone, Default)]
pub struct GebotsLedger {
    eintraege: Arc<DashMap<ConnectionId, LedgerEintrag>>,
}

impl GebotsLedger {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt den Eintrag einer Verbindung an oder ersetzt ihn (Raumwechsel)
    pub fn eintrag_setzen(
        &self,
        connection: ConnectionId,
        raum: AuctionId,
        user_key: Option<UserKey>,
        nickname: impl Into<String>,
        gebote: HashMap<ProductKey, i64>,
    ) {
        self.eintraege.insert(
            connection,
            LedgerEintrag {
                raum,
                user_key,
                nickname: nickname.into(),
                gebote,
            },
        );
    }

    /// Vermerkt das zuletzt angenommene Gebot der Verbindung
    ///
    /// Ohne vorherigen Eintrag (Verbindung nie beigetreten) ein No-Op.
    pub fn gebot_vermerken(&self, connection: ConnectionId, produkt: ProductKey, betrag: i64) {
        if let Some(mut eintrag) = self.eintraege.get_mut(&connection) {
            eintrag.gebote.insert(produkt, betrag);
        }
    }

    /// Schnappschuss aller Eintraege eines Raums
    pub fn ledger_von(&self, raum: AuctionId) -> Vec<LedgerEintragInfo> {
        self.eintraege
            .iter()
            .filter(|e| e.value().raum == raum)
            .map(|e| {
                let eintrag = e.value();
                let mut gebote: Vec<GebotEintrag> = eintrag
                    .gebote
                    .iter()
                    .map(|(produkt, betrag)| GebotEintrag {
                        produkt: *produkt,
                        betrag: *betrag,
                    })
                    .collect();
                gebote.sort_by_key(|g| g.produkt.inner());

                LedgerEintragInfo {
                    connection: *e.key(),
                    user_key: eintrag.user_key,
                    nickname: eintrag.nickname.clone(),
                    gebote,
                }
            })
            .collect()
    }

    /// Entfernt den Eintrag; gibt den Raum zurueck falls einer existierte
    pub fn verbindung_entfernen(&self, connection: ConnectionId) -> Option<AuctionId> {
        self.eintraege
            .remove(&connection)
            .map(|(_, eintrag)| eintrag.raum)
    }

    /// Streicht ein finalisiertes Produkt aus allen Eintraegen des Raums
    pub fn produkt_leeren(&self, raum: AuctionId, produkt: ProductKey) {
        for mut eintrag in self.eintraege.iter_mut() {
            if eintrag.raum == raum {
                eintrag.gebote.remove(&produkt);
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eintrag_und_schnappschuss() {
        let ledger = GebotsLedger::neu();
        let conn = ConnectionId::new();
        let raum = AuctionId(1);

        ledger.eintrag_setzen(conn, raum, Some(UserKey(7)), "Anna", HashMap::new());
        ledger.gebot_vermerken(conn, ProductKey(10), 1500);

        let schnappschuss = ledger.ledger_von(raum);
        assert_eq!(schnappschuss.len(), 1);
        assert_eq!(schnappschuss[0].nickname, "Anna");
        assert_eq!(schnappschuss[0].gebote.len(), 1);
        assert_eq!(schnappschuss[0].gebote[0].betrag, 1500);

        // Anderer Raum ist leer
        assert!(ledger.ledger_von(AuctionId(2)).is_empty());
    }

    #[test]
    fn gebot_ohne_eintrag_ist_noop() {
        let ledger = GebotsLedger::neu();
        ledger.gebot_vermerken(ConnectionId::new(), ProductKey(1), 100);
        assert!(ledger.ledger_von(AuctionId(1)).is_empty());
    }

    #[test]
    fn produkt_leeren_streicht_nur_das_produkt() {
        let ledger = GebotsLedger::neu();
        let conn = ConnectionId::new();
        let raum = AuctionId(1);

        let mut gebote = HashMap::new();
        gebote.insert(ProductKey(10), 1000);
        gebote.insert(ProductKey(11), 2000);
        ledger.eintrag_setzen(conn, raum, Some(UserKey(7)), "Anna", gebote);

        ledger.produkt_leeren(raum, ProductKey(10));

        let schnappschuss = ledger.ledger_von(raum);
        assert_eq!(schnappschuss[0].gebote.len(), 1);
        assert_eq!(schnappschuss[0].gebote[0].produkt, ProductKey(11));
    }

    #[test]
    fn entfernen_liefert_raum() {
        let ledger = GebotsLedger::neu();
        let conn = ConnectionId::new();
        ledger.eintrag_setzen(conn, AuctionId(3), None, "Gast", HashMap::new());

        assert_eq!(ledger.verbindung_entfernen(conn), Some(AuctionId(3)));
        assert_eq!(ledger.verbindung_entfernen(conn), None);
    }

    #[test]
    fn raumwechsel_ersetzt_eintrag() {
        let ledger = GebotsLedger::neu();
        let conn = ConnectionId::new();

        let mut gebote = HashMap::new();
        gebote.insert(ProductKey(10), 1000);
        ledger.eintrag_setzen(conn, AuctionId(1), Some(UserKey(7)), "Anna", gebote);
        ledger.eintrag_setzen(conn, AuctionId(2), Some(UserKey(7)), "Anna", HashMap::new());

        assert!(ledger.ledger_von(AuctionId(1)).is_empty());
        let neu = ledger.ledger_von(AuctionId(2));
        assert!(neu[0].gebote.is_empty());
    }
}
