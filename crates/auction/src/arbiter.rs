//! Gebots-Arbitrierung
//!
//! Alle preisveraendernden Operationen auf einem Produkt laufen durch
//! ein produktweises Async-Mutex. Das Schloss wird ueber den kompletten
//! Lese-Pruef-Schreib-Zyklus gehalten; zwei gleichzeitige Gebote auf
//! dasselbe Produkt sehen dadurch nie denselben Ausgangspreis.
//!
//! Der Store wird vor dem In-Memory-Zustand geschrieben: schlaegt der
//! Store-Zugriff fehl, bleibt der Ledger unveraendert.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use bidcast_core::types::{AuctionId, ConnectionId, LoginId, ProductKey, UserKey};
use bidcast_db::models::{NeuesGebot, ProduktRecord, ProduktStatus};
use bidcast_db::BidcastStore;
use bidcast_protocol::control::{BieterInfo, GebotAusgang, LedgerEintragInfo, ProduktInfo};

use crate::error::AuktionError;
use crate::ledger::GebotsLedger;

/// Ergebnis eines angenommenen Gebots, fertig fuer die Raum-Broadcasts
#[derive(Debug, Clone)]
pub struct GebotErgebnis {
    pub produkt: ProduktInfo,
    pub bieter: BieterInfo,
    pub ledger: Vec<LedgerEintragInfo>,
}

struct ArbiterInner<S> {
    store: Arc<S>,
    ledger: GebotsLedger,
    /// Aktuell aufgerufenes Produkt pro Auktion
    ausgewaehlt: DashMap<AuctionId, ProduktInfo>,
    /// Produktweise Schloesser fuer die Gebots-Serialisierung
    schloesser: DashMap<(AuctionId, ProductKey), Arc<Mutex<()>>>,
}

/// Nimmt Gebote an, lehnt sie ab und verwaltet den Auktionszustand
pub struct BidArbiter<S> {
    inner: Arc<ArbiterInner<S>>,
}

impl<S> Clone for BidArbiter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: BidcastStore> BidArbiter<S> {
    pub fn neu(store: Arc<S>, ledger: GebotsLedger) -> Self {
        Self {
            inner: Arc::new(ArbiterInner {
                store,
                ledger,
                ausgewaehlt: DashMap::new(),
                schloesser: DashMap::new(),
            }),
        }
    }

    pub fn ledger(&self) -> &GebotsLedger {
        &self.inner.ledger
    }

    /// Aktuell aufgerufenes Produkt der Auktion (fuer den Beitritt)
    pub fn ausgewaehltes_produkt(&self, auktion: AuctionId) -> Option<ProduktInfo> {
        self.inner.ausgewaehlt.get(&auktion).map(|e| e.clone())
    }

    /// Legt beim Beitritt den Ledger-Eintrag der Verbindung an
    ///
    /// Bekannte Benutzer bekommen ihre Hoechstgebote aus der Historie
    /// zurueck; unbekannte Logins treten als Gast ohne Gebote auf.
    /// Gibt den frischen Raum-Schnappschuss zurueck.
    pub async fn eintrag_sicherstellen(
        &self,
        connection: ConnectionId,
        raum: AuctionId,
        login: &LoginId,
    ) -> Result<Vec<LedgerEintragInfo>, AuktionError> {
        let benutzer = self.inner.store.benutzer_nach_login(login).await?;

        let (user_key, nickname, gebote) = match benutzer {
            Some(benutzer) => {
                let historie = self
                    .inner
                    .store
                    .hoechstgebote(benutzer.user_key, raum)
                    .await?;
                let gebote: HashMap<ProductKey, i64> = historie
                    .into_iter()
                    .map(|g| (g.prod_key, g.betrag))
                    .collect();
                (Some(benutzer.user_key), benutzer.nickname, gebote)
            }
            None => (None, login.als_str().to_string(), HashMap::new()),
        };

        self.inner
            .ledger
            .eintrag_setzen(connection, raum, user_key, nickname, gebote);

        Ok(self.inner.ledger.ledger_von(raum))
    }

    /// Host ruft ein Produkt auf
    pub async fn produkt_auswaehlen(
        &self,
        auktion: AuctionId,
        mut produkt: ProduktInfo,
    ) -> Result<ProduktInfo, AuktionError> {
        if produkt.auktion != auktion {
            return Err(AuktionError::validierung(format!(
                "Produkt {} gehoert nicht zu Auktion {}",
                produkt.prod_key, auktion
            )));
        }

        let gesetzt = self
            .inner
            .store
            .produkt_status_setzen(produkt.prod_key, ProduktStatus::InBearbeitung)
            .await?;
        if !gesetzt {
            return Err(AuktionError::nicht_gefunden(format!(
                "Produkt {}",
                produkt.prod_key
            )));
        }

        produkt.status = ProduktStatus::InBearbeitung.als_code().to_string();
        self.inner.ausgewaehlt.insert(auktion, produkt.clone());

        info!(auktion = %auktion, produkt = %produkt.prod_key, "Produkt aufgerufen");
        Ok(produkt)
    }

    /// Verarbeitet einen Gebotsversuch
    ///
    /// Unter dem Produkt-Schloss: Preis lesen, Minimum pruefen, Preis
    /// und Historie schreiben, Ledger aktualisieren.
    pub async fn gebot_verarbeiten(
        &self,
        connection: ConnectionId,
        auktion: AuctionId,
        produkt: ProductKey,
        betrag: i64,
        login: &LoginId,
    ) -> Result<GebotErgebnis, AuktionError> {
        let bieter = self
            .inner
            .store
            .benutzer_nach_login(login)
            .await?
            .ok_or_else(|| {
                AuktionError::validierung(format!("Unbekannter Bieter: {}", login.als_str()))
            })?;

        let schloss = self.produkt_schloss(auktion, produkt);
        let _fuehrung = schloss.lock().await;

        let stand = self
            .inner
            .store
            .preis_stand(produkt)
            .await?
            .ok_or_else(|| AuktionError::nicht_gefunden(format!("Produkt {produkt}")))?;

        let minimum = stand.minimum();
        if betrag < minimum {
            debug!(
                produkt = %produkt,
                betrag,
                minimum,
                "Gebot unter Minimum abgelehnt"
            );
            return Err(AuktionError::GebotZuNiedrig { minimum });
        }

        let record = self
            .inner
            .store
            .gebot_uebernehmen(produkt, betrag, bieter.user_key)
            .await?
            .ok_or_else(|| AuktionError::nicht_gefunden(format!("Produkt {produkt}")))?;

        self.inner
            .store
            .gebot_eintragen(NeuesGebot {
                user_key: bieter.user_key,
                prod_key: produkt,
                betrag,
                auction_id: auktion,
            })
            .await?;

        self.inner.ledger.gebot_vermerken(connection, produkt, betrag);

        let info = produkt_info(&record);
        if let Some(mut ausgewaehlt) = self.inner.ausgewaehlt.get_mut(&auktion) {
            if ausgewaehlt.prod_key == produkt {
                *ausgewaehlt = info.clone();
            }
        }

        info!(
            auktion = %auktion,
            produkt = %produkt,
            betrag,
            bieter = %bieter.user_key,
            "Gebot angenommen"
        );

        Ok(GebotErgebnis {
            produkt: info,
            bieter: BieterInfo {
                user_key: Some(bieter.user_key),
                login: Some(bieter.login_id),
                nickname: Some(bieter.nickname),
                connection: Some(connection),
            },
            ledger: self.inner.ledger.ledger_von(auktion),
        })
    }

    /// Host finalisiert das Produkt (Zuschlag oder Rueckgabe)
    ///
    /// Streicht das Produkt aus allen Ledger-Eintraegen des Raums und
    /// gibt Produkt plus frischen Schnappschuss zurueck.
    pub async fn finalisieren(
        &self,
        auktion: AuctionId,
        produkt: ProductKey,
        ausgang: GebotAusgang,
    ) -> Result<(ProduktInfo, Vec<LedgerEintragInfo>), AuktionError> {
        let schloss = self.produkt_schloss(auktion, produkt);
        let _fuehrung = schloss.lock().await;

        let status = match ausgang {
            GebotAusgang::Zuschlag => ProduktStatus::Zugeschlagen,
            GebotAusgang::Rueckgabe => ProduktStatus::Zurueckgegeben,
        };

        let gesetzt = self
            .inner
            .store
            .produkt_status_setzen(produkt, status)
            .await?;
        if !gesetzt {
            return Err(AuktionError::nicht_gefunden(format!("Produkt {produkt}")));
        }

        let record = self
            .inner
            .store
            .produkt_laden(produkt)
            .await?
            .ok_or_else(|| AuktionError::nicht_gefunden(format!("Produkt {produkt}")))?;

        self.inner.ledger.produkt_leeren(auktion, produkt);
        self.inner
            .ausgewaehlt
            .remove_if(&auktion, |_, info| info.prod_key == produkt);

        info!(auktion = %auktion, produkt = %produkt, ?ausgang, "Produkt finalisiert");
        Ok((produkt_info(&record), self.inner.ledger.ledger_von(auktion)))
    }

    /// Host korrigiert Preis und Gewinner direkt (Fehlzuschlag)
    pub async fn gebot_zuruecksetzen(
        &self,
        auktion: AuctionId,
        produkt: ProductKey,
        final_preis: i64,
        gewinner: Option<UserKey>,
    ) -> Result<ProduktInfo, AuktionError> {
        let schloss = self.produkt_schloss(auktion, produkt);
        let _fuehrung = schloss.lock().await;

        let record = self
            .inner
            .store
            .preis_korrigieren(produkt, final_preis, gewinner)
            .await?
            .ok_or_else(|| AuktionError::nicht_gefunden(format!("Produkt {produkt}")))?;

        let info = produkt_info(&record);
        if let Some(mut ausgewaehlt) = self.inner.ausgewaehlt.get_mut(&auktion) {
            if ausgewaehlt.prod_key == produkt {
                *ausgewaehlt = info.clone();
            }
        }

        info!(auktion = %auktion, produkt = %produkt, final_preis, "Gebot zurueckgesetzt");
        Ok(info)
    }

    /// Beendet die Auktion und raeumt ihren fluechtigen Zustand ab
    pub async fn auktion_beenden(&self, auktion: AuctionId) -> Result<bool, AuktionError> {
        let beendet = self.inner.store.auktion_beenden(auktion).await?;

        self.inner.ausgewaehlt.remove(&auktion);
        self.inner
            .schloesser
            .retain(|(a, _), _| *a != auktion);

        if beendet {
            info!(auktion = %auktion, "Auktion beendet");
        }
        Ok(beendet)
    }

    fn produkt_schloss(&self, auktion: AuctionId, produkt: ProductKey) -> Arc<Mutex<()>> {
        self.inner
            .schloesser
            .entry((auktion, produkt))
            .or_default()
            .clone()
    }
}

fn produkt_info(record: &ProduktRecord) -> ProduktInfo {
    ProduktInfo {
        prod_key: record.prod_key,
        auktion: record.auction_id,
        name: record.prod_name.clone(),
        detail: record.prod_detail.clone(),
        unit_value: record.unit_value,
        init_price: record.init_price,
        current_price: record.current_price,
        final_price: record.final_price,
        winner: record.winner_key,
        status: record.prod_status.als_code().to_string(),
        file_url: record.file_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidcast_db::SqliteDb;

    async fn test_umgebung() -> (BidArbiter<SqliteDb>, Arc<SqliteDb>, AuctionId, ProductKey) {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());

        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('host1', 'Heinz')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('kaeufer1', 'Anna')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('kaeufer2', 'Bernd')")
            .execute(db.pool())
            .await
            .unwrap();
        let auktion: (i64,) = sqlx::query_as(
            "INSERT INTO auktionen (host_login, titel, status) \
             VALUES ('host1', 'Abendauktion', 'laufend') RETURNING auction_id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        let produkt: (i64,) = sqlx::query_as(
            "INSERT INTO produkte (auction_id, prod_name, unit_value, init_price) \
             VALUES (?, 'Vase', 500, 1000) RETURNING prod_key",
        )
        .bind(auktion.0)
        .fetch_one(db.pool())
        .await
        .unwrap();

        let arbiter = BidArbiter::neu(db.clone(), GebotsLedger::neu());
        (arbiter, db, AuctionId(auktion.0), ProductKey(produkt.0))
    }

    async fn beitreten(
        arbiter: &BidArbiter<SqliteDb>,
        raum: AuctionId,
        login: &str,
    ) -> ConnectionId {
        let conn = ConnectionId::new();
        arbiter
            .eintrag_sicherstellen(conn, raum, &LoginId::from(login))
            .await
            .unwrap();
        conn
    }

    #[tokio::test]
    async fn erstes_gebot_braucht_startpreis() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;

        let fehler = arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 999, &LoginId::from("kaeufer1"))
            .await;
        assert!(matches!(
            fehler,
            Err(AuktionError::GebotZuNiedrig { minimum: 1000 })
        ));

        let ergebnis = arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &LoginId::from("kaeufer1"))
            .await
            .unwrap();
        assert_eq!(ergebnis.produkt.current_price, Some(1000));
        assert_eq!(ergebnis.bieter.nickname.as_deref(), Some("Anna"));
    }

    #[tokio::test]
    async fn folgegebot_braucht_schrittweite() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;
        let login = LoginId::from("kaeufer1");

        arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &login)
            .await
            .unwrap();

        // 1400 liegt unter 1000 + 500
        let fehler = arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1400, &login)
            .await;
        assert!(matches!(
            fehler,
            Err(AuktionError::GebotZuNiedrig { minimum: 1500 })
        ));

        let ergebnis = arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1500, &login)
            .await
            .unwrap();
        assert_eq!(ergebnis.produkt.current_price, Some(1500));
    }

    #[tokio::test]
    async fn unbekannter_bieter_wird_abgelehnt() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = ConnectionId::new();

        let fehler = arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &LoginId::from("niemand"))
            .await;
        assert!(matches!(fehler, Err(AuktionError::Validierung(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn nebenlaeufige_gebote_werden_serialisiert() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn_a = beitreten(&arbiter, auktion, "kaeufer1").await;
        let conn_b = beitreten(&arbiter, auktion, "kaeufer2").await;

        // Beide bieten den Startpreis gleichzeitig; genau einer gewinnt,
        // der andere sieht das neue Minimum.
        let a = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move {
                arbiter
                    .gebot_verarbeiten(conn_a, auktion, produkt, 1000, &LoginId::from("kaeufer1"))
                    .await
            })
        };
        let b = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move {
                arbiter
                    .gebot_verarbeiten(conn_b, auktion, produkt, 1000, &LoginId::from("kaeufer2"))
                    .await
            })
        };

        let ergebnisse = [a.await.unwrap(), b.await.unwrap()];
        let angenommen = ergebnisse.iter().filter(|r| r.is_ok()).count();
        assert_eq!(angenommen, 1);

        let abgelehnt = ergebnisse
            .iter()
            .find(|r| r.is_err())
            .unwrap()
            .as_ref()
            .unwrap_err();
        assert!(matches!(
            abgelehnt,
            AuktionError::GebotZuNiedrig { minimum: 1500 }
        ));
    }

    #[tokio::test]
    async fn finalisieren_leert_ledger_und_auswahl() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;
        let login = LoginId::from("kaeufer1");

        let info = ProduktInfo {
            prod_key: produkt,
            auktion,
            name: "Vase".into(),
            detail: None,
            unit_value: 500,
            init_price: 1000,
            current_price: None,
            final_price: None,
            winner: None,
            status: "W".into(),
            file_url: None,
        };
        arbiter.produkt_auswaehlen(auktion, info).await.unwrap();
        assert!(arbiter.ausgewaehltes_produkt(auktion).is_some());

        arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &login)
            .await
            .unwrap();

        let (finalisiert, ledger) = arbiter
            .finalisieren(auktion, produkt, GebotAusgang::Zuschlag)
            .await
            .unwrap();
        assert_eq!(finalisiert.status, "C");
        assert!(ledger[0].gebote.is_empty());
        assert!(arbiter.ausgewaehltes_produkt(auktion).is_none());
    }

    #[tokio::test]
    async fn zuruecksetzen_ueberschreibt_preis_und_gewinner() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;

        arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1500, &LoginId::from("kaeufer1"))
            .await
            .unwrap();

        let info = arbiter
            .gebot_zuruecksetzen(auktion, produkt, 1000, None)
            .await
            .unwrap();
        assert_eq!(info.final_price, Some(1000));
        assert_eq!(info.winner, None);
    }

    #[tokio::test]
    async fn auktion_beenden_raeumt_auf() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;

        arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &LoginId::from("kaeufer1"))
            .await
            .unwrap();

        assert!(arbiter.auktion_beenden(auktion).await.unwrap());
        assert!(arbiter.ausgewaehltes_produkt(auktion).is_none());
        // Zweites Beenden ist ein No-Op
        assert!(!arbiter.auktion_beenden(auktion).await.unwrap());
    }

    #[tokio::test]
    async fn beitritt_stellt_hoechstgebote_wieder_her() {
        let (arbiter, _db, auktion, produkt) = test_umgebung().await;
        let conn = beitreten(&arbiter, auktion, "kaeufer1").await;
        let login = LoginId::from("kaeufer1");

        arbiter
            .gebot_verarbeiten(conn, auktion, produkt, 1000, &login)
            .await
            .unwrap();

        // Neue Verbindung desselben Benutzers sieht ihr altes Hoechstgebot
        let neue_verbindung = ConnectionId::new();
        let ledger = arbiter
            .eintrag_sicherstellen(neue_verbindung, auktion, &login)
            .await
            .unwrap();
        let eintrag = ledger
            .iter()
            .find(|e| e.connection == neue_verbindung)
            .unwrap();
        assert_eq!(eintrag.gebote.len(), 1);
        assert_eq!(eintrag.gebote[0].betrag, 1000);
    }
}
