//! ChatRelay – Nachrichten persistieren und fuer den Fan-out aufbereiten

use std::sync::Arc;

use tracing::debug;

use bidcast_core::types::{AuctionId, LoginId};
use bidcast_db::models::NeueChatNachricht;
use bidcast_db::{BenutzerRepository, ChatRepository};
use bidcast_protocol::control::ChatNachrichtInfo;

use crate::error::{ChatError, ChatResult};

/// Anzahl Nachrichten die ein Beitretender als Verlauf bekommt
pub const VERLAUF_LIMIT: i64 = 40;

/// Maximale Nachrichtenlaenge in Zeichen
const MAX_NACHRICHT: usize = 2000;

/// Persistiert Chat-Nachrichten und liefert den Beitritts-Verlauf
pub struct ChatRelay<S> {
    store: Arc<S>,
}

impl<S> Clone for ChatRelay<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: BenutzerRepository + ChatRepository> ChatRelay<S> {
    pub fn neu(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Nimmt eine Nachricht an, persistiert sie und gibt das fertige
    /// Broadcast-Payload zurueck
    pub async fn nachricht_senden(
        &self,
        auktion: AuctionId,
        absender: &LoginId,
        inhalt: &str,
    ) -> ChatResult<ChatNachrichtInfo> {
        let inhalt = inhalt.trim();
        if inhalt.is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }
        if inhalt.chars().count() > MAX_NACHRICHT {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang (Maximum: {MAX_NACHRICHT} Zeichen)"
            )));
        }

        let benutzer = self
            .store
            .benutzer_nach_login(absender)
            .await?
            .ok_or_else(|| ChatError::UnbekannterAbsender(absender.als_str().to_string()))?;

        let record = self
            .store
            .chat_speichern(NeueChatNachricht {
                auction_id: auktion,
                user_key: benutzer.user_key,
                inhalt,
            })
            .await?;

        debug!(auktion = %auktion, absender = %absender.als_str(), "Chat-Nachricht gespeichert");

        Ok(ChatNachrichtInfo {
            nickname: record.nickname,
            inhalt: record.inhalt,
            zeitstempel: record.reg_date,
        })
    }

    /// Verlauf fuer den Raumbeitritt, aelteste Nachricht zuerst
    pub async fn verlauf(&self, auktion: AuctionId) -> ChatResult<Vec<ChatNachrichtInfo>> {
        let nachrichten = self.store.chat_verlauf(auktion, VERLAUF_LIMIT).await?;

        Ok(nachrichten
            .into_iter()
            .map(|n| ChatNachrichtInfo {
                nickname: n.nickname,
                inhalt: n.inhalt,
                zeitstempel: n.reg_date,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidcast_db::SqliteDb;

    async fn test_umgebung() -> (ChatRelay<SqliteDb>, Arc<SqliteDb>, AuctionId) {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());

        sqlx::query("INSERT INTO benutzer (login_id, nickname) VALUES ('kaeufer1', 'Anna')")
            .execute(db.pool())
            .await
            .unwrap();
        let auktion: (i64,) = sqlx::query_as(
            "INSERT INTO auktionen (host_login, titel, status) \
             VALUES ('kaeufer1', 'Abendauktion', 'laufend') RETURNING auction_id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        (ChatRelay::neu(db.clone()), db, AuctionId(auktion.0))
    }

    #[tokio::test]
    async fn nachricht_senden_und_verlauf() {
        let (relay, _db, auktion) = test_umgebung().await;
        let login = LoginId::from("kaeufer1");

        let info = relay
            .nachricht_senden(auktion, &login, "Hallo zusammen")
            .await
            .unwrap();
        assert_eq!(info.nickname, "Anna");
        assert_eq!(info.inhalt, "Hallo zusammen");

        let verlauf = relay.verlauf(auktion).await.unwrap();
        assert_eq!(verlauf.len(), 1);
        assert_eq!(verlauf[0].inhalt, "Hallo zusammen");
    }

    #[tokio::test]
    async fn leere_nachricht_wird_abgelehnt() {
        let (relay, _db, auktion) = test_umgebung().await;
        let login = LoginId::from("kaeufer1");

        let fehler = relay.nachricht_senden(auktion, &login, "   ").await;
        assert!(matches!(fehler, Err(ChatError::UngueltigeEingabe(_))));
    }

    #[tokio::test]
    async fn unbekannter_absender_wird_abgelehnt() {
        let (relay, _db, auktion) = test_umgebung().await;

        let fehler = relay
            .nachricht_senden(auktion, &LoginId::from("niemand"), "Hallo")
            .await;
        assert!(matches!(fehler, Err(ChatError::UnbekannterAbsender(_))));
    }

    #[tokio::test]
    async fn verlauf_ist_chronologisch_und_begrenzt() {
        let (relay, _db, auktion) = test_umgebung().await;
        let login = LoginId::from("kaeufer1");

        for i in 0..(VERLAUF_LIMIT + 5) {
            relay
                .nachricht_senden(auktion, &login, &format!("Nachricht {i}"))
                .await
                .unwrap();
        }

        let verlauf = relay.verlauf(auktion).await.unwrap();
        assert_eq!(verlauf.len(), VERLAUF_LIMIT as usize);
        assert_eq!(verlauf[0].inhalt, "Nachricht 5");
        assert_eq!(
            verlauf.last().unwrap().inhalt,
            format!("Nachricht {}", VERLAUF_LIMIT + 4)
        );
    }
}
