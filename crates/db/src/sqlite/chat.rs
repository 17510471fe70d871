//! Chat-Repository (SQLite)

use sqlx::Row;

use bidcast_core::types::{AuctionId, UserKey};

use crate::models::{ChatNachrichtRecord, NeueChatNachricht};
use crate::repository::{ChatRepository, DbResult};

use super::{parse_timestamp, pool::SqliteDb};

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<ChatNachrichtRecord> {
    let reg_date: String = row.try_get("reg_date")?;

    Ok(ChatNachrichtRecord {
        auction_id: AuctionId(row.try_get("auction_id")?),
        user_key: UserKey(row.try_get("user_key")?),
        nickname: row.try_get("nickname")?,
        inhalt: row.try_get("inhalt")?,
        reg_date: parse_timestamp(&reg_date),
    })
}

impl ChatRepository for SqliteDb {
    async fn chat_speichern(&self, data: NeueChatNachricht<'_>) -> DbResult<ChatNachrichtRecord> {
        let row = sqlx::query(
            "INSERT INTO chat_nachrichten (auction_id, user_key, inhalt) \
             VALUES (?, ?, ?) \
             RETURNING id",
        )
        .bind(data.auction_id.inner())
        .bind(data.user_key.inner())
        .bind(data.inhalt)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;

        let row = sqlx::query(
            "SELECT n.auction_id, n.user_key, b.nickname, n.inhalt, n.reg_date \
             FROM chat_nachrichten n \
             JOIN benutzer b ON b.user_key = n.user_key \
             WHERE n.id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        row_to_nachricht(&row)
    }

    async fn chat_verlauf(
        &self,
        auktion: AuctionId,
        limit: i64,
    ) -> DbResult<Vec<ChatNachrichtRecord>> {
        // Juengste `limit` Nachrichten holen, dann chronologisch kippen
        let rows = sqlx::query(
            "SELECT n.auction_id, n.user_key, b.nickname, n.inhalt, n.reg_date \
             FROM chat_nachrichten n \
             JOIN benutzer b ON b.user_key = n.user_key \
             WHERE n.auction_id = ? \
             ORDER BY n.id DESC \
             LIMIT ?",
        )
        .bind(auktion.inner())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut nachrichten = rows
            .iter()
            .map(row_to_nachricht)
            .collect::<DbResult<Vec<_>>>()?;
        nachrichten.reverse();

        Ok(nachrichten)
    }
}
