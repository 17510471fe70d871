//! Gebots-Historie (SQLite)

use sqlx::Row;

use bidcast_core::types::{AuctionId, ProductKey, UserKey};

use crate::models::{Hoechstgebot, NeuesGebot};
use crate::repository::{DbResult, GebotRepository};

use super::pool::SqliteDb;

impl GebotRepository for SqliteDb {
    async fn gebot_eintragen(&self, gebot: NeuesGebot) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO gebot_historie (user_key, prod_key, betrag, auction_id) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(gebot.user_key.inner())
        .bind(gebot.prod_key.inner())
        .bind(gebot.betrag)
        .bind(gebot.auction_id.inner())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn hoechstgebote(
        &self,
        user: UserKey,
        auktion: AuctionId,
    ) -> DbResult<Vec<Hoechstgebot>> {
        let rows = sqlx::query(
            "SELECT prod_key, MAX(betrag) AS betrag \
             FROM gebot_historie \
             WHERE user_key = ? AND auction_id = ? \
             GROUP BY prod_key",
        )
        .bind(user.inner())
        .bind(auktion.inner())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Hoechstgebot {
                    prod_key: ProductKey(row.try_get("prod_key")?),
                    betrag: row.try_get("betrag")?,
                })
            })
            .collect()
    }
}
