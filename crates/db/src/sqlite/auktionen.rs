//! Auktions-Repository (SQLite)

use sqlx::Row;

use bidcast_core::types::{AuctionId, LoginId};

use crate::error::DbError;
use crate::models::{AuktionRecord, AuktionStatus};
use crate::repository::{AuktionRepository, DbResult};

use super::{parse_timestamp, pool::SqliteDb};

fn row_to_auktion(row: &sqlx::sqlite::SqliteRow) -> DbResult<AuktionRecord> {
    let status: String = row.try_get("status")?;
    let end_time: Option<String> = row.try_get("end_time")?;

    Ok(AuktionRecord {
        auction_id: AuctionId(row.try_get("auction_id")?),
        host_login: LoginId(row.try_get("host_login")?),
        titel: row.try_get("titel")?,
        status: status
            .parse::<AuktionStatus>()
            .map_err(DbError::UngueltigeDaten)?,
        end_time: end_time.as_deref().map(parse_timestamp),
    })
}

impl AuktionRepository for SqliteDb {
    async fn auktion_laden(&self, auktion: AuctionId) -> DbResult<Option<AuktionRecord>> {
        let row = sqlx::query(
            "SELECT auction_id, host_login, titel, status, end_time \
             FROM auktionen WHERE auction_id = ?",
        )
        .bind(auktion.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_auktion).transpose()
    }

    async fn ist_host(&self, auktion: AuctionId, login: &LoginId) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT 1 AS eins FROM auktionen WHERE auction_id = ? AND host_login = ?",
        )
        .bind(auktion.inner())
        .bind(login.als_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn auktion_status_wechseln(
        &self,
        auktion: AuctionId,
        von: AuktionStatus,
        zu: AuktionStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE auktionen SET status = ? WHERE auction_id = ? AND status = ?",
        )
        .bind(zu.als_str())
        .bind(auktion.inner())
        .bind(von.als_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn auktion_beenden(&self, auktion: AuctionId) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE auktionen \
             SET status = 'beendet', end_time = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE auction_id = ? AND status != 'beendet'",
        )
        .bind(auktion.inner())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
