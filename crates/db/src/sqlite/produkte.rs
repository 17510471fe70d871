//! Produkt-Repository (SQLite)

use sqlx::Row;

use bidcast_core::types::{AuctionId, ProductKey, UserKey};

use crate::error::DbError;
use crate::models::{PreisStand, ProduktRecord, ProduktStatus};
use crate::repository::{DbResult, ProduktRepository};

use super::pool::SqliteDb;

const PRODUKT_SPALTEN: &str = "prod_key, auction_id, prod_name, prod_detail, unit_value, \
     init_price, current_price, final_price, winner_key, prod_status, file_url";

fn row_to_produkt(row: &sqlx::sqlite::SqliteRow) -> DbResult<ProduktRecord> {
    let status: String = row.try_get("prod_status")?;
    let winner: Option<i64> = row.try_get("winner_key")?;

    Ok(ProduktRecord {
        prod_key: ProductKey(row.try_get("prod_key")?),
        auction_id: AuctionId(row.try_get("auction_id")?),
        prod_name: row.try_get("prod_name")?,
        prod_detail: row.try_get("prod_detail")?,
        unit_value: row.try_get("unit_value")?,
        init_price: row.try_get("init_price")?,
        current_price: row.try_get("current_price")?,
        final_price: row.try_get("final_price")?,
        winner_key: winner.map(UserKey),
        prod_status: ProduktStatus::aus_code(&status).map_err(DbError::UngueltigeDaten)?,
        file_url: row.try_get("file_url")?,
    })
}

impl ProduktRepository for SqliteDb {
    async fn produkt_laden(&self, prod: ProductKey) -> DbResult<Option<ProduktRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUKT_SPALTEN} FROM produkte WHERE prod_key = ?"
        ))
        .bind(prod.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_produkt).transpose()
    }

    async fn preis_stand(&self, prod: ProductKey) -> DbResult<Option<PreisStand>> {
        let row = sqlx::query(
            "SELECT current_price, init_price, unit_value FROM produkte WHERE prod_key = ?",
        )
        .bind(prod.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(PreisStand {
                current_price: row.try_get("current_price")?,
                init_price: row.try_get("init_price")?,
                unit_value: row.try_get("unit_value")?,
            })
        })
        .transpose()
    }

    async fn gebot_uebernehmen(
        &self,
        prod: ProductKey,
        preis: i64,
        gewinner: UserKey,
    ) -> DbResult<Option<ProduktRecord>> {
        let result = sqlx::query(
            "UPDATE produkte \
             SET current_price = ?, final_price = ?, winner_key = ? \
             WHERE prod_key = ?",
        )
        .bind(preis)
        .bind(preis)
        .bind(gewinner.inner())
        .bind(prod.inner())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.produkt_laden(prod).await
    }

    async fn preis_korrigieren(
        &self,
        prod: ProductKey,
        final_preis: i64,
        gewinner: Option<UserKey>,
    ) -> DbResult<Option<ProduktRecord>> {
        let result = sqlx::query(
            "UPDATE produkte \
             SET current_price = ?, final_price = ?, winner_key = ? \
             WHERE prod_key = ?",
        )
        .bind(final_preis)
        .bind(final_preis)
        .bind(gewinner.map(|g| g.inner()))
        .bind(prod.inner())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.produkt_laden(prod).await
    }

    async fn produkt_status_setzen(
        &self,
        prod: ProductKey,
        status: ProduktStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE produkte SET prod_status = ? WHERE prod_key = ?")
            .bind(status.als_code())
            .bind(prod.inner())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
