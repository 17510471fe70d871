//! Benutzer-Repository (SQLite)

use sqlx::Row;

use bidcast_core::types::{LoginId, UserKey};

use crate::models::BenutzerRecord;
use crate::repository::{BenutzerRepository, DbResult};

use super::pool::SqliteDb;

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    Ok(BenutzerRecord {
        user_key: UserKey(row.try_get("user_key")?),
        login_id: LoginId(row.try_get("login_id")?),
        nickname: row.try_get("nickname")?,
    })
}

impl BenutzerRepository for SqliteDb {
    async fn benutzer_nach_login(&self, login: &LoginId) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT user_key, login_id, nickname FROM benutzer WHERE login_id = ?",
        )
        .bind(login.als_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_benutzer).transpose()
    }

    async fn benutzer_nach_key(&self, key: UserKey) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT user_key, login_id, nickname FROM benutzer WHERE user_key = ?",
        )
        .bind(key.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_benutzer).transpose()
    }
}
