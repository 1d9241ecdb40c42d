//! Key-value access to the JSON collections.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;

/// Logical keys of the stored collections.
pub mod keys {
    pub const USERS: &str = "users";
    pub const BICYCLES: &str = "bicycles";
    pub const RENTALS: &str = "rentals";
    pub const CURRENT_USER: &str = "current_user";

    /// Slot registry key for a station.
    pub fn slots(station_key: &str) -> String {
        format!("slots:{}", station_key)
    }
}

/// Read and decode the value under `key`.
///
/// A value that no longer decodes is logged and treated as absent.
pub async fn read_key<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<T>, AppError> {
    let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let raw: String = row.get("value");

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, "Ignoring malformed stored value: {}", e);
            Ok(None)
        }
    }
}

/// Read a collection, empty when absent.
pub async fn read_collection<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Vec<T>, AppError> {
    Ok(read_key(conn, key).await?.unwrap_or_default())
}

pub async fn write_key<T: Serialize + ?Sized>(
    conn: &mut SqliteConnection,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(&raw)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Increment the revision once per committed change.
pub async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_and_malformed_value() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("kv.sqlite"))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let missing: Option<Vec<String>> = read_key(&mut *conn, "nothing").await.unwrap();
        assert!(missing.is_none());

        write_key(&mut *conn, "names", &vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let names: Vec<String> = read_collection(&mut *conn, "names").await.unwrap();
        assert_eq!(names, vec!["a", "b"]);

        sqlx::query("UPDATE kv_store SET value = '{not json' WHERE key = 'names'")
            .execute(&mut *conn)
            .await
            .unwrap();
        let names: Vec<String> = read_collection(&mut *conn, "names").await.unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_slot_key_format() {
        assert_eq!(keys::slots("Station 1_Kathmandu"), "slots:Station 1_Kathmandu");
    }
}
