use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{AnalysisPerspective, ImageAnalysisRecord, ImageAnalysisRow};
use crate::db::{
    decode_elements, decode_timestamp, encode_elements, encode_timestamp, RecordStore, StoreError,
};

const SELECT_COLUMNS: &str = "SELECT id, original_filename, image_data, \
     original_description, original_elements, original_mood, \
     mirror_description, mirror_elements, mirror_mood, created_at \
     FROM image_analyses";

/// SQLite-backed record store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str, create_if_missing: bool) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(create_if_missing);

        // Every connection to `:memory:` is its own database, so pin to one.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (\
                id TEXT PRIMARY KEY NOT NULL,\
                username TEXT NOT NULL UNIQUE,\
                password TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS image_analyses (\
                id TEXT PRIMARY KEY NOT NULL,\
                original_filename TEXT NOT NULL,\
                image_data TEXT NOT NULL,\
                original_description TEXT NOT NULL,\
                original_elements TEXT NOT NULL DEFAULT '[]',\
                original_mood TEXT NOT NULL,\
                mirror_description TEXT NOT NULL,\
                mirror_elements TEXT NOT NULL DEFAULT '[]',\
                mirror_mood TEXT NOT NULL,\
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_image_analyses_created_at ON image_analyses(created_at);",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: ImageAnalysisRow) -> Result<ImageAnalysisRecord, StoreError> {
    let original_elements = decode_elements(&row.id, &row.original_elements)?;
    let mirror_elements = decode_elements(&row.id, &row.mirror_elements)?;
    let created_at = decode_timestamp(&row.id, &row.created_at)?;

    Ok(ImageAnalysisRecord {
        id: row.id,
        original_filename: row.original_filename,
        image_data: row.image_data,
        original: AnalysisPerspective {
            description: row.original_description,
            elements: original_elements,
            mood: row.original_mood,
        },
        mirror: AnalysisPerspective {
            description: row.mirror_description,
            elements: mirror_elements,
            mood: row.mirror_mood,
        },
        created_at,
    })
}

impl RecordStore for Database {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn put(&self, record: ImageAnalysisRecord) -> Result<ImageAnalysisRecord, StoreError> {
        let result = sqlx::query(
            "INSERT INTO image_analyses \
             (id, original_filename, image_data, original_description, original_elements, original_mood, \
              mirror_description, mirror_elements, mirror_mood, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.original_filename)
        .bind(&record.image_data)
        .bind(&record.original.description)
        .bind(encode_elements(&record.original.elements))
        .bind(&record.original.mood)
        .bind(&record.mirror.description)
        .bind(encode_elements(&record.mirror.elements))
        .bind(&record.mirror.mood)
        .bind(encode_timestamp(&record.created_at))
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(StoreError::Duplicate(record.id));
            }
        }
        result?;

        let row = sqlx::query_as::<_, ImageAnalysisRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&record.id)
            .fetch_one(&self.pool)
            .await?;
        row_to_record(row)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ImageAnalysisRecord>, StoreError> {
        let row = sqlx::query_as::<_, ImageAnalysisRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_record).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ImageAnalysisRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ImageAnalysisRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
