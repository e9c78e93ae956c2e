use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

use concierge_core::{
    domain::{ChatRecord, FileRecord, RegistrationState, UserId, UserRecord},
    errors::Error,
    ports::StoragePort,
    Result,
};

use crate::pool::SqlitePoolManager;

/// SQLite-backed store. The `users` upsert is a single statement, so it is
/// atomic per key and serialized by SQLite's writer.
#[derive(Clone)]
pub struct SqliteStore {
    pool_manager: SqlitePoolManager,
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    display_name: String,
    handle: Option<String>,
    phone_number: Option<String>,
    referral_code: Option<String>,
    registration_state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> Result<UserRecord> {
        let state = RegistrationState::parse(&self.registration_state).ok_or_else(|| {
            Error::Persistence(format!(
                "unknown registration state: {}",
                self.registration_state
            ))
        })?;

        Ok(UserRecord {
            user_id: UserId(self.user_id),
            display_name: self.display_name,
            handle: self.handle,
            phone_number: self.phone_number,
            referral_code: self.referral_code,
            state,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Persistence(e.to_string())
}

impl SqliteStore {
    pub async fn open(database_path: &str) -> Result<Self> {
        let pool_manager = SqlitePoolManager::new(database_path).await.map_err(db_err)?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                handle TEXT,
                phone_number TEXT,
                referral_code TEXT,
                registration_state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_log (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                input TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_log (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_log_user_id ON chat_log(user_id)")
            .execute(pool)
            .await
            .map_err(db_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_log_user_id ON file_log(user_id)")
            .execute(pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl StoragePort for SqliteStore {
    async fn upsert_user(&self, record: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, display_name, handle, phone_number, referral_code, registration_state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                handle = excluded.handle,
                phone_number = excluded.phone_number,
                referral_code = excluded.referral_code,
                registration_state = excluded.registration_state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.user_id.0)
        .bind(&record.display_name)
        .bind(&record.handle)
        .bind(&record.phone_number)
        .bind(&record.referral_code)
        .bind(record.state.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(self.pool_manager.pool())
        .await
        .map_err(db_err)?;

        debug!("upserted user {}", record.user_id.0);
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_optional(self.pool_manager.pool())
            .await
            .map_err(db_err)?;

        row.map(UserRow::into_record).transpose()
    }

    async fn append_chat(&self, record: &ChatRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_log (id, user_id, input, response, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id.0)
        .bind(&record.input)
        .bind(&record.response)
        .bind(record.created_at)
        .execute(self.pool_manager.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn append_file(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_log (id, user_id, file_name, category, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id.0)
        .bind(&record.file_name)
        .bind(record.category.as_str())
        .bind(&record.description)
        .bind(record.created_at)
        .execute(self.pool_manager.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
