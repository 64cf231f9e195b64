mod user;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::identity::{IdentityStore, StoreError};
use crate::jwt::SubjectId;

pub use user::{
    Gender, IdentityRecord, NewIdentity, ProfileUpdate, RelationshipStatus, UserStore,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqlitePoolOptions::new();
        let (url, options) = if path == ":memory:" {
            // Every connection to sqlite::memory: is a separate database,
            // so keep exactly one alive for the pool's lifetime.
            (
                "sqlite::memory:".to_string(),
                options
                    .max_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>),
            )
        } else {
            (format!("sqlite:{}?mode=rwc", path), options.max_connections(5))
        };

        let pool = options.connect(&url).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    age INTEGER NOT NULL,
                    gender TEXT NOT NULL,
                    relationship_status TEXT NOT NULL DEFAULT 'SINGLE',
                    avatar_url TEXT,
                    location TEXT,
                    enabled INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE INDEX idx_users_username ON users(username)",
            ],
        )
        .await
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_by_id(&self, id: SubjectId) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.users().get_by_id(id).await?)
    }

    async fn find_by_login_key(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.users().get_by_email(email).await?)
    }

    async fn exists_by_login_key(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.users().exists_by_email(email).await?)
    }
}
