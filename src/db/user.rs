use sqlx::sqlite::SqlitePool;
use tracing::warn;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            "OTHER" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipStatus {
    Single,
    InRelationship,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Single => "SINGLE",
            RelationshipStatus::InRelationship => "IN_RELATIONSHIP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SINGLE" => Some(RelationshipStatus::Single),
            "IN_RELATIONSHIP" => Some(RelationshipStatus::InRelationship),
            _ => None,
        }
    }
}

/// A stored user account.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: i64,
    /// Login key, stored lowercase
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub enabled: bool,
    pub created_at: String,
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
}

/// Editable profile fields. Email, password and the enabled flag are not
/// part of a profile update.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    age: i32,
    gender: String,
    relationship_status: String,
    avatar_url: Option<String>,
    location: Option<String>,
    enabled: i32,
    created_at: String,
}

impl From<UserRow> for IdentityRecord {
    fn from(row: UserRow) -> Self {
        let gender = Gender::from_str(&row.gender).unwrap_or_else(|| {
            warn!(user_id = row.id, value = %row.gender, "Unknown gender in users row, using OTHER");
            Gender::Other
        });
        let relationship_status = RelationshipStatus::from_str(&row.relationship_status)
            .unwrap_or_else(|| {
                warn!(
                    user_id = row.id,
                    value = %row.relationship_status,
                    "Unknown relationship status in users row, using SINGLE"
                );
                RelationshipStatus::Single
            });

        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            age: row.age,
            gender,
            relationship_status,
            avatar_url: row.avatar_url,
            location: row.location,
            enabled: row.enabled != 0,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, age, gender, \
     relationship_status, avatar_url, location, enabled, created_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an enabled user. Returns the user ID.
    pub async fn create(&self, user: &NewIdentity) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (email, username, password_hash, age, gender, relationship_status, avatar_url, location)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.email.to_lowercase())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.age)
        .bind(user.gender.as_str())
        .bind(user.relationship_status.as_str())
        .bind(&user.avatar_url)
        .bind(&user.location)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<IdentityRecord>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(IdentityRecord::from))
    }

    /// Get a user by email, case-insensitively.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email.to_lowercase())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(IdentityRecord::from))
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email.to_lowercase())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// True when another account already uses this username.
    pub async fn username_taken_by_other(
        &self,
        username: &str,
        exclude_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(exclude_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Overwrite the editable profile fields. Returns false if the user does not exist.
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET username = ?, age = ?, gender = ?, relationship_status = ?,
             avatar_url = ?, location = ? WHERE id = ?",
        )
        .bind(&update.username)
        .bind(update.age)
        .bind(update.gender.as_str())
        .bind(update.relationship_status.as_str())
        .bind(&update.avatar_url)
        .bind(&update.location)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable an account. Returns false if the user does not exist.
    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET enabled = ? WHERE id = ?")
            .bind(enabled as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
