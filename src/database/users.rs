// ABOUTME: User account database operations
// ABOUTME: Handles user creation, lookup by id or email, and profile updates

use super::{parse_uuid, Database, DatabaseError, DatabaseResult};
use crate::models::{AuthProvider, NewIdentity, User};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

impl Database {
    /// Create the users table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_users(&self) -> DatabaseResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT,
                password_hash TEXT,
                photo_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UniqueViolation`] if the email is already in use
    pub async fn create_user(&self, user: &User) -> DatabaseResult<Uuid> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut conn, user).await?;
        Ok(user.id)
    }

    /// Insert a password user together with its `LOCAL` identity
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UniqueViolation`] if the email is already in use
    pub async fn create_local_user(&self, user: &User) -> DatabaseResult<Uuid> {
        let identity = NewIdentity {
            user_id: user.id,
            provider: AuthProvider::Local,
            provider_id: None,
            tokens: None,
        };
        self.create_user_with_identity(user, &identity).await?;
        Ok(user.id)
    }

    /// Insert a user and its first identity in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UniqueViolation`] if the email or the
    /// (provider, provider id) pair is already taken; nothing is written then
    pub async fn create_user_with_identity(
        &self,
        user: &User,
        identity: &NewIdentity,
    ) -> DatabaseResult<Uuid> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, user).await?;
        let identity_id = self.insert_identity_on(&mut tx, identity).await?;
        tx.commit().await?;
        Ok(identity_id)
    }

    /// Get a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt
    pub async fn get_user(&self, user_id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, password_hash, photo_url, created_at, updated_at
            FROM users WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Get a user by id, returning an error if not found
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] if no such user exists
    pub async fn get_user_required(&self, user_id: Uuid) -> DatabaseResult<User> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }

    /// Get a user by email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt
    pub async fn get_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, password_hash, photo_url, created_at, updated_at
            FROM users WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Whether any user owns `email`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn email_in_use(&self, email: &str) -> DatabaseResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Replace a user's email, name and photo
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UniqueViolation`] if the new email belongs to another
    /// user, or [`DatabaseError::NotFound`] if the user does not exist
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        email: &str,
        name: Option<&str>,
        photo_url: Option<&str>,
    ) -> DatabaseResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users SET email = $2, name = $3, photo_url = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .bind(email)
        .bind(name)
        .bind(photo_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    /// Number of users
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_users(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_user(conn: &mut SqliteConnection, user: &User) -> DatabaseResult<()> {
    sqlx::query(
        r"
        INSERT INTO users (id, email, name, password_hash, photo_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(&user.photo_url)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Convert a database row to a User struct
fn row_to_user(row: &SqliteRow) -> DatabaseResult<User> {
    let id: String = row.try_get("id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(User {
        id: parse_uuid(&id)?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        photo_url: row.try_get("photo_url")?,
        created_at,
        updated_at,
    })
}
