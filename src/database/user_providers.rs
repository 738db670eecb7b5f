// ABOUTME: Linked provider identity database operations
// ABOUTME: Stores one row per (user, provider) with encrypted access and refresh tokens

use super::{parse_uuid, Database, DatabaseError, DatabaseResult};
use crate::models::{AuthProvider, LinkedIdentity, NewIdentity, ProviderTokens};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const IDENTITY_COLUMNS: &str = "id, user_id, provider, provider_id, access_token, refresh_token, \
                                token_expires_at, linked_at, last_used_at";

impl Database {
    /// Create the `user_providers` table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_user_providers(&self) -> DatabaseResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_providers (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                provider_id TEXT,
                access_token TEXT,
                refresh_token TEXT,
                token_expires_at TEXT,
                linked_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                UNIQUE(provider, provider_id),
                UNIQUE(user_id, provider)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_providers_user ON user_providers(user_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Link a new identity to an existing user
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UniqueViolation`] if the identity is already linked
    /// anywhere, or the user already has an identity of this provider kind
    pub async fn insert_identity(&self, identity: &NewIdentity) -> DatabaseResult<Uuid> {
        let mut conn = self.pool.acquire().await?;
        self.insert_identity_on(&mut conn, identity).await
    }

    pub(super) async fn insert_identity_on(
        &self,
        conn: &mut SqliteConnection,
        identity: &NewIdentity,
    ) -> DatabaseResult<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let tokens = identity.tokens.as_ref();
        let access_token = self
            .cipher
            .encrypt_opt(tokens.map(|t| t.access_token.as_str()))?;
        let refresh_token = self
            .cipher
            .encrypt_opt(tokens.and_then(|t| t.refresh_token.as_deref()))?;

        sqlx::query(
            r"
            INSERT INTO user_providers
                (id, user_id, provider, provider_id, access_token, refresh_token,
                 token_expires_at, linked_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(id.to_string())
        .bind(identity.user_id.to_string())
        .bind(identity.provider.as_str())
        .bind(&identity.provider_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(tokens.and_then(|t| t.expires_at))
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(id)
    }

    /// Find the identity for a provider subject
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored tokens cannot be decrypted
    pub async fn find_identity(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> DatabaseResult<Option<LinkedIdentity>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM user_providers WHERE provider = $1 AND provider_id = $2"
        );
        let row = sqlx::query(&query)
            .bind(provider.as_str())
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| self.row_to_identity(r)).transpose()
    }

    /// Find a user's identity of one provider kind
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored tokens cannot be decrypted
    pub async fn find_user_identity(
        &self,
        user_id: Uuid,
        provider: AuthProvider,
    ) -> DatabaseResult<Option<LinkedIdentity>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM user_providers WHERE user_id = $1 AND provider = $2"
        );
        let row = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| self.row_to_identity(r)).transpose()
    }

    /// Whether a user already has an identity of this provider kind
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn user_has_provider(
        &self,
        user_id: Uuid,
        provider: AuthProvider,
    ) -> DatabaseResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_providers WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// All identities linked to a user, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored tokens cannot be decrypted
    pub async fn list_identities(&self, user_id: Uuid) -> DatabaseResult<Vec<LinkedIdentity>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM user_providers WHERE user_id = $1 ORDER BY linked_at"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|r| self.row_to_identity(r)).collect()
    }

    /// Store new tokens for an identity and mark it used
    ///
    /// An absent refresh token keeps the one already stored.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] if the identity does not exist
    pub async fn update_identity_tokens(
        &self,
        identity_id: Uuid,
        tokens: &ProviderTokens,
    ) -> DatabaseResult<()> {
        let access_token = self.cipher.encrypt(&tokens.access_token)?;
        let refresh_token = self.cipher.encrypt_opt(tokens.refresh_token.as_deref())?;

        let result = sqlx::query(
            r"
            UPDATE user_providers SET
                access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                token_expires_at = $4,
                last_used_at = $5
            WHERE id = $1
            ",
        )
        .bind(identity_id.to_string())
        .bind(access_token)
        .bind(refresh_token)
        .bind(tokens.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                entity: "identity",
                id: identity_id.to_string(),
            });
        }
        Ok(())
    }

    /// Mark an identity as used now
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn touch_identity(&self, identity_id: Uuid) -> DatabaseResult<()> {
        sqlx::query("UPDATE user_providers SET last_used_at = $2 WHERE id = $1")
            .bind(identity_id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_identity(&self, row: &SqliteRow) -> DatabaseResult<LinkedIdentity> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        let provider: String = row.try_get("provider")?;
        let access_token: Option<String> = row.try_get("access_token")?;
        let refresh_token: Option<String> = row.try_get("refresh_token")?;
        let token_expires_at: Option<DateTime<Utc>> = row.try_get("token_expires_at")?;

        Ok(LinkedIdentity {
            id: parse_uuid(&id)?,
            user_id: parse_uuid(&user_id)?,
            provider: provider
                .parse()
                .map_err(|_| DatabaseError::Corrupt(format!("unknown provider {provider}")))?,
            provider_id: row.try_get("provider_id")?,
            access_token: self.cipher.decrypt_opt(access_token.as_deref())?,
            refresh_token: self.cipher.decrypt_opt(refresh_token.as_deref())?,
            token_expires_at,
            linked_at: row.try_get("linked_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}
