//! # Account Repository
//!
//! Login identities. Passwords are stored as argon2id PHC strings and are
//! never returned by any read.
//!
//! ```text
//!   create / patch(password)  → hash_password  → accounts.password_hash
//!   login                     → verify_credentials(username, password)
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use kho_core::inputs::{AccountPatch, NewAccount};
use kho_core::validation::Validate;
use kho_core::{Account, CollectionName};

use super::{new_id, CrudRepository};
use crate::error::{DbError, DbResult};

const SELECT_ACCOUNT: &str =
    "SELECT id, username, password_hash, role, created_at, updated_at FROM accounts";

// =============================================================================
// Password hashing
// =============================================================================

/// Hashes a password for storage.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Checks a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<Account>> {
        let sql = format!("{} WHERE username = ?1", SELECT_ACCOUNT);
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Returns the account when `password` matches; `InvalidCredentials`
    /// for an unknown user and a wrong password alike.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> DbResult<Account> {
        let account = match self.find_by_username(username).await? {
            Some(account) => account,
            None => {
                warn!(username = %username, "Login for unknown account");
                return Err(DbError::InvalidCredentials);
            }
        };

        if !verify_password(password, &account.password_hash) {
            warn!(username = %username, "Login with wrong password");
            return Err(DbError::InvalidCredentials);
        }

        Ok(account)
    }
}

#[async_trait]
impl CrudRepository for AccountRepository {
    type Entity = Account;
    type Create = NewAccount;
    type Update = AccountPatch;

    const COLLECTION: CollectionName = CollectionName::Account;
    const TABLE: &'static str = "accounts";

    fn from_pool(pool: SqlitePool) -> Self {
        AccountRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<Account>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_ACCOUNT);
        Ok(sqlx::query_as::<_, Account>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find(&self, id: &str) -> DbResult<Option<Account>> {
        let sql = format!("{} WHERE id = ?1", SELECT_ACCOUNT);
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, input: NewAccount) -> DbResult<Account> {
        input.validate()?;
        let now = Utc::now();
        let account = Account {
            id: new_id(),
            username: input.username.trim().to_string(),
            password_hash: hash_password(&input.password)?,
            role: input.role,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, password_hash, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.role)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", &account.username),
            other => other,
        })?;

        debug!(id = %account.id, username = %account.username, "Account created");
        Ok(account)
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> DbResult<Account> {
        patch.validate()?;
        let mut account = self.get(id).await?;

        if let Some(password) = &patch.password {
            account.password_hash = hash_password(password)?;
        }
        if let Some(role) = patch.role {
            account.role = role;
        }
        account.updated_at = Utc::now();

        sqlx::query("UPDATE accounts SET password_hash = ?2, role = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&account.id)
            .bind(&account.password_hash)
            .bind(account.role)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(account)
    }
}
