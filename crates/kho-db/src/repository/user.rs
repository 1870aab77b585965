//! Staff profile repository. One profile per account.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use kho_core::inputs::{NewUser, UserPatch};
use kho_core::validation::Validate;
use kho_core::{CollectionName, User};

use super::{ensure_exists, new_id, CrudRepository};
use crate::error::{DbError, DbResult};

const SELECT_USER: &str = r#"
    SELECT id, account_id, name, email, phone, address, avatar, created_at, updated_at
    FROM users
"#;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn find_by_account(&self, account_id: &str) -> DbResult<Option<User>> {
        let sql = format!("{} WHERE account_id = ?1", SELECT_USER);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl CrudRepository for UserRepository {
    type Entity = User;
    type Create = NewUser;
    type Update = UserPatch;

    const COLLECTION: CollectionName = CollectionName::User;
    const TABLE: &'static str = "users";

    fn from_pool(pool: SqlitePool) -> Self {
        UserRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_USER);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("{} WHERE id = ?1", SELECT_USER);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, input: NewUser) -> DbResult<User> {
        input.validate()?;
        ensure_exists(&self.pool, "accounts", "account_id", &input.account_id).await?;
        let user = input.into_user(new_id(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO users (
                id, account_id, name, email, phone, address, avatar, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.account_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("account_id", &user.account_id),
            other => other,
        })?;

        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> DbResult<User> {
        patch.validate()?;
        let mut user = self.get(id).await?;
        patch.apply(&mut user, Utc::now());

        sqlx::query(
            r#"
            UPDATE users SET name = ?2, email = ?3, phone = ?4, address = ?5, avatar = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.avatar)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use kho_core::inputs::NewAccount;
    use kho_core::Role;

    use super::*;
    use crate::repository::test_support::db;

    fn profile(account_id: &str) -> NewUser {
        NewUser {
            account_id: account_id.to_string(),
            name: "Nguyễn Thu Hà".to_string(),
            email: Some("ha@kho.vn".to_string()),
            phone: Some("0901234567".to_string()),
            address: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_one_profile_per_account() {
        let db = db().await;
        let account = db
            .accounts()
            .create(NewAccount {
                username: "thu.ha".to_string(),
                password: "matkhau123".to_string(),
                role: Role::Staff,
            })
            .await
            .unwrap();

        let user = db.users().create(profile(&account.id)).await.unwrap();
        let found = db.users().find_by_account(&account.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let err = db.users().create(profile(&account.id)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let updated = db
            .users()
            .update(
                &user.id,
                UserPatch {
                    address: Some("12 Lê Lợi, Q1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address.as_deref(), Some("12 Lê Lợi, Q1"));
        assert_eq!(updated.phone.as_deref(), Some("0901234567"));
    }

    #[tokio::test]
    async fn test_profile_needs_existing_account() {
        let db = db().await;
        let ghost = uuid::Uuid::new_v4().to_string();

        let err = db.users().create(profile(&ghost)).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidReference { ref field, .. } if field == "account_id"));
    }
}
