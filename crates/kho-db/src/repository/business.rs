//! Supplier ("business") repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use kho_core::inputs::{BusinessPatch, NewBusiness};
use kho_core::validation::Validate;
use kho_core::{Business, CollectionName};

use super::{new_id, CrudRepository};
use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    id: String,
    name: String,
    email: Option<String>,
    address: String,
    logo: Option<String>,
    logo_links: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Business {
            id: row.id,
            name: row.name,
            email: row.email,
            address: row.address,
            logo: row.logo,
            logo_links: row.logo_links.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_BUSINESS: &str =
    "SELECT id, name, email, address, logo, logo_links, created_at, updated_at FROM businesses";

#[derive(Debug, Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BusinessRepository { pool }
    }

    async fn save(&self, business: &Business, insert: bool) -> DbResult<()> {
        let sql = if insert {
            r#"
            INSERT INTO businesses (id, name, email, address, logo, logo_links, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#
        } else {
            r#"
            UPDATE businesses SET name = ?2, email = ?3, address = ?4, logo = ?5,
                logo_links = ?6, updated_at = ?8
            WHERE id = ?1
            "#
        };

        sqlx::query(sql)
            .bind(&business.id)
            .bind(&business.name)
            .bind(&business.email)
            .bind(&business.address)
            .bind(&business.logo)
            .bind(Json(&business.logo_links))
            .bind(business.created_at)
            .bind(business.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CrudRepository for BusinessRepository {
    type Entity = Business;
    type Create = NewBusiness;
    type Update = BusinessPatch;

    const COLLECTION: CollectionName = CollectionName::Business;
    const TABLE: &'static str = "businesses";

    fn from_pool(pool: SqlitePool) -> Self {
        BusinessRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<Business>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_BUSINESS);
        let rows: Vec<BusinessRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Business::from).collect())
    }

    async fn find(&self, id: &str) -> DbResult<Option<Business>> {
        let sql = format!("{} WHERE id = ?1", SELECT_BUSINESS);
        let row: Option<BusinessRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Business::from))
    }

    async fn create(&self, input: NewBusiness) -> DbResult<Business> {
        input.validate()?;
        let business = input.into_business(new_id(), Utc::now());

        debug!(id = %business.id, name = %business.name, "Creating supplier");
        self.save(&business, true).await?;
        Ok(business)
    }

    async fn update(&self, id: &str, patch: BusinessPatch) -> DbResult<Business> {
        patch.validate()?;
        let mut business = self.get(id).await?;
        patch.apply(&mut business, Utc::now());

        self.save(&business, false).await?;
        Ok(business)
    }
}
