//! # Repository Module
//!
//! Database repository implementations for Kho.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.products().list()                                          │
//! │       ▼                                                                 │
//! │  ProductRepository : CrudRepository                                    │
//! │  ├── list(&self)                                                       │
//! │  ├── get(&self, id)                                                    │
//! │  ├── create(&self, NewProduct)                                         │
//! │  ├── update(&self, id, ProductPatch)                                   │
//! │  ├── delete(&self, id)                                                 │
//! │  └── delete_all(&self)                                                 │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every collection of the uniform CRUD contract implements
//! [`CrudRepository`]; the HTTP layer mounts one generic router per
//! implementation. Orders have their own lifecycle and repository methods.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog
//! - [`product_detail::ProductDetailRepository`] - Batches, stock index
//! - [`order::OrderRepository`] - Checkout, drafts, settlement
//! - [`report::ReportRepository`] - Revenue aggregation
//! - [`business`], [`category`], [`order_form`], [`goods_receipt`],
//!   [`account`], [`user`] - Remaining collections

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Sqlite, SqliteExecutor, SqlitePool, Transaction};
use uuid::Uuid;

use kho_core::order::document_code;
use kho_core::validation::{validate_uuid, Validate};
use kho_core::CollectionName;

use crate::error::{DbError, DbResult};

pub mod account;
pub mod business;
pub mod category;
pub mod goods_receipt;
pub mod order;
pub mod order_form;
pub mod product;
pub mod product_detail;
pub mod report;
pub mod user;

// =============================================================================
// CRUD Contract
// =============================================================================

/// Uniform create/list/get/update/delete contract of a collection.
#[async_trait]
pub trait CrudRepository: Send + Sync + Sized {
    type Entity: Serialize + Send + Sync + 'static;
    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;

    const COLLECTION: CollectionName;
    const TABLE: &'static str;

    fn from_pool(pool: SqlitePool) -> Self;

    fn pool(&self) -> &SqlitePool;

    /// Every record, oldest first. No pagination.
    async fn list(&self) -> DbResult<Vec<Self::Entity>>;

    async fn find(&self, id: &str) -> DbResult<Option<Self::Entity>>;

    async fn create(&self, input: Self::Create) -> DbResult<Self::Entity>;

    /// Partial update; fields missing from the patch keep their value.
    async fn update(&self, id: &str, patch: Self::Update) -> DbResult<Self::Entity>;

    /// Gets a record, treating a malformed id as a validation failure.
    async fn get(&self, id: &str) -> DbResult<Self::Entity> {
        validate_uuid(id)?;
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(Self::COLLECTION.entity(), id))
    }

    async fn delete(&self, id: &str) -> DbResult<()> {
        validate_uuid(id)?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", Self::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(self.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Self::COLLECTION.entity(), id));
        }
        Ok(())
    }

    /// Deletes every record; returns how many were removed.
    async fn delete_all(&self) -> DbResult<u64> {
        let sql = format!("DELETE FROM {}", Self::TABLE);
        let result = sqlx::query(&sql).execute(self.pool()).await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Opens a write transaction with `BEGIN IMMEDIATE`.
///
/// The write lock is taken up front, so a second writer waits out the busy
/// timeout at `BEGIN` instead of failing when its first write would upgrade
/// a read transaction.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Fails with `InvalidReference` unless `table` has a row with this id.
pub(crate) async fn ensure_exists<'e, E>(executor: E, table: &str, field: &str, id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table);
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(executor).await?;

    if count == 0 {
        return Err(DbError::invalid_reference(field, id));
    }
    Ok(())
}

/// Next daily document code for `table.column`, e.g. `PN20240101-0003`.
///
/// Continues from the highest sequence issued today, so deleting a document
/// never frees its code for reuse while later codes are still live.
pub(crate) async fn next_document_code<'e, E>(
    executor: E,
    table: &str,
    column: &str,
    prefix: &str,
    date: chrono::NaiveDate,
) -> DbResult<String>
where
    E: SqliteExecutor<'e>,
{
    let day = format!("{}{}-", prefix, date.format("%Y%m%d"));
    let sql = format!(
        "SELECT COALESCE(MAX(CAST(substr({col}, ?2) AS INTEGER)), 0) FROM {table} WHERE {col} LIKE ?1",
        col = column,
        table = table,
    );
    let last: i64 = sqlx::query_scalar(&sql)
        .bind(format!("{}%", day))
        .bind(day.len() as i64 + 1)
        .fetch_one(executor)
        .await?;

    Ok(document_code(prefix, date, last as u32 + 1))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use kho_core::inputs::{NewBusiness, NewProduct, NewProductDetail};
    use kho_core::{Business, Product, ProductDetail};

    use super::CrudRepository;
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn supplier(db: &Database) -> Business {
        db.businesses()
            .create(NewBusiness {
                name: "Vinamilk".to_string(),
                email: Some("ncc@vinamilk.com.vn".to_string()),
                address: "10 Tân Trào, Q7".to_string(),
                logo: None,
                logo_links: vec![],
            })
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, supplier_id: &str, name: &str, price: i64) -> Product {
        db.products()
            .create(NewProduct {
                supplier_id: supplier_id.to_string(),
                category_id: None,
                name: name.to_string(),
                description: None,
                image_links: vec![],
                input_price: price * 4 / 5,
                output_price: price,
            })
            .await
            .unwrap()
    }

    pub async fn batch(db: &Database, product_id: &str, quantity: i64, made: (i32, u32, u32)) -> ProductDetail {
        db.product_details()
            .create(NewProductDetail {
                product_id: product_id.to_string(),
                input_quantity: quantity,
                output_quantity: 0,
                date_of_manufacture: NaiveDate::from_ymd_opt(made.0, made.1, made.2),
                expiry_date: None,
            })
            .await
            .unwrap()
    }
}
