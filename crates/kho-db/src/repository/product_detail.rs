//! # Product Detail (Batch) Repository
//!
//! ## Quantity Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PATCH { output_quantity: n }        (sale decrement primitive)         │
//! │     UPDATE ... SET output_quantity = n                                  │
//! │     WHERE id = ? AND n <= input_quantity      ← checked in one statement│
//! │     0 rows + batch exists  →  BatchOverdrawn (422)                      │
//! │                                                                         │
//! │  PATCH { input_quantity, dates, ... }  (receiving adjustments)          │
//! │     read → apply + validate → UPDATE                                    │
//! │     CHECK (output_quantity <= input_quantity) is the last line          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use kho_core::inputs::{NewProductDetail, ProductDetailPatch};
use kho_core::stock::StockIndex;
use kho_core::validation::{validate_reference, validate_uuid, Validate};
use kho_core::{CollectionName, CoreError, ProductDetail};

use super::{ensure_exists, new_id, CrudRepository};
use crate::error::{DbError, DbResult};

pub(crate) const SELECT_DETAIL: &str = r#"
    SELECT id, product_id, input_quantity, output_quantity,
           date_of_manufacture, expiry_date, created_at, updated_at
    FROM product_details
"#;

/// Repository for batches.
#[derive(Debug, Clone)]
pub struct ProductDetailRepository {
    pool: SqlitePool,
}

impl ProductDetailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductDetailRepository { pool }
    }

    /// Batches of one product in the order they were received.
    pub async fn list_by_product(&self, product_id: &str) -> DbResult<Vec<ProductDetail>> {
        validate_reference("product_id", product_id)?;
        let sql = format!("{} WHERE product_id = ?1 ORDER BY rowid", SELECT_DETAIL);
        let details = sqlx::query_as::<_, ProductDetail>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(details)
    }

    /// Rebuilds the stock index from every batch.
    pub async fn stock_index(&self) -> DbResult<StockIndex> {
        let details = self.list().await?;
        let index = StockIndex::build(&details);

        debug!(batches = details.len(), products = index.len(), "Built stock index");
        Ok(index)
    }

    /// Sets `output_quantity` only if it stays within `input_quantity`.
    async fn set_output_quantity(&self, id: &str, output_quantity: i64) -> DbResult<ProductDetail> {
        let result = sqlx::query(
            r#"
            UPDATE product_details
            SET output_quantity = ?2, updated_at = ?3
            WHERE id = ?1 AND ?2 >= 0 AND ?2 <= input_quantity
            "#,
        )
        .bind(id)
        .bind(output_quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(id).await?;
            return Err(CoreError::BatchOverdrawn {
                batch_id: current.id,
                input_quantity: current.input_quantity,
                output_quantity,
            }
            .into());
        }

        self.get(id).await
    }
}

#[async_trait]
impl CrudRepository for ProductDetailRepository {
    type Entity = ProductDetail;
    type Create = NewProductDetail;
    type Update = ProductDetailPatch;

    const COLLECTION: CollectionName = CollectionName::ProductDetail;
    const TABLE: &'static str = "product_details";

    fn from_pool(pool: SqlitePool) -> Self {
        ProductDetailRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<ProductDetail>> {
        let sql = format!("{} ORDER BY rowid", SELECT_DETAIL);
        let details = sqlx::query_as::<_, ProductDetail>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(details)
    }

    async fn find(&self, id: &str) -> DbResult<Option<ProductDetail>> {
        let sql = format!("{} WHERE id = ?1", SELECT_DETAIL);
        let detail = sqlx::query_as::<_, ProductDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(detail)
    }

    async fn create(&self, input: NewProductDetail) -> DbResult<ProductDetail> {
        input.validate()?;
        ensure_exists(&self.pool, "products", "product_id", &input.product_id).await?;

        let detail = input.into_detail(new_id(), Utc::now());
        insert_detail(&self.pool, &detail).await?;

        Ok(detail)
    }

    async fn update(&self, id: &str, patch: ProductDetailPatch) -> DbResult<ProductDetail> {
        validate_uuid(id)?;
        patch.validate()?;

        if patch.is_output_only() {
            if let Some(output_quantity) = patch.output_quantity {
                debug!(id = %id, output_quantity, "Setting batch output quantity");
                return self.set_output_quantity(id, output_quantity).await;
            }
        }

        let mut detail = self.get(id).await?;
        patch.apply(&mut detail, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE product_details SET
                input_quantity = ?2, output_quantity = ?3,
                date_of_manufacture = ?4, expiry_date = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&detail.id)
        .bind(detail.input_quantity)
        .bind(detail.output_quantity)
        .bind(detail.date_of_manufacture)
        .bind(detail.expiry_date)
        .bind(detail.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(detail)
    }
}

/// Inserts a batch row. Shared with goods receiving, which runs it inside
/// its own transaction.
pub(crate) async fn insert_detail<'e, E>(executor: E, detail: &ProductDetail) -> DbResult<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    debug!(id = %detail.id, product_id = %detail.product_id, qty = detail.input_quantity, "Inserting batch");

    sqlx::query(
        r#"
        INSERT INTO product_details (
            id, product_id, input_quantity, output_quantity,
            date_of_manufacture, expiry_date, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&detail.id)
    .bind(&detail.product_id)
    .bind(detail.input_quantity)
    .bind(detail.output_quantity)
    .bind(detail.date_of_manufacture)
    .bind(detail.expiry_date)
    .bind(detail.created_at)
    .bind(detail.updated_at)
    .execute(executor)
    .await
    .map_err(DbError::from)?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{batch, db, product, supplier};

    #[tokio::test]
    async fn test_output_patch_is_the_decrement_primitive() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 10, (2024, 1, 1)).await;

        let sold = db
            .product_details()
            .update(
                &b1.id,
                ProductDetailPatch {
                    output_quantity: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(sold.output_quantity, 4);
        assert_eq!(sold.inventory(), 6);

        let err = db
            .product_details()
            .update(
                &b1.id,
                ProductDetailPatch {
                    output_quantity: Some(11),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::BatchOverdrawn { .. })));
        assert_eq!(db.product_details().get(&b1.id).await.unwrap().output_quantity, 4);
    }

    #[tokio::test]
    async fn test_receiving_adjustment_keeps_invariant() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 10, (2024, 1, 1)).await;

        let grown = db
            .product_details()
            .update(
                &b1.id,
                ProductDetailPatch {
                    input_quantity: Some(15),
                    output_quantity: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(grown.inventory(), 10);

        let err = db
            .product_details()
            .update(
                &b1.id,
                ProductDetailPatch {
                    input_quantity: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_overdrawn_batch_and_unknown_product() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;

        let overdrawn = NewProductDetail {
            product_id: milk.id.clone(),
            input_quantity: 1,
            output_quantity: 2,
            date_of_manufacture: None,
            expiry_date: None,
        };
        assert!(db.product_details().create(overdrawn).await.is_err());

        let orphan = NewProductDetail {
            product_id: vnm.id.clone(),
            input_quantity: 1,
            output_quantity: 0,
            date_of_manufacture: None,
            expiry_date: None,
        };
        assert!(matches!(
            db.product_details().create(orphan).await,
            Err(DbError::InvalidReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_stock_index_from_store() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b2 = batch(&db, &milk.id, 5, (2024, 2, 1)).await;
        let b1 = batch(&db, &milk.id, 3, (2024, 1, 1)).await;

        let by_product = db.product_details().list_by_product(&milk.id).await.unwrap();
        assert_eq!(by_product.len(), 2);

        let index = db.product_details().stock_index().await.unwrap();
        let order: Vec<_> = index.batches(&milk.id).iter().map(|e| e.batch_id.clone()).collect();
        assert_eq!(order, vec![b1.id, b2.id]);
        assert_eq!(index.total_available(&milk.id), 8);
    }
}
