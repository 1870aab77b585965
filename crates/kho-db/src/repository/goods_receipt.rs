//! # Goods Receipt Repository
//!
//! Posting a receipt is the only way stock enters the store besides
//! creating batches by hand.
//!
//! ## Posting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    supplier, products, order form exist?    else InvalidReference      │
//! │    order form pending, same supplier?       else 422                   │
//! │    for each line:                                                       │
//! │        INSERT product_details (input = quantity, output = 0, dates)    │
//! │    code = PN{YYYYMMDD}-{seq}                                           │
//! │    INSERT good_receipts (lines carry their new detail_id)              │
//! │    order_form_id set?  → order form status = completed                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are frozen once posted; patches touch only the receiver and note.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::info;

use kho_core::inputs::{GoodReceiptPatch, NewGoodReceipt};
use kho_core::order::GOOD_RECEIPT_CODE_PREFIX;
use kho_core::validation::Validate;
use kho_core::{CollectionName, GoodReceipt, GoodReceiptItem, ProductDetail};

use super::order_form::{ensure_products, ensure_receivable, mark_completed};
use super::product_detail::insert_detail;
use super::{begin_write, ensure_exists, new_id, next_document_code, CrudRepository};
use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct GoodReceiptRow {
    id: String,
    code: String,
    supplier_id: String,
    order_form_id: Option<String>,
    receiver_id: String,
    items: Json<Vec<GoodReceiptItem>>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GoodReceiptRow> for GoodReceipt {
    fn from(row: GoodReceiptRow) -> Self {
        GoodReceipt {
            id: row.id,
            code: row.code,
            supplier_id: row.supplier_id,
            order_form_id: row.order_form_id,
            receiver_id: row.receiver_id,
            items: row.items.0,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_RECEIPT: &str = r#"
    SELECT id, code, supplier_id, order_form_id, receiver_id, items, note, created_at, updated_at
    FROM good_receipts
"#;

#[derive(Debug, Clone)]
pub struct GoodReceiptRepository {
    pool: SqlitePool,
}

impl GoodReceiptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GoodReceiptRepository { pool }
    }
}

#[async_trait]
impl CrudRepository for GoodReceiptRepository {
    type Entity = GoodReceipt;
    type Create = NewGoodReceipt;
    type Update = GoodReceiptPatch;

    const COLLECTION: CollectionName = CollectionName::GoodReceipt;
    const TABLE: &'static str = "good_receipts";

    fn from_pool(pool: SqlitePool) -> Self {
        GoodReceiptRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<GoodReceipt>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_RECEIPT);
        let rows: Vec<GoodReceiptRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(GoodReceipt::from).collect())
    }

    async fn find(&self, id: &str) -> DbResult<Option<GoodReceipt>> {
        let sql = format!("{} WHERE id = ?1", SELECT_RECEIPT);
        let row: Option<GoodReceiptRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(GoodReceipt::from))
    }

    async fn create(&self, input: NewGoodReceipt) -> DbResult<GoodReceipt> {
        input.validate()?;
        let now = Utc::now();

        let mut tx = begin_write(&self.pool).await?;
        ensure_exists(&mut *tx, "businesses", "supplier_id", &input.supplier_id).await?;
        if let Some(form_id) = &input.order_form_id {
            ensure_receivable(&mut tx, form_id, &input.supplier_id).await?;
        }
        ensure_products(&mut tx, input.items.iter().map(|i| i.product_id.as_str())).await?;

        let mut detail_ids = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let batch = ProductDetail {
                id: new_id(),
                product_id: item.product_id.clone(),
                input_quantity: item.quantity,
                output_quantity: 0,
                date_of_manufacture: item.date_of_manufacture,
                expiry_date: item.expiry_date,
                created_at: now,
                updated_at: now,
            };
            insert_detail(&mut *tx, &batch).await?;
            detail_ids.push(batch.id);
        }

        let code = next_document_code(
            &mut *tx,
            "good_receipts",
            "code",
            GOOD_RECEIPT_CODE_PREFIX,
            now.date_naive(),
        )
        .await?;
        let receipt = input.into_good_receipt(new_id(), code, detail_ids, now);

        sqlx::query(
            r#"
            INSERT INTO good_receipts (
                id, code, supplier_id, order_form_id, receiver_id, items, note, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.code)
        .bind(&receipt.supplier_id)
        .bind(&receipt.order_form_id)
        .bind(&receipt.receiver_id)
        .bind(Json(&receipt.items))
        .bind(&receipt.note)
        .bind(receipt.created_at)
        .bind(receipt.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(form_id) = &receipt.order_form_id {
            mark_completed(&mut tx, form_id, now).await?;
        }

        tx.commit().await?;
        info!(
            id = %receipt.id,
            code = %receipt.code,
            batches = receipt.items.len(),
            "Goods receipt posted"
        );
        Ok(receipt)
    }

    async fn update(&self, id: &str, patch: GoodReceiptPatch) -> DbResult<GoodReceipt> {
        patch.validate()?;
        let mut receipt = self.get(id).await?;
        patch.apply(&mut receipt, Utc::now());

        sqlx::query("UPDATE good_receipts SET receiver_id = ?2, note = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&receipt.id)
            .bind(&receipt.receiver_id)
            .bind(&receipt.note)
            .bind(receipt.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use kho_core::inputs::{NewOrderForm, OrderFormPatch};
    use kho_core::{CoreError, OrderForm, OrderFormItem, OrderFormStatus};

    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{db, product, supplier};
    use crate::Database;

    async fn pending_form(db: &Database, supplier_id: &str, product_id: &str) -> OrderForm {
        db.order_forms()
            .create(NewOrderForm {
                supplier_id: supplier_id.to_string(),
                items: vec![OrderFormItem {
                    product_id: product_id.to_string(),
                    quantity: 24,
                    input_price: 25_600,
                }],
                note: None,
            })
            .await
            .unwrap()
    }

    fn receipt_for(supplier_id: &str, form_id: &str, product_id: &str) -> NewGoodReceipt {
        NewGoodReceipt {
            supplier_id: supplier_id.to_string(),
            order_form_id: Some(form_id.to_string()),
            receiver_id: "kho-chinh".to_string(),
            items: vec![line(product_id, 24, None)],
            note: None,
        }
    }

    fn line(product_id: &str, quantity: i64, made: Option<NaiveDate>) -> GoodReceiptItem {
        GoodReceiptItem {
            product_id: product_id.to_string(),
            quantity,
            input_price: 25_600,
            date_of_manufacture: made,
            expiry_date: None,
            detail_id: None,
        }
    }

    #[tokio::test]
    async fn test_receipt_creates_one_batch_per_line() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;
        let yogurt = product(&db, &vnm.id, "Sữa chua", 7_000).await;
        let made = NaiveDate::from_ymd_opt(2024, 3, 1);

        let receipt = db
            .good_receipts()
            .create(NewGoodReceipt {
                supplier_id: vnm.id.clone(),
                order_form_id: None,
                receiver_id: "kho-chinh".to_string(),
                items: vec![line(&milk.id, 24, made), line(&yogurt.id, 60, None)],
                note: None,
            })
            .await
            .unwrap();

        assert!(receipt.code.starts_with("PN"));
        let milk_batches = db.product_details().list_by_product(&milk.id).await.unwrap();
        assert_eq!(milk_batches.len(), 1);
        assert_eq!(milk_batches[0].input_quantity, 24);
        assert_eq!(milk_batches[0].output_quantity, 0);
        assert_eq!(milk_batches[0].date_of_manufacture, made);
        assert_eq!(receipt.items[0].detail_id.as_deref(), Some(milk_batches[0].id.as_str()));

        let index = db.product_details().stock_index().await.unwrap();
        assert_eq!(index.total_available(&yogurt.id), 60);
    }

    #[tokio::test]
    async fn test_receipt_completes_order_form() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let form = db
            .order_forms()
            .create(NewOrderForm {
                supplier_id: vnm.id.clone(),
                items: vec![OrderFormItem {
                    product_id: milk.id.clone(),
                    quantity: 24,
                    input_price: 25_600,
                }],
                note: None,
            })
            .await
            .unwrap();

        db.good_receipts()
            .create(NewGoodReceipt {
                supplier_id: vnm.id.clone(),
                order_form_id: Some(form.id.clone()),
                receiver_id: "kho-chinh".to_string(),
                items: vec![line(&milk.id, 24, None)],
                note: Some("Đủ hàng".to_string()),
            })
            .await
            .unwrap();

        let form = db.order_forms().get(&form.id).await.unwrap();
        assert_eq!(form.status, OrderFormStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_receipt_leaves_no_batches() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;
        let ghost_form = uuid::Uuid::new_v4().to_string();

        let err = db
            .good_receipts()
            .create(NewGoodReceipt {
                supplier_id: vnm.id.clone(),
                order_form_id: Some(ghost_form),
                receiver_id: "kho-chinh".to_string(),
                items: vec![line(&milk.id, 24, None)],
                note: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InvalidReference { .. }));
        assert!(db.product_details().list().await.unwrap().is_empty());
        assert!(db.good_receipts().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receipt_needs_pending_order_form() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let cancelled = pending_form(&db, &vnm.id, &milk.id).await;
        db.order_forms()
            .update(
                &cancelled.id,
                OrderFormPatch {
                    status: Some(OrderFormStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = db
            .good_receipts()
            .create(receipt_for(&vnm.id, &cancelled.id, &milk.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidOrderState { .. })));
        let form = db.order_forms().get(&cancelled.id).await.unwrap();
        assert_eq!(form.status, OrderFormStatus::Cancelled);

        let fulfilled = pending_form(&db, &vnm.id, &milk.id).await;
        db.good_receipts()
            .create(receipt_for(&vnm.id, &fulfilled.id, &milk.id))
            .await
            .unwrap();
        let err = db
            .good_receipts()
            .create(receipt_for(&vnm.id, &fulfilled.id, &milk.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidOrderState { .. })));

        assert_eq!(db.product_details().list().await.unwrap().len(), 1);
        assert_eq!(db.good_receipts().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_supplier_must_match_order_form() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let other = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;
        let form = pending_form(&db, &vnm.id, &milk.id).await;

        let err = db
            .good_receipts()
            .create(receipt_for(&other.id, &form.id, &milk.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let form = db.order_forms().get(&form.id).await.unwrap();
        assert_eq!(form.status, OrderFormStatus::Pending);
        assert!(db.product_details().list().await.unwrap().is_empty());
    }
}
