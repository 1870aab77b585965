//! Purchase order ("order form") repository.
//!
//! Codes are `PO{YYYYMMDD}-{seq}`, numbered per day inside the insert
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use kho_core::inputs::{NewOrderForm, OrderFormPatch};
use kho_core::order::ORDER_FORM_CODE_PREFIX;
use kho_core::validation::Validate;
use kho_core::{CollectionName, CoreError, OrderForm, OrderFormItem, OrderFormStatus, ValidationError};

use super::{begin_write, ensure_exists, new_id, next_document_code, CrudRepository};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct OrderFormRow {
    id: String,
    code: String,
    supplier_id: String,
    items: Json<Vec<OrderFormItem>>,
    status: OrderFormStatus,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderFormRow> for OrderForm {
    fn from(row: OrderFormRow) -> Self {
        OrderForm {
            id: row.id,
            code: row.code,
            supplier_id: row.supplier_id,
            items: row.items.0,
            status: row.status,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_ORDER_FORM: &str =
    "SELECT id, code, supplier_id, items, status, note, created_at, updated_at FROM order_forms";

#[derive(Debug, Clone)]
pub struct OrderFormRepository {
    pool: SqlitePool,
}

impl OrderFormRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderFormRepository { pool }
    }

    pub async fn list_by_supplier(&self, supplier_id: &str) -> DbResult<Vec<OrderForm>> {
        let sql = format!("{} WHERE supplier_id = ?1 ORDER BY created_at, rowid", SELECT_ORDER_FORM);
        let rows: Vec<OrderFormRow> = sqlx::query_as(&sql)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(OrderForm::from).collect())
    }
}

/// Every line must name an existing product.
pub(crate) async fn ensure_products(
    conn: &mut SqliteConnection,
    product_ids: impl Iterator<Item = &str>,
) -> DbResult<()> {
    for product_id in product_ids {
        ensure_exists(&mut *conn, "products", "product_id", product_id).await?;
    }
    Ok(())
}

/// A goods receipt may only fulfil a pending purchase order of its own
/// supplier.
pub(crate) async fn ensure_receivable(conn: &mut SqliteConnection, id: &str, supplier_id: &str) -> DbResult<()> {
    let form: Option<(String, OrderFormStatus)> =
        sqlx::query_as("SELECT supplier_id, status FROM order_forms WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

    let Some((form_supplier, status)) = form else {
        return Err(DbError::invalid_reference("order_form_id", id));
    };

    if status != OrderFormStatus::Pending {
        let current_state = match status {
            OrderFormStatus::Pending => "pending",
            OrderFormStatus::Completed => "completed",
            OrderFormStatus::Cancelled => "cancelled",
        };
        return Err(CoreError::InvalidOrderState {
            order_id: id.to_string(),
            current_state: current_state.to_string(),
            operation: "receive goods".to_string(),
        }
        .into());
    }

    if form_supplier != supplier_id {
        return Err(ValidationError::invalid_format(
            "supplier_id",
            format!("order form {} belongs to supplier {}", id, form_supplier),
        )
        .into());
    }

    Ok(())
}

/// Marks a pending purchase order as fulfilled by a goods receipt.
pub(crate) async fn mark_completed(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<()> {
    sqlx::query("UPDATE order_forms SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4")
        .bind(id)
        .bind(OrderFormStatus::Completed)
        .bind(now)
        .bind(OrderFormStatus::Pending)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl CrudRepository for OrderFormRepository {
    type Entity = OrderForm;
    type Create = NewOrderForm;
    type Update = OrderFormPatch;

    const COLLECTION: CollectionName = CollectionName::OrderForm;
    const TABLE: &'static str = "order_forms";

    fn from_pool(pool: SqlitePool) -> Self {
        OrderFormRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<OrderForm>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_ORDER_FORM);
        let rows: Vec<OrderFormRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(OrderForm::from).collect())
    }

    async fn find(&self, id: &str) -> DbResult<Option<OrderForm>> {
        let sql = format!("{} WHERE id = ?1", SELECT_ORDER_FORM);
        let row: Option<OrderFormRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(OrderForm::from))
    }

    async fn create(&self, input: NewOrderForm) -> DbResult<OrderForm> {
        input.validate()?;
        let now = Utc::now();

        let mut tx = begin_write(&self.pool).await?;
        ensure_exists(&mut *tx, "businesses", "supplier_id", &input.supplier_id).await?;
        ensure_products(&mut tx, input.items.iter().map(|i| i.product_id.as_str())).await?;

        let code = next_document_code(
            &mut *tx,
            "order_forms",
            "code",
            ORDER_FORM_CODE_PREFIX,
            now.date_naive(),
        )
        .await?;
        let form = input.into_order_form(new_id(), code, now);

        sqlx::query(
            r#"
            INSERT INTO order_forms (id, code, supplier_id, items, status, note, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&form.id)
        .bind(&form.code)
        .bind(&form.supplier_id)
        .bind(Json(&form.items))
        .bind(form.status)
        .bind(&form.note)
        .bind(form.created_at)
        .bind(form.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(id = %form.id, code = %form.code, lines = form.items.len(), "Purchase order created");
        Ok(form)
    }

    async fn update(&self, id: &str, patch: OrderFormPatch) -> DbResult<OrderForm> {
        patch.validate()?;
        let mut form = self.get(id).await?;

        let mut conn = self.pool.acquire().await?;
        if let Some(items) = &patch.items {
            ensure_products(&mut conn, items.iter().map(|i| i.product_id.as_str())).await?;
        }
        patch.apply(&mut form, Utc::now());

        sqlx::query("UPDATE order_forms SET items = ?2, status = ?3, note = ?4, updated_at = ?5 WHERE id = ?1")
            .bind(&form.id)
            .bind(Json(&form.items))
            .bind(form.status)
            .bind(&form.note)
            .bind(form.updated_at)
            .execute(&mut *conn)
            .await?;

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, product, supplier};

    #[tokio::test]
    async fn test_order_form_codes_are_daily_sequence() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let new_form = || NewOrderForm {
            supplier_id: vnm.id.clone(),
            items: vec![OrderFormItem {
                product_id: milk.id.clone(),
                quantity: 48,
                input_price: 25_600,
            }],
            note: None,
        };

        let first = db.order_forms().create(new_form()).await.unwrap();
        let second = db.order_forms().create(new_form()).await.unwrap();
        let today = Utc::now().format("%Y%m%d").to_string();

        assert_eq!(first.code, format!("PO{}-0001", today));
        assert_eq!(second.code, format!("PO{}-0002", today));
        assert_eq!(first.status, OrderFormStatus::Pending);
        assert_eq!(db.order_forms().list_by_supplier(&vnm.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_order_form_rejects_unknown_product() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let ghost = uuid::Uuid::new_v4().to_string();

        let err = db
            .order_forms()
            .create(NewOrderForm {
                supplier_id: vnm.id.clone(),
                items: vec![OrderFormItem {
                    product_id: ghost.clone(),
                    quantity: 1,
                    input_price: 0,
                }],
                note: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InvalidReference { ref id, .. } if *id == ghost));
        assert!(db.order_forms().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_form_cancel() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let form = db
            .order_forms()
            .create(NewOrderForm {
                supplier_id: vnm.id.clone(),
                items: vec![OrderFormItem {
                    product_id: milk.id.clone(),
                    quantity: 12,
                    input_price: 25_600,
                }],
                note: Some("Giao trước thứ 6".to_string()),
            })
            .await
            .unwrap();

        let cancelled = db
            .order_forms()
            .update(
                &form.id,
                OrderFormPatch {
                    status: Some(OrderFormStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderFormStatus::Cancelled);
        assert_eq!(cancelled.items.len(), 1);
        assert_eq!(cancelled.note.as_deref(), Some("Giao trước thứ 6"));
    }
}
