//! # Order Repository
//!
//! Checkout, draft completion and settlement, each in one transaction.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. CHECKOUT                                                            │
//! │     └── create() → Order (+ order_items)                               │
//! │     └── paid?  settle in the same transaction                          │
//! │     └── draft? stored as pending, inventory untouched                  │
//! │                                                                         │
//! │  2. COMPLETE DRAFT                                                      │
//! │     └── complete_draft() → payment_status = true, status = completed   │
//! │     └── settle in the same transaction                                 │
//! │                                                                         │
//! │  3. RETRY                                                               │
//! │     └── settle() → for a paid order whose settlement was rolled back   │
//! │                                                                         │
//! │  4. DELETE                                                              │
//! │     └── delete() → hard delete, batches keep their output_quantity     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use kho_core::inputs::{CompleteDraft, NewOrder};
use kho_core::order::{build_order, complete_draft, OrderState, ORDER_CODE_PREFIX};
use kho_core::settlement::{SettlementOutcome, ShortfallPolicy};
use kho_core::validation::{validate_uuid, Validate};
use kho_core::{BatchBinding, Order, OrderItem, OrderStatus, PaymentMethod};

use super::{begin_write, ensure_exists, new_id, next_document_code};
use crate::error::{DbError, DbResult};
use crate::settlement::settle_order;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_code: String,
    employee_id: String,
    total_amount: i64,
    payment_method: PaymentMethod,
    payment_status: bool,
    status: OrderStatus,
    note: Option<String>,
    inventory_settled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_code: self.order_code,
            employee_id: self.employee_id,
            items,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            status: self.status,
            note: self.note,
            inventory_settled_at: self.inventory_settled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    quantity: i64,
    price: i64,
    detail_id: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
            batch_details: row.detail_id.map(|detail_id| BatchBinding { detail_id }),
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, order_code, employee_id, total_amount, payment_method,
           payment_status, status, note, inventory_settled_at, created_at, updated_at
    FROM orders
"#;

/// The stored order plus what settlement did, if it ran.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub settlement: Option<SettlementOutcome>,
}

/// Repository for sales orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Every order with its lines, oldest first.
    pub async fn list(&self) -> DbResult<Vec<Order>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_ORDER);
        let rows: Vec<OrderRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, quantity, price, detail_id FROM order_items ORDER BY order_id, line",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id.clone()).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> DbResult<Order> {
        validate_uuid(id)?;
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Stores a checkout. A paid checkout is settled in the same
    /// transaction; a draft is not.
    pub async fn create(&self, input: NewOrder, policy: ShortfallPolicy) -> DbResult<CheckoutOutcome> {
        input.validate()?;
        let now = Utc::now();

        let mut tx = begin_write(&self.pool).await?;

        for item in &input.items {
            ensure_exists(&mut *tx, "products", "product_id", &item.product_id).await?;
        }

        let code = next_document_code(&mut *tx, "orders", "order_code", ORDER_CODE_PREFIX, now.date_naive()).await?;
        let mut order = build_order(input, new_id(), code, now);
        insert_order(&mut tx, &order).await?;

        info!(
            id = %order.id,
            order_code = %order.order_code,
            state = order.state().as_str(),
            total = %order.total(),
            "Order created"
        );

        let settlement = match order.state() {
            OrderState::Paid => {
                let outcome = settle_order(&mut tx, &order, policy).await?;
                order.inventory_settled_at = Some(outcome.settled_at);
                Some(outcome)
            }
            OrderState::Draft => None,
        };

        tx.commit().await?;
        Ok(CheckoutOutcome { order, settlement })
    }

    /// Flips a draft to paid and settles it.
    pub async fn complete_draft(&self, input: CompleteDraft, policy: ShortfallPolicy) -> DbResult<CheckoutOutcome> {
        input.validate()?;
        let mut tx = begin_write(&self.pool).await?;

        let mut order = fetch_order(&mut tx, &input.order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", &input.order_id))?;

        complete_draft(&mut order, input.payment_method, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE orders SET payment_method = ?2, payment_status = ?3, status = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.status)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        let outcome = settle_order(&mut tx, &order, policy).await?;
        order.inventory_settled_at = Some(outcome.settled_at);

        tx.commit().await?;
        info!(id = %order.id, "Draft completed");

        Ok(CheckoutOutcome {
            order,
            settlement: Some(outcome),
        })
    }

    /// Settles a paid order that is not settled yet.
    pub async fn settle(&self, id: &str, policy: ShortfallPolicy) -> DbResult<SettlementOutcome> {
        validate_uuid(id)?;
        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        let outcome = settle_order(&mut tx, &order, policy).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Hard delete. Stock already taken by the order is not given back.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        validate_uuid(id)?;
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        debug!(id = %id, "Order deleted");
        Ok(())
    }

    pub async fn delete_all(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM orders").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("{} WHERE id = ?1", SELECT_ORDER);
    let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items: Vec<OrderItemRow> = sqlx::query_as(
        "SELECT order_id, product_id, quantity, price, detail_id FROM order_items WHERE order_id = ?1 ORDER BY line",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_order(items.into_iter().map(OrderItem::from).collect())))
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_code, employee_id, total_amount, payment_method,
            payment_status, status, note, inventory_settled_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_code)
    .bind(&order.employee_id)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.status)
    .bind(&order.note)
    .bind(order.inventory_settled_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (line, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, line, product_id, quantity, price, detail_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.id)
        .bind(line as i64)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.bound_batch())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{batch, db, product, supplier};
    use crate::repository::CrudRepository;
    use crate::Database;
    use kho_core::CoreError;

    fn checkout(lines: &[(&str, i64, i64)], paid: bool) -> NewOrder {
        NewOrder {
            employee_id: "nv-01".to_string(),
            items: lines
                .iter()
                .map(|(product_id, quantity, price)| OrderItem {
                    product_id: product_id.to_string(),
                    quantity: *quantity,
                    price: *price,
                    batch_details: None,
                })
                .collect(),
            total_amount: None,
            payment_method: PaymentMethod::Cash,
            payment_status: paid,
            status: None,
            note: None,
        }
    }

    async fn output_of(db: &Database, batch_id: &str) -> i64 {
        db.product_details().get(batch_id).await.unwrap().output_quantity
    }

    #[tokio::test]
    async fn test_paid_checkout_settles_oldest_first() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 3, (2024, 1, 1)).await;
        let b2 = batch(&db, &milk.id, 5, (2024, 2, 1)).await;

        let outcome = db
            .orders()
            .create(checkout(&[(&milk.id, 6, 30_000)], true), ShortfallPolicy::Allow)
            .await
            .unwrap();

        assert!(outcome.order.is_settled());
        assert_eq!(outcome.order.total_amount, 180_000);
        assert!(outcome.order.order_code.starts_with("DH"));
        assert!(outcome.settlement.as_ref().unwrap().is_complete());

        assert_eq!(output_of(&db, &b1.id).await, 3);
        assert_eq!(output_of(&db, &b2.id).await, 3);
    }

    #[tokio::test]
    async fn test_draft_is_not_settled_until_completed() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 10, (2024, 1, 1)).await;

        let draft = db
            .orders()
            .create(checkout(&[(&milk.id, 2, 30_000)], false), ShortfallPolicy::Allow)
            .await
            .unwrap();
        assert!(draft.settlement.is_none());
        assert_eq!(output_of(&db, &b1.id).await, 0);

        let paid = db
            .orders()
            .complete_draft(
                CompleteDraft {
                    order_id: draft.order.id.clone(),
                    payment_method: PaymentMethod::Transfer,
                },
                ShortfallPolicy::Allow,
            )
            .await
            .unwrap();
        assert!(paid.order.payment_status);
        assert_eq!(paid.order.status, OrderStatus::Completed);
        assert_eq!(output_of(&db, &b1.id).await, 2);

        let stored = db.orders().get(&draft.order.id).await.unwrap();
        assert_eq!(stored.payment_method, PaymentMethod::Transfer);
        assert!(stored.is_settled());

        let again = db
            .orders()
            .complete_draft(
                CompleteDraft {
                    order_id: draft.order.id.clone(),
                    payment_method: PaymentMethod::Cash,
                },
                ShortfallPolicy::Allow,
            )
            .await
            .unwrap_err();
        assert!(matches!(again, DbError::Core(CoreError::InvalidOrderState { .. })));
        assert_eq!(output_of(&db, &b1.id).await, 2);
    }

    #[tokio::test]
    async fn test_settling_twice_does_not_decrement_twice() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 10, (2024, 1, 1)).await;

        let outcome = db
            .orders()
            .create(checkout(&[(&milk.id, 4, 30_000)], true), ShortfallPolicy::Allow)
            .await
            .unwrap();
        assert_eq!(output_of(&db, &b1.id).await, 4);

        let err = db
            .orders()
            .settle(&outcome.order.id, ShortfallPolicy::Allow)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadySettled(_))));
        assert_eq!(output_of(&db, &b1.id).await, 4);
    }

    #[tokio::test]
    async fn test_shortfall_policies() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 3, (2024, 1, 1)).await;

        let err = db
            .orders()
            .create(checkout(&[(&milk.id, 5, 30_000)], true), ShortfallPolicy::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock(_))));
        assert_eq!(output_of(&db, &b1.id).await, 0);
        assert!(db.orders().list().await.unwrap().is_empty());

        let outcome = db
            .orders()
            .create(checkout(&[(&milk.id, 5, 30_000)], true), ShortfallPolicy::Allow)
            .await
            .unwrap();
        let settlement = outcome.settlement.unwrap();
        assert_eq!(settlement.shortfalls.len(), 1);
        assert_eq!(settlement.shortfalls[0].fulfilled, 3);
        assert_eq!(output_of(&db, &b1.id).await, 3);
    }

    #[tokio::test]
    async fn test_bound_batch_and_shared_lines() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 3, (2024, 1, 1)).await;
        let b2 = batch(&db, &milk.id, 5, (2024, 2, 1)).await;

        let mut input = checkout(&[(&milk.id, 2, 30_000), (&milk.id, 4, 30_000)], true);
        input.items[0].batch_details = Some(BatchBinding {
            detail_id: b2.id.clone(),
        });

        db.orders().create(input, ShortfallPolicy::Allow).await.unwrap();

        // line 0: b2 -2 (bound); line 1: b1 -3, b2 -1
        assert_eq!(output_of(&db, &b1.id).await, 3);
        assert_eq!(output_of(&db, &b2.id).await, 3);
    }

    #[tokio::test]
    async fn test_delete_keeps_stock_taken() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 10, (2024, 1, 1)).await;

        let outcome = db
            .orders()
            .create(checkout(&[(&milk.id, 4, 30_000)], true), ShortfallPolicy::Allow)
            .await
            .unwrap();
        db.orders().delete(&outcome.order.id).await.unwrap();

        assert!(matches!(
            db.orders().get(&outcome.order.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(output_of(&db, &b1.id).await, 4);
    }

    #[tokio::test]
    async fn test_order_codes_count_per_day_and_items_round_trip() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;

        let first = db
            .orders()
            .create(checkout(&[(&milk.id, 1, 30_000)], false), ShortfallPolicy::Allow)
            .await
            .unwrap();
        let second = db
            .orders()
            .create(checkout(&[(&milk.id, 2, 30_000)], false), ShortfallPolicy::Allow)
            .await
            .unwrap();

        assert!(first.order.order_code.ends_with("-0001"));
        assert!(second.order.order_code.ends_with("-0002"));

        let orders = db.orders().list().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_order_code_after_delete_does_not_reuse_live_code() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let draft = || checkout(&[(&milk.id, 1, 30_000)], false);

        let first = db.orders().create(draft(), ShortfallPolicy::Allow).await.unwrap();
        let second = db.orders().create(draft(), ShortfallPolicy::Allow).await.unwrap();
        db.orders().delete(&first.order.id).await.unwrap();

        let third = db.orders().create(draft(), ShortfallPolicy::Allow).await.unwrap();
        assert!(second.order.order_code.ends_with("-0002"));
        assert!(third.order.order_code.ends_with("-0003"));
        assert_eq!(db.orders().list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_decrement_rolls_back_claim_and_earlier_batches() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 3, (2024, 1, 1)).await;
        let b2 = batch(&db, &milk.id, 5, (2024, 2, 1)).await;

        let draft = db
            .orders()
            .create(checkout(&[(&milk.id, 6, 30_000)], false), ShortfallPolicy::Allow)
            .await
            .unwrap();

        // Another writer empties b2 right after b1 is taken
        sqlx::query(&format!(
            "CREATE TRIGGER drain_b2 AFTER INSERT ON order_allocations BEGIN \
             UPDATE product_details SET output_quantity = input_quantity WHERE id = '{}'; END",
            b2.id
        ))
        .execute(db.pool())
        .await
        .unwrap();

        let complete = || CompleteDraft {
            order_id: draft.order.id.clone(),
            payment_method: PaymentMethod::Cash,
        };
        let err = db
            .orders()
            .complete_draft(complete(), ShortfallPolicy::Allow)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        assert_eq!(output_of(&db, &b1.id).await, 0);
        assert_eq!(output_of(&db, &b2.id).await, 0);
        let stored = db.orders().get(&draft.order.id).await.unwrap();
        assert!(!stored.payment_status);
        assert!(stored.inventory_settled_at.is_none());
        let allocations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_allocations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(allocations, 0);

        sqlx::query("DROP TRIGGER drain_b2").execute(db.pool()).await.unwrap();
        db.orders().complete_draft(complete(), ShortfallPolicy::Allow).await.unwrap();
        assert_eq!(output_of(&db, &b1.id).await, 3);
        assert_eq!(output_of(&db, &b2.id).await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_file_database() {
        let path = std::env::temp_dir().join(format!("kho-{}.db", new_id()));
        let db = Database::new(crate::DbConfig::new(path.clone()).max_connections(5)).await.unwrap();
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa", 30_000).await;
        let b1 = batch(&db, &milk.id, 20, (2024, 1, 1)).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let orders = db.orders();
            let input = checkout(&[(&milk.id, 1, 30_000)], true);
            handles.push(tokio::spawn(async move {
                orders.create(input, ShortfallPolicy::Reject).await
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(outcome.settlement.unwrap().is_complete());
            codes.push(outcome.order.order_code);
        }
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 20);
        assert_eq!(output_of(&db, &b1.id).await, 20);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let db = db().await;
        let err = db
            .orders()
            .create(
                checkout(&[("550e8400-e29b-41d4-a716-446655440000", 1, 1)], true),
                ShortfallPolicy::Allow,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidReference { .. }));
    }
}
