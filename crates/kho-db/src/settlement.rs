//! # Settlement Executor
//!
//! Applies a settlement plan to the batch store inside the caller's
//! transaction.
//!
//! ## Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. claim     UPDATE orders SET inventory_settled_at = now              │
//! │               WHERE id = ? AND inventory_settled_at IS NULL             │
//! │               0 rows → AlreadySettled                                   │
//! │                                                                         │
//! │  2. read      batches of the order's products (inside the transaction)  │
//! │  3. plan      kho_core::settlement::plan_settlement                     │
//! │  4. policy    reject + shortfall → InsufficientStock                    │
//! │                                                                         │
//! │  5. apply     per decrement:                                            │
//! │               UPDATE product_details                                    │
//! │               SET output_quantity = output_quantity + d                 │
//! │               WHERE id = ? AND output_quantity + d <= input_quantity    │
//! │               0 rows → Conflict                                         │
//! │                                                                         │
//! │  6. record    INSERT INTO order_allocations                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error drops the transaction, so a failed settlement leaves neither
//! the claim nor any decrement behind.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

use kho_core::order::ensure_settleable;
use kho_core::settlement::{plan_settlement, SettlementLine, SettlementOutcome, ShortfallPolicy};
use kho_core::stock::{StockEntry, StockIndex};
use kho_core::{CoreError, Order, ProductDetail};

use crate::error::{DbError, DbResult};
use crate::repository::product_detail::SELECT_DETAIL;

/// Settles `order` within `tx`. The caller commits.
pub(crate) async fn settle_order(
    tx: &mut Transaction<'_, Sqlite>,
    order: &Order,
    policy: ShortfallPolicy,
) -> DbResult<SettlementOutcome> {
    ensure_settleable(order)?;
    let settled_at = Utc::now();

    let claimed = sqlx::query(
        "UPDATE orders SET inventory_settled_at = ?2 WHERE id = ?1 AND inventory_settled_at IS NULL",
    )
    .bind(&order.id)
    .bind(settled_at)
    .execute(&mut **tx)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(CoreError::AlreadySettled(order.id.clone()).into());
    }

    let index = load_index(tx, order).await?;
    let lines: Vec<SettlementLine> = order.items.iter().map(SettlementLine::from).collect();
    let plan = plan_settlement(&lines, &index);

    for shortfall in plan.shortfalls() {
        warn!(
            order_id = %order.id,
            product_id = %shortfall.product_id,
            requested = shortfall.requested,
            fulfilled = shortfall.fulfilled,
            "Insufficient stock while settling order"
        );
    }
    policy.check(&plan)?;

    for decrement in plan.decrements() {
        let applied = sqlx::query(
            r#"
            UPDATE product_details
            SET output_quantity = output_quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND output_quantity + ?2 <= input_quantity
            "#,
        )
        .bind(&decrement.batch_id)
        .bind(decrement.quantity)
        .bind(settled_at)
        .execute(&mut **tx)
        .await?;

        if applied.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "batch {} no longer has {} units for order {}",
                decrement.batch_id, decrement.quantity, order.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO order_allocations (
                order_id, line, product_id, batch_id, quantity, unit_price, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.id)
        .bind(decrement.line as i64)
        .bind(&decrement.product_id)
        .bind(&decrement.batch_id)
        .bind(decrement.quantity)
        .bind(decrement.unit_price)
        .bind(settled_at)
        .execute(&mut **tx)
        .await?;

        debug!(
            order_id = %order.id,
            batch_id = %decrement.batch_id,
            quantity = decrement.quantity,
            "Batch decremented"
        );
    }

    let outcome = plan.into_outcome(order.id.clone(), settled_at);
    info!(
        order_id = %order.id,
        decrements = outcome.decrements.len(),
        shortfalls = outcome.shortfalls.len(),
        "Order settled"
    );
    Ok(outcome)
}

/// Stock index over the products of `order`, read inside the transaction.
async fn load_index(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<StockIndex> {
    let mut product_ids: Vec<&str> = order.items.iter().map(|i| i.product_id.as_str()).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let sql = format!("{} WHERE product_id = ?1 ORDER BY rowid", SELECT_DETAIL);
    let mut index = StockIndex::default();
    for product_id in product_ids {
        let details = sqlx::query_as::<_, ProductDetail>(&sql)
            .bind(product_id)
            .fetch_all(&mut **tx)
            .await?;
        index.insert(product_id, details.iter().map(StockEntry::from).collect());
    }

    Ok(index)
}
