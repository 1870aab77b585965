//! # Order Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   POST /api/order {payment_status: false}                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌─────────┐   PATCH /api/order/draft   ┌────────┐                     │
//! │   │  DRAFT  │ ─────────────────────────► │  PAID  │ ──► settlement      │
//! │   │ pending │                            │completed│                    │
//! │   └─────────┘                            └────────┘                     │
//! │                                              ▲                          │
//! │   POST /api/order {payment_status: true} ────┘ ──► settlement           │
//! │                                                                         │
//! │   Forward only. DELETE is a hard delete in either state and never      │
//! │   gives stock back.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::inputs::NewOrder;
use crate::money::Money;
use crate::types::{Order, OrderItem, OrderStatus, PaymentMethod};

pub const ORDER_CODE_PREFIX: &str = "DH";
pub const ORDER_FORM_CODE_PREFIX: &str = "PO";
pub const GOOD_RECEIPT_CODE_PREFIX: &str = "PN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Draft,
    Paid,
}

impl OrderState {
    /// Legacy rows may carry only one of the two flags; either one means paid.
    pub fn of(payment_status: bool, status: OrderStatus) -> Self {
        if payment_status || status == OrderStatus::Completed {
            OrderState::Paid
        } else {
            OrderState::Draft
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "draft",
            OrderState::Paid => "paid",
        }
    }
}

impl Order {
    pub fn state(&self) -> OrderState {
        OrderState::of(self.payment_status, self.status)
    }
}

/// Σ quantity × price over the lines.
pub fn compute_total(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::line_total).sum()
}

/// Document code `{prefix}{YYYYMMDD}-{NNNN}`, with `sequence` counted per day.
///
/// ```rust
/// use chrono::NaiveDate;
/// use kho_core::order::document_code;
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// assert_eq!(document_code("DH", day, 7), "DH20240101-0007");
/// ```
pub fn document_code(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}{}-{:04}", prefix, date.format("%Y%m%d"), sequence)
}

pub fn generate_order_code(date: NaiveDate, sequence: u32) -> String {
    document_code(ORDER_CODE_PREFIX, date, sequence)
}

/// Builds the order row for a checkout.
///
/// A paid checkout is normalized to `payment_status = true` and
/// `status = completed`; anything else is stored as a draft.
pub fn build_order(input: NewOrder, id: String, order_code: String, now: DateTime<Utc>) -> Order {
    let total_amount = input
        .total_amount
        .unwrap_or_else(|| compute_total(&input.items).dong());
    let state = OrderState::of(input.payment_status, input.status.unwrap_or_default());

    Order {
        id,
        order_code,
        employee_id: input.employee_id,
        items: input.items,
        total_amount,
        payment_method: input.payment_method,
        payment_status: state == OrderState::Paid,
        status: match state {
            OrderState::Paid => OrderStatus::Completed,
            OrderState::Draft => OrderStatus::Pending,
        },
        note: input.note.filter(|n| !n.trim().is_empty()),
        inventory_settled_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Flips a draft to paid.
pub fn complete_draft(order: &mut Order, payment_method: PaymentMethod, now: DateTime<Utc>) -> CoreResult<()> {
    if order.state() == OrderState::Paid {
        return Err(CoreError::InvalidOrderState {
            order_id: order.id.clone(),
            current_state: OrderState::Paid.as_str().to_string(),
            operation: "complete draft".to_string(),
        });
    }

    order.payment_method = payment_method;
    order.payment_status = true;
    order.status = OrderStatus::Completed;
    order.updated_at = now;
    Ok(())
}

/// Checks that the order may be settled now.
///
/// Drafts are never settled, and an order is settled at most once.
pub fn ensure_settleable(order: &Order) -> CoreResult<()> {
    if order.state() == OrderState::Draft {
        return Err(CoreError::InvalidOrderState {
            order_id: order.id.clone(),
            current_state: OrderState::Draft.as_str().to_string(),
            operation: "settle inventory".to_string(),
        });
    }
    if order.is_settled() {
        return Err(CoreError::AlreadySettled(order.id.clone()));
    }
    Ok(())
}

pub fn needs_settlement(order: &Order) -> bool {
    ensure_settleable(order).is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout(payment_status: bool, total_amount: Option<i64>) -> NewOrder {
        serde_json::from_value(serde_json::json!({
            "employee_id": "nv-01",
            "items": [
                { "product_id": "p-1", "quantity": 3, "price": 12500 },
                { "product_id": "p-2", "quantity": 1, "price": 8000 }
            ],
            "total_amount": total_amount,
            "payment_method": "cash",
            "payment_status": payment_status
        }))
        .unwrap()
    }

    fn build(payment_status: bool) -> Order {
        build_order(checkout(payment_status, None), "o-1".into(), "DH20240101-0001".into(), Utc::now())
    }

    #[test]
    fn test_total_defaults_to_line_sum() {
        let order = build(true);
        assert_eq!(order.total_amount, 45_500);
        assert_eq!(compute_total(&order.items), Money::from_dong(45_500));

        let given = build_order(checkout(true, Some(40_000)), "o-2".into(), "c".into(), Utc::now());
        assert_eq!(given.total_amount, 40_000);
    }

    #[test]
    fn test_oversized_prices_fail_validation() {
        use crate::validation::Validate;

        let priced = |price: i64, quantity: i64| -> NewOrder {
            serde_json::from_value(serde_json::json!({
                "employee_id": "nv-01",
                "items": [
                    { "product_id": "550e8400-e29b-41d4-a716-446655440001", "quantity": quantity, "price": price },
                    { "product_id": "550e8400-e29b-41d4-a716-446655440002", "quantity": quantity, "price": price }
                ],
                "payment_method": "cash",
                "payment_status": true
            }))
            .unwrap()
        };

        assert!(priced(5_000_000_000_000_000_000, 1).validate().is_err());

        let ceiling = priced(crate::MAX_PRICE, crate::MAX_ITEM_QUANTITY);
        assert!(ceiling.validate().is_ok());
        let order = build_order(ceiling, "o-3".into(), "c".into(), Utc::now());
        assert_eq!(order.total_amount, 2 * crate::MAX_PRICE * crate::MAX_ITEM_QUANTITY);
    }

    #[test]
    fn test_build_normalizes_state() {
        let paid = build(true);
        assert_eq!(paid.state(), OrderState::Paid);
        assert_eq!(paid.status, OrderStatus::Completed);
        assert!(needs_settlement(&paid));

        let draft = build(false);
        assert_eq!(draft.state(), OrderState::Draft);
        assert_eq!(draft.status, OrderStatus::Pending);
        assert!(!needs_settlement(&draft));
    }

    #[test]
    fn test_complete_draft_moves_forward_only() {
        let mut order = build(false);
        complete_draft(&mut order, PaymentMethod::Transfer, Utc::now()).unwrap();
        assert!(order.payment_status);
        assert_eq!(order.payment_method, PaymentMethod::Transfer);
        assert_eq!(order.state(), OrderState::Paid);

        let err = complete_draft(&mut order, PaymentMethod::Cash, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOrderState { .. }));
        assert_eq!(order.payment_method, PaymentMethod::Transfer);
    }

    #[test]
    fn test_settle_guard() {
        let draft = build(false);
        assert!(matches!(ensure_settleable(&draft), Err(CoreError::InvalidOrderState { .. })));

        let mut paid = build(true);
        assert!(ensure_settleable(&paid).is_ok());
        paid.inventory_settled_at = Some(Utc::now());
        assert!(matches!(ensure_settleable(&paid), Err(CoreError::AlreadySettled(_))));
    }

    #[test]
    fn test_legacy_completed_flag_counts_as_paid() {
        assert_eq!(OrderState::of(false, OrderStatus::Completed), OrderState::Paid);
        assert_eq!(OrderState::of(true, OrderStatus::Pending), OrderState::Paid);
        assert_eq!(OrderState::of(false, OrderStatus::Pending), OrderState::Draft);
    }

    #[test]
    fn test_order_codes() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(generate_order_code(day, 1), "DH20241231-0001");
        assert_eq!(document_code(GOOD_RECEIPT_CODE_PREFIX, day, 12345), "PN20241231-12345");
    }
}
