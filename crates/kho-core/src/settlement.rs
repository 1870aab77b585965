//! # Settlement Planning
//!
//! Turns the lines of a paid order into batch decrements.
//!
//! ## Algorithm (per line, in order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  remaining = line.quantity                                              │
//! │                                                                         │
//! │  1. bound batch (batchDetails.detailId) belongs to the product?         │
//! │        take min(remaining, available(bound))                            │
//! │                                                                         │
//! │  2. while remaining > 0, walk the product's batches oldest first,       │
//! │     skipping the bound batch:                                           │
//! │        take min(remaining, available(batch))                            │
//! │                                                                         │
//! │  3. remaining > 0 after the walk → Shortfall                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `available` is the index quantity minus what earlier lines of the same
//! order already took, so two lines for one product never double-book a
//! batch. For each product the decrements add up to `min(requested, stock)`.
//!
//! Planning is pure. Applying the plan (atomically, once per order) is the
//! job of the database layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::stock::{StockEntry, StockIndex};
use crate::types::OrderItem;

// =============================================================================
// Inputs
// =============================================================================

/// One order line as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementLine {
    pub product_id: String,
    pub quantity: i64,
    pub bound_batch: Option<String>,
    /// Unit price in đồng, carried into the allocation records.
    pub unit_price: i64,
}

impl SettlementLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SettlementLine {
            product_id: product_id.into(),
            quantity,
            bound_batch: None,
            unit_price: 0,
        }
    }

    pub fn with_bound_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.bound_batch = Some(batch_id.into());
        self
    }

    pub fn with_unit_price(mut self, unit_price: i64) -> Self {
        self.unit_price = unit_price;
        self
    }
}

impl From<&OrderItem> for SettlementLine {
    fn from(item: &OrderItem) -> Self {
        SettlementLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            bound_batch: item.bound_batch().map(str::to_string),
            unit_price: item.price,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Take `quantity` units out of `batch_id` for order line `line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDecrement {
    pub line: usize,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    pub unit_price: i64,
}

/// A line that total stock could not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub line: usize,
    pub product_id: String,
    pub requested: i64,
    pub fulfilled: i64,
}

impl Shortfall {
    pub fn missing(&self) -> i64 {
        self.requested - self.fulfilled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LineOutcome {
    Fulfilled {
        line: usize,
        product_id: String,
        quantity: i64,
    },
    Short {
        #[serde(flatten)]
        shortfall: Shortfall,
    },
}

/// Decrements and per-line outcomes for one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlementPlan {
    decrements: Vec<BatchDecrement>,
    outcomes: Vec<LineOutcome>,
}

impl SettlementPlan {
    pub fn decrements(&self) -> &[BatchDecrement] {
        &self.decrements
    }

    pub fn outcomes(&self) -> &[LineOutcome] {
        &self.outcomes
    }

    /// Total units the plan takes from one batch.
    pub fn decremented_from(&self, batch_id: &str) -> i64 {
        self.decrements
            .iter()
            .filter(|d| d.batch_id == batch_id)
            .map(|d| d.quantity)
            .sum()
    }

    /// Total units the plan takes for one product, across batches.
    pub fn total_for(&self, product_id: &str) -> i64 {
        self.decrements
            .iter()
            .filter(|d| d.product_id == product_id)
            .map(|d| d.quantity)
            .sum()
    }

    pub fn shortfalls(&self) -> impl Iterator<Item = &Shortfall> {
        self.outcomes.iter().filter_map(|o| match o {
            LineOutcome::Short { shortfall } => Some(shortfall),
            LineOutcome::Fulfilled { .. } => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.shortfalls().next().is_none()
    }

    /// Finalizes the plan into the record returned to callers.
    pub fn into_outcome(self, order_id: impl Into<String>, settled_at: DateTime<Utc>) -> SettlementOutcome {
        let shortfalls = self.shortfalls().cloned().collect();
        SettlementOutcome {
            order_id: order_id.into(),
            decrements: self.decrements,
            shortfalls,
            settled_at,
        }
    }
}

/// What settling an order actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementOutcome {
    pub order_id: String,
    pub decrements: Vec<BatchDecrement>,
    pub shortfalls: Vec<Shortfall>,
    pub settled_at: DateTime<Utc>,
}

impl SettlementOutcome {
    pub fn is_complete(&self) -> bool {
        self.shortfalls.is_empty()
    }
}

// =============================================================================
// Policy
// =============================================================================

/// What to do when total stock cannot cover an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Settle what exists and report the shortfall.
    #[default]
    Allow,
    /// Refuse the whole settlement.
    Reject,
}

impl ShortfallPolicy {
    pub fn check(&self, plan: &SettlementPlan) -> CoreResult<()> {
        match (self, plan.shortfalls().next()) {
            (ShortfallPolicy::Reject, Some(shortfall)) => {
                Err(CoreError::InsufficientStock(shortfall.clone()))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Planner
// =============================================================================

/// Plans batch decrements for `lines` against `index`.
pub fn plan_settlement(lines: &[SettlementLine], index: &StockIndex) -> SettlementPlan {
    let mut taken: HashMap<String, i64> = HashMap::new();
    let mut plan = SettlementPlan::default();

    for (line_no, line) in lines.iter().enumerate() {
        let requested = line.quantity.max(0);
        let mut remaining = requested;

        let bound = line
            .bound_batch
            .as_deref()
            .and_then(|batch_id| index.batch(&line.product_id, batch_id));

        if let Some(entry) = bound {
            remaining -= take(&mut taken, &mut plan, line_no, line, entry, remaining);
        }

        for entry in index.batches(&line.product_id) {
            if remaining == 0 {
                break;
            }
            if bound.is_some_and(|b| b.batch_id == entry.batch_id) {
                continue;
            }
            remaining -= take(&mut taken, &mut plan, line_no, line, entry, remaining);
        }

        let fulfilled = requested - remaining;
        plan.outcomes.push(if remaining > 0 {
            LineOutcome::Short {
                shortfall: Shortfall {
                    line: line_no,
                    product_id: line.product_id.clone(),
                    requested,
                    fulfilled,
                },
            }
        } else {
            LineOutcome::Fulfilled {
                line: line_no,
                product_id: line.product_id.clone(),
                quantity: fulfilled,
            }
        });
    }

    plan
}

/// Takes up to `wanted` units from `entry`, net of earlier lines. Returns
/// the amount taken.
fn take(
    taken: &mut HashMap<String, i64>,
    plan: &mut SettlementPlan,
    line_no: usize,
    line: &SettlementLine,
    entry: &StockEntry,
    wanted: i64,
) -> i64 {
    let used = taken.entry(entry.batch_id.clone()).or_insert(0);
    let decrease = wanted.min(entry.quantity_available - *used);
    if decrease <= 0 {
        return 0;
    }

    *used += decrease;
    plan.decrements.push(BatchDecrement {
        line: line_no,
        product_id: line.product_id.clone(),
        batch_id: entry.batch_id.clone(),
        quantity: decrease,
        unit_price: line.unit_price,
    });
    decrease
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockEntry;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn milk_index() -> StockIndex {
        StockIndex::from_entries(
            "milk",
            vec![
                StockEntry::new("b2", 5, date(2024, 2, 1)),
                StockEntry::new("b1", 3, date(2024, 1, 1)),
            ],
        )
    }

    #[test]
    fn test_oldest_batch_is_emptied_first() {
        let index = milk_index();
        let plan = plan_settlement(&[SettlementLine::new("milk", 6)], &index);

        assert_eq!(plan.decremented_from("b1"), 3);
        assert_eq!(plan.decremented_from("b2"), 3);
        assert_eq!(plan.decrements()[0].batch_id, "b1");
        assert!(plan.is_complete());

        // Remaining availability: b1 = 0, b2 = 2.
        let left_b2 = index.batch("milk", "b2").map(|e| e.quantity_available).unwrap_or(0)
            - plan.decremented_from("b2");
        assert_eq!(left_b2, 2);
    }

    #[test]
    fn test_never_exceeds_batch_availability() {
        let index = milk_index();
        for qty in 0..=12 {
            let plan = plan_settlement(&[SettlementLine::new("milk", qty)], &index);
            for entry in index.batches("milk") {
                assert!(plan.decremented_from(&entry.batch_id) <= entry.quantity_available);
            }
        }
    }

    #[test]
    fn test_total_is_min_of_requested_and_stock() {
        let index = milk_index();
        for qty in 0..=12 {
            let plan = plan_settlement(&[SettlementLine::new("milk", qty)], &index);
            assert_eq!(plan.total_for("milk"), qty.min(8), "requested {}", qty);
            assert_eq!(plan.is_complete(), qty <= 8);
        }
    }

    #[test]
    fn test_shortfall_is_reported_not_thrown() {
        let plan = plan_settlement(&[SettlementLine::new("milk", 10)], &milk_index());
        let shortfalls: Vec<_> = plan.shortfalls().collect();

        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].requested, 10);
        assert_eq!(shortfalls[0].fulfilled, 8);
        assert_eq!(shortfalls[0].missing(), 2);
        assert_eq!(plan.total_for("milk"), 8);
    }

    #[test]
    fn test_bound_batch_is_used_first() {
        let line = SettlementLine::new("milk", 6).with_bound_batch("b2");
        let plan = plan_settlement(&[line], &milk_index());

        assert_eq!(plan.decrements()[0].batch_id, "b2");
        assert_eq!(plan.decremented_from("b2"), 5);
        assert_eq!(plan.decremented_from("b1"), 1);
    }

    #[test]
    fn test_bound_batch_of_other_product_is_ignored() {
        let mut index = milk_index();
        index.insert("rice", vec![StockEntry::new("r1", 4, None)]);

        let line = SettlementLine::new("milk", 2).with_bound_batch("r1");
        let plan = plan_settlement(&[line], &index);

        assert_eq!(plan.decremented_from("r1"), 0);
        assert_eq!(plan.decremented_from("b1"), 2);
    }

    #[test]
    fn test_lines_share_availability() {
        let lines = vec![
            SettlementLine::new("milk", 4),
            SettlementLine::new("milk", 4).with_bound_batch("b1"),
        ];
        let plan = plan_settlement(&lines, &milk_index());

        assert_eq!(plan.decremented_from("b1"), 3);
        assert_eq!(plan.decremented_from("b2"), 5);
        assert!(plan.is_complete());

        let plan = plan_settlement(&[lines[0].clone(), lines[0].clone(), lines[0].clone()], &milk_index());
        assert_eq!(plan.total_for("milk"), 8);
        assert_eq!(plan.shortfalls().count(), 1);
    }

    #[test]
    fn test_unknown_product_is_a_full_shortfall() {
        let plan = plan_settlement(&[SettlementLine::new("tea", 2)], &milk_index());
        assert!(plan.decrements().is_empty());
        assert_eq!(plan.shortfalls().next().map(|s| s.fulfilled), Some(0));
    }

    #[test]
    fn test_order_items_carry_price_and_binding() {
        let item: OrderItem = serde_json::from_str(
            r#"{"product_id":"milk","quantity":2,"price":25000,"batchDetails":{"detailId":"b2"}}"#,
        )
        .unwrap();
        let plan = plan_settlement(&[SettlementLine::from(&item)], &milk_index());

        assert_eq!(plan.decrements()[0].batch_id, "b2");
        assert_eq!(plan.decrements()[0].unit_price, 25_000);
    }

    #[test]
    fn test_policy() {
        let short = plan_settlement(&[SettlementLine::new("milk", 9)], &milk_index());
        let full = plan_settlement(&[SettlementLine::new("milk", 8)], &milk_index());

        assert!(ShortfallPolicy::Allow.check(&short).is_ok());
        assert!(ShortfallPolicy::Reject.check(&full).is_ok());
        assert!(matches!(
            ShortfallPolicy::Reject.check(&short),
            Err(CoreError::InsufficientStock(s)) if s.missing() == 1
        ));
        assert_eq!(ShortfallPolicy::default(), ShortfallPolicy::Allow);
    }

    #[test]
    fn test_outcome_keeps_shortfalls() {
        let plan = plan_settlement(&[SettlementLine::new("milk", 9)], &milk_index());
        let outcome = plan.into_outcome("o-1", Utc::now());

        assert_eq!(outcome.order_id, "o-1");
        assert_eq!(outcome.decrements.len(), 2);
        assert!(!outcome.is_complete());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["shortfalls"][0]["requested"], 9);
    }
}
