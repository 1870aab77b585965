//! # Stock Index
//!
//! Sellable batches grouped per product, oldest manufacture date first.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductDetail rows (all of them, unpaged)                              │
//! │        │                                                                │
//! │        ▼  drop batches with inventory <= 0                              │
//! │        ▼  group by product_id                                           │
//! │        ▼  stable sort: dated batches oldest first, undated after,       │
//! │           undated keep the order they were read in                      │
//! │                                                                         │
//! │  product_id ─► [ StockEntry { batchId, quantityAvailable, ... }, ... ]  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The index is rebuilt wholesale whenever it is needed; there is no
//! incremental refresh.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use ts_rs::TS;

use crate::types::ProductDetail;

/// One sellable batch as seen by settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub batch_id: String,
    pub quantity_available: i64,
    /// Units already sold from the batch when the index was built.
    pub output_quantity: i64,
    #[ts(as = "Option<String>")]
    pub manufacture_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
}

impl StockEntry {
    pub fn new(
        batch_id: impl Into<String>,
        quantity_available: i64,
        manufacture_date: Option<NaiveDate>,
    ) -> Self {
        StockEntry {
            batch_id: batch_id.into(),
            quantity_available,
            output_quantity: 0,
            manufacture_date,
            expiry_date: None,
        }
    }
}

impl From<&ProductDetail> for StockEntry {
    fn from(detail: &ProductDetail) -> Self {
        StockEntry {
            batch_id: detail.id.clone(),
            quantity_available: detail.inventory(),
            output_quantity: detail.output_quantity,
            manufacture_date: detail.date_of_manufacture,
            expiry_date: detail.expiry_date,
        }
    }
}

/// Per-product list of sellable batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StockIndex {
    products: BTreeMap<String, Vec<StockEntry>>,
}

/// Dated batches first (ascending), undated batches after them.
///
/// Undated entries share one key, so a stable sort leaves them in
/// encountered order and the comparison stays total.
fn fifo_key(entry: &StockEntry) -> (bool, Option<NaiveDate>) {
    (entry.manufacture_date.is_none(), entry.manufacture_date)
}

fn normalize(mut entries: Vec<StockEntry>) -> Vec<StockEntry> {
    entries.retain(|e| e.quantity_available > 0);
    entries.sort_by_key(fifo_key);
    entries
}

impl StockIndex {
    /// Builds the index from every batch in the store.
    pub fn build<'a>(details: impl IntoIterator<Item = &'a ProductDetail>) -> Self {
        let mut grouped: BTreeMap<String, Vec<StockEntry>> = BTreeMap::new();
        for detail in details {
            grouped
                .entry(detail.product_id.clone())
                .or_default()
                .push(StockEntry::from(detail));
        }

        let products = grouped
            .into_iter()
            .map(|(product_id, entries)| (product_id, normalize(entries)))
            .filter(|(_, entries)| !entries.is_empty())
            .collect();

        StockIndex { products }
    }

    /// Builds a single-product index from pre-made entries.
    pub fn from_entries(product_id: impl Into<String>, entries: Vec<StockEntry>) -> Self {
        let mut index = StockIndex::default();
        index.insert(product_id, entries);
        index
    }

    /// Adds (or replaces) one product's batches, applying the same
    /// filtering and ordering as [`StockIndex::build`].
    pub fn insert(&mut self, product_id: impl Into<String>, entries: Vec<StockEntry>) {
        let product_id = product_id.into();
        let entries = normalize(entries);
        if entries.is_empty() {
            self.products.remove(&product_id);
        } else {
            self.products.insert(product_id, entries);
        }
    }

    /// Batches of a product, oldest first. Empty when nothing is in stock.
    pub fn batches(&self, product_id: &str) -> &[StockEntry] {
        self.products
            .get(product_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn batch(&self, product_id: &str, batch_id: &str) -> Option<&StockEntry> {
        self.batches(product_id)
            .iter()
            .find(|e| e.batch_id == batch_id)
    }

    pub fn total_available(&self, product_id: &str) -> i64 {
        self.batches(product_id)
            .iter()
            .map(|e| e.quantity_available)
            .sum()
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
