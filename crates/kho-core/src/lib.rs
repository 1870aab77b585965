//! # kho-core: Pure Business Logic for Kho
//!
//! This crate holds the inventory and order rules of the Kho back-office
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Kho Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront / back-office UI                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kho-api (axum routes)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ kho-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌────────┐ ┌────────┐  │   │
//! │  │  │  types  │ │  stock  │ │ settlement │ │ order  │ │ report │  │   │
//! │  │  └─────────┘ └─────────┘ └────────────┘ └────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kho-db (SQLite repositories)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Persisted entities (Product, ProductDetail, Order, ...)
//! - [`inputs`] - Create/patch payloads for the uniform CRUD contract
//! - [`money`] - Integer đồng amounts
//! - [`stock`] - Stock index: batches grouped per product, oldest first
//! - [`settlement`] - Batch decrement planning for paid orders
//! - [`order`] - Draft → paid lifecycle and order codes
//! - [`report`] - Revenue report queries and calendar densification
//! - [`validation`] - Field-level validators
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use kho_core::settlement::{plan_settlement, SettlementLine};
//! use kho_core::stock::{StockEntry, StockIndex};
//!
//! let index = StockIndex::from_entries("milk", vec![
//!     StockEntry::new("b1", 3, NaiveDate::from_ymd_opt(2024, 1, 1)),
//!     StockEntry::new("b2", 5, NaiveDate::from_ymd_opt(2024, 2, 1)),
//! ]);
//!
//! let plan = plan_settlement(&[SettlementLine::new("milk", 6)], &index);
//! assert_eq!(plan.decremented_from("b1"), 3);
//! assert_eq!(plan.decremented_from("b2"), 3);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inputs;
pub mod money;
pub mod order;
pub mod report;
pub mod settlement;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single order or purchase document.
pub const MAX_ORDER_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
///
/// Catches typos at the counter (10000 instead of 100) before they reach
/// batch bookkeeping.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest unit price in đồng (one trillion).
///
/// Keeps `MAX_ORDER_ITEMS × MAX_ITEM_QUANTITY × MAX_PRICE` inside `i64`.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Largest order total in đồng.
pub const MAX_ORDER_TOTAL: i64 = MAX_PRICE * MAX_ITEM_QUANTITY * MAX_ORDER_ITEMS as i64;

/// Default number of rows for the `top_products` report.
pub const DEFAULT_TOP_PRODUCTS: u32 = 5;

/// Upper bound for the `top_products` report `limit` parameter.
pub const MAX_TOP_PRODUCTS: u32 = 100;
