//! # kho-db: Database Layer for Kho
//!
//! SQLite persistence for the Kho back-office, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kho Data Flow                                  │
//! │                                                                         │
//! │  HTTP handler (POST /api/order)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kho-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (CRUD, order │    │  (embedded)  │  │   │
//! │  │   │               │    │   report)     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│               │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │  settlement   │  paid order → batch   │   │
//! │  │                        │  executor     │  decrements (one tx)  │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (kho.db)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - `settlement` - Applies settlement plans inside order transactions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kho_db::{CrudRepository, Database, DbConfig};
//! use kho_core::settlement::ShortfallPolicy;
//!
//! let db = Database::new(DbConfig::new("kho.db")).await?;
//!
//! let batches = db.product_details().list_by_product(&product_id).await?;
//! let checkout = db.orders().create(new_order, ShortfallPolicy::Allow).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::CrudRepository;

// Repository re-exports for convenience
pub use repository::account::{hash_password, verify_password, AccountRepository};
pub use repository::business::BusinessRepository;
pub use repository::category::CategoryRepository;
pub use repository::goods_receipt::GoodReceiptRepository;
pub use repository::order::{CheckoutOutcome, OrderRepository};
pub use repository::order_form::OrderFormRepository;
pub use repository::product::ProductRepository;
pub use repository::product_detail::ProductDetailRepository;
pub use repository::report::ReportRepository;
pub use repository::user::UserRepository;
