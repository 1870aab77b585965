//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /api/{collection}[/:id]     crud      product, product-detail,        │
//! │                                        business, category, order-form, │
//! │                                        good-receipt, user, account     │
//! │  /api/order...               order     checkout, drafts, settlement    │
//! │  /api/report/revenue         report    calendar + breakdown reports    │
//! │  /api/stock, by-product ...  catalog   stock index and lookups         │
//! │  /api/auth/login, /me        auth      JWT                             │
//! │  /health                     health                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::Router;

use kho_db::{
    AccountRepository, BusinessRepository, CategoryRepository, GoodReceiptRepository,
    OrderFormRepository, ProductDetailRepository, ProductRepository, UserRepository,
};

use crate::state::AppState;

pub mod auth;
pub mod catalog;
pub mod crud;
pub mod health;
pub mod order;
pub mod report;

use crud::crud_routes;

/// Every `/api` route that `auth.enforce` guards.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(crud_routes::<ProductRepository>())
        .merge(crud_routes::<ProductDetailRepository>())
        .merge(crud_routes::<BusinessRepository>())
        .merge(crud_routes::<CategoryRepository>())
        .merge(crud_routes::<OrderFormRepository>())
        .merge(crud_routes::<GoodReceiptRepository>())
        .merge(crud_routes::<UserRepository>())
        .merge(crud_routes::<AccountRepository>())
        .merge(catalog::routes())
        .merge(order::routes())
        .merge(report::routes())
}
