//! # Domain Types
//!
//! Persisted entities of the Kho back-office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Business ◄──── Product ◄──── ProductDetail (batch)                    │
//! │  (supplier)      │  │          input_quantity / output_quantity        │
//! │                  │  └──► Category                                      │
//! │                  │                                                      │
//! │  OrderForm ──────┤  (purchase order: what we want from a supplier)     │
//! │  GoodReceipt ────┘  (what arrived; creates batches)                    │
//! │                                                                         │
//! │  Order ──► OrderItem ──► optional bound batch (batchDetails.detailId)  │
//! │                                                                         │
//! │  Account ◄──── User (profile)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity serializes its primary key as `_id` and is addressed by a
//! UUID v4 string.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Collections
// =============================================================================

/// The uniform CRUD collections exposed under `/api/{collection}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionName {
    Product,
    ProductDetail,
    Order,
    Business,
    Category,
    OrderForm,
    GoodReceipt,
    User,
    Account,
}

impl CollectionName {
    /// URL segment of the collection (`/api/{path}`).
    pub const fn path(&self) -> &'static str {
        match self {
            CollectionName::Product => "product",
            CollectionName::ProductDetail => "product-detail",
            CollectionName::Order => "order",
            CollectionName::Business => "business",
            CollectionName::Category => "category",
            CollectionName::OrderForm => "order-form",
            CollectionName::GoodReceipt => "good-receipt",
            CollectionName::User => "user",
            CollectionName::Account => "account",
        }
    }

    /// Human-readable entity name used in error messages.
    pub const fn entity(&self) -> &'static str {
        match self {
            CollectionName::Product => "Product",
            CollectionName::ProductDetail => "Product detail",
            CollectionName::Order => "Order",
            CollectionName::Business => "Business",
            CollectionName::Category => "Category",
            CollectionName::OrderForm => "Order form",
            CollectionName::GoodReceipt => "Good receipt",
            CollectionName::User => "User",
            CollectionName::Account => "Account",
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product in the catalog.
///
/// `supplier_id` is fixed at creation; patches cannot move a product to
/// another supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub supplier_id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub image_links: Vec<String>,
    /// Purchase price in đồng.
    pub input_price: i64,
    /// Selling price in đồng.
    pub output_price: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_dong(self.output_price)
    }

    /// Gross margin per unit (may be negative for clearance items).
    #[inline]
    pub fn unit_margin(&self) -> Money {
        Money::from_dong(self.output_price) - Money::from_dong(self.input_price)
    }
}

/// A product category, used by the category revenue report.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product Detail (batch)
// =============================================================================

/// One received lot of a product.
///
/// ## Quantities
/// ```text
///   input_quantity   cumulative units received   (never decreases)
///   output_quantity  cumulative units sold       (never decreases)
///   inventory        input_quantity - output_quantity   (derived)
///
///   invariant: 0 <= output_quantity <= input_quantity
/// ```
///
/// `inventory` is never stored; it is computed on every read and emitted in
/// JSON so clients keep seeing the field.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub product_id: String,
    pub input_quantity: i64,
    pub output_quantity: i64,
    pub date_of_manufacture: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductDetail {
    /// Units still available in this batch.
    #[inline]
    pub fn inventory(&self) -> i64 {
        self.input_quantity - self.output_quantity
    }

    /// Whether the stored quantities satisfy the batch invariant.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.output_quantity >= 0 && self.output_quantity <= self.input_quantity
    }

    /// Whether the batch is past its expiry date on `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }
}

impl Serialize for ProductDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProductDetail", 9)?;
        s.serialize_field("_id", &self.id)?;
        s.serialize_field("product_id", &self.product_id)?;
        s.serialize_field("input_quantity", &self.input_quantity)?;
        s.serialize_field("output_quantity", &self.output_quantity)?;
        s.serialize_field("inventory", &self.inventory())?;
        s.serialize_field("date_of_manufacture", &self.date_of_manufacture)?;
        s.serialize_field("expiry_date", &self.expiry_date)?;
        s.serialize_field("created_at", &self.created_at)?;
        s.serialize_field("updated_at", &self.updated_at)?;
        s.end()
    }
}

// =============================================================================
// Suppliers
// =============================================================================

/// A supplier ("business").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Business {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub address: String,
    pub logo: Option<String>,
    pub logo_links: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sales Orders
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Bank transfer / QR payment.
    Transfer,
    Card,
}

impl PaymentMethod {
    pub const ALL: [&'static str; 3] = ["cash", "transfer", "card"];
}

/// Stored order status.
///
/// Older clients wrote `COMPLETED` in upper case; both spellings are
/// accepted on input.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "COMPLETED")]
    Completed,
}

/// Explicit binding of an order line to a batch (e.g. after a barcode scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchBinding {
    #[serde(rename = "detailId")]
    pub detail_id: String,
}

/// A sales order line. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in đồng at the time of sale.
    pub price: i64,
    #[serde(rename = "batchDetails", default, skip_serializing_if = "Option::is_none")]
    pub batch_details: Option<BatchBinding>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_dong(self.price).multiply_quantity(self.quantity)
    }

    /// Batch the operator pinned this line to, if any.
    #[inline]
    pub fn bound_batch(&self) -> Option<&str> {
        self.batch_details.as_ref().map(|b| b.detail_id.as_str())
    }
}

/// A sales order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub order_code: String,
    pub employee_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: bool,
    pub status: OrderStatus,
    pub note: Option<String>,
    /// Set once the order's quantities have been taken out of batches.
    #[ts(as = "Option<String>")]
    pub inventory_settled_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_dong(self.total_amount)
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.inventory_settled_at.is_some()
    }
}

// =============================================================================
// Purchasing
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderFormStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFormItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub input_price: i64,
}

/// A purchase order sent to a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderForm {
    #[serde(rename = "_id")]
    pub id: String,
    pub code: String,
    pub supplier_id: String,
    pub items: Vec<OrderFormItem>,
    pub status: OrderFormStatus,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GoodReceiptItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub input_price: i64,
    #[ts(as = "Option<String>")]
    pub date_of_manufacture: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Batch created for this line when the receipt was posted.
    #[serde(default)]
    pub detail_id: Option<String>,
}

/// Goods received from a supplier. Each line becomes a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GoodReceipt {
    #[serde(rename = "_id")]
    pub id: String,
    pub code: String,
    pub supplier_id: String,
    pub order_form_id: Option<String>,
    pub receiver_id: String,
    pub items: Vec<GoodReceiptItem>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// People
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Staff,
}

/// Login identity. The password hash never leaves the server.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff profile linked to an [`Account`].
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Data URL or uploaded-image URL.
    pub avatar: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
