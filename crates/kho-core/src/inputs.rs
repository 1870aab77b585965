//! # Request Payloads
//!
//! Create and patch bodies for the uniform CRUD contract.
//!
//! ```text
//!   POST  /api/{collection}       New*   ──validate──► into_*(id, now) ──► insert
//!   PATCH /api/{collection}/{id}  *Patch ──validate──► apply(&mut entity) ──► update
//! ```
//!
//! Patches are partial: a missing field leaves the stored value untouched.
//! Line-item documents (order forms) replace their `items` wholesale.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::ValidationError;
use crate::types::{
    Business, Category, GoodReceipt, GoodReceiptItem, OrderForm, OrderFormItem, OrderFormStatus,
    OrderItem, OrderStatus, PaymentMethod, Product, ProductDetail, Role, User,
};
use crate::validation::{
    validate_batch_dates, validate_batch_quantities, validate_email, validate_item_count,
    validate_name, validate_password, validate_price, validate_quantity, validate_reference,
    validate_total, validate_username, Validate, ValidationResult,
};

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub supplier_id: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_links: Vec<String>,
    pub input_price: i64,
    pub output_price: i64,
}

impl Validate for NewProduct {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("supplier_id", &self.supplier_id)?;
        if let Some(category_id) = &self.category_id {
            validate_reference("category_id", category_id)?;
        }
        validate_name("name", &self.name)?;
        validate_price("input_price", self.input_price)?;
        validate_price("output_price", self.output_price)
    }
}

impl NewProduct {
    pub fn into_product(self, id: String, now: DateTime<Utc>) -> Product {
        Product {
            id,
            supplier_id: self.supplier_id,
            category_id: self.category_id,
            name: self.name.trim().to_string(),
            description: trimmed(self.description),
            image_links: self.image_links,
            input_price: self.input_price,
            output_price: self.output_price,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    /// Accepted only when it repeats the current supplier.
    pub supplier_id: Option<String>,
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_links: Option<Vec<String>>,
    pub input_price: Option<i64>,
    pub output_price: Option<i64>,
}

impl Validate for ProductPatch {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(category_id) = &self.category_id {
            validate_reference("category_id", category_id)?;
        }
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(price) = self.input_price {
            validate_price("input_price", price)?;
        }
        if let Some(price) = self.output_price {
            validate_price("output_price", price)?;
        }
        Ok(())
    }
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product, now: DateTime<Utc>) -> ValidationResult<()> {
        if let Some(supplier_id) = self.supplier_id {
            if supplier_id != product.supplier_id {
                return Err(ValidationError::NotAllowed {
                    field: "supplier_id".to_string(),
                    allowed: vec![product.supplier_id.clone()],
                });
            }
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if self.description.is_some() {
            product.description = trimmed(self.description);
        }
        if let Some(links) = self.image_links {
            product.image_links = links;
        }
        if let Some(price) = self.input_price {
            product.input_price = price;
        }
        if let Some(price) = self.output_price {
            product.output_price = price;
        }
        product.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Product Detail (batch)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewProductDetail {
    pub product_id: String,
    pub input_quantity: i64,
    #[serde(default)]
    pub output_quantity: i64,
    #[serde(default)]
    pub date_of_manufacture: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl Validate for NewProductDetail {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("product_id", &self.product_id)?;
        validate_batch_quantities(self.input_quantity, self.output_quantity)?;
        validate_batch_dates(self.date_of_manufacture, self.expiry_date)
    }
}

impl NewProductDetail {
    pub fn into_detail(self, id: String, now: DateTime<Utc>) -> ProductDetail {
        ProductDetail {
            id,
            product_id: self.product_id,
            input_quantity: self.input_quantity,
            output_quantity: self.output_quantity,
            date_of_manufacture: self.date_of_manufacture,
            expiry_date: self.expiry_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Batch patch. `{ "output_quantity": n }` is the sale decrement primitive.
///
/// A client-supplied `inventory` is ignored: it is always derived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDetailPatch {
    pub input_quantity: Option<i64>,
    pub output_quantity: Option<i64>,
    pub date_of_manufacture: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl Validate for ProductDetailPatch {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(input) = self.input_quantity {
            if input < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "input_quantity".to_string(),
                    min: 0,
                    max: i64::MAX,
                });
            }
        }
        if let Some(output) = self.output_quantity {
            if output < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "output_quantity".to_string(),
                    min: 0,
                    max: i64::MAX,
                });
            }
        }
        Ok(())
    }
}

impl ProductDetailPatch {
    /// Applies the patch and re-checks the batch invariant on the result.
    pub fn apply(self, detail: &mut ProductDetail, now: DateTime<Utc>) -> ValidationResult<()> {
        let input = self.input_quantity.unwrap_or(detail.input_quantity);
        let output = self.output_quantity.unwrap_or(detail.output_quantity);
        validate_batch_quantities(input, output)?;

        let made = self.date_of_manufacture.or(detail.date_of_manufacture);
        let expiry = self.expiry_date.or(detail.expiry_date);
        validate_batch_dates(made, expiry)?;

        detail.input_quantity = input;
        detail.output_quantity = output;
        detail.date_of_manufacture = made;
        detail.expiry_date = expiry;
        detail.updated_at = now;
        Ok(())
    }

    /// True when the patch only moves `output_quantity`.
    pub fn is_output_only(&self) -> bool {
        self.output_quantity.is_some()
            && self.input_quantity.is_none()
            && self.date_of_manufacture.is_none()
            && self.expiry_date.is_none()
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Checkout body for `POST /api/order`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub employee_id: String,
    pub items: Vec<OrderItem>,
    /// Defaults to Σ quantity × price when omitted.
    #[serde(default)]
    pub total_amount: Option<i64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: bool,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for NewOrder {
    fn validate(&self) -> ValidationResult<()> {
        if self.employee_id.trim().is_empty() {
            return Err(ValidationError::required("employee_id"));
        }
        validate_item_count(self.items.len())?;
        for item in &self.items {
            validate_reference("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;
            validate_price("price", item.price)?;
            if let Some(batch) = item.bound_batch() {
                validate_reference("batchDetails.detailId", batch)?;
            }
        }
        if let Some(total) = self.total_amount {
            validate_total("total_amount", total)?;
        }
        Ok(())
    }
}

/// Body for `PATCH /api/order/draft`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteDraft {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub payment_method: PaymentMethod,
}

impl Validate for CompleteDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("orderId", &self.order_id)
    }
}

// =============================================================================
// Business (supplier)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub logo_links: Vec<String>,
}

impl Validate for NewBusiness {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_email(self.email.as_deref())?;
        if self.address.trim().is_empty() {
            return Err(ValidationError::required("address"));
        }
        Ok(())
    }
}

impl NewBusiness {
    pub fn into_business(self, id: String, now: DateTime<Utc>) -> Business {
        Business {
            id,
            name: self.name.trim().to_string(),
            email: trimmed(self.email),
            address: self.address.trim().to_string(),
            logo: trimmed(self.logo),
            logo_links: self.logo_links,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub logo: Option<String>,
    pub logo_links: Option<Vec<String>>,
}

impl Validate for BusinessPatch {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        validate_email(self.email.as_deref())
    }
}

impl BusinessPatch {
    pub fn apply(self, business: &mut Business, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            business.name = name.trim().to_string();
        }
        if self.email.is_some() {
            business.email = trimmed(self.email);
        }
        if let Some(address) = self.address {
            business.address = address.trim().to_string();
        }
        if self.logo.is_some() {
            business.logo = trimmed(self.logo);
        }
        if let Some(links) = self.logo_links {
            business.logo_links = links;
        }
        business.updated_at = now;
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for NewCategory {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

impl NewCategory {
    pub fn into_category(self, id: String, now: DateTime<Utc>) -> Category {
        Category {
            id,
            name: self.name.trim().to_string(),
            description: trimmed(self.description),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for CategoryPatch {
    fn validate(&self) -> ValidationResult<()> {
        match &self.name {
            Some(name) => validate_name("name", name),
            None => Ok(()),
        }
    }
}

impl CategoryPatch {
    pub fn apply(self, category: &mut Category, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            category.name = name.trim().to_string();
        }
        if self.description.is_some() {
            category.description = trimmed(self.description);
        }
        category.updated_at = now;
    }
}

// =============================================================================
// Purchasing documents
// =============================================================================

fn validate_purchase_lines<'a>(
    lines: impl ExactSizeIterator<Item = (&'a str, i64, i64)>,
) -> ValidationResult<()> {
    validate_item_count(lines.len())?;
    for (product_id, quantity, price) in lines {
        validate_reference("product_id", product_id)?;
        validate_quantity(quantity)?;
        validate_price("input_price", price)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderForm {
    pub supplier_id: String,
    pub items: Vec<OrderFormItem>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for NewOrderForm {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("supplier_id", &self.supplier_id)?;
        validate_purchase_lines(
            self.items
                .iter()
                .map(|i| (i.product_id.as_str(), i.quantity, i.input_price)),
        )
    }
}

impl NewOrderForm {
    pub fn into_order_form(self, id: String, code: String, now: DateTime<Utc>) -> OrderForm {
        OrderForm {
            id,
            code,
            supplier_id: self.supplier_id,
            items: self.items,
            status: OrderFormStatus::Pending,
            note: trimmed(self.note),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFormPatch {
    /// Replaces every line; there is no per-line diffing.
    pub items: Option<Vec<OrderFormItem>>,
    pub status: Option<OrderFormStatus>,
    pub note: Option<String>,
}

impl Validate for OrderFormPatch {
    fn validate(&self) -> ValidationResult<()> {
        match &self.items {
            Some(items) => validate_purchase_lines(
                items
                    .iter()
                    .map(|i| (i.product_id.as_str(), i.quantity, i.input_price)),
            ),
            None => Ok(()),
        }
    }
}

impl OrderFormPatch {
    pub fn apply(self, form: &mut OrderForm, now: DateTime<Utc>) {
        if let Some(items) = self.items {
            form.items = items;
        }
        if let Some(status) = self.status {
            form.status = status;
        }
        if self.note.is_some() {
            form.note = trimmed(self.note);
        }
        form.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoodReceipt {
    pub supplier_id: String,
    #[serde(default)]
    pub order_form_id: Option<String>,
    pub receiver_id: String,
    pub items: Vec<GoodReceiptItem>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for NewGoodReceipt {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("supplier_id", &self.supplier_id)?;
        if let Some(form_id) = &self.order_form_id {
            validate_reference("order_form_id", form_id)?;
        }
        if self.receiver_id.trim().is_empty() {
            return Err(ValidationError::required("receiver_id"));
        }
        validate_purchase_lines(
            self.items
                .iter()
                .map(|i| (i.product_id.as_str(), i.quantity, i.input_price)),
        )?;
        for item in &self.items {
            validate_batch_dates(item.date_of_manufacture, item.expiry_date)?;
        }
        Ok(())
    }
}

impl NewGoodReceipt {
    /// Builds the receipt; `detail_ids[i]` is the batch created for line `i`.
    pub fn into_good_receipt(
        self,
        id: String,
        code: String,
        detail_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> GoodReceipt {
        let items = self
            .items
            .into_iter()
            .zip(detail_ids)
            .map(|(item, detail_id)| GoodReceiptItem {
                detail_id: Some(detail_id),
                ..item
            })
            .collect();

        GoodReceipt {
            id,
            code,
            supplier_id: self.supplier_id,
            order_form_id: self.order_form_id,
            receiver_id: self.receiver_id,
            items,
            note: trimmed(self.note),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Posted receipts keep their lines: the batches already exist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoodReceiptPatch {
    pub receiver_id: Option<String>,
    pub note: Option<String>,
}

impl Validate for GoodReceiptPatch {
    fn validate(&self) -> ValidationResult<()> {
        match &self.receiver_id {
            Some(receiver) if receiver.trim().is_empty() => {
                Err(ValidationError::required("receiver_id"))
            }
            _ => Ok(()),
        }
    }
}

impl GoodReceiptPatch {
    pub fn apply(self, receipt: &mut GoodReceipt, now: DateTime<Utc>) {
        if let Some(receiver) = self.receiver_id {
            receipt.receiver_id = receiver;
        }
        if self.note.is_some() {
            receipt.note = trimmed(self.note);
        }
        receipt.updated_at = now;
    }
}

// =============================================================================
// Accounts & users
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl Validate for NewAccount {
    fn validate(&self) -> ValidationResult<()> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl Validate for AccountPatch {
    fn validate(&self) -> ValidationResult<()> {
        match &self.password {
            Some(password) => validate_password(password),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> ValidationResult<()> {
        validate_reference("account_id", &self.account_id)?;
        validate_name("name", &self.name)?;
        validate_email(self.email.as_deref())
    }
}

impl NewUser {
    pub fn into_user(self, id: String, now: DateTime<Utc>) -> User {
        User {
            id,
            account_id: self.account_id,
            name: self.name.trim().to_string(),
            email: trimmed(self.email),
            phone: trimmed(self.phone),
            address: trimmed(self.address),
            avatar: self.avatar,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
}

impl Validate for UserPatch {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        validate_email(self.email.as_deref())
    }
}

impl UserPatch {
    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if self.email.is_some() {
            user.email = trimmed(self.email);
        }
        if self.phone.is_some() {
            user.phone = trimmed(self.phone);
        }
        if self.address.is_some() {
            user.address = trimmed(self.address);
        }
        if self.avatar.is_some() {
            user.avatar = self.avatar;
        }
        user.updated_at = now;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPLIER: &str = "550e8400-e29b-41d4-a716-446655440000";
    const PRODUCT: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn product() -> Product {
        NewProduct {
            supplier_id: SUPPLIER.to_string(),
            category_id: None,
            name: "  Sữa tươi  ".to_string(),
            description: Some("   ".to_string()),
            image_links: vec![],
            input_price: 20_000,
            output_price: 25_000,
        }
        .into_product("p-1".to_string(), Utc::now())
    }

    #[test]
    fn test_new_product_trims_fields() {
        let p = product();
        assert_eq!(p.name, "Sữa tươi");
        assert_eq!(p.description, None);
        assert_eq!(p.unit_margin().dong(), 5_000);
    }

    #[test]
    fn test_product_patch_keeps_supplier_fixed() {
        let mut p = product();
        let patch = ProductPatch {
            supplier_id: Some(PRODUCT.to_string()),
            ..Default::default()
        };
        assert!(patch.apply(&mut p, Utc::now()).is_err());
        assert_eq!(p.supplier_id, SUPPLIER);

        let patch = ProductPatch {
            supplier_id: Some(SUPPLIER.to_string()),
            output_price: Some(27_000),
            ..Default::default()
        };
        patch.apply(&mut p, Utc::now()).unwrap();
        assert_eq!(p.output_price, 27_000);
    }

    #[test]
    fn test_batch_patch_enforces_invariant() {
        let mut detail = NewProductDetail {
            product_id: PRODUCT.to_string(),
            input_quantity: 10,
            output_quantity: 0,
            date_of_manufacture: None,
            expiry_date: None,
        }
        .into_detail("b-1".to_string(), Utc::now());

        let overdraw = ProductDetailPatch {
            output_quantity: Some(11),
            ..Default::default()
        };
        assert!(overdraw.is_output_only());
        assert!(overdraw.apply(&mut detail, Utc::now()).is_err());
        assert_eq!(detail.output_quantity, 0);

        let sale = ProductDetailPatch {
            output_quantity: Some(4),
            ..Default::default()
        };
        sale.apply(&mut detail, Utc::now()).unwrap();
        assert_eq!(detail.inventory(), 6);

        let shrink = ProductDetailPatch {
            input_quantity: Some(3),
            ..Default::default()
        };
        assert!(shrink.apply(&mut detail, Utc::now()).is_err());
    }

    #[test]
    fn test_new_order_validation() {
        let order: NewOrder = serde_json::from_value(serde_json::json!({
            "employee_id": "nv-01",
            "items": [{ "product_id": PRODUCT, "quantity": 2, "price": 25000 }],
            "payment_method": "cash",
            "payment_status": true
        }))
        .unwrap();
        assert!(order.validate().is_ok());

        let mut empty = order.clone();
        empty.items.clear();
        assert!(empty.validate().is_err());

        let mut zero = order.clone();
        zero.items[0].quantity = 0;
        assert!(zero.validate().is_err());

        let mut bad_id = order;
        bad_id.items[0].product_id = "64f1c2e9a7b3d1e2f3a4b5c6".to_string();
        assert!(bad_id.validate().is_err());
    }

    #[test]
    fn test_complete_draft_uses_camel_case_id() {
        let body: CompleteDraft = serde_json::from_value(serde_json::json!({
            "orderId": PRODUCT,
            "payment_method": "transfer"
        }))
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::Transfer);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_good_receipt_links_created_batches() {
        let input = NewGoodReceipt {
            supplier_id: SUPPLIER.to_string(),
            order_form_id: None,
            receiver_id: "nv-02".to_string(),
            items: vec![GoodReceiptItem {
                product_id: PRODUCT.to_string(),
                quantity: 24,
                input_price: 18_000,
                date_of_manufacture: NaiveDate::from_ymd_opt(2024, 3, 1),
                expiry_date: NaiveDate::from_ymd_opt(2024, 9, 1),
                detail_id: None,
            }],
            note: None,
        };
        assert!(input.validate().is_ok());

        let receipt =
            input.into_good_receipt("r-1".into(), "PN-1".into(), vec!["b-7".into()], Utc::now());
        assert_eq!(receipt.items[0].detail_id.as_deref(), Some("b-7"));
    }

    #[test]
    fn test_order_form_patch_replaces_items() {
        let mut form = NewOrderForm {
            supplier_id: SUPPLIER.to_string(),
            items: vec![OrderFormItem {
                product_id: PRODUCT.to_string(),
                quantity: 10,
                input_price: 0,
            }],
            note: None,
        }
        .into_order_form("f-1".into(), "PO-1".into(), Utc::now());

        OrderFormPatch {
            items: Some(vec![]),
            ..Default::default()
        }
        .apply(&mut form, Utc::now());
        assert!(form.items.is_empty());
        assert!(OrderFormPatch {
            items: Some(vec![]),
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
