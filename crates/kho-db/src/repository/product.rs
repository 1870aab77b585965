//! # Product Repository
//!
//! Catalog CRUD. A product names its supplier at creation and keeps it;
//! deleting a product leaves its batches and order history untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use kho_core::inputs::{NewProduct, ProductPatch};
use kho_core::validation::Validate;
use kho_core::{CollectionName, Product};

use super::{ensure_exists, new_id, CrudRepository};
use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    supplier_id: String,
    category_id: Option<String>,
    name: String,
    description: Option<String>,
    image_links: Json<Vec<String>>,
    input_price: i64,
    output_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            supplier_id: row.supplier_id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            image_links: row.image_links.0,
            input_price: row.input_price,
            output_price: row.output_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, supplier_id, category_id, name, description, image_links,
           input_price, output_price, created_at, updated_at
    FROM products
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Products of one supplier, by name.
    pub async fn list_by_supplier(&self, supplier_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!("{} WHERE supplier_id = ?1 ORDER BY name", SELECT_PRODUCT);
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn check_references(&self, supplier_id: Option<&str>, category_id: Option<&str>) -> DbResult<()> {
        if let Some(supplier_id) = supplier_id {
            ensure_exists(&self.pool, "businesses", "supplier_id", supplier_id).await?;
        }
        if let Some(category_id) = category_id {
            ensure_exists(&self.pool, "categories", "category_id", category_id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CrudRepository for ProductRepository {
    type Entity = Product;
    type Create = NewProduct;
    type Update = ProductPatch;

    const COLLECTION: CollectionName = CollectionName::Product;
    const TABLE: &'static str = "products";

    fn from_pool(pool: SqlitePool) -> Self {
        ProductRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("{} ORDER BY created_at, rowid", SELECT_PRODUCT);
        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        debug!(count = rows.len(), "Listed products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{} WHERE id = ?1", SELECT_PRODUCT);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    async fn create(&self, input: NewProduct) -> DbResult<Product> {
        input.validate()?;
        self.check_references(Some(&input.supplier_id), input.category_id.as_deref())
            .await?;

        let product = input.into_product(new_id(), Utc::now());
        debug!(id = %product.id, name = %product.name, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, supplier_id, category_id, name, description, image_links,
                input_price, output_price, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.supplier_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(Json(&product.image_links))
        .bind(product.input_price)
        .bind(product.output_price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn update(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        patch.validate()?;
        let mut product = self.get(id).await?;
        self.check_references(None, patch.category_id.as_deref()).await?;

        patch.apply(&mut product, Utc::now())?;
        debug!(id = %product.id, "Updating product");

        sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?2, name = ?3, description = ?4, image_links = ?5,
                input_price = ?6, output_price = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(Json(&product.image_links))
        .bind(product.input_price)
        .bind(product.output_price)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{db, product, supplier};
    use kho_core::CoreError;

    #[tokio::test]
    async fn test_create_get_list() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let fetched = db.products().get(&milk.id).await.unwrap();
        assert_eq!(fetched.name, "Sữa tươi 1L");
        assert_eq!(fetched.output_price, 32_000);
        assert_eq!(db.products().list().await.unwrap().len(), 1);
        assert_eq!(db.products().list_by_supplier(&vnm.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_existing_supplier() {
        let db = db().await;
        let err = db
            .products()
            .create(NewProduct {
                supplier_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
                category_id: None,
                name: "Orphan".to_string(),
                description: None,
                image_links: vec![],
                input_price: 1,
                output_price: 2,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_keeps_supplier() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let milk = product(&db, &vnm.id, "Sữa tươi 1L", 32_000).await;

        let updated = db
            .products()
            .update(
                &milk.id,
                ProductPatch {
                    output_price: Some(33_000),
                    image_links: Some(vec!["https://cdn/milk.png".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.output_price, 33_000);
        assert_eq!(updated.name, "Sữa tươi 1L");

        let stored = db.products().get(&milk.id).await.unwrap();
        assert_eq!(stored.image_links, vec!["https://cdn/milk.png".to_string()]);

        let other = supplier(&db).await;
        let err = db
            .products()
            .update(
                &milk.id,
                ProductPatch {
                    supplier_id: Some(other.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_and_missing_ids() {
        let db = db().await;
        let err = db.products().get("64f1c2e9a7b3d1e2f3a4b5c6").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let err = db
            .products()
            .get("550e8400-e29b-41d4-a716-446655440000")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let db = db().await;
        let vnm = supplier(&db).await;
        let a = product(&db, &vnm.id, "A", 1_000).await;
        product(&db, &vnm.id, "B", 2_000).await;
        product(&db, &vnm.id, "C", 3_000).await;

        db.products().delete(&a.id).await.unwrap();
        assert!(matches!(
            db.products().delete(&a.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(db.products().delete_all().await.unwrap(), 2);
        assert!(db.products().list().await.unwrap().is_empty());
    }
}
