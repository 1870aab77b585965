//! Category repository. Names are unique.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use kho_core::inputs::{CategoryPatch, NewCategory};
use kho_core::validation::Validate;
use kho_core::{Category, CollectionName};

use super::{new_id, CrudRepository};
use crate::error::{DbError, DbResult};

const SELECT_CATEGORY: &str = "SELECT id, name, description, created_at, updated_at FROM categories";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }
}

/// Reports the clashing name instead of the raw constraint text.
fn name_taken(err: DbError, name: &str) -> DbError {
    match err {
        DbError::UniqueViolation { .. } => DbError::duplicate("category name", name),
        other => other,
    }
}

#[async_trait]
impl CrudRepository for CategoryRepository {
    type Entity = Category;
    type Create = NewCategory;
    type Update = CategoryPatch;

    const COLLECTION: CollectionName = CollectionName::Category;
    const TABLE: &'static str = "categories";

    fn from_pool(pool: SqlitePool) -> Self {
        CategoryRepository::new(pool)
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("{} ORDER BY name", SELECT_CATEGORY);
        Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find(&self, id: &str) -> DbResult<Option<Category>> {
        let sql = format!("{} WHERE id = ?1", SELECT_CATEGORY);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, input: NewCategory) -> DbResult<Category> {
        input.validate()?;
        let category = input.into_category(new_id(), Utc::now());

        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| name_taken(e.into(), &category.name))?;

        Ok(category)
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> DbResult<Category> {
        patch.validate()?;
        let mut category = self.get(id).await?;
        patch.apply(&mut category, Utc::now());

        sqlx::query("UPDATE categories SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| name_taken(e.into(), &category.name))?;

        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;

    fn named(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_category_names_are_unique() {
        let db = db().await;
        let dairy = db.categories().create(named("Sữa")).await.unwrap();
        db.categories().create(named("Bánh kẹo")).await.unwrap();

        let err = db.categories().create(named("Sữa")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "Sữa"));

        let names: Vec<_> = db
            .categories()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Bánh kẹo", "Sữa"]);

        let renamed = db
            .categories()
            .update(
                &dairy.id,
                CategoryPatch {
                    description: Some("Sữa và chế phẩm".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.description.as_deref(), Some("Sữa và chế phẩm"));
    }
}
