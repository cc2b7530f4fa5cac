//! Category persistence
//!
//! Categories are seeded lazily: the first sync of a category inserts its
//! canonical row with a deterministic id, so concurrent or repeated runs
//! converge on the same row.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::domain::category::{Category, CategorySlug};

#[derive(Clone)]
pub struct CategoryRepository {
    pool: Arc<SqlitePool>,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Fetch the category row for a slug, inserting the canonical seed row
    /// when it does not exist yet.
    pub async fn ensure(&self, slug: CategorySlug) -> Result<Category> {
        let seeded = Category::seeded(slug);
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, icon, sort_order)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&seeded.id)
        .bind(&seeded.name)
        .bind(&seeded.slug)
        .bind(&seeded.icon)
        .bind(seeded.sort_order)
        .execute(&*self.pool)
        .await?;

        self.get_by_slug(slug)
            .await?
            .with_context(|| format!("failed to initialize category '{slug}'"))
    }

    pub async fn get_by_slug(&self, slug: CategorySlug) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, slug, icon, sort_order FROM categories WHERE slug = ?",
        )
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            icon: row.get("icon"),
            sort_order: row.get("sort_order"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    #[tokio::test]
    async fn ensure_inserts_once() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        let repo = CategoryRepository::new(db.pool().clone());

        let first = repo.ensure(CategorySlug::Cpu).await?;
        let second = repo.ensure(CategorySlug::Cpu).await?;
        assert_eq!(first.id, "cat-cpu");
        assert_eq!(first.id, second.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }
}
