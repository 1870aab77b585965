//! # Report Repository
//!
//! Revenue aggregation over revenue-bearing orders.
//!
//! ## Query Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  calendar (hour/day/month/year)                                         │
//! │     orders ─► strftime(bucket, created_at, '+N minutes') ─► densify     │
//! │     revenue = Σ total_amount                                            │
//! │                                                                         │
//! │  breakdown (product/category/top_products)                              │
//! │     order_allocations ─► product_details ─► products ─► categories      │
//! │     revenue = Σ allocated quantity × unit price                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are stored in UTC; buckets are computed in shop-local time
//! using the configured UTC offset.

use sqlx::SqlitePool;
use tracing::debug;

use kho_core::report::{densify, ProductRevenue, ReportQuery, RevenueBucket, RevenueReport};

use crate::error::DbResult;

/// Orders that count as revenue.
const REVENUE_FILTER: &str = "(o.payment_status = 1 OR o.status IN ('completed', 'COMPLETED'))";

#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    bucket: i64,
    total_revenue: i64,
    total_orders: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BreakdownRow {
    id: String,
    name: String,
    total_revenue: i64,
    total_orders: i64,
    total_quantity: i64,
}

impl From<BreakdownRow> for ProductRevenue {
    fn from(row: BreakdownRow) -> Self {
        ProductRevenue {
            id: row.id,
            name: row.name,
            total_revenue: row.total_revenue,
            total_orders: row.total_orders,
            total_quantity: row.total_quantity,
        }
    }
}

/// Repository for revenue reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Runs one report. `utc_offset_minutes` places timestamps in the
    /// shop's local calendar (420 for Asia/Ho_Chi_Minh).
    pub async fn revenue(&self, query: &ReportQuery, utc_offset_minutes: i32) -> DbResult<RevenueReport> {
        debug!(report = query.name(), utc_offset_minutes, "Running revenue report");

        let report = match query {
            ReportQuery::Product {
                product_id,
                product_name,
            } => RevenueReport::Breakdown(
                self.by_product(product_id.as_deref(), product_name.as_deref(), None)
                    .await?,
            ),
            ReportQuery::TopProducts { limit } => {
                RevenueReport::Breakdown(self.by_product(None, None, Some(*limit)).await?)
            }
            ReportQuery::Category { category_id } => {
                RevenueReport::Breakdown(self.by_category(category_id.as_deref()).await?)
            }
            _ => RevenueReport::Calendar(self.calendar(query, utc_offset_minutes).await?),
        };

        Ok(report)
    }

    async fn calendar(&self, query: &ReportQuery, utc_offset_minutes: i32) -> DbResult<Vec<RevenueBucket>> {
        let format = query.bucket_format().unwrap_or("%Y");
        let modifier = format!("{:+} minutes", utc_offset_minutes);
        let (start, end) = match query.date_range() {
            Some((start, end)) => (Some(start.to_string()), Some(end.to_string())),
            None => (None, None),
        };

        let sql = format!(
            r#"
            SELECT CAST(strftime(?1, o.created_at, ?2) AS INTEGER) AS bucket,
                   COALESCE(SUM(o.total_amount), 0) AS total_revenue,
                   COUNT(*) AS total_orders
            FROM orders o
            WHERE {REVENUE_FILTER}
              AND (?3 IS NULL OR date(o.created_at, ?2) >= ?3)
              AND (?4 IS NULL OR date(o.created_at, ?2) < ?4)
            GROUP BY bucket
            ORDER BY bucket
            "#
        );

        let rows: Vec<BucketRow> = sqlx::query_as(&sql)
            .bind(format)
            .bind(&modifier)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        let buckets = rows
            .into_iter()
            .filter(|row| row.bucket >= 0)
            .map(|row| RevenueBucket {
                id: row.bucket as u32,
                total_revenue: row.total_revenue,
                total_orders: row.total_orders,
            })
            .collect();

        Ok(densify(query, buckets))
    }

    async fn by_product(
        &self,
        product_id: Option<&str>,
        product_name: Option<&str>,
        limit: Option<u32>,
    ) -> DbResult<Vec<ProductRevenue>> {
        let sql = format!(
            r#"
            SELECT p.id AS id,
                   p.name AS name,
                   COALESCE(SUM(a.quantity * a.unit_price), 0) AS total_revenue,
                   COUNT(DISTINCT a.order_id) AS total_orders,
                   COALESCE(SUM(a.quantity), 0) AS total_quantity
            FROM order_allocations a
            JOIN orders o ON o.id = a.order_id
            JOIN product_details d ON d.id = a.batch_id
            JOIN products p ON p.id = d.product_id
            WHERE {REVENUE_FILTER}
              AND (?1 IS NULL OR p.id = ?1)
              AND (?2 IS NULL OR p.name LIKE '%' || ?2 || '%')
            GROUP BY p.id, p.name
            ORDER BY total_revenue DESC, p.name
            LIMIT ?3
            "#
        );

        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows: Vec<BreakdownRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .bind(product_name)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductRevenue::from).collect())
    }

    async fn by_category(&self, category_id: Option<&str>) -> DbResult<Vec<ProductRevenue>> {
        let sql = format!(
            r#"
            SELECT c.id AS id,
                   c.name AS name,
                   COALESCE(SUM(a.quantity * a.unit_price), 0) AS total_revenue,
                   COUNT(DISTINCT a.order_id) AS total_orders,
                   COALESCE(SUM(a.quantity), 0) AS total_quantity
            FROM order_allocations a
            JOIN orders o ON o.id = a.order_id
            JOIN product_details d ON d.id = a.batch_id
            JOIN products p ON p.id = d.product_id
            JOIN categories c ON c.id = p.category_id
            WHERE {REVENUE_FILTER}
              AND (?1 IS NULL OR c.id = ?1)
            GROUP BY c.id, c.name
            ORDER BY total_revenue DESC, c.name
            "#
        );

        let rows: Vec<BreakdownRow> = sqlx::query_as(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductRevenue::from).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
