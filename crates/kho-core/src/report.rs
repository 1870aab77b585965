//! # Revenue Reports
//!
//! One tagged query per report `type`, parsed from the query string and
//! validated before any SQL is built.
//!
//! ## Report Types
//! ```text
//! ┌──────────────┬────────────────────┬─────────────────────┬────────────┐
//! │ type         │ parameters         │ grouped by          │ densified  │
//! ├──────────────┼────────────────────┼─────────────────────┼────────────┤
//! │ hour         │ date               │ hour 0..=23         │ 24 rows    │
//! │ day          │ month, year        │ day of month        │ whole month│
//! │ month        │ year               │ month 1..=12        │ 12 rows    │
//! │ year         │                    │ calendar year       │ no         │
//! │ product      │ productId/Name     │ product             │ no         │
//! │ category     │ categoryId         │ category            │ no         │
//! │ top_products │ limit (5, max 100) │ product, revenue ↓  │ no         │
//! └──────────────┴────────────────────┴─────────────────────┴────────────┘
//! ```
//!
//! Only revenue-bearing orders count: `payment_status = true` or a
//! `completed` status in either spelling.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{validate_reference, ValidationResult};
use crate::{DEFAULT_TOP_PRODUCTS, MAX_TOP_PRODUCTS};

/// Raw query-string parameters of `GET /api/report/revenue`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportParams {
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub date: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    #[serde(rename = "productName")]
    pub product_name: Option<String>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportQuery {
    Hour { date: NaiveDate },
    Day { year: i32, month: u32 },
    Month { year: i32 },
    Year,
    Product {
        product_id: Option<String>,
        product_name: Option<String>,
    },
    Category { category_id: Option<String> },
    TopProducts { limit: u32 },
}

pub const REPORT_TYPES: [&str; 7] = [
    "hour",
    "day",
    "month",
    "year",
    "product",
    "category",
    "top_products",
];

fn check_year(year: i32) -> ValidationResult<i32> {
    if !(1970..=9999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1970,
            max: 9999,
        });
    }
    Ok(year)
}

fn check_month(month: u32) -> ValidationResult<u32> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }
    Ok(month)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ReportQuery {
    /// Parses and validates the query string. `today` fills in the
    /// calendar defaults.
    pub fn from_params(params: ReportParams, today: NaiveDate) -> ValidationResult<Self> {
        let report_type = non_blank(params.report_type).ok_or_else(|| ValidationError::required("type"))?;
        let year = params.year.map(check_year).transpose()?.unwrap_or(today.year());

        let query = match report_type.as_str() {
            "hour" => {
                let date = match non_blank(params.date) {
                    Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                        .map_err(|_| ValidationError::invalid_format("date", "expected YYYY-MM-DD"))?,
                    None => today,
                };
                ReportQuery::Hour { date }
            }
            "day" => ReportQuery::Day {
                year,
                month: params.month.map(check_month).transpose()?.unwrap_or(today.month()),
            },
            "month" => ReportQuery::Month { year },
            "year" => ReportQuery::Year,
            "product" => {
                let product_id = non_blank(params.product_id);
                if let Some(id) = &product_id {
                    validate_reference("productId", id)?;
                }
                ReportQuery::Product {
                    product_id,
                    product_name: non_blank(params.product_name),
                }
            }
            "category" => {
                let category_id = non_blank(params.category_id);
                if let Some(id) = &category_id {
                    validate_reference("categoryId", id)?;
                }
                ReportQuery::Category { category_id }
            }
            "top_products" => {
                let limit = params.limit.unwrap_or(DEFAULT_TOP_PRODUCTS);
                if limit == 0 || limit > MAX_TOP_PRODUCTS {
                    return Err(ValidationError::OutOfRange {
                        field: "limit".to_string(),
                        min: 1,
                        max: MAX_TOP_PRODUCTS as i64,
                    });
                }
                ReportQuery::TopProducts { limit }
            }
            _ => {
                return Err(ValidationError::NotAllowed {
                    field: "type".to_string(),
                    allowed: REPORT_TYPES.iter().map(|t| t.to_string()).collect(),
                })
            }
        };

        Ok(query)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReportQuery::Hour { .. } => "hour",
            ReportQuery::Day { .. } => "day",
            ReportQuery::Month { .. } => "month",
            ReportQuery::Year => "year",
            ReportQuery::Product { .. } => "product",
            ReportQuery::Category { .. } => "category",
            ReportQuery::TopProducts { .. } => "top_products",
        }
    }

    pub fn is_calendar(&self) -> bool {
        matches!(
            self,
            ReportQuery::Hour { .. } | ReportQuery::Day { .. } | ReportQuery::Month { .. } | ReportQuery::Year
        )
    }

    /// `strftime` pattern producing the bucket number of a local timestamp.
    pub fn bucket_format(&self) -> Option<&'static str> {
        match self {
            ReportQuery::Hour { .. } => Some("%H"),
            ReportQuery::Day { .. } => Some("%d"),
            ReportQuery::Month { .. } => Some("%m"),
            ReportQuery::Year => Some("%Y"),
            _ => None,
        }
    }

    /// Local-date window `[start, end)` the report covers, if bounded.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            ReportQuery::Hour { date } => Some((date, date.succ_opt()?)),
            ReportQuery::Day { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = start.checked_add_months(chrono::Months::new(1))?;
                Some((start, end))
            }
            ReportQuery::Month { year } => Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            )),
            _ => None,
        }
    }

    /// Every bucket id a densified report must contain.
    pub fn expected_buckets(&self) -> Option<std::ops::RangeInclusive<u32>> {
        match *self {
            ReportQuery::Hour { .. } => Some(0..=23),
            ReportQuery::Day { year, month } => Some(1..=days_in_month(year, month)),
            ReportQuery::Month { .. } => Some(1..=12),
            _ => None,
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One calendar bucket (`_id` is the hour, day, month or year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct RevenueBucket {
    #[serde(rename = "_id")]
    pub id: u32,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: i64,
    #[serde(rename = "totalOrders")]
    pub total_orders: i64,
}

impl RevenueBucket {
    pub fn empty(id: u32) -> Self {
        RevenueBucket {
            id,
            total_revenue: 0,
            total_orders: 0,
        }
    }
}

/// Revenue attributed to one product or category through sold batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ProductRevenue {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: i64,
    #[serde(rename = "totalOrders")]
    pub total_orders: i64,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RevenueReport {
    Calendar(Vec<RevenueBucket>),
    Breakdown(Vec<ProductRevenue>),
}

impl RevenueReport {
    pub fn len(&self) -> usize {
        match self {
            RevenueReport::Calendar(rows) => rows.len(),
            RevenueReport::Breakdown(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Densification
// =============================================================================

pub fn days_in_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(chrono::Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(0)
}

/// Fills every missing bucket of the period with zeros, in order.
///
/// Reports without a fixed period (`year`) are only merged and sorted.
pub fn densify(query: &ReportQuery, rows: Vec<RevenueBucket>) -> Vec<RevenueBucket> {
    let mut merged: BTreeMap<u32, RevenueBucket> = BTreeMap::new();
    for row in rows {
        let bucket = merged.entry(row.id).or_insert_with(|| RevenueBucket::empty(row.id));
        bucket.total_revenue += row.total_revenue;
        bucket.total_orders += row.total_orders;
    }

    match query.expected_buckets() {
        Some(range) => range
            .map(|id| merged.get(&id).copied().unwrap_or_else(|| RevenueBucket::empty(id)))
            .collect(),
        None => merged.into_values().collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    }

    fn params(report_type: &str) -> ReportParams {
        ReportParams {
            report_type: Some(report_type.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_calendar_defaults() {
        assert_eq!(
            ReportQuery::from_params(params("hour"), today()).unwrap(),
            ReportQuery::Hour { date: today() }
        );
        assert_eq!(
            ReportQuery::from_params(params("day"), today()).unwrap(),
            ReportQuery::Day { year: 2024, month: 2 }
        );
        assert_eq!(
            ReportQuery::from_params(params("month"), today()).unwrap(),
            ReportQuery::Month { year: 2024 }
        );
        assert_eq!(
            ReportQuery::from_params(params("top_products"), today()).unwrap(),
            ReportQuery::TopProducts { limit: 5 }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ReportQuery::from_params(ReportParams::default(), today()).is_err());
        assert!(ReportQuery::from_params(params("week"), today()).is_err());

        let mut p = params("day");
        p.month = Some(13);
        assert!(ReportQuery::from_params(p, today()).is_err());

        let mut p = params("hour");
        p.date = Some("10/02/2024".to_string());
        assert!(ReportQuery::from_params(p, today()).is_err());

        let mut p = params("top_products");
        p.limit = Some(101);
        assert!(ReportQuery::from_params(p, today()).is_err());

        let mut p = params("product");
        p.product_id = Some("64f1c2e9a7b3d1e2f3a4b5c6".to_string());
        assert!(ReportQuery::from_params(p, today()).is_err());
    }

    #[test]
    fn test_day_report_has_every_day_of_month() {
        for (year, month, days) in [(2024, 2, 29), (2023, 2, 28), (2024, 4, 30), (2024, 12, 31)] {
            let query = ReportQuery::Day { year, month };
            let rows = densify(
                &query,
                vec![RevenueBucket {
                    id: 3,
                    total_revenue: 50_000,
                    total_orders: 2,
                }],
            );
            assert_eq!(rows.len(), days as usize);
            assert!(rows.iter().all(|r| r.total_revenue >= 0));
            assert_eq!(rows[2].total_revenue, 50_000);
            assert_eq!(rows.first().map(|r| r.id), Some(1));
            assert_eq!(rows.last().map(|r| r.id), Some(days));
        }
    }

    #[test]
    fn test_hour_report_has_24_rows() {
        let query = ReportQuery::Hour { date: today() };
        let rows = densify(&query, vec![]);
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].id, 0);
        assert_eq!(rows[23].id, 23);

        let rows = densify(
            &query,
            vec![
                RevenueBucket { id: 9, total_revenue: 10, total_orders: 1 },
                RevenueBucket { id: 9, total_revenue: 5, total_orders: 1 },
            ],
        );
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[9].total_revenue, 15);
        assert_eq!(rows[9].total_orders, 2);
    }

    #[test]
    fn test_month_and_year_reports() {
        assert_eq!(densify(&ReportQuery::Month { year: 2024 }, vec![]).len(), 12);

        let years = densify(
            &ReportQuery::Year,
            vec![RevenueBucket::empty(2024), RevenueBucket::empty(2022)],
        );
        assert_eq!(years.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2022, 2024]);
    }

    #[test]
    fn test_date_ranges() {
        let (start, end) = ReportQuery::Day { year: 2024, month: 12 }.date_range().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(ReportQuery::Year.date_range().is_none());
    }

    #[test]
    fn test_rows_serialize_with_client_names() {
        let json = serde_json::to_value(RevenueReport::Calendar(vec![RevenueBucket::empty(7)])).unwrap();
        assert_eq!(json[0]["_id"], 7);
        assert_eq!(json[0]["totalRevenue"], 0);
        assert_eq!(json[0]["totalOrders"], 0);
    }
}
