//! Core domain model for SmartStock inventory analytics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};

pub mod errors;
pub mod filler;
pub mod listing;
pub mod policy;
pub mod window;

pub use errors::{ListingFlowError, PipelineError, SchemaGap};
pub use filler::{normalize_catalog, FillerStrategy, FixedFiller, SeededFiller};
pub use listing::{ListingDraft, ListingPrompt, ListingSession, ListingSessions, ListingStep};
pub use policy::{AnalyticsPolicy, ForecastPolicy, HealthPolicy};
pub use window::LookbackWindow;

pub const CRATE_NAME: &str = "smartstock-core";

pub type ProductId = i64;

/// The four logical source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Catalog,
    Sales,
    Trends,
    Festivals,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Catalog,
        TableKind::Sales,
        TableKind::Trends,
        TableKind::Festivals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Catalog => "catalog",
            TableKind::Sales => "sales",
            TableKind::Trends => "trends",
            TableKind::Festivals => "festivals",
        }
    }

    /// Columns a source file must carry to be accepted as an upload.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Catalog => &[
                "product_id",
                "name",
                "category",
                "price",
                "cost",
                "stock_quantity",
                "restock_threshold",
            ],
            TableKind::Sales => &["product_id", "quantity_sold", "sales_date"],
            TableKind::Trends => &["product_id", "month", "trend_score"],
            TableKind::Festivals => &["product_name", "month", "festival", "season", "tags"],
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog columns that are backfilled when absent from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogColumn {
    ProductId,
    Name,
    Category,
    Price,
    Cost,
    Status,
    StockQuantity,
    RestockThreshold,
}

impl CatalogColumn {
    pub const ALL: [CatalogColumn; 8] = [
        CatalogColumn::ProductId,
        CatalogColumn::Name,
        CatalogColumn::Category,
        CatalogColumn::Price,
        CatalogColumn::Cost,
        CatalogColumn::Status,
        CatalogColumn::StockQuantity,
        CatalogColumn::RestockThreshold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogColumn::ProductId => "product_id",
            CatalogColumn::Name => "name",
            CatalogColumn::Category => "category",
            CatalogColumn::Price => "price",
            CatalogColumn::Cost => "cost",
            CatalogColumn::Status => "status",
            CatalogColumn::StockQuantity => "stock_quantity",
            CatalogColumn::RestockThreshold => "restock_threshold",
        }
    }
}

/// Catalog row as read from the source. `None` marks an absent column or blank cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogRow {
    pub product_id: Option<ProductId>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
    pub status: Option<String>,
    pub stock_quantity: Option<i64>,
    pub restock_threshold: Option<i64>,
}

/// Fully populated catalog product, immutable within an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub cost: f64,
    pub stock_quantity: i64,
    pub restock_threshold: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub product_id: ProductId,
    pub quantity_sold: i64,
    /// `None` when the source date did not match the configured format.
    pub sales_date: Option<NaiveDate>,
    /// Month column carried by the source, if any.
    pub sales_month: Option<u32>,
}

impl SalesRecord {
    /// Calendar month of the sale: derived from the date, else the source month column.
    pub fn month(&self) -> Option<u32> {
        self.sales_date.map(|d| d.month()).or(self.sales_month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub product_id: ProductId,
    pub month: u32,
    pub trend_score: f64,
}

/// Festival/season tag row. Joined to the catalog by product name, not id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FestivalTag {
    pub product_name: String,
    pub month: u32,
    pub festival: Option<String>,
    pub season: Option<String>,
    pub tags: Option<String>,
}

impl FestivalTag {
    /// Individual values of the comma-joined `tags` cell.
    pub fn tag_values(&self) -> impl Iterator<Item = &str> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// When a product last sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastSold {
    Never,
    /// Sales exist but none carries a parseable date.
    Unparsed,
    On(NaiveDate),
}

impl LastSold {
    pub const UNPARSED_DAYS: i64 = 999;

    pub fn days_since(&self, reference: NaiveDate) -> i64 {
        match self {
            LastSold::Never => 0,
            LastSold::Unparsed => Self::UNPARSED_DAYS,
            LastSold::On(date) => (reference - *date).num_days(),
        }
    }
}

impl fmt::Display for LastSold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastSold::Never => f.write_str("Never"),
            LastSold::Unparsed => f.write_str("Unparsed"),
            LastSold::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for LastSold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Health flags, always derived from the row's own fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StockFlags {
    pub is_dead_stock: bool,
    pub is_overstocked: bool,
    pub is_understocked: bool,
}

impl StockFlags {
    pub fn derive(
        stock_quantity: i64,
        total_sold: i64,
        restock_threshold: i64,
        stock_sales_ratio: f64,
        policy: &HealthPolicy,
    ) -> Self {
        Self {
            is_dead_stock: stock_quantity > 0 && total_sold == 0,
            is_overstocked: stock_sales_ratio > policy.overstock_ratio
                && stock_quantity > restock_threshold,
            is_understocked: stock_quantity < restock_threshold
                && total_sold > policy.understock_min_sold,
        }
    }
}

/// Sum of quantities, pinned at the `i64` bounds instead of overflowing.
pub fn saturating_total(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, i64::saturating_add)
}

pub fn stock_sales_ratio(stock_quantity: i64, total_sold: i64) -> f64 {
    stock_quantity as f64 / total_sold.max(1) as f64
}

/// One per catalog product: catalog attributes joined with sales, trend and festival data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedProductRecord {
    #[serde(flatten)]
    pub product: Product,
    pub total_sold: i64,
    pub last_sold_date: LastSold,
    pub trend_score: f64,
    pub festivals: BTreeSet<String>,
    pub seasons: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub stock_sales_ratio: f64,
    pub days_since_last_sold: i64,
    pub last_week_sales: i64,
    #[serde(flatten)]
    pub flags: StockFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastEntry {
    pub product_id: ProductId,
    pub target_month: u32,
    pub forecasted_demand: u64,
    /// Matched festival/season names, or empty.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthForecast {
    pub month: u32,
    pub products: BTreeMap<ProductId, ForecastEntry>,
}

/// Months in forecast order (wrapping 12 -> 1), each mapping product id to its entry.
///
/// Serializes as `{month: {product_id: entry}}`, keys in forecast order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemandForecast {
    pub months: Vec<MonthForecast>,
}

impl Serialize for DemandForecast {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.months.iter().map(|m| (m.month, &m.products)))
    }
}

impl DemandForecast {
    pub fn entry(&self, month: u32, product_id: ProductId) -> Option<&ForecastEntry> {
        self.months
            .iter()
            .find(|m| m.month == month)
            .and_then(|m| m.products.get(&product_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DemandClass {
    High,
    Low,
}

impl DemandClass {
    pub fn label(&self) -> &'static str {
        match self {
            DemandClass::High => "High demand",
            DemandClass::Low => "Low demand",
        }
    }
}

impl fmt::Display for DemandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockRecommendation {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub month: u32,
    pub current_stock: i64,
    pub forecasted_demand: u64,
    pub restock_threshold: i64,
    pub recommended_restock: i64,
    pub demand_class: DemandClass,
    pub reason: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRestockPlan {
    pub month: u32,
    pub product_recommendations: Vec<RestockRecommendation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RestockSummary {
    pub total_restock_quantity: i64,
    pub total_restock_value: i64,
    pub products_to_restock: usize,
    /// Rows with a negative recommendation; no current rule produces one.
    pub products_to_reduce: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockPlan {
    #[serde(serialize_with = "plans_by_month")]
    pub monthly_plans: Vec<MonthlyRestockPlan>,
    pub summary: RestockSummary,
    pub forecast_period: String,
}

impl RestockPlan {
    pub fn recommendations(&self) -> impl Iterator<Item = &RestockRecommendation> {
        self.monthly_plans
            .iter()
            .flat_map(|m| m.product_recommendations.iter())
    }
}

fn plans_by_month<S: Serializer>(
    plans: &[MonthlyRestockPlan],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(plans.iter().map(|p| (p.month, p)))
}

/// Next calendar month, wrapping December to January.
pub fn next_month(month: u32) -> u32 {
    month % 12 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_pin_at_bounds() {
        assert_eq!(saturating_total([1, 2, 3]), 6);
        assert_eq!(saturating_total([i64::MAX, 1]), i64::MAX);
        assert_eq!(saturating_total([i64::MIN, -1]), i64::MIN);
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dead_stock_requires_positive_stock() {
        let policy = HealthPolicy::default();
        let ratio = stock_sales_ratio(0, 0);
        let flags = StockFlags::derive(0, 0, 5, ratio, &policy);
        assert_eq!(ratio, 0.0);
        assert!(!flags.is_dead_stock);

        let flags = StockFlags::derive(3, 0, 5, stock_sales_ratio(3, 0), &policy);
        assert!(flags.is_dead_stock);
    }

    #[test]
    fn overstock_and_understock_predicates() {
        let policy = HealthPolicy::default();
        let over = StockFlags::derive(30, 10, 5, stock_sales_ratio(30, 10), &policy);
        assert!(over.is_overstocked);
        assert!(!over.is_understocked);

        let under = StockFlags::derive(2, 11, 5, stock_sales_ratio(2, 11), &policy);
        assert!(under.is_understocked);
        let not_under = StockFlags::derive(2, 10, 5, stock_sales_ratio(2, 10), &policy);
        assert!(!not_under.is_understocked);
    }

    #[test]
    fn last_sold_days_against_reference() {
        let reference = date(2025, 7, 1);
        assert_eq!(LastSold::Never.days_since(reference), 0);
        assert_eq!(LastSold::Unparsed.days_since(reference), 999);
        assert_eq!(LastSold::On(date(2025, 6, 21)).days_since(reference), 10);
        assert_eq!(
            serde_json::to_value(LastSold::On(date(2025, 6, 21))).unwrap(),
            serde_json::json!("2025-06-21")
        );
        assert_eq!(serde_json::to_value(LastSold::Never).unwrap(), serde_json::json!("Never"));
    }

    #[test]
    fn sales_month_prefers_parsed_date() {
        let rec = SalesRecord {
            product_id: 1,
            quantity_sold: 4,
            sales_date: Some(date(2025, 3, 9)),
            sales_month: Some(11),
        };
        assert_eq!(rec.month(), Some(3));
        let unparsed = SalesRecord { sales_date: None, ..rec };
        assert_eq!(unparsed.month(), Some(11));
    }

    #[test]
    fn festival_tags_split_on_commas() {
        let tag = FestivalTag {
            product_name: "Silk Saree".into(),
            month: 10,
            festival: Some("Diwali".into()),
            season: None,
            tags: Some("ethnic, festive,,silk ".into()),
        };
        assert_eq!(tag.tag_values().collect::<Vec<_>>(), vec!["ethnic", "festive", "silk"]);
    }

    #[test]
    fn months_wrap_after_december() {
        assert_eq!(next_month(11), 12);
        assert_eq!(next_month(12), 1);
    }

    #[test]
    fn forecast_and_plan_serialize_keyed_by_month() {
        let entry = |month| ForecastEntry {
            product_id: 1,
            target_month: month,
            forecasted_demand: 7,
            reason: String::new(),
        };
        let forecast = DemandForecast {
            months: [12, 1]
                .into_iter()
                .map(|month| MonthForecast {
                    month,
                    products: BTreeMap::from([(1, entry(month))]),
                })
                .collect(),
        };
        let text = serde_json::to_string(&forecast).unwrap();
        // forecast order, not numeric order
        assert!(text.starts_with("{\"12\":{\"1\":"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["12"]["1"]["forecasted_demand"], 7);
        assert_eq!(value["1"]["1"]["target_month"], 1);

        let plan = RestockPlan {
            monthly_plans: vec![MonthlyRestockPlan {
                month: 11,
                product_recommendations: Vec::new(),
            }],
            summary: RestockSummary::default(),
            forecast_period: "1 months".into(),
        };
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["monthly_plans"]["11"]["month"], 11);
        assert_eq!(value["forecast_period"], "1 months");
    }
}
