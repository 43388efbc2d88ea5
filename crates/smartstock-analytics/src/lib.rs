//! Fusion, health scoring and ranked inventory views.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use smartstock_core::{FestivalTag, FusedProductRecord, HealthPolicy};
use tracing::info;

pub mod fusion;
pub mod health;
pub mod recommend;
pub mod sales;
pub mod validation;
pub mod views;

pub use fusion::{FusedDataset, FusionEngine};
pub use health::{HealthScorer, InventorySummary};
pub use recommend::{
    advice, festival_recommendations, new_product_recommendations, Advice, FestivalRecommendation,
    HealthBand, InvestmentPriority, NewProductRecommendation,
};
pub use sales::{
    sales_breakdown, MonthSales, PeriodSales, ProductSales, SalesBreakdown, SalesSummary, SeasonSales,
};
pub use validation::{validate_festival_names, NameJoinReport, UnmatchedName};
pub use views::{
    CategoryStats, DeadStockRow, LastWeekRow, OverstockRow, SalesRankRow, UnderstockRow,
};

pub const CRATE_NAME: &str = "smartstock-analytics";

/// The analysis result handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryAnalysis {
    pub summary: InventorySummary,
    pub most_sold: Vec<SalesRankRow>,
    pub least_sold: Vec<SalesRankRow>,
    pub dead_stock: Vec<DeadStockRow>,
    pub overstocked: Vec<OverstockRow>,
    pub understocked: Vec<UnderstockRow>,
    pub last_week_sales: Vec<LastWeekRow>,
    pub category_analysis: BTreeMap<String, CategoryStats>,
    pub health_score: u8,
    pub festival_recommendations: Vec<FestivalRecommendation>,
    pub advice: Vec<Advice>,
}

#[derive(Debug, Clone)]
pub struct InventoryAnalyzer {
    policy: HealthPolicy,
    scorer: HealthScorer,
}

impl InventoryAnalyzer {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            scorer: HealthScorer::new(policy.clone()),
            policy,
        }
    }

    /// Build every view over `records`. `evaluation_date` selects the festival month.
    pub fn analyze(
        &self,
        records: &[FusedProductRecord],
        festivals: &[FestivalTag],
        evaluation_date: NaiveDate,
    ) -> InventoryAnalysis {
        let summary = self.scorer.summarize(records);
        let health_score = self.scorer.score(records);
        let dead_stock = views::dead_stock(records);
        let overstocked = views::overstocked(records, self.policy.overstock_top_n);
        let understocked = views::understocked(records);
        let advice = advice(
            health_score,
            &summary,
            dead_stock.len(),
            overstocked.len(),
            understocked.len(),
        );

        info!(
            products = summary.total_products,
            health_score,
            dead_stock = dead_stock.len(),
            overstocked = overstocked.len(),
            understocked = understocked.len(),
            "inventory analysis complete"
        );

        InventoryAnalysis {
            most_sold: views::most_sold(records, self.policy.top_n),
            least_sold: views::least_sold(records, self.policy.top_n),
            last_week_sales: views::last_week_sales(records, self.policy.top_n),
            category_analysis: views::category_rollup(records),
            festival_recommendations: festival_recommendations(festivals, evaluation_date.month()),
            summary,
            dead_stock,
            overstocked,
            understocked,
            health_score,
            advice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_core::Product;

    fn product(id: i64, name: &str, stock: i64) -> Product {
        Product {
            product_id: id,
            name: name.into(),
            category: "Kurti".into(),
            price: 200.0,
            cost: 100.0,
            stock_quantity: stock,
            restock_threshold: 5,
            status: "active".into(),
        }
    }

    #[test]
    fn analysis_bundles_every_view() {
        let policy = HealthPolicy::default();
        let festivals = vec![FestivalTag {
            product_name: "Kurti A".into(),
            month: 7,
            festival: None,
            season: Some("Monsoon".into()),
            tags: None,
        }];
        let records = FusionEngine::new(policy.clone()).fuse(
            &[product(1, "Kurti A", 0), product(2, "Kurti B", 9)],
            &[],
            &[],
            &festivals,
        );
        let analysis = InventoryAnalyzer::new(policy).analyze(
            &records,
            &festivals,
            NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
        );

        assert_eq!(analysis.summary.total_products, 2);
        assert_eq!(analysis.dead_stock.len(), 1);
        // Kurti B is both dead and overstocked; no ratio bonus with nothing sold
        assert_eq!(analysis.health_score, 92);
        assert_eq!(analysis.festival_recommendations.len(), 1);
        assert_eq!(analysis.category_analysis["Kurti"].total_stock, 9);
        assert_eq!(
            analysis.advice[0],
            Advice::Health {
                band: HealthBand::Excellent
            }
        );
    }
}
