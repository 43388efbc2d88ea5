//! Turns a demand forecast and current stock into per-month restock recommendations.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use smartstock_core::{
    DemandClass, DemandForecast, ForecastPolicy, MonthlyRestockPlan, Product, RestockPlan,
    RestockRecommendation, RestockSummary,
};
use tracing::info;

#[derive(Debug, Clone)]
pub struct RestockPlanner {
    policy: ForecastPolicy,
}

impl RestockPlanner {
    pub fn new(policy: ForecastPolicy) -> Self {
        Self { policy }
    }

    /// One recommendation per catalog product per forecast month. Products the
    /// forecast does not cover are planned with zero demand.
    pub fn plan(&self, forecast: &DemandForecast, catalog: &[Product]) -> RestockPlan {
        let monthly_plans: Vec<MonthlyRestockPlan> = forecast
            .months
            .iter()
            .map(|month| MonthlyRestockPlan {
                month: month.month,
                product_recommendations: catalog
                    .iter()
                    .map(|product| {
                        let entry = month.products.get(&product.product_id);
                        self.recommend(
                            product,
                            month.month,
                            entry.map(|e| e.forecasted_demand).unwrap_or(0),
                            entry.map(|e| e.reason.as_str()).unwrap_or_default(),
                        )
                    })
                    .collect(),
            })
            .collect();

        let summary = summarize(&monthly_plans);
        info!(
            months = monthly_plans.len(),
            products_to_restock = summary.products_to_restock,
            total_restock_quantity = summary.total_restock_quantity,
            "restock plan complete"
        );
        RestockPlan {
            forecast_period: format!("{} months", monthly_plans.len()),
            monthly_plans,
            summary,
        }
    }

    pub fn recommend(
        &self,
        product: &Product,
        month: u32,
        forecasted_demand: u64,
        festival_reason: &str,
    ) -> RestockRecommendation {
        let demand = i64::try_from(forecasted_demand).unwrap_or(i64::MAX);
        let demand_gap = demand.saturating_sub(product.stock_quantity);
        let (recommended_restock, demand_class) = if demand_gap > product.restock_threshold {
            (demand_gap, DemandClass::High)
        } else {
            (
                product.restock_threshold.saturating_add(self.policy.low_demand_buffer),
                DemandClass::Low,
            )
        };
        let reason = if festival_reason.is_empty() {
            demand_class.label().to_string()
        } else {
            festival_reason.to_string()
        };

        RestockRecommendation {
            product_id: product.product_id,
            name: product.name.clone(),
            category: product.category.clone(),
            month,
            current_stock: product.stock_quantity,
            forecasted_demand,
            restock_threshold: product.restock_threshold,
            recommended_restock,
            demand_class,
            reason,
            cost: product.cost,
        }
    }
}

/// Totals over positive recommendations. `products_to_reduce` counts negative
/// rows, which the current restock rule never produces.
pub fn summarize(monthly_plans: &[MonthlyRestockPlan]) -> RestockSummary {
    let mut summary = RestockSummary::default();
    let mut value = 0.0;
    for rec in monthly_plans.iter().flat_map(|m| m.product_recommendations.iter()) {
        match rec.recommended_restock.cmp(&0) {
            Ordering::Greater => {
                summary.total_restock_quantity =
                    summary.total_restock_quantity.saturating_add(rec.recommended_restock);
                value += rec.recommended_restock as f64 * rec.cost;
                summary.products_to_restock += 1;
            }
            Ordering::Less => summary.products_to_reduce += 1,
            Ordering::Equal => {}
        }
    }
    summary.total_restock_value = value.round_ties_even() as i64;
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFocus {
    pub category: String,
    pub units: i64,
}

/// Categories with the largest positive restock volume across the plan.
pub fn top_categories(plan: &RestockPlan, limit: usize) -> Vec<CategoryFocus> {
    let mut units: BTreeMap<&str, i64> = BTreeMap::new();
    for rec in plan.recommendations().filter(|r| r.recommended_restock > 0) {
        let total = units.entry(rec.category.as_str()).or_default();
        *total = total.saturating_add(rec.recommended_restock);
    }
    let mut ranked: Vec<CategoryFocus> = units
        .into_iter()
        .map(|(category, units)| CategoryFocus {
            category: category.to_string(),
            units,
        })
        .collect();
    ranked.sort_by(|a, b| b.units.cmp(&a.units));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_core::{ForecastEntry, MonthForecast};

    fn product(id: i64, category: &str, stock: i64, threshold: i64, cost: f64) -> Product {
        Product {
            product_id: id,
            name: format!("Product {id}"),
            category: category.into(),
            price: cost * 2.0,
            cost,
            stock_quantity: stock,
            restock_threshold: threshold,
            status: "active".into(),
        }
    }

    fn month(month: u32, entries: &[(i64, u64, &str)]) -> MonthForecast {
        MonthForecast {
            month,
            products: entries
                .iter()
                .map(|(id, demand, reason)| {
                    (
                        *id,
                        ForecastEntry {
                            product_id: *id,
                            target_month: month,
                            forecasted_demand: *demand,
                            reason: reason.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn planner() -> RestockPlanner {
        RestockPlanner::new(ForecastPolicy::default())
    }

    #[test]
    fn high_demand_restocks_the_gap() {
        let rec = planner().recommend(&product(1, "Kurti", 10, 5, 100.0), 7, 20, "");
        assert_eq!(rec.recommended_restock, 10);
        assert_eq!(rec.demand_class, DemandClass::High);
        assert!(rec.reason.contains("High demand"));
    }

    #[test]
    fn low_demand_tops_up_threshold_plus_buffer() {
        let rec = planner().recommend(&product(1, "Kurti", 10, 5, 100.0), 7, 12, "");
        assert_eq!(rec.recommended_restock, 10);
        assert_eq!(rec.reason, "Low demand");
    }

    #[test]
    fn festival_reason_wins_over_class_label() {
        let rec = planner().recommend(&product(1, "Saree", 0, 5, 100.0), 10, 40, "Diwali");
        assert_eq!(rec.demand_class, DemandClass::High);
        assert_eq!(rec.reason, "Diwali");
    }

    #[test]
    fn extreme_thresholds_saturate() {
        let rec = planner().recommend(&product(1, "Kurti", 0, i64::MAX, 1.0), 3, 0, "");
        assert_eq!(rec.recommended_restock, i64::MAX);
        assert_eq!(rec.demand_class, DemandClass::Low);

        let summary = summarize(&[MonthlyRestockPlan {
            month: 3,
            product_recommendations: vec![rec.clone(), rec],
        }]);
        assert_eq!(summary.total_restock_quantity, i64::MAX);
        assert_eq!(summary.products_to_restock, 2);
    }

    #[test]
    fn plan_covers_every_catalog_product_and_rolls_up() {
        let catalog = vec![
            product(1, "Kurti", 10, 5, 100.0),
            product(2, "Saree", 2, 3, 250.5),
        ];
        let forecast = DemandForecast {
            months: vec![month(11, &[(1, 20, "")]), month(12, &[(1, 12, ""), (2, 30, "Christmas")])],
        };
        let plan = planner().plan(&forecast, &catalog);

        assert_eq!(plan.forecast_period, "2 months");
        assert_eq!(plan.monthly_plans[0].month, 11);
        // product 2 is missing from November's forecast: zero demand, low-demand top-up
        let missing = &plan.monthly_plans[0].product_recommendations[1];
        assert_eq!(missing.forecasted_demand, 0);
        assert_eq!(missing.recommended_restock, 8);

        // 10 + 8 + 10 + 28
        assert_eq!(plan.summary.total_restock_quantity, 56);
        assert_eq!(plan.summary.products_to_restock, 4);
        assert_eq!(plan.summary.products_to_reduce, 0);
        // 10*100 + 8*250.5 + 10*100 + 28*250.5 = 11018
        assert_eq!(plan.summary.total_restock_value, 11018);

        let focus = top_categories(&plan, 3);
        assert_eq!(focus[0], CategoryFocus { category: "Saree".into(), units: 36 });
        assert_eq!(focus[1].units, 20);
    }

    #[test]
    fn empty_forecast_yields_empty_plan() {
        let plan = planner().plan(&DemandForecast::default(), &[product(1, "Kurti", 1, 1, 1.0)]);
        assert!(plan.monthly_plans.is_empty());
        assert_eq!(plan.forecast_period, "0 months");
        assert_eq!(plan.summary, RestockSummary::default());
    }
}
