//! Historical demand profile over the whole sales log.
//!
//! Unlike the forecast this reads every row, so old demand counts as much as recent demand.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use smartstock_core::{LookbackWindow, ProductId, SalesRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandProfile {
    pub product_id: ProductId,
    pub total_sold: i64,
    pub avg_monthly: f64,
    /// Sample standard deviation of monthly totals; zero with fewer than two months.
    pub demand_std: f64,
    pub max: i64,
    pub min: i64,
}

/// One profile per product that appears in `sales`, in order of first appearance.
pub fn historical_demand(sales: &[SalesRecord], as_of: NaiveDate) -> Vec<DemandProfile> {
    let rows = LookbackWindow::Unbounded.select(sales, as_of);

    let mut order: Vec<ProductId> = Vec::new();
    let mut totals: HashMap<ProductId, i64> = HashMap::new();
    let mut monthly: HashMap<ProductId, BTreeMap<u32, i64>> = HashMap::new();
    for sale in rows {
        if !totals.contains_key(&sale.product_id) {
            order.push(sale.product_id);
        }
        let total = totals.entry(sale.product_id).or_default();
        *total = total.saturating_add(sale.quantity_sold);
        let months = monthly.entry(sale.product_id).or_default();
        if let Some(month) = sale.month() {
            let sum = months.entry(month).or_default();
            *sum = sum.saturating_add(sale.quantity_sold);
        }
    }

    order
        .into_iter()
        .map(|product_id| {
            let total_sold = totals.get(&product_id).copied().unwrap_or(0);
            let sums: Vec<i64> = monthly
                .get(&product_id)
                .map(|m| m.values().copied().collect())
                .unwrap_or_default();
            DemandProfile {
                product_id,
                total_sold,
                avg_monthly: total_sold as f64 / sums.len().max(1) as f64,
                demand_std: sample_std(&sums),
                max: sums.iter().copied().max().unwrap_or(0),
                min: sums.iter().copied().min().unwrap_or(0),
            }
        })
        .collect()
}

fn sample_std(values: &[i64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    var.sqrt()
}
