//! Ranked and filtered projections of the fused record set.
//!
//! Rankings are stable: products with equal keys keep catalog order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use smartstock_core::FusedProductRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRankRow {
    pub name: String,
    pub category: String,
    pub total_sold: i64,
    pub stock_quantity: i64,
    pub trend_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadStockRow {
    pub name: String,
    pub category: String,
    pub stock_quantity: i64,
    pub total_sold: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverstockRow {
    pub name: String,
    pub category: String,
    pub stock_quantity: i64,
    pub total_sold: i64,
    pub stock_sales_ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderstockRow {
    pub name: String,
    pub category: String,
    pub stock_quantity: i64,
    pub total_sold: i64,
    pub restock_threshold: i64,
    pub price: f64,
    pub stock_sales_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastWeekRow {
    pub name: String,
    pub category: String,
    pub last_week_sales: i64,
    pub total_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CategoryStats {
    pub product_count: usize,
    pub total_stock: i64,
    pub total_sold: i64,
    pub avg_price: f64,
    pub avg_trend_score: f64,
}

fn sales_rank_row(r: &FusedProductRecord) -> SalesRankRow {
    SalesRankRow {
        name: r.product.name.clone(),
        category: r.product.category.clone(),
        total_sold: r.total_sold,
        stock_quantity: r.product.stock_quantity,
        trend_score: r.trend_score,
    }
}

fn ranked<'a, F>(records: &'a [FusedProductRecord], top_n: usize, cmp: F) -> Vec<&'a FusedProductRecord>
where
    F: Fn(&FusedProductRecord, &FusedProductRecord) -> Ordering,
{
    let mut sorted: Vec<&FusedProductRecord> = records.iter().collect();
    sorted.sort_by(|a, b| cmp(*a, *b));
    sorted.truncate(top_n);
    sorted
}

pub fn most_sold(records: &[FusedProductRecord], top_n: usize) -> Vec<SalesRankRow> {
    ranked(records, top_n, |a, b| b.total_sold.cmp(&a.total_sold))
        .into_iter()
        .map(sales_rank_row)
        .collect()
}

pub fn least_sold(records: &[FusedProductRecord], top_n: usize) -> Vec<SalesRankRow> {
    ranked(records, top_n, |a, b| a.total_sold.cmp(&b.total_sold))
        .into_iter()
        .map(sales_rank_row)
        .collect()
}

pub fn dead_stock(records: &[FusedProductRecord]) -> Vec<DeadStockRow> {
    records
        .iter()
        .filter(|r| r.flags.is_dead_stock)
        .map(|r| DeadStockRow {
            name: r.product.name.clone(),
            category: r.product.category.clone(),
            stock_quantity: r.product.stock_quantity,
            total_sold: r.total_sold,
            price: r.product.price,
        })
        .collect()
}

/// Overstocked products, highest stock/sales ratio first.
pub fn overstocked(records: &[FusedProductRecord], top_n: usize) -> Vec<OverstockRow> {
    let flagged: Vec<FusedProductRecord> = records
        .iter()
        .filter(|r| r.flags.is_overstocked)
        .cloned()
        .collect();
    ranked(&flagged, top_n, |a, b| {
        b.stock_sales_ratio
            .partial_cmp(&a.stock_sales_ratio)
            .unwrap_or(Ordering::Equal)
    })
    .into_iter()
    .map(|r| OverstockRow {
        name: r.product.name.clone(),
        category: r.product.category.clone(),
        stock_quantity: r.product.stock_quantity,
        total_sold: r.total_sold,
        stock_sales_ratio: r.stock_sales_ratio,
        price: r.product.price,
    })
    .collect()
}

pub fn understocked(records: &[FusedProductRecord]) -> Vec<UnderstockRow> {
    records
        .iter()
        .filter(|r| r.flags.is_understocked)
        .map(|r| UnderstockRow {
            name: r.product.name.clone(),
            category: r.product.category.clone(),
            stock_quantity: r.product.stock_quantity,
            total_sold: r.total_sold,
            restock_threshold: r.product.restock_threshold,
            price: r.product.price,
            stock_sales_ratio: r.stock_sales_ratio,
        })
        .collect()
}

pub fn last_week_sales(records: &[FusedProductRecord], top_n: usize) -> Vec<LastWeekRow> {
    ranked(records, top_n, |a, b| b.last_week_sales.cmp(&a.last_week_sales))
        .into_iter()
        .map(|r| LastWeekRow {
            name: r.product.name.clone(),
            category: r.product.category.clone(),
            last_week_sales: r.last_week_sales,
            total_sold: r.total_sold,
        })
        .collect()
}

pub fn category_rollup(records: &[FusedProductRecord]) -> BTreeMap<String, CategoryStats> {
    let mut sums: BTreeMap<String, (CategoryStats, f64, f64)> = BTreeMap::new();
    for r in records {
        let (stats, price_sum, trend_sum) = sums.entry(r.product.category.clone()).or_default();
        stats.product_count += 1;
        stats.total_stock = stats.total_stock.saturating_add(r.product.stock_quantity);
        stats.total_sold = stats.total_sold.saturating_add(r.total_sold);
        *price_sum += r.product.price;
        *trend_sum += r.trend_score;
    }
    sums.into_iter()
        .map(|(category, (mut stats, price_sum, trend_sum))| {
            let n = stats.product_count as f64;
            stats.avg_price = price_sum / n;
            stats.avg_trend_score = trend_sum / n;
            (category, stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_core::{stock_sales_ratio, HealthPolicy, LastSold, Product, StockFlags};

    fn record(name: &str, category: &str, stock: i64, sold: i64, last_week: i64) -> FusedProductRecord {
        let ratio = stock_sales_ratio(stock, sold);
        FusedProductRecord {
            product: Product {
                product_id: 1,
                name: name.into(),
                category: category.into(),
                price: 100.0,
                cost: 50.0,
                stock_quantity: stock,
                restock_threshold: 5,
                status: "active".into(),
            },
            total_sold: sold,
            last_sold_date: LastSold::Never,
            trend_score: 100.0,
            festivals: Default::default(),
            seasons: Default::default(),
            tags: Default::default(),
            stock_sales_ratio: ratio,
            days_since_last_sold: 0,
            last_week_sales: last_week,
            flags: StockFlags::derive(stock, sold, 5, ratio, &HealthPolicy::default()),
        }
    }

    fn fleet() -> Vec<FusedProductRecord> {
        vec![
            record("A", "Kurti", 10, 30, 2),
            record("B", "Kurti", 40, 10, 0),
            record("C", "Saree", 8, 0, 0),
            record("D", "Saree", 60, 5, 1),
            record("E", "Jacket", 2, 30, 9),
            record("F", "Jacket", 3, 30, 0),
        ]
    }

    #[test]
    fn rankings_are_stable_for_ties() {
        let top = most_sold(&fleet(), 3);
        let names: Vec<&str> = top.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "E", "F"]);

        let bottom = least_sold(&fleet(), 2);
        assert_eq!(bottom[0].name, "C");
        assert_eq!(bottom[1].name, "D");
    }

    #[test]
    fn flag_views_filter_and_order() {
        let records = fleet();
        assert_eq!(dead_stock(&records).len(), 1);
        let over = overstocked(&records, 10);
        assert_eq!(
            over.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["D", "C", "B"]
        );
        let under = understocked(&records);
        assert_eq!(under.len(), 2);
        assert_eq!(last_week_sales(&records, 1)[0].name, "E");
    }

    #[test]
    fn category_stock_sums_to_fleet_total() {
        let records = fleet();
        let rollup = category_rollup(&records);
        let fleet_stock: i64 = records.iter().map(|r| r.product.stock_quantity).sum();
        assert_eq!(rollup.values().map(|c| c.total_stock).sum::<i64>(), fleet_stock);
        assert_eq!(rollup["Kurti"].product_count, 2);
        assert_eq!(rollup["Jacket"].total_sold, 60);
        assert_eq!(rollup["Saree"].avg_price, 100.0);
    }
}
