//! Sales-log breakdowns for the sales report: monthly, per product, seasonal and per period.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Month;
use serde::Serialize;
use smartstock_core::{saturating_total, Product, ProductId, SalesRecord};

/// Products listed in the top-sellers table.
pub const TOP_PRODUCTS: usize = 10;

/// Fixed season buckets over calendar months.
pub const SEASONS: [(&str, &[u32]); 3] = [
    ("Summer", &[5, 6, 7, 8]),
    ("Festival", &[10, 11, 12]),
    ("Off-season", &[1, 2, 3, 4, 9]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_records: usize,
    pub total_products: usize,
    pub total_quantity: i64,
    /// Total quantity spread over a twelve-month year.
    pub avg_monthly_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSales {
    pub month: u32,
    pub month_name: String,
    pub records: usize,
    pub products: usize,
    pub quantity: i64,
    pub avg_per_record: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub total_quantity: i64,
    pub sales_records: usize,
    pub avg_per_sale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSales {
    pub season: String,
    pub months: Vec<u32>,
    pub total_sales: i64,
    pub avg_per_record: f64,
}

/// Quantity of one product within one week or month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSales {
    pub period: String,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesBreakdown {
    pub summary: SalesSummary,
    pub monthly: Vec<MonthSales>,
    pub top_products: Vec<ProductSales>,
    pub seasons: Vec<SeasonSales>,
    /// Keyed `%Y-W%U` (Sunday-start weeks).
    pub weekly: Vec<PeriodSales>,
    /// Keyed `%Y-%m`.
    pub by_month: Vec<PeriodSales>,
}

/// Break the sales log down for reporting. Product names come from `catalog`,
/// falling back to `#<id>` for ids the catalog lacks.
pub fn sales_breakdown(sales: &[SalesRecord], catalog: &[Product]) -> SalesBreakdown {
    let names: HashMap<ProductId, &str> =
        catalog.iter().map(|p| (p.product_id, p.name.as_str())).collect();
    let name_of = |id: ProductId| {
        names
            .get(&id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("#{id}"))
    };

    let total_quantity = saturating_total(sales.iter().map(|s| s.quantity_sold));
    let summary = SalesSummary {
        total_records: sales.len(),
        total_products: sales.iter().map(|s| s.product_id).collect::<HashSet<_>>().len(),
        total_quantity,
        avg_monthly_sales: total_quantity as f64 / 12.0,
    };

    let monthly = (1..=12)
        .filter_map(|month| {
            let rows: Vec<&SalesRecord> = sales.iter().filter(|s| s.month() == Some(month)).collect();
            if rows.is_empty() {
                return None;
            }
            let quantity = saturating_total(rows.iter().map(|s| s.quantity_sold));
            Some(MonthSales {
                month,
                month_name: month_name(month),
                records: rows.len(),
                products: rows.iter().map(|s| s.product_id).collect::<HashSet<_>>().len(),
                quantity,
                avg_per_record: quantity as f64 / rows.len() as f64,
            })
        })
        .collect();

    let mut per_product: HashMap<ProductId, (i64, usize)> = HashMap::new();
    for sale in sales {
        let (qty, count) = per_product.entry(sale.product_id).or_default();
        *qty = qty.saturating_add(sale.quantity_sold);
        *count += 1;
    }
    let mut top_products: Vec<ProductSales> = per_product
        .into_iter()
        .map(|(product_id, (total_quantity, sales_records))| ProductSales {
            product_id,
            name: name_of(product_id),
            total_quantity,
            sales_records,
            avg_per_sale: total_quantity as f64 / sales_records as f64,
        })
        .collect();
    top_products.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    top_products.truncate(TOP_PRODUCTS);

    let seasons = SEASONS
        .iter()
        .map(|(season, months)| {
            let rows: Vec<i64> = sales
                .iter()
                .filter(|s| s.month().is_some_and(|m| months.contains(&m)))
                .map(|s| s.quantity_sold)
                .collect();
            let total_sales = saturating_total(rows.iter().copied());
            SeasonSales {
                season: season.to_string(),
                months: months.to_vec(),
                total_sales,
                avg_per_record: if rows.is_empty() {
                    0.0
                } else {
                    total_sales as f64 / rows.len() as f64
                },
            }
        })
        .collect();

    SalesBreakdown {
        summary,
        monthly,
        top_products,
        seasons,
        weekly: period_sales(sales, "%Y-W%U", &name_of),
        by_month: period_sales(sales, "%Y-%m", &name_of),
    }
}

fn period_sales(
    sales: &[SalesRecord],
    format: &str,
    name_of: &dyn Fn(ProductId) -> String,
) -> Vec<PeriodSales> {
    let mut grouped: BTreeMap<(String, ProductId), i64> = BTreeMap::new();
    for sale in sales {
        let Some(date) = sale.sales_date else {
            continue;
        };
        let sum = grouped
            .entry((date.format(format).to_string(), sale.product_id))
            .or_default();
        *sum = sum.saturating_add(sale.quantity_sold);
    }
    let mut rows: Vec<PeriodSales> = grouped
        .into_iter()
        .map(|((period, product_id), quantity)| PeriodSales {
            period,
            product_id,
            name: name_of(product_id),
            quantity,
        })
        .collect();
    rows.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.name.cmp(&b.name)));
    rows
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| month.to_string())
}
