//! Paginated report document and markdown brief.
//!
//! Documents are plain data; styling and layout belong to whatever renders them.

use chrono::NaiveDate;
use serde::Serialize;
use smartstock_analytics::{InventoryAnalysis, NewProductRecommendation, SalesBreakdown};
use smartstock_core::{DemandForecast, FusedProductRecord, RestockPlan};
use smartstock_forecast::CategoryFocus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub section: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPage {
    pub number: usize,
    pub section: String,
    /// Page within the section, starting at 1.
    pub section_page: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub evaluation_date: NaiveDate,
    pub health_score: u8,
    pub page_size: usize,
    pub pages: Vec<ReportPage>,
}

/// Inputs a report is rendered from.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub evaluation_date: NaiveDate,
    pub records: Vec<FusedProductRecord>,
    pub analysis: InventoryAnalysis,
    pub forecast: DemandForecast,
    pub plan: RestockPlan,
    pub focus: Vec<CategoryFocus>,
    pub new_products: Vec<NewProductRecommendation>,
    pub sales: SalesBreakdown,
}

/// Split rows into pages of `page_size`, keeping input order.
pub fn paginate<T: Clone>(rows: &[T], page_size: usize) -> Vec<Vec<T>> {
    rows.chunks(page_size.max(1)).map(<[T]>::to_vec).collect()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

fn inventory_table(records: &[FusedProductRecord]) -> ReportTable {
    ReportTable {
        section: "Inventory".to_string(),
        columns: columns(&[
            "product_id",
            "name",
            "category",
            "stock",
            "sold",
            "ratio",
            "last_sold",
            "flags",
        ]),
        rows: records
            .iter()
            .map(|r| {
                let mut flags = Vec::new();
                if r.flags.is_dead_stock {
                    flags.push("dead");
                }
                if r.flags.is_overstocked {
                    flags.push("over");
                }
                if r.flags.is_understocked {
                    flags.push("under");
                }
                vec![
                    r.product.product_id.to_string(),
                    r.product.name.clone(),
                    r.product.category.clone(),
                    r.product.stock_quantity.to_string(),
                    r.total_sold.to_string(),
                    format!("{:.2}", r.stock_sales_ratio),
                    r.last_sold_date.to_string(),
                    flags.join(" "),
                ]
            })
            .collect(),
    }
}

fn category_table(analysis: &InventoryAnalysis) -> ReportTable {
    ReportTable {
        section: "Categories".to_string(),
        columns: columns(&["category", "products", "stock", "sold", "avg_price", "avg_trend"]),
        rows: analysis
            .category_analysis
            .iter()
            .map(|(category, s)| {
                vec![
                    category.clone(),
                    s.product_count.to_string(),
                    s.total_stock.to_string(),
                    s.total_sold.to_string(),
                    format!("{:.2}", s.avg_price),
                    format!("{:.1}", s.avg_trend_score),
                ]
            })
            .collect(),
    }
}

fn forecast_table(forecast: &DemandForecast) -> ReportTable {
    ReportTable {
        section: "Forecast".to_string(),
        columns: columns(&["month", "product_id", "forecasted_demand", "reason"]),
        rows: forecast
            .months
            .iter()
            .flat_map(|m| m.products.values())
            .map(|e| {
                vec![
                    e.target_month.to_string(),
                    e.product_id.to_string(),
                    e.forecasted_demand.to_string(),
                    e.reason.clone(),
                ]
            })
            .collect(),
    }
}

fn restock_table(plan: &RestockPlan) -> ReportTable {
    ReportTable {
        section: "Restock plan".to_string(),
        columns: columns(&[
            "month",
            "name",
            "category",
            "stock",
            "demand",
            "restock",
            "reason",
        ]),
        rows: plan
            .recommendations()
            .map(|r| {
                vec![
                    r.month.to_string(),
                    r.name.clone(),
                    r.category.clone(),
                    r.current_stock.to_string(),
                    r.forecasted_demand.to_string(),
                    r.recommended_restock.to_string(),
                    r.reason.clone(),
                ]
            })
            .collect(),
    }
}

fn sales_tables(sales: &SalesBreakdown) -> [ReportTable; 3] {
    let monthly = ReportTable {
        section: "Sales by month".to_string(),
        columns: columns(&["month", "records", "products", "quantity", "avg_per_record"]),
        rows: sales
            .monthly
            .iter()
            .map(|m| {
                vec![
                    m.month_name.clone(),
                    m.records.to_string(),
                    m.products.to_string(),
                    m.quantity.to_string(),
                    format!("{:.1}", m.avg_per_record),
                ]
            })
            .collect(),
    };
    let top = ReportTable {
        section: "Top products".to_string(),
        columns: columns(&["name", "quantity", "records", "avg_per_sale"]),
        rows: sales
            .top_products
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    p.total_quantity.to_string(),
                    p.sales_records.to_string(),
                    format!("{:.1}", p.avg_per_sale),
                ]
            })
            .collect(),
    };
    let weekly = ReportTable {
        section: "Weekly sales".to_string(),
        columns: columns(&["week", "name", "quantity"]),
        rows: sales
            .weekly
            .iter()
            .map(|w| vec![w.period.clone(), w.name.clone(), w.quantity.to_string()])
            .collect(),
    };
    [monthly, top, weekly]
}

/// Lay every table out into numbered pages. CPU-bound for large catalogs.
pub fn build_document(inputs: &ReportInputs, page_size: usize) -> ReportDocument {
    let mut tables = vec![
        inventory_table(&inputs.records),
        category_table(&inputs.analysis),
        forecast_table(&inputs.forecast),
        restock_table(&inputs.plan),
    ];
    tables.extend(sales_tables(&inputs.sales));

    let mut pages = Vec::new();
    for table in tables {
        for (idx, chunk) in paginate(&table.rows, page_size).into_iter().enumerate() {
            pages.push(ReportPage {
                number: pages.len() + 1,
                section: table.section.clone(),
                section_page: idx + 1,
                columns: table.columns.clone(),
                rows: chunk,
            });
        }
    }

    ReportDocument {
        title: format!("SmartStock Inventory Report {}", inputs.evaluation_date),
        evaluation_date: inputs.evaluation_date,
        health_score: inputs.analysis.health_score,
        page_size: page_size.max(1),
        pages,
    }
}

pub fn render_brief(inputs: &ReportInputs, run_id: &str) -> String {
    let s = &inputs.analysis.summary;
    let plan = &inputs.plan.summary;
    let mut lines = vec![
        "# SmartStock Brief".to_string(),
        String::new(),
        format!("- Run ID: `{run_id}`"),
        format!("- Evaluation date: {}", inputs.evaluation_date),
        format!("- Health score: {}/100", inputs.analysis.health_score),
        format!("- Products: {}", s.total_products),
        format!("- Stock / sold: {} / {}", s.total_stock, s.total_sold),
        format!(
            "- Dead / over / under stocked: {} / {} / {}",
            s.dead_stock_count, s.overstocked_count, s.understocked_count
        ),
        String::new(),
        format!("## Restock ({})", inputs.plan.forecast_period),
        format!("- Units to restock: {}", plan.total_restock_quantity),
        format!("- Restock value: {}", plan.total_restock_value),
        format!("- Recommendations: {}", plan.products_to_restock),
    ];

    lines.push(String::new());
    lines.push("## Sales by season".to_string());
    lines.extend(
        inputs
            .sales
            .seasons
            .iter()
            .map(|season| format!("- {}: {} units", season.season, season.total_sales)),
    );

    if !inputs.focus.is_empty() {
        lines.push(String::new());
        lines.push("## Category focus".to_string());
        lines.extend(
            inputs
                .focus
                .iter()
                .map(|f| format!("- {}: {} units", f.category, f.units)),
        );
    }

    if !inputs.new_products.is_empty() {
        lines.push(String::new());
        lines.push("## Upcoming festivals".to_string());
        lines.extend(inputs.new_products.iter().map(|r| {
            format!(
                "- month {}: {} for {} ({:?} priority)",
                r.month, r.recommended_product_type, r.festival, r.investment_priority
            )
        }));
    }

    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_analytics::sales_breakdown;
    use smartstock_core::SalesRecord;

    #[test]
    fn pagination_keeps_order_and_remainder() {
        let rows: Vec<u32> = (1..=7).collect();
        let pages = paginate(&rows, 3);
        assert_eq!(pages, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        assert_eq!(paginate::<u32>(&[], 3).len(), 0);
        assert_eq!(paginate(&rows, 0).len(), 7);
    }

    #[test]
    fn sales_tables_follow_the_breakdown() {
        let sales: Vec<SalesRecord> = [(1, 10, 5), (1, 4, 7), (2, 3, 6)]
            .into_iter()
            .map(|(id, qty, day)| SalesRecord {
                product_id: id,
                quantity_sold: qty,
                sales_date: NaiveDate::from_ymd_opt(2025, 10, day),
                sales_month: None,
            })
            .collect();
        let [monthly, top, weekly] = sales_tables(&sales_breakdown(&sales, &[]));

        assert_eq!(monthly.rows, vec![vec!["October", "3", "2", "17", "5.7"]]);
        assert_eq!(top.rows[0], vec!["#1", "14", "2", "7.0"]);
        assert_eq!(weekly.rows.len(), 2);
        assert_eq!(weekly.rows[1], vec!["2025-W40", "#2", "3"]);
    }
}
