//! Joins the four source tables into one record per catalog product.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use smartstock_core::{
    normalize_catalog, stock_sales_ratio, FestivalTag, FillerStrategy, FusedProductRecord,
    HealthPolicy, LastSold, LookbackWindow, PipelineError, Product, ProductId, SalesRecord,
    SchemaGap, StockFlags, TableKind, TrendRecord,
};
use smartstock_storage::SourceSet;
use tracing::{info, info_span};

/// Fused records plus every schema gap seen on the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FusedDataset {
    pub records: Vec<FusedProductRecord>,
    pub gaps: Vec<SchemaGap>,
}

impl FusedDataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Default)]
struct SalesAggregate {
    total_sold: i64,
    last_sold: Option<NaiveDate>,
    rows: usize,
}

#[derive(Debug, Default)]
struct EventAggregate {
    festivals: BTreeSet<String>,
    seasons: BTreeSet<String>,
    tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct FusionEngine {
    policy: HealthPolicy,
}

impl FusionEngine {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    /// Normalize the catalog with `filler`, then fuse. Fails only when the catalog is absent.
    pub fn fuse_sources(
        &self,
        sources: &SourceSet,
        filler: &mut dyn FillerStrategy,
    ) -> Result<FusedDataset, PipelineError> {
        let catalog = sources
            .catalog
            .as_ref()
            .ok_or(PipelineError::SourceUnavailable {
                table: TableKind::Catalog,
            })?;
        let products = normalize_catalog(&catalog.rows, filler);
        let records = self.fuse(
            &products,
            &sources.sales.rows,
            &sources.trends.rows,
            &sources.festivals.rows,
        );
        Ok(FusedDataset {
            records,
            gaps: sources.gaps().cloned().collect(),
        })
    }

    /// Left-join sales, trends and festival tags onto `catalog`, one record per product, in catalog order.
    pub fn fuse(
        &self,
        catalog: &[Product],
        sales: &[SalesRecord],
        trends: &[TrendRecord],
        festivals: &[FestivalTag],
    ) -> Vec<FusedProductRecord> {
        let span = info_span!("fuse", products = catalog.len());
        let _guard = span.enter();

        let reference = self.policy.reference_date;
        let sales_by_product = aggregate_sales(sales.iter());
        let last_week = aggregate_sales(
            LookbackWindow::TrailingDays(self.policy.last_week_days)
                .select(sales, reference)
                .into_iter(),
        );
        let trend_by_product = latest_trends(trends);
        let events_by_name = aggregate_events(festivals);

        let records: Vec<FusedProductRecord> = catalog
            .iter()
            .map(|product| {
                let sold = sales_by_product.get(&product.product_id);
                let total_sold = sold.map(|s| s.total_sold).unwrap_or(0);
                let last_sold_date = match sold {
                    None => LastSold::Never,
                    Some(SalesAggregate {
                        last_sold: Some(date),
                        ..
                    }) => LastSold::On(*date),
                    Some(agg) if agg.rows > 0 => LastSold::Unparsed,
                    Some(_) => LastSold::Never,
                };
                let ratio = stock_sales_ratio(product.stock_quantity, total_sold);
                let events = events_by_name.get(product.name.as_str());

                FusedProductRecord {
                    product: product.clone(),
                    total_sold,
                    last_sold_date,
                    trend_score: trend_by_product
                        .get(&product.product_id)
                        .copied()
                        .unwrap_or(0.0),
                    festivals: events.map(|e| e.festivals.clone()).unwrap_or_default(),
                    seasons: events.map(|e| e.seasons.clone()).unwrap_or_default(),
                    tags: events.map(|e| e.tags.clone()).unwrap_or_default(),
                    stock_sales_ratio: ratio,
                    days_since_last_sold: last_sold_date.days_since(reference),
                    last_week_sales: last_week
                        .get(&product.product_id)
                        .map(|s| s.total_sold)
                        .unwrap_or(0),
                    flags: StockFlags::derive(
                        product.stock_quantity,
                        total_sold,
                        product.restock_threshold,
                        ratio,
                        &self.policy,
                    ),
                }
            })
            .collect();

        info!(
            products = records.len(),
            sales_rows = sales.len(),
            trend_rows = trends.len(),
            festival_rows = festivals.len(),
            "fusion complete"
        );
        records
    }
}

fn aggregate_sales<'a>(
    sales: impl Iterator<Item = &'a SalesRecord>,
) -> HashMap<ProductId, SalesAggregate> {
    let mut out: HashMap<ProductId, SalesAggregate> = HashMap::new();
    for sale in sales {
        let agg = out.entry(sale.product_id).or_default();
        agg.total_sold = agg.total_sold.saturating_add(sale.quantity_sold);
        agg.rows += 1;
        agg.last_sold = agg.last_sold.max(sale.sales_date);
    }
    out
}

/// Highest score across the months on file for each product.
fn latest_trends(trends: &[TrendRecord]) -> HashMap<ProductId, f64> {
    let mut out: HashMap<ProductId, f64> = HashMap::new();
    for trend in trends {
        out.entry(trend.product_id)
            .and_modify(|score| *score = score.max(trend.trend_score))
            .or_insert(trend.trend_score);
    }
    out
}

/// Festival, season and tag sets keyed by product name. Null cells contribute nothing.
fn aggregate_events(festivals: &[FestivalTag]) -> HashMap<&str, EventAggregate> {
    let mut out: HashMap<&str, EventAggregate> = HashMap::new();
    for row in festivals {
        let agg = out.entry(row.product_name.as_str()).or_default();
        if let Some(festival) = &row.festival {
            agg.festivals.insert(festival.clone());
        }
        if let Some(season) = &row.season {
            agg.seasons.insert(season.clone());
        }
        agg.tags.extend(row.tag_values().map(str::to_string));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_core::{CatalogRow, FixedFiller, SeededFiller};
    use smartstock_storage::LoadedTable;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn product(id: ProductId, name: &str, stock: i64, threshold: i64) -> Product {
        Product {
            product_id: id,
            name: name.to_string(),
            category: "Kurti".to_string(),
            price: 500.0,
            cost: 100.0,
            stock_quantity: stock,
            restock_threshold: threshold,
            status: "active".to_string(),
        }
    }

    fn sale(id: ProductId, qty: i64, when: Option<NaiveDate>) -> SalesRecord {
        SalesRecord {
            product_id: id,
            quantity_sold: qty,
            sales_date: when,
            sales_month: None,
        }
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(HealthPolicy::default())
    }

    #[test]
    fn product_without_sales_and_zero_stock_is_not_dead() {
        let records = engine().fuse(&[product(1, "Scarf", 0, 5)], &[], &[], &[]);
        let r = &records[0];
        assert_eq!(r.total_sold, 0);
        assert_eq!(r.stock_sales_ratio, 0.0);
        assert!(!r.flags.is_dead_stock);
        assert_eq!(r.last_sold_date, LastSold::Never);
        assert_eq!(r.days_since_last_sold, 0);
    }

    #[test]
    fn joins_sales_trends_and_festivals() {
        let catalog = vec![product(1, "Silk Saree", 30, 5), product(2, "Raincoat", 4, 5)];
        let sales = vec![
            sale(1, 4, Some(date(2025, 6, 28))),
            sale(1, 6, Some(date(2025, 5, 2))),
            sale(2, 12, None),
        ];
        let trends = vec![
            TrendRecord { product_id: 1, month: 5, trend_score: 120.0 },
            TrendRecord { product_id: 1, month: 6, trend_score: 180.0 },
        ];
        let festivals = vec![
            FestivalTag {
                product_name: "Silk Saree".into(),
                month: 10,
                festival: Some("Diwali".into()),
                season: None,
                tags: Some("ethnic,silk".into()),
            },
            FestivalTag {
                product_name: "Silk Saree".into(),
                month: 8,
                festival: Some("Onam".into()),
                season: Some("Monsoon".into()),
                tags: Some("ethnic".into()),
            },
        ];

        let records = engine().fuse(&catalog, &sales, &trends, &festivals);
        let saree = &records[0];
        assert_eq!(saree.total_sold, 10);
        assert_eq!(saree.last_sold_date, LastSold::On(date(2025, 6, 28)));
        assert_eq!(saree.days_since_last_sold, 3);
        assert_eq!(saree.trend_score, 180.0);
        assert_eq!(saree.stock_sales_ratio, 3.0);
        assert!(saree.flags.is_overstocked);
        assert_eq!(
            saree.festivals.iter().cloned().collect::<Vec<_>>(),
            vec!["Diwali".to_string(), "Onam".to_string()]
        );
        assert_eq!(saree.seasons.len(), 1);
        assert_eq!(saree.tags.len(), 2);
        assert_eq!(saree.last_week_sales, 4);

        let raincoat = &records[1];
        assert_eq!(raincoat.last_sold_date, LastSold::Unparsed);
        assert_eq!(raincoat.days_since_last_sold, 999);
        assert!(raincoat.flags.is_understocked);
        assert!(raincoat.festivals.is_empty());
        assert_eq!(raincoat.trend_score, 0.0);
    }

    #[test]
    fn ratio_and_dead_stock_hold_for_every_record() {
        let catalog: Vec<Product> = (1..=20)
            .map(|i| product(i, &format!("P{i}"), i % 4 * 7, 5))
            .collect();
        let sales: Vec<SalesRecord> = (1..=20)
            .filter(|i| i % 3 != 0)
            .map(|i| sale(i, i * 2 % 9, Some(date(2025, 3, 1))))
            .collect();
        for r in engine().fuse(&catalog, &sales, &[], &[]) {
            let expected = r.product.stock_quantity as f64 / r.total_sold.max(1) as f64;
            assert!((r.stock_sales_ratio - expected).abs() < 1e-12);
            if r.flags.is_dead_stock {
                assert!(r.product.stock_quantity > 0 && r.total_sold == 0);
            }
        }
    }

    #[test]
    fn huge_quantities_saturate_instead_of_overflowing() {
        let catalog = vec![product(1, "Bulk Socks", 10, 5)];
        let sales = vec![
            sale(1, i64::MAX, Some(date(2025, 6, 1))),
            sale(1, i64::MAX, Some(date(2025, 6, 2))),
        ];
        let records = engine().fuse(&catalog, &sales, &[], &[]);
        assert_eq!(records[0].total_sold, i64::MAX);
        assert!(!records[0].flags.is_dead_stock);
    }

    fn sparse_sources() -> SourceSet {
        SourceSet {
            catalog: Some(LoadedTable {
                rows: vec![
                    CatalogRow {
                        product_id: Some(1),
                        name: Some("Scarf".into()),
                        ..Default::default()
                    },
                    CatalogRow::default(),
                ],
                gaps: vec![SchemaGap {
                    table: TableKind::Catalog,
                    column: "price".into(),
                }],
            }),
            sales: LoadedTable {
                rows: vec![sale(1, 3, Some(date(2025, 6, 1)))],
                gaps: vec![],
            },
            ..Default::default()
        }
    }

    #[test]
    fn fusing_twice_is_idempotent_with_deterministic_fillers() {
        let sources = sparse_sources();
        let e = engine();
        let a = e.fuse_sources(&sources, &mut FixedFiller::default()).unwrap();
        let b = e.fuse_sources(&sources, &mut FixedFiller::default()).unwrap();
        assert_eq!(a, b);

        let c = e.fuse_sources(&sources, &mut SeededFiller::new(11)).unwrap();
        let d = e.fuse_sources(&sources, &mut SeededFiller::new(11)).unwrap();
        assert_eq!(c, d);
        assert_eq!(c.gaps.len(), 1);
    }

    #[test]
    fn synthesized_columns_are_present() {
        let dataset = engine()
            .fuse_sources(&sparse_sources(), &mut SeededFiller::new(3))
            .unwrap();
        let filled = &dataset.records[1];
        assert!(!filled.product.name.is_empty());
        assert!(!filled.product.category.is_empty());
        assert!(filled.product.restock_threshold >= 1);
    }

    #[test]
    fn missing_catalog_is_fatal() {
        let sources = SourceSet::default();
        let err = engine()
            .fuse_sources(&sources, &mut FixedFiller::default())
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::SourceUnavailable {
                table: TableKind::Catalog
            }
        );
        assert!(err.is_fatal());
    }
}
