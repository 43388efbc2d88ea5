//! Request-scoped orchestration: load sources, fuse, analyze, forecast, plan and write reports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use smartstock_analytics::{
    new_product_recommendations, sales_breakdown, validate_festival_names, FusedDataset,
    FusionEngine, InventoryAnalysis, InventoryAnalyzer, NameJoinReport, SalesBreakdown,
};
use smartstock_core::{
    AnalyticsPolicy, DemandForecast, PipelineError, Product, RestockPlan, SchemaGap, TableKind,
};
use smartstock_forecast::{
    festival_patterns, historical_demand, top_categories, DemandForecaster, DemandProfile,
    FestivalPattern, ForecastRequest, RestockPlanner, FOCUS_CATEGORIES,
};
use smartstock_storage::{row_counts, ReplacedSource, SourceLoader, SourceSet, SourceStore};
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod config;
pub mod document;
pub mod snapshots;

pub use config::{load_policy, PipelineConfig, POLICY_FILE};
pub use document::{build_document, paginate, render_brief, ReportDocument, ReportInputs, ReportPage};
pub use snapshots::{export_snapshots, SnapshotFile, SnapshotManifest};

pub const CRATE_NAME: &str = "smartstock-report";

/// Sources and their fused view for a single request.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sources: SourceSet,
    pub fused: FusedDataset,
}

impl Snapshot {
    pub fn products(&self) -> Vec<Product> {
        self.fused.records.iter().map(|r| r.product.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub row_counts: BTreeMap<TableKind, usize>,
    pub unavailable: Vec<TableKind>,
    pub schema_gaps: Vec<SchemaGap>,
    pub festival_names: NameJoinReport,
}

/// Historical demand, festival-month patterns and the upcoming forecast in one bundle.
#[derive(Debug, Clone, Serialize)]
pub struct DemandAnalysis {
    pub historical_demand: Vec<DemandProfile>,
    pub festival_patterns: BTreeMap<u32, FestivalPattern>,
    /// `None` when the catalog is unavailable.
    pub demand_forecast: Option<DemandForecast>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub products: usize,
    pub health_score: u8,
    pub forecast_months: usize,
    pub restock_recommendations: usize,
    pub pages: usize,
    pub reports_dir: String,
    pub snapshot_manifest: String,
}

#[derive(Debug, Clone)]
pub struct ReportPipeline {
    config: PipelineConfig,
    policy: AnalyticsPolicy,
}

impl ReportPipeline {
    pub fn new(config: PipelineConfig, policy: AnalyticsPolicy) -> Self {
        Self { config, policy }
    }

    pub fn from_env() -> Result<Self> {
        let config = PipelineConfig::from_env();
        let policy = load_policy(&config.policy_path())?;
        Ok(Self::new(config, policy))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn policy(&self) -> &AnalyticsPolicy {
        &self.policy
    }

    pub fn load_sources(&self) -> Result<SourceSet> {
        SourceLoader::new(self.config.source_paths())
            .with_date_format(self.config.sales_date_format.clone())
            .load()
            .context("loading source tables")
    }

    /// Reload every table and fuse it. A missing catalog aborts the request.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.fuse(self.load_sources()?)
    }

    fn fuse(&self, sources: SourceSet) -> Result<Snapshot> {
        let mut filler = self.config.filler();
        let fused = FusionEngine::new(self.policy.health.clone())
            .fuse_sources(&sources, filler.as_mut())
            .context("fusing source tables")?;
        if fused.is_empty() {
            warn!("catalog has no products");
        }
        Ok(Snapshot { sources, fused })
    }

    pub fn fused(&self) -> Result<FusedDataset> {
        Ok(self.snapshot()?.fused)
    }

    pub fn analyze(&self) -> Result<InventoryAnalysis> {
        let snapshot = self.snapshot()?;
        Ok(self.analyze_snapshot(&snapshot))
    }

    fn analyze_snapshot(&self, snapshot: &Snapshot) -> InventoryAnalysis {
        InventoryAnalyzer::new(self.policy.health.clone()).analyze(
            &snapshot.fused.records,
            &snapshot.sources.festivals.rows,
            self.config.evaluation_date,
        )
    }

    fn request(&self, months_ahead: usize, start_month: Option<u32>) -> ForecastRequest {
        ForecastRequest {
            months_ahead,
            start_month,
            as_of: self.config.evaluation_date,
        }
    }

    fn forecast_snapshot(
        &self,
        snapshot: &Snapshot,
        request: ForecastRequest,
    ) -> Result<DemandForecast, PipelineError> {
        DemandForecaster::new(self.policy.forecast.clone()).forecast(
            &snapshot.sources.sales.rows,
            &snapshot.sources.festivals.rows,
            &snapshot.products(),
            request,
        )
    }

    /// `months` defaults to the configured horizon.
    pub fn forecast(&self, months: Option<usize>, start_month: Option<u32>) -> Result<DemandForecast> {
        let snapshot = self.snapshot()?;
        let request = self.request(months.unwrap_or(self.config.forecast_months), start_month);
        Ok(self.forecast_snapshot(&snapshot, request)?)
    }

    pub fn restock(&self, start_month: Option<u32>) -> Result<RestockPlan> {
        let snapshot = self.snapshot()?;
        let request = self.request(self.config.forecast_months, start_month);
        let forecast = self.forecast_snapshot(&snapshot, request)?;
        Ok(RestockPlanner::new(self.policy.forecast.clone()).plan(&forecast, &snapshot.products()))
    }

    /// Historical demand and festival patterns need only the sales log; the forecast
    /// is dropped when the catalog is missing.
    pub fn demand(&self) -> Result<DemandAnalysis> {
        let sources = self.load_sources()?;
        let historical_demand = historical_demand(&sources.sales.rows, self.config.evaluation_date);
        let festival_patterns = festival_patterns(&sources.festivals.rows, &sources.sales.rows);
        let demand_forecast = if sources.catalog.is_some() {
            let snapshot = self.fuse(sources)?;
            let request = self.request(self.config.forecast_months, None);
            Some(self.forecast_snapshot(&snapshot, request)?)
        } else {
            warn!("catalog unavailable; demand analysis carries no forecast");
            None
        };
        Ok(DemandAnalysis {
            historical_demand,
            festival_patterns,
            demand_forecast,
        })
    }

    /// Monthly, seasonal and per-period sales tables. Names fall back to ids without a catalog.
    pub fn sales(&self) -> Result<SalesBreakdown> {
        let sources = self.load_sources()?;
        if sources.catalog.is_none() {
            return Ok(sales_breakdown(&sources.sales.rows, &[]));
        }
        let snapshot = self.fuse(sources)?;
        Ok(sales_breakdown(&snapshot.sources.sales.rows, &snapshot.products()))
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        let snapshot = self.snapshot()?;
        let festival_names =
            validate_festival_names(&snapshot.products(), &snapshot.sources.festivals.rows);
        for gap in &snapshot.fused.gaps {
            warn!(table = %gap.table, column = %gap.column, "schema gap");
        }
        Ok(ValidationReport {
            row_counts: row_counts(&snapshot.sources),
            unavailable: snapshot.sources.unavailable.clone(),
            schema_gaps: snapshot.fused.gaps.clone(),
            festival_names,
        })
    }

    pub async fn upload(&self, table: TableKind, bytes: &[u8]) -> Result<ReplacedSource> {
        SourceStore::new(self.config.source_paths())
            .replace_source(table, bytes)
            .await
            .with_context(|| format!("replacing {table} source"))
    }

    /// Write one `reports/<run_id>/` directory from a fresh snapshot.
    pub async fn run_report(&self) -> Result<ReportRunSummary> {
        let run_id = Uuid::new_v4();
        self.write_report(run_id)
            .instrument(info_span!("report_run", %run_id))
            .await
    }

    async fn write_report(&self, run_id: Uuid) -> Result<ReportRunSummary> {
        let started_at = Utc::now();
        let snapshot = self.snapshot()?;
        let analysis = self.analyze_snapshot(&snapshot);
        let forecast =
            self.forecast_snapshot(&snapshot, self.request(self.config.forecast_months, None))?;
        let products = snapshot.products();
        let sales = sales_breakdown(&snapshot.sources.sales.rows, &products);
        let plan = RestockPlanner::new(self.policy.forecast.clone()).plan(&forecast, &products);
        let inputs = ReportInputs {
            evaluation_date: self.config.evaluation_date,
            focus: top_categories(&plan, FOCUS_CATEGORIES),
            new_products: new_product_recommendations(
                &snapshot.sources.festivals.rows,
                self.config.evaluation_date.month(),
            ),
            records: snapshot.fused.records,
            analysis,
            forecast,
            plan,
            sales,
        };

        let reports_dir = self.config.reports_dir.join(run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        write_json(&reports_dir, "analysis.json", &inputs.analysis).await?;
        write_json(&reports_dir, "forecast.json", &inputs.forecast).await?;
        write_json(&reports_dir, "restock_plan.json", &inputs.plan).await?;
        write_json(&reports_dir, "sales.json", &inputs.sales).await?;

        let page_size = self.config.report_page_size;
        let (inputs, document) = tokio::task::spawn_blocking(move || {
            let document = build_document(&inputs, page_size);
            (inputs, document)
        })
        .await
        .map_err(|err| PipelineError::computation("report rendering", err.to_string()))?;
        write_json(&reports_dir, "report_document.json", &document).await?;
        fs::write(reports_dir.join("brief.md"), render_brief(&inputs, &run_id.to_string()))
            .await
            .context("writing brief.md")?;

        let manifest = export_snapshots(&reports_dir, &inputs.records, &inputs.forecast, &inputs.plan)?;
        let manifest_path = reports_dir.join("snapshots").join("manifest.json");
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing snapshot manifest")?;
        fs::write(&manifest_path, bytes)
            .await
            .with_context(|| format!("writing {}", manifest_path.display()))?;

        let summary = ReportRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            products: inputs.records.len(),
            health_score: inputs.analysis.health_score,
            forecast_months: inputs.forecast.months.len(),
            restock_recommendations: inputs.plan.recommendations().count(),
            pages: document.pages.len(),
            reports_dir: reports_dir.display().to_string(),
            snapshot_manifest: manifest_path.display().to_string(),
        };
        info!(
            products = summary.products,
            pages = summary.pages,
            reports_dir = %summary.reports_dir,
            "report written"
        );
        Ok(summary)
    }
}

async fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    let bytes = serde_json::to_vec_pretty(value).with_context(|| format!("serializing {name}"))?;
    fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub async fn run_report_from_env() -> Result<ReportRunSummary> {
    ReportPipeline::from_env()?.run_report().await
}
