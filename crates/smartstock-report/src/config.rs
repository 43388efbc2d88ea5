use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use smartstock_core::{AnalyticsPolicy, FillerStrategy, FixedFiller, SeededFiller};
use smartstock_storage::{SourcePaths, DEFAULT_SALES_DATE_FORMAT};
use tracing::{info, warn};

pub const POLICY_FILE: &str = "rules/analytics.yaml";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub catalog_file: String,
    pub sales_file: String,
    pub trends_file: String,
    pub festivals_file: String,
    pub reports_dir: PathBuf,
    pub sales_date_format: String,
    /// Seed for schema-gap backfill; the fixed filler is used when absent.
    pub filler_seed: Option<u64>,
    pub evaluation_date: NaiveDate,
    pub forecast_months: usize,
    pub report_page_size: usize,
    pub workspace_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            catalog_file: "catalog.csv".to_string(),
            sales_file: "sales.csv".to_string(),
            trends_file: "trends.csv".to_string(),
            festivals_file: "festivals.csv".to_string(),
            reports_dir: PathBuf::from("./reports"),
            sales_date_format: DEFAULT_SALES_DATE_FORMAT.to_string(),
            filler_seed: None,
            evaluation_date: Utc::now().date_naive(),
            forecast_months: 2,
            report_page_size: 25,
            workspace_root: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("SMARTSTOCK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            catalog_file: std::env::var("SMARTSTOCK_CATALOG_FILE").unwrap_or(defaults.catalog_file),
            sales_file: std::env::var("SMARTSTOCK_SALES_FILE").unwrap_or(defaults.sales_file),
            trends_file: std::env::var("SMARTSTOCK_TRENDS_FILE").unwrap_or(defaults.trends_file),
            festivals_file: std::env::var("SMARTSTOCK_FESTIVALS_FILE")
                .unwrap_or(defaults.festivals_file),
            reports_dir: std::env::var("SMARTSTOCK_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            sales_date_format: std::env::var("SMARTSTOCK_SALES_DATE_FORMAT")
                .unwrap_or(defaults.sales_date_format),
            filler_seed: std::env::var("SMARTSTOCK_FILLER_SEED")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            evaluation_date: std::env::var("SMARTSTOCK_EVALUATION_DATE")
                .ok()
                .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
                .unwrap_or(defaults.evaluation_date),
            forecast_months: std::env::var("SMARTSTOCK_FORECAST_MONTHS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.forecast_months),
            report_page_size: std::env::var("SMARTSTOCK_REPORT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.report_page_size),
            workspace_root: defaults.workspace_root,
        }
    }

    pub fn source_paths(&self) -> SourcePaths {
        SourcePaths {
            catalog: self.data_dir.join(&self.catalog_file),
            sales: self.data_dir.join(&self.sales_file),
            trends: self.data_dir.join(&self.trends_file),
            festivals: self.data_dir.join(&self.festivals_file),
        }
    }

    /// Fresh filler per request so reruns over the same snapshot agree.
    pub fn filler(&self) -> Box<dyn FillerStrategy + Send> {
        match self.filler_seed {
            Some(seed) => Box::new(SeededFiller::new(seed)),
            None => Box::<FixedFiller>::default(),
        }
    }

    pub fn policy_path(&self) -> PathBuf {
        self.workspace_root.join(POLICY_FILE)
    }
}

/// Load the policy file if present; every omitted key keeps its default.
pub fn load_policy(path: &Path) -> Result<AnalyticsPolicy> {
    if !path.exists() {
        return Ok(AnalyticsPolicy::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let policy: AnalyticsPolicy =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if policy != AnalyticsPolicy::default() {
        warn!(path = %path.display(), "policy file overrides default constants");
    } else {
        info!(path = %path.display(), "policy file loaded");
    }
    Ok(policy)
}
