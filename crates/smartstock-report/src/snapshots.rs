//! Parquet snapshots of the fused records, forecast and restock plan for one report run.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array,
    UInt64Array,
};
use arrow_schema::{Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use serde::Serialize;
use smartstock_core::{DemandForecast, FusedProductRecord, RestockPlan};
use smartstock_storage::sha256_hex;

pub const SNAPSHOT_DIR: &str = "snapshots";
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotManifest {
    pub schema_version: u32,
    pub files: Vec<SnapshotFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotFile {
    pub name: String,
    /// Relative to the report directory.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

impl SnapshotFile {
    fn describe(name: &str, report_dir: &Path, path: &Path) -> Result<Self> {
        let content = std::fs::read(path).with_context(|| format!("hashing {}", path.display()))?;
        let relative = path.strip_prefix(report_dir).unwrap_or(path);
        Ok(Self {
            name: name.to_string(),
            path: relative.to_string_lossy().replace('\\', "/"),
            sha256: sha256_hex(&content),
            bytes: content.len() as u64,
        })
    }
}

/// Non-null columns of one snapshot table, in schema order.
struct SnapshotTable {
    name: &'static str,
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
}

impl SnapshotTable {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn column(mut self, name: &str, array: ArrayRef) -> Self {
        self.fields.push(Field::new(name, array.data_type().clone(), false));
        self.columns.push(array);
        self
    }

    fn write(self, report_dir: &Path) -> Result<SnapshotFile> {
        let path = report_dir
            .join(SNAPSHOT_DIR)
            .join(format!("{}.parquet", self.name));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(self.fields)), self.columns)
            .with_context(|| format!("assembling {} columns", self.name))?;
        let props = WriterProperties::builder()
            .set_created_by(format!("smartstock-report {}", env!("CARGO_PKG_VERSION")))
            .set_key_value_metadata(Some(vec![KeyValue::new(
                "smartstock.snapshot".to_string(),
                self.name.to_string(),
            )]))
            .build();

        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .with_context(|| format!("starting {} snapshot", self.name))?;
        writer.write(&batch)?;
        writer
            .close()
            .with_context(|| format!("finishing {}", path.display()))?;
        SnapshotFile::describe(self.name, report_dir, &path)
    }
}

fn ints(values: impl IntoIterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(values))
}

fn texts<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn floats(values: impl IntoIterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

fn flags(values: impl IntoIterator<Item = bool>) -> ArrayRef {
    Arc::new(values.into_iter().map(Some).collect::<BooleanArray>())
}

fn months(values: impl IntoIterator<Item = u32>) -> ArrayRef {
    Arc::new(UInt32Array::from_iter_values(values))
}

fn demand(values: impl IntoIterator<Item = u64>) -> ArrayRef {
    Arc::new(UInt64Array::from_iter_values(values))
}

/// Write the three snapshot tables under `report_dir/snapshots` and return their manifest.
pub fn export_snapshots(
    report_dir: &Path,
    records: &[FusedProductRecord],
    forecast: &DemandForecast,
    plan: &RestockPlan,
) -> Result<SnapshotManifest> {
    let dir = report_dir.join(SNAPSHOT_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let files = vec![
        fused_table(records).write(report_dir)?,
        forecast_table(forecast).write(report_dir)?,
        restock_table(plan).write(report_dir)?,
    ];
    Ok(SnapshotManifest {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        files,
    })
}

fn fused_table(records: &[FusedProductRecord]) -> SnapshotTable {
    SnapshotTable::new("fused_products")
        .column("product_id", ints(records.iter().map(|r| r.product.product_id)))
        .column("name", texts(records.iter().map(|r| &r.product.name)))
        .column("category", texts(records.iter().map(|r| &r.product.category)))
        .column("stock_quantity", ints(records.iter().map(|r| r.product.stock_quantity)))
        .column("total_sold", ints(records.iter().map(|r| r.total_sold)))
        .column(
            "last_sold_date",
            texts(records.iter().map(|r| r.last_sold_date.to_string())),
        )
        .column("trend_score", floats(records.iter().map(|r| r.trend_score)))
        .column("stock_sales_ratio", floats(records.iter().map(|r| r.stock_sales_ratio)))
        .column("days_since_last_sold", ints(records.iter().map(|r| r.days_since_last_sold)))
        .column("is_dead_stock", flags(records.iter().map(|r| r.flags.is_dead_stock)))
        .column("is_overstocked", flags(records.iter().map(|r| r.flags.is_overstocked)))
        .column("is_understocked", flags(records.iter().map(|r| r.flags.is_understocked)))
}

fn forecast_table(forecast: &DemandForecast) -> SnapshotTable {
    let entries: Vec<_> = forecast
        .months
        .iter()
        .flat_map(|m| m.products.values())
        .collect();
    SnapshotTable::new("forecast")
        .column("month", months(entries.iter().map(|e| e.target_month)))
        .column("product_id", ints(entries.iter().map(|e| e.product_id)))
        .column("forecasted_demand", demand(entries.iter().map(|e| e.forecasted_demand)))
        .column("reason", texts(entries.iter().map(|e| &e.reason)))
}

fn restock_table(plan: &RestockPlan) -> SnapshotTable {
    let recs: Vec<_> = plan.recommendations().collect();
    SnapshotTable::new("restock_plan")
        .column("month", months(recs.iter().map(|r| r.month)))
        .column("product_id", ints(recs.iter().map(|r| r.product_id)))
        .column("category", texts(recs.iter().map(|r| &r.category)))
        .column("current_stock", ints(recs.iter().map(|r| r.current_stock)))
        .column("forecasted_demand", demand(recs.iter().map(|r| r.forecasted_demand)))
        .column("recommended_restock", ints(recs.iter().map(|r| r.recommended_restock)))
        .column("demand_class", texts(recs.iter().map(|r| r.demand_class.label())))
        .column("reason", texts(recs.iter().map(|r| &r.reason)))
        .column("cost", floats(recs.iter().map(|r| r.cost)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use smartstock_core::{ForecastEntry, MonthForecast};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn forecast_snapshot_records_rows_and_writer_metadata() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(SNAPSHOT_DIR)).unwrap();
        let forecast = DemandForecast {
            months: vec![MonthForecast {
                month: 10,
                products: BTreeMap::from([(
                    3,
                    ForecastEntry {
                        product_id: 3,
                        target_month: 10,
                        forecasted_demand: 12,
                        reason: "Diwali".into(),
                    },
                )]),
            }],
        };

        let file = forecast_table(&forecast).write(dir.path()).unwrap();
        assert_eq!(file.path, "snapshots/forecast.parquet");
        assert_eq!(file.sha256.len(), 64);

        let reader =
            SerializedFileReader::new(File::open(dir.path().join(&file.path)).unwrap()).unwrap();
        let meta = reader.metadata().file_metadata();
        assert_eq!(meta.num_rows(), 1);
        assert!(meta.created_by().unwrap().starts_with("smartstock-report"));
        let tags = meta.key_value_metadata().unwrap();
        assert!(tags
            .iter()
            .any(|kv| kv.key == "smartstock.snapshot" && kv.value.as_deref() == Some("forecast")));
        assert_eq!(meta.schema_descr().num_columns(), 4);
    }
}
