//! Tabular source loading and upload storage for SmartStock.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use smartstock_core::{
    CatalogColumn, CatalogRow, FestivalTag, ProductId, SalesRecord, SchemaGap, TableKind,
    TrendRecord,
};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "smartstock-storage";

pub const DEFAULT_SALES_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not read {table} source {path}: {source}")]
    Unavailable {
        table: TableKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {table} source {path}: {source}")]
    Csv {
        table: TableKind,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{table} source is missing required columns: {}", .missing.join(", "))]
    MissingColumns { table: TableKind, missing: Vec<String> },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where each logical table lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub catalog: PathBuf,
    pub sales: PathBuf,
    pub trends: PathBuf,
    pub festivals: PathBuf,
}

impl SourcePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            catalog: dir.join("catalog.csv"),
            sales: dir.join("sales.csv"),
            trends: dir.join("trends.csv"),
            festivals: dir.join("festivals.csv"),
        }
    }

    pub fn path_for(&self, table: TableKind) -> &Path {
        match table {
            TableKind::Catalog => &self.catalog,
            TableKind::Sales => &self.sales,
            TableKind::Trends => &self.trends,
            TableKind::Festivals => &self.festivals,
        }
    }
}

/// Rows of one table plus the expected columns it did not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable<T> {
    pub rows: Vec<T>,
    pub gaps: Vec<SchemaGap>,
}

impl<T> Default for LoadedTable<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            gaps: Vec::new(),
        }
    }
}

/// The four tables of one request. Only the catalog may be absent; the rest read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSet {
    pub catalog: Option<LoadedTable<CatalogRow>>,
    pub sales: LoadedTable<SalesRecord>,
    pub trends: LoadedTable<TrendRecord>,
    pub festivals: LoadedTable<FestivalTag>,
    pub unavailable: Vec<TableKind>,
}

impl SourceSet {
    pub fn gaps(&self) -> impl Iterator<Item = &SchemaGap> {
        self.catalog
            .iter()
            .flat_map(|c| c.gaps.iter())
            .chain(self.sales.gaps.iter())
            .chain(self.trends.gaps.iter())
            .chain(self.festivals.gaps.iter())
    }
}

#[derive(Debug, Clone)]
pub struct SourceLoader {
    paths: SourcePaths,
    date_format: String,
}

impl SourceLoader {
    pub fn new(paths: SourcePaths) -> Self {
        Self {
            paths,
            date_format: DEFAULT_SALES_DATE_FORMAT.to_string(),
        }
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    pub fn paths(&self) -> &SourcePaths {
        &self.paths
    }

    /// Load every table independently. A missing file is tolerated; an unreadable one is not.
    pub fn load(&self) -> Result<SourceSet, SourceError> {
        let span = info_span!("load_sources");
        let _guard = span.enter();

        let mut set = SourceSet::default();
        match self.open(TableKind::Catalog)? {
            Some(reader) => set.catalog = Some(self.read_catalog(reader)?),
            None => set.unavailable.push(TableKind::Catalog),
        }
        set.sales = self.load_optional(TableKind::Sales, &mut set.unavailable, |r| self.read_sales(r));
        set.trends =
            self.load_optional(TableKind::Trends, &mut set.unavailable, |r| self.read_trends(r));
        set.festivals = self.load_optional(TableKind::Festivals, &mut set.unavailable, |r| {
            self.read_festivals(r)
        });

        info!(
            catalog = set.catalog.as_ref().map(|c| c.rows.len()).unwrap_or(0),
            sales = set.sales.rows.len(),
            trends = set.trends.rows.len(),
            festivals = set.festivals.rows.len(),
            unavailable = set.unavailable.len(),
            "sources loaded"
        );
        Ok(set)
    }

    /// Any failure on a non-catalog table degrades it to empty and marks it unavailable.
    fn load_optional<T>(
        &self,
        table: TableKind,
        unavailable: &mut Vec<TableKind>,
        read: impl FnOnce(TableReader) -> Result<LoadedTable<T>, SourceError>,
    ) -> LoadedTable<T> {
        match self.open(table).and_then(|reader| reader.map(read).transpose()) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                unavailable.push(table);
                LoadedTable::default()
            }
            Err(err) => {
                warn!(%table, error = %err, "source unreadable; reading as empty");
                unavailable.push(table);
                LoadedTable::default()
            }
        }
    }

    fn open(&self, table: TableKind) -> Result<Option<TableReader>, SourceError> {
        let path = self.paths.path_for(table);
        match std::fs::File::open(path) {
            Ok(file) => TableReader::new(table, path, file).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(%table, path = %path.display(), "source unavailable; reading as empty");
                Ok(None)
            }
            Err(source) => Err(SourceError::Unavailable {
                table,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn read_catalog(&self, mut reader: TableReader) -> Result<LoadedTable<CatalogRow>, SourceError> {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row()? {
            rows.push(CatalogRow {
                product_id: row.parse(CatalogColumn::ProductId.as_str()),
                name: row.text(CatalogColumn::Name.as_str()),
                category: row.text(CatalogColumn::Category.as_str()),
                price: row.parse(CatalogColumn::Price.as_str()),
                cost: row.parse(CatalogColumn::Cost.as_str()),
                status: row.text(CatalogColumn::Status.as_str()),
                stock_quantity: row.parse(CatalogColumn::StockQuantity.as_str()),
                restock_threshold: row.parse(CatalogColumn::RestockThreshold.as_str()),
            });
        }
        let expected = CatalogColumn::ALL.map(|c| c.as_str());
        Ok(reader.finish(rows, &expected))
    }

    pub fn read_sales(&self, mut reader: TableReader) -> Result<LoadedTable<SalesRecord>, SourceError> {
        let mut rows = Vec::new();
        let mut unparsed_dates = 0usize;
        let mut skipped = 0usize;
        while let Some(row) = reader.next_row()? {
            let Some(product_id) = row.parse::<ProductId>("product_id") else {
                skipped += 1;
                continue;
            };
            let raw_date = row.text("sales_date");
            let sales_date = raw_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, &self.date_format).ok());
            if sales_date.is_none() {
                unparsed_dates += 1;
            }
            rows.push(SalesRecord {
                product_id,
                quantity_sold: row.parse("quantity_sold").unwrap_or(0),
                sales_date,
                sales_month: row.parse::<u32>("sales_month").filter(|m| (1..=12).contains(m)),
            });
        }
        if unparsed_dates > 0 {
            warn!(
                rows = unparsed_dates,
                format = %self.date_format,
                "sales dates did not parse; kept as unparsed"
            );
        }
        if skipped > 0 {
            warn!(rows = skipped, "sales rows without a product id skipped");
        }
        Ok(reader.finish(rows, TableKind::Sales.required_columns()))
    }

    pub fn read_trends(&self, mut reader: TableReader) -> Result<LoadedTable<TrendRecord>, SourceError> {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row()? {
            let (Some(product_id), Some(month)) = (row.parse("product_id"), row.parse("month")) else {
                continue;
            };
            rows.push(TrendRecord {
                product_id,
                month,
                trend_score: row.parse("trend_score").unwrap_or(0.0),
            });
        }
        Ok(reader.finish(rows, TableKind::Trends.required_columns()))
    }

    pub fn read_festivals(&self, mut reader: TableReader) -> Result<LoadedTable<FestivalTag>, SourceError> {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row()? {
            let (Some(product_name), Some(month)) = (row.text("product_name"), row.parse("month"))
            else {
                continue;
            };
            rows.push(FestivalTag {
                product_name,
                month,
                festival: row.text("festival"),
                season: row.text("season"),
                tags: row.text("tags"),
            });
        }
        Ok(reader.finish(rows, TableKind::Festivals.required_columns()))
    }
}

/// Header-aware CSV reader for one table. Columns are looked up by name so
/// absent columns surface as gaps instead of parse failures.
pub struct TableReader {
    table: TableKind,
    path: PathBuf,
    columns: HashMap<String, usize>,
    reader: csv::Reader<Box<dyn Read>>,
    record: csv::StringRecord,
    lossy_rows: usize,
}

impl TableReader {
    pub fn new(table: TableKind, path: &Path, input: impl Read + 'static) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(Box::new(input) as Box<dyn Read>);
        let columns = reader
            .headers()
            .map_err(|source| SourceError::Csv {
                table,
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim_start_matches('\u{feff}').to_string(), idx))
            .collect();
        Ok(Self {
            table,
            path: path.to_path_buf(),
            columns,
            reader,
            record: csv::StringRecord::new(),
            lossy_rows: 0,
        })
    }

    pub fn from_bytes(table: TableKind, bytes: Vec<u8>) -> Result<Self, SourceError> {
        Self::new(table, Path::new(table.as_str()), io::Cursor::new(bytes))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Next row; cells that are not valid UTF-8 are decoded lossily and counted.
    fn next_row(&mut self) -> Result<Option<RowView<'_>>, SourceError> {
        let mut bytes = std::mem::take(&mut self.record).into_byte_record();
        let more = self
            .reader
            .read_byte_record(&mut bytes)
            .map_err(|source| SourceError::Csv {
                table: self.table,
                path: self.path.clone(),
                source,
            })?;
        self.record = match csv::StringRecord::from_byte_record(bytes) {
            Ok(record) => record,
            Err(err) => {
                self.lossy_rows += 1;
                csv::StringRecord::from_byte_record_lossy(err.into_byte_record())
            }
        };
        Ok(more.then(|| RowView {
            columns: &self.columns,
            record: &self.record,
        }))
    }

    fn finish<T>(self, rows: Vec<T>, expected: &[&str]) -> LoadedTable<T> {
        let gaps: Vec<SchemaGap> = expected
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| SchemaGap {
                table: self.table,
                column: (*c).to_string(),
            })
            .collect();
        for gap in &gaps {
            warn!(table = %gap.table, column = %gap.column, "expected column missing from source");
        }
        if self.lossy_rows > 0 {
            warn!(table = %self.table, rows = self.lossy_rows, "rows with invalid UTF-8 decoded lossily");
        }
        debug!(table = %self.table, rows = rows.len(), "table read");
        LoadedTable { rows, gaps }
    }
}

struct RowView<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl RowView<'_> {
    fn cell(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|idx| self.record.get(*idx))
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
    }

    fn text(&self, column: &str) -> Option<String> {
        self.cell(column).map(str::to_string)
    }

    fn parse<T: std::str::FromStr>(&self, column: &str) -> Option<T> {
        self.cell(column).and_then(|v| v.parse().ok())
    }
}

/// Columns of `table` that the given CSV header line does not carry.
pub fn missing_columns(table: TableKind, bytes: &[u8]) -> Result<Vec<String>, SourceError> {
    let reader = TableReader::from_bytes(table, bytes.to_vec())?;
    Ok(table
        .required_columns()
        .iter()
        .filter(|c| !reader.has_column(c))
        .map(|c| c.to_string())
        .collect())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedSource {
    pub table: TableKind,
    pub path: PathBuf,
    pub content_hash: String,
    pub byte_size: usize,
}

/// Whole-file replacement of source tables. Last write wins.
#[derive(Debug, Clone)]
pub struct SourceStore {
    paths: SourcePaths,
}

impl SourceStore {
    pub fn new(paths: SourcePaths) -> Self {
        Self { paths }
    }

    /// Validate column presence, then swap the table's file in via temp file and rename.
    pub async fn replace_source(&self, table: TableKind, bytes: &[u8]) -> anyhow::Result<ReplacedSource> {
        let missing = missing_columns(table, bytes)?;
        if !missing.is_empty() {
            return Err(SourceError::MissingColumns { table, missing }.into());
        }

        let path = self.paths.path_for(table).to_path_buf();
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating source directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.{}.tmp", table, Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp source file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp source file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp source file {}", temp_path.display()))?;
        drop(file);

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SourceError::Write { path, source }.into());
        }

        let replaced = ReplacedSource {
            table,
            path,
            content_hash: sha256_hex(bytes),
            byte_size: bytes.len(),
        };
        info!(
            %table,
            path = %replaced.path.display(),
            bytes = replaced.byte_size,
            sha256 = %replaced.content_hash,
            "source replaced"
        );
        Ok(replaced)
    }
}

/// Row counts per table, for status output.
pub fn row_counts(set: &SourceSet) -> BTreeMap<TableKind, usize> {
    let mut counts = BTreeMap::new();
    if let Some(catalog) = &set.catalog {
        counts.insert(TableKind::Catalog, catalog.rows.len());
    }
    counts.insert(TableKind::Sales, set.sales.rows.len());
    counts.insert(TableKind::Trends, set.trends.rows.len());
    counts.insert(TableKind::Festivals, set.festivals.rows.len());
    counts
}
