//! The tabular input to a profiling run.
//!
//! A [`TableHandle`] wraps a DataFusion [`SessionContext`] with the data
//! registered as a partitioned [`MemTable`]. Reductions (counts, distinct
//! counts, duplicates, value frequencies) run as SQL aggregates so the
//! engine can parallelize them across partitions. Row counts and memory
//! footprint are read from batch metadata without a scan.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use datafusion::datasource::MemTable;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{ProfileError, ProfileResult};
use crate::log_query;
use crate::logging::LogConfig;
use crate::security::SqlSecurity;

/// Name under which the input is registered in the session.
const TABLE_NAME: &str = "profile_input";

/// Coarse element type of a column, derived from its Arrow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredType {
    Numeric,
    Text,
    Datetime,
    Boolean,
    Unknown,
}

impl DeclaredType {
    /// Maps an Arrow data type onto the declared-type categories.
    pub fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => DeclaredType::Numeric,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => DeclaredType::Text,
            DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time32(_)
            | DataType::Time64(_) => DeclaredType::Datetime,
            DataType::Boolean => DeclaredType::Boolean,
            DataType::Dictionary(_, value) => DeclaredType::from_arrow(value),
            _ => DeclaredType::Unknown,
        }
    }

    pub fn is_numeric(self) -> bool {
        self == DeclaredType::Numeric
    }

    pub fn is_text(self) -> bool {
        self == DeclaredType::Text
    }
}

impl std::fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeclaredType::Numeric => "numeric",
            DeclaredType::Text => "text",
            DeclaredType::Datetime => "datetime",
            DeclaredType::Boolean => "boolean",
            DeclaredType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Per-column counts from a single aggregate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCounts {
    pub name: String,
    pub non_null: u64,
    pub nulls: u64,
    pub distinct: u64,
}

/// A read-only handle over a possibly partitioned table.
#[derive(Clone)]
pub struct TableHandle {
    name: String,
    ctx: SessionContext,
    schema: SchemaRef,
    partitions: Arc<Vec<Vec<RecordBatch>>>,
    log_config: LogConfig,
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("name", &self.name)
            .field("columns", &self.schema.fields().len())
            .field("partitions", &self.partitions.len())
            .field("rows", &self.row_count())
            .finish()
    }
}

impl TableHandle {
    /// Registers pre-partitioned batches. Each inner vector is one partition.
    pub fn from_partitions(
        name: impl Into<String>,
        schema: SchemaRef,
        mut partitions: Vec<Vec<RecordBatch>>,
    ) -> ProfileResult<Self> {
        let name = name.into();
        if partitions.is_empty() {
            partitions.push(vec![]);
        }

        let table = MemTable::try_new(schema.clone(), partitions.clone())
            .map_err(|e| ProfileError::load(&name, e.to_string()))?;
        let ctx = SessionContext::new();
        ctx.register_table(TABLE_NAME, Arc::new(table))
            .map_err(|e| ProfileError::load(&name, e.to_string()))?;

        Ok(Self {
            name,
            ctx,
            schema,
            partitions: Arc::new(partitions),
            log_config: LogConfig::default(),
        })
    }

    /// Controls whether generated SQL and sampling plans are logged.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    /// Registers a single batch as a one-partition table.
    pub fn from_batch(name: impl Into<String>, batch: RecordBatch) -> ProfileResult<Self> {
        let schema = batch.schema();
        Self::from_partitions(name, schema, vec![vec![batch]])
    }

    /// Loads a CSV file, keeping the physical partitioning DataFusion reads it with.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn from_csv(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let path_str = path
            .to_str()
            .ok_or_else(|| ProfileError::load(&display, "path is not valid UTF-8"))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let ctx = SessionContext::new();
        let options = CsvReadOptions::new().file_extension(&extension);
        let df = ctx
            .read_csv(path_str, options)
            .await
            .map_err(|e| ProfileError::load(&display, e.to_string()))?;
        let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
        let partitions = df
            .collect_partitioned()
            .await
            .map_err(|e| ProfileError::load(&display, e.to_string()))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&display)
            .to_string();
        let handle = Self::from_partitions(name, schema, partitions)?;
        info!(
            rows = handle.row_count(),
            columns = handle.column_count(),
            partitions = handle.partition_count(),
            "Loaded CSV input"
        );
        Ok(handle)
    }

    /// Dataset name used in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.schema.fields().len()
    }

    /// Index of a column, or `ColumnNotFound`.
    pub fn column_index(&self, column: &str) -> ProfileResult<usize> {
        self.schema
            .index_of(column)
            .map_err(|_| ProfileError::column_not_found(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.schema.index_of(column).is_ok()
    }

    /// Declared type of a column, or `ColumnNotFound`.
    pub fn declared_type(&self, column: &str) -> ProfileResult<DeclaredType> {
        let idx = self.column_index(column)?;
        Ok(DeclaredType::from_arrow(self.schema.field(idx).data_type()))
    }

    /// Total row count from batch metadata.
    pub fn row_count(&self) -> usize {
        self.partition_sizes().iter().sum()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Row count of each partition, in partition order.
    pub fn partition_sizes(&self) -> Vec<usize> {
        self.partitions
            .iter()
            .map(|p| p.iter().map(|b| b.num_rows()).sum())
            .collect()
    }

    /// In-memory size of each column, summed across batches.
    pub fn memory_bytes_per_column(&self) -> Vec<u64> {
        let mut sizes = vec![0u64; self.column_count()];
        for batch in self.partitions.iter().flatten() {
            for (idx, size) in sizes.iter_mut().enumerate() {
                *size += batch.column(idx).get_array_memory_size() as u64;
            }
        }
        sizes
    }

    /// The quoted name of the registered table, for building SQL.
    pub fn table_ref(&self) -> String {
        format!("\"{TABLE_NAME}\"")
    }

    /// Quotes a column name after checking it exists.
    pub fn quoted_column(&self, column: &str) -> ProfileResult<String> {
        self.column_index(column)?;
        SqlSecurity::quote_identifier(column)
    }

    /// Executes SQL against the session and collects the result.
    pub async fn query(&self, sql: &str) -> ProfileResult<Vec<RecordBatch>> {
        log_query!(self.log_config, sql);
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    /// Null, non-null and distinct counts for every column in one query.
    #[instrument(skip(self), fields(table = %self.name))]
    pub async fn column_counts(&self) -> ProfileResult<Vec<ColumnCounts>> {
        let names = self.column_names();
        if names.is_empty() {
            return Ok(vec![]);
        }

        let mut exprs = vec!["COUNT(*) AS total_rows".to_string()];
        for (idx, name) in names.iter().enumerate() {
            let col = SqlSecurity::quote_identifier(name)?;
            exprs.push(format!("COUNT({col}) AS non_null_{idx}"));
            exprs.push(format!("COUNT(DISTINCT {col}) AS distinct_{idx}"));
        }
        let sql = format!("SELECT {} FROM {}", exprs.join(", "), self.table_ref());
        let batches = self.query(&sql).await?;
        let batch = first_row_batch(&batches)?;

        let total = extract_u64(batch, 0, "total_rows")?;
        let mut counts = Vec::with_capacity(names.len());
        for (idx, name) in names.into_iter().enumerate() {
            let non_null = extract_u64(batch, 1 + idx * 2, "non_null")?;
            let distinct = extract_u64(batch, 2 + idx * 2, "distinct")?;
            counts.push(ColumnCounts {
                name,
                non_null,
                nulls: total.saturating_sub(non_null),
                distinct,
            });
        }
        Ok(counts)
    }

    /// Number of rows that repeat an earlier row exactly.
    #[instrument(skip(self), fields(table = %self.name))]
    pub async fn duplicate_row_count(&self) -> ProfileResult<u64> {
        let rows = self.row_count() as u64;
        if rows == 0 || self.column_count() == 0 {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) AS distinct_rows FROM (SELECT DISTINCT * FROM {})",
            self.table_ref()
        );
        let batches = self.query(&sql).await?;
        let distinct = extract_u64(first_row_batch(&batches)?, 0, "distinct_rows")?;
        Ok(rows.saturating_sub(distinct))
    }

    /// Counts rows matching a SQL predicate.
    pub async fn count_where(&self, predicate: &str) -> ProfileResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS matches FROM {} WHERE {predicate}",
            self.table_ref()
        );
        let batches = self.query(&sql).await?;
        extract_u64(first_row_batch(&batches)?, 0, "matches")
    }

    /// Non-null finite values of a column cast to `f64`.
    pub async fn numeric_values(&self, column: &str) -> ProfileResult<Vec<f64>> {
        let col = self.quoted_column(column)?;
        let sql = format!(
            "SELECT CAST({col} AS DOUBLE) AS v FROM {} WHERE {col} IS NOT NULL",
            self.table_ref()
        );
        let batches = self.query(&sql).await?;
        let mut values = Vec::new();
        for batch in &batches {
            let arr = batch
                .column(0)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    ProfileError::invalid_data(format!("Expected DOUBLE values for {column}"))
                })?;
            values.extend(arr.iter().flatten().filter(|v| v.is_finite()));
        }
        Ok(values)
    }

    /// Most frequent values of a column as strings, ties broken by value.
    pub async fn value_counts(&self, column: &str, limit: usize) -> ProfileResult<Vec<(String, u64)>> {
        let col = self.quoted_column(column)?;
        let sql = format!(
            "SELECT v, COUNT(*) AS cnt FROM \
             (SELECT CAST({col} AS VARCHAR) AS v FROM {} WHERE {col} IS NOT NULL) \
             GROUP BY v ORDER BY cnt DESC, v ASC LIMIT {limit}",
            self.table_ref()
        );
        let batches = self.query(&sql).await?;
        let mut counts = Vec::new();
        for batch in &batches {
            let values = stringify_column(batch.column(0).as_ref())?;
            for (row, value) in values.into_iter().enumerate() {
                let count = extract_u64_at(batch, 1, row, "cnt")?;
                counts.push((value.unwrap_or_default(), count));
            }
        }
        Ok(counts)
    }

    /// Minimum and maximum of a column rendered as strings.
    pub async fn min_max_strings(&self, column: &str) -> ProfileResult<Option<(String, String)>> {
        let col = self.quoted_column(column)?;
        let sql = format!(
            "SELECT CAST(MIN({col}) AS VARCHAR) AS lo, CAST(MAX({col}) AS VARCHAR) AS hi FROM {}",
            self.table_ref()
        );
        let batches = self.query(&sql).await?;
        let batch = first_row_batch(&batches)?;
        let lo = stringify_column(batch.column(0).as_ref())?;
        let hi = stringify_column(batch.column(1).as_ref())?;
        match (lo.into_iter().next().flatten(), hi.into_iter().next().flatten()) {
            (Some(lo), Some(hi)) => Ok(Some((lo, hi))),
            _ => Ok(None),
        }
    }

    /// The whole table as one batch.
    pub fn materialize_all(&self) -> ProfileResult<RecordBatch> {
        let batches: Vec<RecordBatch> = self.partitions.iter().flatten().cloned().collect();
        Ok(concat_batches(&self.schema, &batches)?)
    }

    /// The first `limit` rows of the table in partition order.
    pub fn head(&self, limit: usize) -> ProfileResult<RecordBatch> {
        let batches: Vec<RecordBatch> = self.partitions.iter().flatten().cloned().collect();
        let taken = take_rows(&batches, limit);
        Ok(concat_batches(&self.schema, &taken)?)
    }

    /// The first `limit` rows of one partition.
    pub fn partition_head(&self, partition: usize, limit: usize) -> ProfileResult<Vec<RecordBatch>> {
        let batches = self.partitions.get(partition).ok_or_else(|| {
            ProfileError::internal(format!("Partition {partition} does not exist"))
        })?;
        Ok(take_rows(batches, limit))
    }
}

/// Slices at most `limit` leading rows out of a batch sequence.
fn take_rows(batches: &[RecordBatch], limit: usize) -> Vec<RecordBatch> {
    let mut remaining = limit;
    let mut taken = Vec::new();
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let rows = batch.num_rows().min(remaining);
        if rows > 0 {
            taken.push(batch.slice(0, rows));
            remaining -= rows;
        }
    }
    taken
}

fn first_row_batch(batches: &[RecordBatch]) -> ProfileResult<&RecordBatch> {
    batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| ProfileError::internal("Aggregate query returned no rows"))
}

/// Reads an integer count from the first row of a column.
pub(crate) fn extract_u64(batch: &RecordBatch, col_idx: usize, col_name: &str) -> ProfileResult<u64> {
    extract_u64_at(batch, col_idx, 0, col_name)
}

pub(crate) fn extract_u64_at(
    batch: &RecordBatch,
    col_idx: usize,
    row: usize,
    col_name: &str,
) -> ProfileResult<u64> {
    let column = batch.column(col_idx);
    if column.is_null(row) {
        return Err(ProfileError::invalid_data(format!(
            "Null value in {col_name} column"
        )));
    }

    if let Some(arr) = column.as_any().downcast_ref::<Int64Array>() {
        Ok(arr.value(row).max(0) as u64)
    } else if let Some(arr) = column.as_any().downcast_ref::<UInt64Array>() {
        Ok(arr.value(row))
    } else {
        Err(ProfileError::invalid_data(format!(
            "Expected integer for {col_name}"
        )))
    }
}

/// Reads a nullable float from the first row of a column.
pub(crate) fn extract_optional_f64(batch: &RecordBatch, col_idx: usize) -> Option<f64> {
    let column = batch.column(col_idx);
    if column.is_null(0) {
        return None;
    }
    column
        .as_any()
        .downcast_ref::<Float64Array>()
        .map(|arr| arr.value(0))
}

/// Renders every value of an array as a string; nulls stay `None`.
pub fn stringify_column(array: &dyn Array) -> ProfileResult<Vec<Option<String>>> {
    if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        return Ok(strings.iter().map(|v| v.map(str::to_string)).collect());
    }

    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    Ok((0..array.len())
        .map(|i| {
            if array.is_null(i) {
                None
            } else {
                Some(formatter.value(i).to_string())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{customers_batch, partitioned_table};
    use arrow::datatypes::{Field, Schema, TimeUnit};

    #[test]
    fn test_declared_types() {
        assert_eq!(DeclaredType::from_arrow(&DataType::Int32), DeclaredType::Numeric);
        assert_eq!(DeclaredType::from_arrow(&DataType::Float64), DeclaredType::Numeric);
        assert_eq!(DeclaredType::from_arrow(&DataType::Utf8), DeclaredType::Text);
        assert_eq!(
            DeclaredType::from_arrow(&DataType::Timestamp(TimeUnit::Millisecond, None)),
            DeclaredType::Datetime
        );
        assert_eq!(DeclaredType::from_arrow(&DataType::Boolean), DeclaredType::Boolean);
        assert_eq!(
            DeclaredType::from_arrow(&DataType::Dictionary(
                Box::new(DataType::Int32),
                Box::new(DataType::Utf8)
            )),
            DeclaredType::Text
        );
        assert_eq!(DeclaredType::from_arrow(&DataType::Binary), DeclaredType::Unknown);
    }

    #[tokio::test]
    async fn test_column_counts() {
        let table = TableHandle::from_batch("customers", customers_batch()).unwrap();
        let counts = table.column_counts().await.unwrap();

        let id = counts.iter().find(|c| c.name == "id").unwrap();
        assert_eq!(id.distinct, 10);
        assert_eq!(id.nulls, 0);

        let country = counts.iter().find(|c| c.name == "country").unwrap();
        assert_eq!(country.distinct, 1);

        let age = counts.iter().find(|c| c.name == "age").unwrap();
        assert_eq!(age.nulls, 2);
        assert_eq!(age.non_null, 8);
    }

    #[tokio::test]
    async fn test_duplicates_and_values() {
        let table = TableHandle::from_batch("customers", customers_batch()).unwrap();
        assert_eq!(table.duplicate_row_count().await.unwrap(), 0);

        let values = table.numeric_values("age").await.unwrap();
        assert_eq!(values.len(), 8);

        let counts = table.value_counts("country", 5).await.unwrap();
        assert_eq!(counts, vec![("US".to_string(), 10)]);
    }

    #[tokio::test]
    async fn test_partitions_and_heads() {
        let table = partitioned_table(&[3, 0, 5]).unwrap();
        assert_eq!(table.partition_sizes(), vec![3, 0, 5]);
        assert_eq!(table.row_count(), 8);
        assert_eq!(table.head(4).unwrap().num_rows(), 4);
        let head: usize = table
            .partition_head(2, 2)
            .unwrap()
            .iter()
            .map(|b| b.num_rows())
            .sum();
        assert_eq!(head, 2);
        assert!(table.partition_head(7, 1).is_err());
        assert_eq!(table.materialize_all().unwrap().num_rows(), 8);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        let table = TableHandle::from_partitions("empty", schema, vec![]).unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.partition_count(), 1);
        assert_eq!(table.duplicate_row_count().await.unwrap(), 0);
        let counts = table.column_counts().await.unwrap();
        assert_eq!(counts[0].distinct, 0);
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let table = TableHandle::from_batch("customers", customers_batch()).unwrap();
        let err = table.numeric_values("missing").await.unwrap_err();
        assert!(matches!(err, ProfileError::ColumnNotFound { .. }));
    }

    #[tokio::test]
    async fn test_csv_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,score\nann,1.5\nbob,2.5\ncid,3.0\n").unwrap();

        let table = TableHandle::from_csv(&path).await.unwrap();
        assert_eq!(table.name(), "people.csv");
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.declared_type("score").unwrap(), DeclaredType::Numeric);

        let missing = TableHandle::from_csv(dir.path().join("nope.csv")).await;
        assert!(matches!(missing, Err(ProfileError::Load { .. })));
    }

    #[test]
    fn test_stringify_column() {
        let arr = Int64Array::from(vec![Some(1), None, Some(3)]);
        let values = stringify_column(&arr).unwrap();
        assert_eq!(values, vec![Some("1".into()), None, Some("3".into())]);
    }
}
