//! Structural checks run by the overview: duplicate columns, PII hints,
//! memory tips, composite keys, the inferred SQL schema and alerts.

use std::collections::HashSet;

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use super::overview::ColumnDescriptor;
use crate::classifier::TypeLabel;
use crate::config::ProfileConfig;
use crate::error::ProfileResult;
use crate::sampling::PartitionStats;
use crate::security::SqlSecurity;
use crate::stats::round_to;
use crate::table::DeclaredType;

/// Name fragments that hint at personal data. Short keywords must match a
/// whole name token; longer ones may appear anywhere in the name.
const PII_KEYWORDS: [&str; 9] = [
    "name", "email", "phone", "address", "ssn", "social", "credit", "card", "ip",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateColumn {
    pub column: String,
    pub duplicate_of: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub column: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiRisk {
    pub column: String,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTip {
    pub column: String,
    pub current_type: String,
    pub suggested_type: String,
    pub reason: String,
}

/// Dataset-level structural findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralReport {
    pub duplicate_columns: Vec<DuplicateColumn>,
    pub top_memory_columns: Vec<MemoryUsage>,
    pub pii_risks: Vec<PiiRisk>,
    pub optimization_tips: Vec<OptimizationTip>,
    pub composite_keys: Vec<Vec<String>>,
    pub sql_schema: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PartitionSkew,
    ConstantColumn,
    EmptyColumn,
    QuasiConstant,
    MixedTypes,
    LongStrings,
    PiiRisk,
}

/// A data-quality warning raised by the overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub column: Option<String>,
    pub message: String,
}

impl Alert {
    fn column(kind: AlertKind, column: &str, message: String) -> Self {
        Self {
            kind,
            column: Some(column.to_string()),
            message,
        }
    }
}

/// Later columns whose sampled values equal an earlier column.
pub fn duplicate_columns(names: &[String], values: &[Vec<Option<String>>]) -> Vec<DuplicateColumn> {
    let mut duplicates = Vec::new();
    if values.first().map_or(true, Vec::is_empty) {
        return duplicates;
    }
    for j in 1..names.len() {
        if let Some(i) = (0..j).find(|&i| values[i] == values[j]) {
            duplicates.push(DuplicateColumn {
                column: names[j].clone(),
                duplicate_of: names[i].clone(),
            });
        }
    }
    duplicates
}

/// The largest columns by in-memory size.
pub fn top_memory_columns(descriptors: &[ColumnDescriptor], limit: usize) -> Vec<MemoryUsage> {
    let mut usage: Vec<MemoryUsage> = descriptors
        .iter()
        .map(|d| MemoryUsage {
            column: d.name.clone(),
            bytes: d.memory_bytes,
        })
        .collect();
    usage.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.column.cmp(&b.column)));
    usage.truncate(limit);
    usage
}

/// Columns whose names suggest personal data.
pub fn pii_risks(names: &[String]) -> Vec<PiiRisk> {
    names
        .iter()
        .filter_map(|name| {
            let lower = name.to_lowercase();
            let tokens: Vec<&str> = lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|t| !t.is_empty())
                .collect();
            PII_KEYWORDS
                .iter()
                .find(|&&keyword| {
                    if keyword.len() <= 3 {
                        tokens.iter().any(|t| *t == keyword)
                    } else {
                        lower.contains(keyword)
                    }
                })
                .map(|keyword| PiiRisk {
                    column: name.clone(),
                    keyword: keyword.to_string(),
                })
        })
        .collect()
}

/// Narrower integer type that holds `[min, max]`, if any.
fn narrower_int(min: i64, max: i64) -> Option<&'static str> {
    if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        Some("Int8")
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        Some("Int16")
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        Some("Int32")
    } else {
        None
    }
}

/// Memory-saving type suggestions. `int_ranges` holds the min/max of each
/// Int64 column when known.
pub fn optimization_tips(
    descriptors: &[ColumnDescriptor],
    data_types: &[DataType],
    int_ranges: &[Option<(i64, i64)>],
    row_count: u64,
    limit: usize,
) -> Vec<OptimizationTip> {
    let mut tips = Vec::new();
    for ((descriptor, data_type), range) in descriptors.iter().zip(data_types).zip(int_ranges) {
        let tip = match data_type {
            DataType::Float64 => Some((
                "Float32".to_string(),
                "Single precision is usually sufficient for profiling-scale values".to_string(),
            )),
            DataType::Int64 => range.and_then(|(min, max)| {
                narrower_int(min, max).map(|target| {
                    (
                        target.to_string(),
                        format!("Values range from {min} to {max}"),
                    )
                })
            }),
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
                if row_count > 0
                    && descriptor.distinct_count > 0
                    && (descriptor.distinct_count as f64 / row_count as f64) < 0.5 =>
            {
                Some((
                    "Dictionary(Int32, Utf8)".to_string(),
                    format!(
                        "Only {} distinct values across {row_count} rows",
                        descriptor.distinct_count
                    ),
                ))
            }
            _ => None,
        };
        if let Some((suggested_type, reason)) = tip {
            tips.push(OptimizationTip {
                column: descriptor.name.clone(),
                current_type: data_type.to_string(),
                suggested_type,
                reason,
            });
        }
        if tips.len() >= limit {
            break;
        }
    }
    tips
}

/// Column pairs that uniquely identify every sampled row while neither
/// column does on its own.
pub fn composite_keys(
    names: &[String],
    values: &[Vec<Option<String>>],
    column_limit: usize,
    max_keys: usize,
) -> Vec<Vec<String>> {
    let rows = values.first().map_or(0, Vec::len);
    if rows < 2 || max_keys == 0 {
        return vec![];
    }
    let candidates = names.len().min(column_limit);
    let is_unique = |cols: &[usize]| {
        let mut seen = HashSet::with_capacity(rows);
        (0..rows).all(|r| {
            let key: Vec<Option<&str>> = cols.iter().map(|&c| values[c][r].as_deref()).collect();
            seen.insert(key)
        })
    };
    let single: Vec<bool> = (0..candidates).map(|c| is_unique(&[c])).collect();

    let mut keys = Vec::new();
    for i in 0..candidates {
        for j in (i + 1)..candidates {
            if single[i] || single[j] {
                continue;
            }
            if is_unique(&[i, j]) {
                keys.push(vec![names[i].clone(), names[j].clone()]);
                if keys.len() >= max_keys {
                    return keys;
                }
            }
        }
    }
    keys
}

fn sql_type(data_type: &DataType) -> String {
    match data_type {
        DataType::Int8 | DataType::Int16 | DataType::UInt8 => "SMALLINT".to_string(),
        DataType::Int32 | DataType::UInt16 => "INTEGER".to_string(),
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => "BIGINT".to_string(),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "FLOAT".to_string(),
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("DECIMAL({p}, {s})"),
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Timestamp(_, _) => "TIMESTAMP".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
        DataType::Dictionary(_, value) => sql_type(value),
        _ => "TEXT".to_string(),
    }
}

/// A `CREATE TABLE` statement matching the declared column types.
pub fn sql_schema(table_name: &str, fields: &[(String, DataType, bool)]) -> ProfileResult<String> {
    let mut lines = Vec::with_capacity(fields.len());
    for (name, data_type, nullable) in fields {
        let null = if *nullable { "" } else { " NOT NULL" };
        lines.push(format!(
            "    {} {}{null}",
            SqlSecurity::quote_identifier(name)?,
            sql_type(data_type)
        ));
    }
    Ok(format!(
        "CREATE TABLE {} (\n{}\n);",
        SqlSecurity::quote_identifier(table_name)?,
        lines.join(",\n")
    ))
}

/// Share of the most frequent non-null value.
pub fn top_value_share(values: &[Option<String>]) -> Option<f64> {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut total = 0usize;
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
        total += 1;
    }
    let top = counts.values().copied().max()?;
    Some(top as f64 / total as f64)
}

/// Share of non-null values that parse as numbers.
pub fn numeric_parse_share(values: &[Option<String>]) -> Option<f64> {
    let non_null: Vec<&str> = values.iter().flatten().map(|v| v.trim()).collect();
    if non_null.is_empty() {
        return None;
    }
    let parsed = non_null.iter().filter(|v| v.parse::<f64>().is_ok()).count();
    Some(parsed as f64 / non_null.len() as f64)
}

/// Builds the overview alerts.
pub fn alerts(
    descriptors: &[ColumnDescriptor],
    values: &[Vec<Option<String>>],
    partition_stats: &PartitionStats,
    pii: &[PiiRisk],
    config: &ProfileConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if partition_stats.is_skewed {
        alerts.push(Alert {
            kind: AlertKind::PartitionSkew,
            column: None,
            message: format!(
                "Partition sizes are imbalanced (skew {:.2}, largest {} rows vs mean {:.0})",
                partition_stats.skew, partition_stats.max_rows, partition_stats.mean_rows
            ),
        });
    }

    for (descriptor, column_values) in descriptors.iter().zip(values) {
        let name = descriptor.name.as_str();
        if descriptor.type_label == TypeLabel::Constant {
            if descriptor.distinct_count == 0 {
                alerts.push(Alert::column(
                    AlertKind::EmptyColumn,
                    name,
                    format!("'{name}' contains only missing values"),
                ));
            } else {
                alerts.push(Alert::column(
                    AlertKind::ConstantColumn,
                    name,
                    format!("'{name}' has a single constant value"),
                ));
            }
            continue;
        }

        if let Some(share) = top_value_share(column_values) {
            if share > config.quasi_constant_ratio {
                alerts.push(Alert::column(
                    AlertKind::QuasiConstant,
                    name,
                    format!(
                        "'{name}' is quasi-constant ({}% of values are identical)",
                        round_to(share * 100.0, 2)
                    ),
                ));
            }
        }

        if descriptor.declared_dtype == DeclaredType::Text {
            if let Some(share) = numeric_parse_share(column_values) {
                if share > config.mixed_type_ratio && share < 1.0 {
                    alerts.push(Alert::column(
                        AlertKind::MixedTypes,
                        name,
                        format!(
                            "'{name}' is mostly numeric ({}%) but stored as text",
                            round_to(share * 100.0, 2)
                        ),
                    ));
                }
            }
            if let Some(stats) = &descriptor.string_length_stats {
                if stats.max > config.long_string_threshold {
                    alerts.push(Alert::column(
                        AlertKind::LongStrings,
                        name,
                        format!("'{name}' has values up to {} characters long", stats.max),
                    ));
                }
            }
        }
    }

    for risk in pii {
        alerts.push(Alert::column(
            AlertKind::PiiRisk,
            &risk.column,
            format!(
                "'{}' may contain personal data (matched '{}')",
                risk.column, risk.keyword
            ),
        ));
    }

    alerts
}
