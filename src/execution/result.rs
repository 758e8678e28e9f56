//! Query Result - tabular output of one executed statement

use crate::error::{OceanError, Result};
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit as DuckTimeUnit, Value};
use polars::prelude::*;

/// Days from 0001-01-01 (CE) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Outcome of executing one statement. Failures are values, not errors.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Table(ResultTable),
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn table(&self) -> Option<&ResultTable> {
        match self {
            ExecutionOutcome::Table(table) => Some(table),
            ExecutionOutcome::Failed { .. } => None,
        }
    }

    pub fn into_table(self) -> Option<ResultTable> {
        match self {
            ExecutionOutcome::Table(table) => Some(table),
            ExecutionOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed { .. })
    }
}

/// Rows and named columns, backed by a polars DataFrame.
#[derive(Debug, Clone)]
pub struct ResultTable {
    frame: DataFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Timestamp,
    Date,
    Text,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<ColumnKind> {
        match value {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnKind::Boolean),
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::UTinyInt(_)
            | Value::USmallInt(_)
            | Value::UInt(_) => Some(ColumnKind::Integer),
            Value::UBigInt(_)
            | Value::HugeInt(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Decimal(_) => Some(ColumnKind::Float),
            Value::Timestamp(_, _) => Some(ColumnKind::Timestamp),
            Value::Date32(_) => Some(ColumnKind::Date),
            _ => Some(ColumnKind::Text),
        }
    }

    fn merge(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

impl ResultTable {
    pub fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Build a table from DuckDB row values. Column types are inferred from the
    /// non-null values; mixed integer/float columns widen to float and any other
    /// mix falls back to text.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut series = Vec::with_capacity(columns.len());

        for (idx, name) in columns.iter().enumerate() {
            let kind = rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(ColumnKind::of))
                .reduce(ColumnKind::merge)
                .unwrap_or(ColumnKind::Text);

            let cells = rows.iter().map(|row| row.get(idx));
            let column = match kind {
                ColumnKind::Boolean => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_bool)).collect::<Vec<_>>(),
                ),
                ColumnKind::Integer => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_i64)).collect::<Vec<_>>(),
                ),
                ColumnKind::Float => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_f64)).collect::<Vec<_>>(),
                ),
                ColumnKind::Timestamp => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_micros)).collect::<Vec<_>>(),
                )
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?,
                ColumnKind::Date => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_days)).collect::<Vec<_>>(),
                )
                .cast(&DataType::Date)?,
                ColumnKind::Text => Series::new(
                    name,
                    cells.map(|v| v.and_then(value_as_text)).collect::<Vec<_>>(),
                ),
            };
            series.push(column);
        }

        Ok(Self {
            frame: DataFrame::new(series)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Plain-text rendering used inside LLM prompts: a header line followed by one
    /// line per row, columns right-aligned.
    pub fn to_text(&self) -> String {
        let columns = self.frame.get_columns();
        let mut cells: Vec<Vec<String>> = columns
            .iter()
            .map(|series| vec![series.name().to_string()])
            .collect();

        for (col_idx, series) in columns.iter().enumerate() {
            for row_idx in 0..self.frame.height() {
                let cell = series
                    .get(row_idx)
                    .map(|v| format_cell(&v))
                    .unwrap_or_else(|_| "NULL".to_string());
                cells[col_idx].push(cell);
            }
        }

        let widths: Vec<usize> = cells
            .iter()
            .map(|col| col.iter().map(|c| c.chars().count()).max().unwrap_or(0))
            .collect();

        let line_count = self.frame.height() + 1;
        let mut lines = Vec::with_capacity(line_count);
        for line_idx in 0..line_count {
            let line = cells
                .iter()
                .zip(&widths)
                .map(|(col, width)| format!("{:>width$}", col[line_idx], width = *width))
                .collect::<Vec<_>>()
                .join("  ");
            lines.push(line);
        }
        lines.join("\n")
    }

    /// One JSON object per row, keyed by column name.
    pub fn to_json_records(&self) -> Result<Vec<serde_json::Value>> {
        let columns = self.frame.get_columns();
        let mut rows = Vec::with_capacity(self.frame.height());

        for row_idx in 0..self.frame.height() {
            let mut row = serde_json::Map::new();
            for series in columns {
                row.insert(series.name().to_string(), series_to_json_value(series, row_idx)?);
            }
            rows.push(serde_json::Value::Object(row));
        }

        Ok(rows)
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(v) => Some(*v as i64),
        Value::SmallInt(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::BigInt(v) => Some(*v),
        Value::UTinyInt(v) => Some(*v as i64),
        Value::USmallInt(v) => Some(*v as i64),
        Value::UInt(v) => Some(*v as i64),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v as f64),
        Value::Double(v) => Some(*v),
        Value::UBigInt(v) => Some(*v as f64),
        Value::HugeInt(v) => Some(*v as f64),
        Value::Decimal(d) => d.to_string().parse().ok(),
        other => value_as_i64(other).map(|v| v as f64),
    }
}

fn value_as_micros(value: &Value) -> Option<i64> {
    match value {
        Value::Timestamp(unit, v) => Some(match unit {
            DuckTimeUnit::Second => v.saturating_mul(1_000_000),
            DuckTimeUnit::Millisecond => v.saturating_mul(1_000),
            DuckTimeUnit::Microsecond => *v,
            DuckTimeUnit::Nanosecond => v / 1_000,
        }),
        _ => None,
    }
}

fn value_as_days(value: &Value) -> Option<i32> {
    match value {
        Value::Date32(days) => Some(*days),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) | Value::Enum(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Timestamp(..) => value_as_micros(value).and_then(format_micros),
        Value::Date32(days) => format_days(*days),
        other => value_as_f64(other)
            .map(|v| v.to_string())
            .or_else(|| Some(format!("{:?}", other))),
    }
}

fn format_micros(micros: i64) -> Option<String> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
}

fn format_days(days: i32) -> Option<String> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn datetime_micros(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => value / 1_000,
        TimeUnit::Microseconds => value,
        TimeUnit::Milliseconds => value.saturating_mul(1_000),
    }
}

fn format_cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "NULL".to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        AnyValue::Float32(f) => f.to_string(),
        AnyValue::Float64(f) => f.to_string(),
        AnyValue::Int32(i) => i.to_string(),
        AnyValue::Int64(i) => i.to_string(),
        AnyValue::Datetime(v, unit, _) => {
            format_micros(datetime_micros(*v, *unit)).unwrap_or_else(|| v.to_string())
        }
        AnyValue::Date(days) => format_days(*days).unwrap_or_else(|| days.to_string()),
        other => other.to_string(),
    }
}

fn series_to_json_value(series: &Series, row_idx: usize) -> Result<serde_json::Value> {
    let any_val = series
        .get(row_idx)
        .map_err(|e| OceanError::Polars(format!("Failed to get value: {}", e)))?;

    let value = match any_val {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int32(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int64(i) => serde_json::Value::Number(i.into()),
        AnyValue::UInt32(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt64(u) => serde_json::Value::Number(u.into()),
        AnyValue::Float32(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(format_cell(&other)),
    };
    Ok(value)
}
