//! Named tables over polars data frames and the relational operations the
//! model assembler is built from

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::{
    col, lit, AnyValue, Column, DataFrame, DataType, Expr, IntoLazy, JoinArgs, JoinType,
    NamedFrom, PolarsResult, Series, SortMultipleOptions, TimeUnit,
};

use super::types::{parse_timestamp, Cell, FieldMap, FieldValue, Row, TableIndex};
use crate::error::TableError;

/// Join flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        }
    }
}

/// Row positions carried through a join to restore input order
const LEFT_ORDER: &str = "__left_order";
const RIGHT_ORDER: &str = "__right_order";

/// Resolution of timestamp columns
const TIMESTAMP_UNIT: TimeUnit = TimeUnit::Milliseconds;

/// A named data frame plus the columns that key its rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    frame: DataFrame,
    index: TableIndex,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.index == other.index
            && self.frame.equals_missing(&other.frame)
    }
}

impl Table {
    pub fn from_frame(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
            index: TableIndex::Positional,
        }
    }

    /// Build a text table from flattened records. Columns are the union of
    /// the record keys in order of first appearance; nested values are
    /// stored as JSON.
    pub fn from_records(name: impl Into<String>, records: Vec<FieldMap>) -> Result<Self, TableError> {
        let mut columns: Vec<(String, Vec<Option<String>>)> = Vec::new();

        for (i, record) in records.iter().enumerate() {
            for (key, value) in record.iter() {
                let position = match columns.iter().position(|(c, _)| c == key) {
                    Some(position) => position,
                    None => {
                        columns.push((key.to_string(), vec![None; records.len()]));
                        columns.len() - 1
                    }
                };
                columns[position].1[i] = Some(field_text(value));
            }
        }

        let columns = columns
            .into_iter()
            .map(|(column, values)| Series::new(column.into(), values).into())
            .collect();
        Ok(Self::from_frame(name, DataFrame::new(columns)?))
    }

    /// Build a table from typed rows. A column whose present cells are all
    /// integers (or all timestamps) keeps that type; anything mixed is text.
    pub fn from_rows(name: impl Into<String>, rows: &[Row]) -> Result<Self, TableError> {
        let mut names: Vec<&str> = Vec::new();
        for key in rows.iter().flat_map(|r| r.keys()) {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }

        let columns = names
            .iter()
            .map(|column| {
                let cells: Vec<Option<&Cell>> = rows.iter().map(|r| r.get(*column)).collect();
                cells_to_column(column, &cells)
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(Self::from_frame(name, DataFrame::new(columns)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.get_column_index(column).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<Cell> {
        let values = self.frame.column(column).ok()?;
        values.get(row).ok().and_then(cell_from_value)
    }

    /// All values of one column, `None` where a row has no value
    pub fn column(&self, column: &str) -> Result<Vec<Option<Cell>>, TableError> {
        let values = self.require(column)?;
        Ok((0..self.len())
            .map(|i| values.get(i).ok().and_then(cell_from_value))
            .collect())
    }

    /// One row; null cells are left out
    pub fn row(&self, row: usize) -> Row {
        self.frame
            .get_columns()
            .iter()
            .filter_map(|values| {
                let cell = values.get(row).ok().and_then(cell_from_value)?;
                Some((values.name().to_string(), cell))
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<Row> {
        (0..self.len()).map(|i| self.row(i)).collect()
    }

    /// Key of a row under the current index
    pub fn row_key(&self, row: usize) -> Vec<String> {
        match &self.index {
            TableIndex::Positional => vec![row.to_string()],
            TableIndex::Columns(cols) => cols
                .iter()
                .map(|c| self.get(row, c).map(|cell| cell.key_text()).unwrap_or_default())
                .collect(),
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn require(&self, column: &str) -> Result<&Column, TableError> {
        self.frame
            .column(column)
            .map_err(|_| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Keep only the listed columns, renaming each `(from, to)` pair
    pub fn select(&self, columns: &[(&str, &str)]) -> Result<Table, TableError> {
        let selected = columns
            .iter()
            .map(|(from, to)| Ok(self.require(from)?.clone().with_name((*to).into())))
            .collect::<Result<Vec<Column>, TableError>>()?;

        Ok(Table::from_frame(self.name.clone(), DataFrame::new(selected)?))
    }

    /// Add (or replace) a column computed by an expression over the frame
    pub fn with_column(self, expr: Expr) -> Result<Table, TableError> {
        let frame = self.frame.lazy().with_column(expr).collect()?;
        Ok(Table { frame, ..self })
    }

    /// Set a constant text value on every row
    pub fn with_constant(mut self, column: &str, value: &str) -> Result<Table, TableError> {
        let values = Series::new(column.into(), vec![value; self.len()]);
        self.frame.with_column(values)?;
        Ok(self)
    }

    /// Fill null cells of a column with a text value
    pub fn fill_missing(self, column: &str, value: &str) -> Result<Table, TableError> {
        self.require(column)?;
        self.with_column(col(column).fill_null(lit(value)))
    }

    /// Relational join. Output rows follow left order; each left row is
    /// repeated once per matching right row, in right order. A null key
    /// never matches. Right key columns are merged into the left ones; any
    /// other shared column is suffixed `_right`. Keys of different types are
    /// compared as text.
    pub fn join(
        &self,
        right: &Table,
        left_on: &[&str],
        right_on: &[&str],
        kind: JoinKind,
    ) -> Result<Table, TableError> {
        for column in left_on {
            self.require(column)?;
        }
        for column in right_on {
            right.require(column)?;
        }

        let mut left_frame = self.frame.clone();
        let mut right_frame = right.frame.clone();
        for (l, r) in left_on.iter().zip(right_on) {
            if left_frame.column(l)?.dtype() != right_frame.column(r)?.dtype() {
                let l_text = left_frame.column(l)?.cast(&DataType::String)?;
                left_frame.with_column(l_text)?;
                let r_text = right_frame.column(r)?.cast(&DataType::String)?;
                right_frame.with_column(r_text)?;
            }
        }

        let left_keys: Vec<Expr> = left_on.iter().map(|c| col(*c)).collect();
        let right_keys: Vec<Expr> = right_on.iter().map(|c| col(*c)).collect();

        let frame = left_frame
            .with_row_index(LEFT_ORDER.into(), None)?
            .lazy()
            .join(
                right_frame.with_row_index(RIGHT_ORDER.into(), None)?.lazy(),
                left_keys,
                right_keys,
                JoinArgs::new(kind.into()),
            )
            .sort(
                [LEFT_ORDER, RIGHT_ORDER],
                SortMultipleOptions::default()
                    .with_maintain_order(true)
                    .with_nulls_last(true),
            )
            .collect()?
            .drop(LEFT_ORDER)?
            .drop(RIGHT_ORDER)?;

        Ok(Table::from_frame(self.name.clone(), frame))
    }

    /// Append the rows of `other`; columns are the union of both, padded
    /// with nulls
    pub fn concat(self, other: Table) -> Result<Table, TableError> {
        let mut layout: Vec<(String, DataType)> = Vec::new();
        for values in self.frame.get_columns().iter().chain(other.frame.get_columns()) {
            if !layout.iter().any(|(name, _)| name == values.name().as_str()) {
                layout.push((values.name().to_string(), values.dtype().clone()));
            }
        }

        let frame = self.padded(&layout)?.vstack(&other.padded(&layout)?)?;
        Ok(Table::from_frame(self.name, frame))
    }

    fn padded(&self, layout: &[(String, DataType)]) -> Result<DataFrame, TableError> {
        let columns = layout
            .iter()
            .map(|(name, dtype)| match self.frame.column(name) {
                Ok(values) => values.clone(),
                Err(_) => Series::full_null(name.as_str().into(), self.len(), dtype).into(),
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    /// Convert a column to 64-bit integers. Nulls stay null.
    pub fn parse_integers(mut self, column: &str) -> Result<Table, TableError> {
        let values = self.require(column)?;
        if values.dtype() == &DataType::Int64 {
            return Ok(self);
        }

        let text = values.cast(&DataType::String)?;
        let mut parsed = Vec::with_capacity(text.len());
        for value in text.str()?.into_iter() {
            let value = match value {
                Some(v) => Some(v.trim().parse::<i64>().map_err(|_| TableError::InvalidInteger {
                    table: self.name.clone(),
                    column: column.to_string(),
                    value: v.to_string(),
                })?),
                None => None,
            };
            parsed.push(value);
        }

        self.frame.with_column(Series::new(column.into(), parsed))?;
        Ok(self)
    }

    /// Convert a column to timestamps. Nulls stay null.
    pub fn parse_timestamps(mut self, column: &str) -> Result<Table, TableError> {
        let values = self.require(column)?;
        if matches!(values.dtype(), DataType::Datetime(_, _)) {
            return Ok(self);
        }

        let text = values.cast(&DataType::String)?;
        let mut millis = Vec::with_capacity(text.len());
        for value in text.str()?.into_iter() {
            let value = match value {
                Some(v) => {
                    let ts = parse_timestamp(v).ok_or_else(|| TableError::InvalidTimestamp {
                        table: self.name.clone(),
                        column: column.to_string(),
                        value: v.to_string(),
                    })?;
                    Some(ts.and_utc().timestamp_millis())
                }
                None => None,
            };
            millis.push(value);
        }

        let parsed = Series::new(column.into(), millis)
            .cast(&DataType::Datetime(TIMESTAMP_UNIT, None))?;
        self.frame.with_column(parsed)?;
        Ok(self)
    }

    /// Parse a column to integers and sort ascending by it (stable; nulls
    /// last)
    pub fn sort_by_integer(self, column: &str) -> Result<Table, TableError> {
        let table = self.parse_integers(column)?;
        let frame = table
            .frame
            .lazy()
            .sort(
                [column],
                SortMultipleOptions::default()
                    .with_maintain_order(true)
                    .with_nulls_last(true),
            )
            .collect()?;
        Ok(Table { frame, ..table })
    }

    pub fn set_index(mut self, columns: &[&str]) -> Result<Table, TableError> {
        for column in columns {
            self.require(column)?;
        }
        self.index = TableIndex::on(columns);
        Ok(self)
    }

    /// Drop any semantic key and fall back to dense row positions
    pub fn reset_index(mut self) -> Table {
        self.index = TableIndex::Positional;
        self
    }
}

fn field_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Nested(map) => serde_json::to_string(map).unwrap_or_default(),
    }
}

fn cells_to_column(name: &str, cells: &[Option<&Cell>]) -> PolarsResult<Column> {
    let present: Vec<&Cell> = cells.iter().flatten().copied().collect();
    let all = |f: fn(&Cell) -> bool| !present.is_empty() && present.iter().all(|c| f(c));

    let series = if all(|c| matches!(c, Cell::Integer(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Some(Cell::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else if all(|c| matches!(c, Cell::Integer(_) | Cell::Real(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Some(Cell::Integer(i)) => Some(*i as f64),
                Some(Cell::Real(r)) => Some(*r),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else if all(|c| matches!(c, Cell::Timestamp(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Some(Cell::Timestamp(ts)) => Some(ts.and_utc().timestamp_millis()),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).cast(&DataType::Datetime(TIMESTAMP_UNIT, None))?
    } else {
        let values: Vec<Option<String>> = cells.iter().map(|c| c.map(Cell::to_string)).collect();
        Series::new(name.into(), values)
    };
    Ok(series.into())
}

fn cell_from_value(value: AnyValue) -> Option<Cell> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(Cell::text(s)),
        AnyValue::StringOwned(s) => Some(Cell::text(s.as_str())),
        AnyValue::Int64(v) => Some(Cell::Integer(v)),
        AnyValue::Int32(v) => Some(Cell::Integer(v.into())),
        AnyValue::UInt32(v) => Some(Cell::Integer(v.into())),
        AnyValue::Float64(v) => Some(Cell::Real(v)),
        AnyValue::Float32(v) => Some(Cell::Real(v.into())),
        AnyValue::Datetime(v, unit, _) => timestamp_from_epoch(v, unit).map(Cell::Timestamp),
        other => Some(Cell::Text(other.to_string())),
    }
}

fn timestamp_from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let (per_second, nanos_per_tick) = match unit {
        TimeUnit::Milliseconds => (1_000, 1_000_000),
        TimeUnit::Microseconds => (1_000_000, 1_000),
        TimeUnit::Nanoseconds => (1_000_000_000, 1),
    };
    let nanos = u32::try_from(value.rem_euclid(per_second) * nanos_per_tick).ok()?;
    DateTime::from_timestamp(value.div_euclid(per_second), nanos).map(|dt| dt.naive_utc())
}
