use crate::table::{Cell, Row};

/// A cell ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn bind_to(&self, idx: usize, stmt: &mut rusqlite::Statement) -> rusqlite::Result<()> {
        match self {
            SqlValue::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null)?,
            SqlValue::Integer(i) => stmt.raw_bind_parameter(idx, i)?,
            SqlValue::Real(f) => stmt.raw_bind_parameter(idx, f)?,
            SqlValue::Text(s) => stmt.raw_bind_parameter(idx, s.as_str())?,
        }
        Ok(())
    }
}

impl From<Option<&Cell>> for SqlValue {
    fn from(cell: Option<&Cell>) -> Self {
        match cell {
            None => SqlValue::Null,
            Some(Cell::Integer(i)) => SqlValue::Integer(*i),
            Some(Cell::Real(r)) if r.is_nan() => SqlValue::Null,
            Some(Cell::Real(r)) => SqlValue::Real(*r),
            // timestamps as ISO-8601
            Some(other) => SqlValue::Text(other.to_string()),
        }
    }
}

/// Values of `row` in column order; absent columns become NULL
pub fn row_values(row: &Row, columns: &[String]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|col| SqlValue::from(row.get(col)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_timestamp;

    #[test]
    fn test_cell_conversion() {
        assert_eq!(SqlValue::from(None), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(&Cell::Integer(7))), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(Some(&Cell::Real(f64::NAN))), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some(&Cell::text("MW"))),
            SqlValue::Text("MW".into())
        );

        let ts = parse_timestamp("2024-01-01 01:00:00").unwrap();
        assert_eq!(
            SqlValue::from(Some(&Cell::Timestamp(ts))),
            SqlValue::Text("2024-01-01T01:00:00".into())
        );
    }

    #[test]
    fn test_row_values_follow_column_order() {
        let mut row = Row::new();
        row.insert("b".into(), Cell::Integer(2));
        row.insert("a".into(), Cell::Integer(1));
        let columns = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        assert_eq!(
            row_values(&row, &columns),
            vec![SqlValue::Integer(1), SqlValue::Null, SqlValue::Integer(2)]
        );
    }
}
