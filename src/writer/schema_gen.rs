use polars::prelude::DataType;

use crate::table::{Table, TableIndex};

/// SQLite storage class of a model column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

/// Map a column's frame type to a storage class. Text columns stay text:
/// raw values are exported as they appear in the archive. Timestamps are
/// written as ISO-8601 text.
pub fn infer_column_type(table: &Table, column: &str) -> SqlType {
    let Ok(values) = table.frame().column(column) else {
        return SqlType::Text;
    };
    match values.dtype() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => SqlType::Integer,
        DataType::Float32 | DataType::Float64 => SqlType::Real,
        _ => SqlType::Text,
    }
}

/// Quote an identifier for SQLite
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate CREATE TABLE SQL for a model table
pub fn generate_create_table(name: &str, table: &Table) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(name));

    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|col| {
            format!(
                "    {} {}",
                quote_ident(col),
                infer_column_type(table, col).as_sql()
            )
        })
        .collect();

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate a CREATE INDEX statement for a keyed table
pub fn generate_indexes(name: &str, table: &Table) -> Vec<String> {
    match table.index() {
        TableIndex::Positional => Vec::new(),
        TableIndex::Columns(cols) => {
            let quoted: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
            vec![format!(
                "CREATE INDEX {} ON {}({})",
                quote_ident(&format!("idx_{}_{}", name, cols.join("_"))),
                quote_ident(name),
                quoted.join(", ")
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Row};

    fn sample_table() -> Table {
        let mut first = Row::new();
        first.insert("key".into(), Cell::Integer(1));
        first.insert("unit".into(), Cell::text("MW"));
        first.insert("value".into(), Cell::Real(1.5));
        let mut second = Row::new();
        second.insert("key".into(), Cell::Integer(2));
        second.insert("value".into(), Cell::Integer(3));
        Table::from_rows("key", &[first, second]).unwrap()
    }

    #[test]
    fn test_infer_column_type() {
        let table = sample_table();
        assert_eq!(infer_column_type(&table, "key"), SqlType::Integer);
        assert_eq!(infer_column_type(&table, "unit"), SqlType::Text);
        assert_eq!(infer_column_type(&table, "value"), SqlType::Real);
        assert_eq!(infer_column_type(&table, "missing"), SqlType::Text);
    }

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table("key", &sample_table());
        assert!(sql.contains("CREATE TABLE \"key\""));
        assert!(sql.contains("\"key\" INTEGER"));
        assert!(sql.contains("\"unit\" TEXT"));
        assert!(sql.contains("\"value\" REAL"));
    }

    #[test]
    fn test_generate_indexes() {
        assert!(generate_indexes("key", &sample_table()).is_empty());

        let keyed = sample_table().set_index(&["key", "unit"]).unwrap();
        let indexes = generate_indexes("property", &keyed);
        assert_eq!(
            indexes,
            vec!["CREATE INDEX \"idx_property_key_unit\" ON \"property\"(\"key\", \"unit\")"]
        );
    }
}
