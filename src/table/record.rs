use tracing::debug;

use super::frame::Table;
use crate::archive::{XmlNode, XmlTreeDecoder};
use crate::error::TableError;

/// How a built table is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Keep document order; derived tables pick their own keys
    Unindexed,
    /// The single-file rules: `<type>_id`, `<type minus _index>_id`,
    /// `date`, `datetime`, else positional
    Legacy,
}

/// Outcome of building one record type
#[derive(Debug, Clone)]
pub struct BuiltTable {
    pub table: Table,
    /// Set when the legacy policy matched no rule
    pub unindexed: bool,
}

/// Turns one repeated element type into a table
pub struct RecordTableBuilder<'a, D: XmlTreeDecoder> {
    decoder: &'a D,
    policy: IndexPolicy,
}

impl<'a, D: XmlTreeDecoder> RecordTableBuilder<'a, D> {
    pub fn new(decoder: &'a D, policy: IndexPolicy) -> Self {
        Self { decoder, policy }
    }

    pub fn build(&self, root: &XmlNode, record: &str) -> Result<BuiltTable, TableError> {
        let records = self.decoder.flatten(root, record);
        let table = Table::from_records(record, records)?;

        match self.policy {
            IndexPolicy::Unindexed => Ok(BuiltTable {
                table,
                unindexed: false,
            }),
            IndexPolicy::Legacy => apply_legacy_index(table),
        }
    }
}

/// Candidate id column names for a record type
fn id_columns(record: &str) -> [String; 2] {
    let base = record.strip_prefix("t_").unwrap_or(record);
    let trimmed = base.strip_suffix("_index").unwrap_or(base);
    [format!("{}_id", base), format!("{}_id", trimmed)]
}

fn apply_legacy_index(table: Table) -> Result<BuiltTable, TableError> {
    for column in id_columns(table.name()) {
        if table.has_column(&column) {
            return Ok(BuiltTable {
                table: table.set_index(&[column.as_str()])?,
                unindexed: false,
            });
        }
    }

    for column in ["date", "datetime"] {
        if table.has_column(column) {
            let table = table.parse_timestamps(column)?.set_index(&[column])?;
            return Ok(BuiltTable {
                table,
                unindexed: false,
            });
        }
    }

    debug!(table = table.name(), "unable to set index");
    Ok(BuiltTable {
        table,
        unindexed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::QuickXmlDecoder;
    use crate::table::{Cell, TableIndex};

    fn root(doc: &str) -> XmlNode {
        QuickXmlDecoder.parse("doc.xml", doc.as_bytes()).unwrap()
    }

    #[test]
    fn test_id_columns() {
        assert_eq!(id_columns("t_class"), ["class_id".to_string(), "class_id".to_string()]);
        assert_eq!(
            id_columns("t_key_index"),
            ["key_index_id".to_string(), "key_id".to_string()]
        );
        assert_eq!(id_columns("t_list_object")[0], "list_object_id");
    }

    #[test]
    fn test_unindexed_keeps_positions() {
        let root = root("<R><t_class><class_id>5</class_id></t_class><t_class><class_id>2</class_id></t_class></R>");
        let decoder = QuickXmlDecoder;
        let built = RecordTableBuilder::new(&decoder, IndexPolicy::Unindexed)
            .build(&root, "t_class")
            .unwrap();
        assert_eq!(built.table.index(), &TableIndex::Positional);
        assert_eq!(built.table.len(), 2);
        assert_eq!(built.table.row_key(1), vec!["1"]);
    }

    #[test]
    fn test_legacy_uses_id_column() {
        let root = root("<R><t_class><class_id>5</class_id></t_class></R>");
        let decoder = QuickXmlDecoder;
        let built = RecordTableBuilder::new(&decoder, IndexPolicy::Legacy)
            .build(&root, "t_class")
            .unwrap();
        assert_eq!(built.table.index(), &TableIndex::on(&["class_id"]));
        assert_eq!(built.table.row_key(0), vec!["5"]);
        assert!(!built.unindexed);
    }

    #[test]
    fn test_legacy_strips_index_suffix() {
        let root = root("<R><t_key_index><key_id>9</key_id><position>0</position></t_key_index></R>");
        let decoder = QuickXmlDecoder;
        let built = RecordTableBuilder::new(&decoder, IndexPolicy::Legacy)
            .build(&root, "t_key_index")
            .unwrap();
        assert_eq!(built.table.index(), &TableIndex::on(&["key_id"]));
    }

    #[test]
    fn test_legacy_parses_datetime_index() {
        let root = root(
            "<R><t_period_0><interval_id>1</interval_id><datetime>2024-01-01T01:00:00</datetime></t_period_0></R>",
        );
        let decoder = QuickXmlDecoder;
        let built = RecordTableBuilder::new(&decoder, IndexPolicy::Legacy)
            .build(&root, "t_period_0")
            .unwrap();
        assert_eq!(built.table.index(), &TableIndex::on(&["datetime"]));
        assert!(matches!(built.table.get(0, "datetime"), Some(Cell::Timestamp(_))));
    }

    #[test]
    fn test_legacy_falls_back_to_positional() {
        let root = root("<R><t_phase_3><interval_id>1</interval_id><period_id>1</period_id></t_phase_3></R>");
        let decoder = QuickXmlDecoder;
        let built = RecordTableBuilder::new(&decoder, IndexPolicy::Legacy)
            .build(&root, "t_phase_3")
            .unwrap();
        assert_eq!(built.table.index(), &TableIndex::Positional);
        assert!(built.unindexed);
    }
}
