use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::frame::Table;
use super::record::{IndexPolicy, RecordTableBuilder};
use crate::archive::{XmlNode, XmlTreeDecoder};
use crate::error::{ModelWarning, StepError};

/// One table per distinct top-level element type of the metadata document
#[derive(Debug, Clone, Default)]
pub struct RawTableSet {
    tables: BTreeMap<String, Table>,
}

impl RawTableSet {
    /// Build every record type found under `root`. Returns the set and any
    /// tables the legacy policy could not key.
    pub fn from_tree<D: XmlTreeDecoder>(
        decoder: &D,
        root: &XmlNode,
        policy: IndexPolicy,
    ) -> (Self, Vec<ModelWarning>) {
        let builder = RecordTableBuilder::new(decoder, policy);
        let mut tables = BTreeMap::new();
        let mut warnings = Vec::new();

        for record in root.child_tags() {
            match builder.build(root, record) {
                Ok(built) => {
                    if built.unindexed {
                        warnings.push(ModelWarning::IndexAmbiguity {
                            table: record.to_string(),
                        });
                    }
                    debug!(table = record, rows = built.table.len(), "built raw table");
                    tables.insert(record.to_string(), built.table);
                }
                Err(e) => {
                    // Only a date column that will not parse gets here; keep
                    // the rows rather than lose the record type
                    warn!(table = record, error = %e, "keeping raw table unindexed");
                    let unindexed = RecordTableBuilder::new(decoder, IndexPolicy::Unindexed);
                    if let Ok(built) = unindexed.build(root, record) {
                        tables.insert(record.to_string(), built.table);
                    }
                    warnings.push(ModelWarning::IndexAmbiguity {
                        table: record.to_string(),
                    });
                }
            }
        }

        (Self { tables }, warnings)
    }

    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
        }
    }

    /// Look up a record type by bare name (`class`) or tag (`t_class`)
    pub fn get(&self, record: &str) -> Option<&Table> {
        let bare = record.strip_prefix("t_").unwrap_or(record);
        self.tables
            .get(&format!("t_{}", bare))
            .or_else(|| self.tables.get(bare))
    }

    /// Like [`get`](Self::get), but a missing table is a step error
    pub fn require(&self, record: &str) -> Result<&Table, StepError> {
        self.get(record).ok_or_else(|| StepError::MissingRecordType {
            record: record.to_string(),
        })
    }

    pub fn contains(&self, record: &str) -> bool {
        self.get(record).is_some()
    }

    /// Tables keyed by element tag, in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::QuickXmlDecoder;

    const DOC: &str = "<R>\
        <t_class><class_id>1</class_id><name>Region</name></t_class>\
        <t_class><class_id>2</class_id><name>Generator</name><description>units</description></t_class>\
        <t_phase_3><interval_id>1</interval_id></t_phase_3>\
        <class_group><class_group_id>1</class_group_id></class_group>\
        </R>";

    fn root() -> XmlNode {
        QuickXmlDecoder.parse("doc.xml", DOC.as_bytes()).unwrap()
    }

    #[test]
    fn test_one_table_per_element_type() {
        let (raw, warnings) = RawTableSet::from_tree(&QuickXmlDecoder, &root(), IndexPolicy::Unindexed);
        assert!(warnings.is_empty());
        assert_eq!(raw.names().collect::<Vec<_>>(), vec!["class_group", "t_class", "t_phase_3"]);

        let class = raw.get("class").unwrap();
        assert_eq!(class.len(), 2);
        assert_eq!(class.columns(), &["class_id", "name", "description"]);
    }

    #[test]
    fn test_lookup_accepts_bare_and_prefixed_names() {
        let (raw, _) = RawTableSet::from_tree(&QuickXmlDecoder, &root(), IndexPolicy::Unindexed);
        assert!(raw.contains("t_class"));
        assert!(raw.contains("class_group"));
        assert!(raw.contains("t_class_group"));
        assert!(matches!(
            raw.require("membership"),
            Err(StepError::MissingRecordType { .. })
        ));
    }

    #[test]
    fn test_legacy_policy_reports_unkeyed_tables() {
        let (_, warnings) = RawTableSet::from_tree(&QuickXmlDecoder, &root(), IndexPolicy::Legacy);
        assert_eq!(
            warnings,
            vec![ModelWarning::IndexAmbiguity {
                table: "t_phase_3".into()
            }]
        );
    }
}
