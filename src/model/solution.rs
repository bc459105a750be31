use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use super::assembler::{check_key_consistency, BuildReport, ModelAssembler};
use super::options::AssemblyOptions;
use super::steps::DerivedTable;
use crate::archive::{
    ArchiveLoader, BinaryTimeSeriesDecoder, LoadedArchive, QuickXmlDecoder, XmlTreeDecoder,
};
use crate::error::{ModelWarning, Result};
use crate::table::{Cell, IndexPolicy, RawTableSet, Table};

const SAMPLE_BYTES: i64 = std::mem::size_of::<f64>() as i64;

/// The reconstructed solution: raw tables, derived tables and binary
/// payloads. Immutable once built.
#[derive(Debug, Clone)]
pub struct SolutionModel {
    raw: RawTableSet,
    derived: BTreeMap<DerivedTable, Table>,
    payloads: BTreeMap<String, Vec<f64>>,
    report: BuildReport,
}

impl SolutionModel {
    /// Read a solution zip from disk with the default decoders
    pub fn open(path: &Path, options: AssemblyOptions) -> Result<Self> {
        Self::open_with(&ArchiveLoader::new(), path, options)
    }

    pub fn open_with<X, B>(
        loader: &ArchiveLoader<X, B>,
        path: &Path,
        options: AssemblyOptions,
    ) -> Result<Self>
    where
        X: XmlTreeDecoder,
        B: BinaryTimeSeriesDecoder,
    {
        let loaded = loader.load_path(path)?;
        Ok(Self::from_loaded(loader.xml_decoder(), loaded, options))
    }

    /// Read a solution zip held in memory
    pub fn from_bytes(bytes: &[u8], options: AssemblyOptions) -> Result<Self> {
        let loader = ArchiveLoader::new();
        let loaded = loader.load_bytes(bytes)?;
        Ok(Self::from_loaded(loader.xml_decoder(), loaded, options))
    }

    /// Build from an already loaded archive. Raw tables stay unindexed.
    pub fn from_loaded<D: XmlTreeDecoder>(
        decoder: &D,
        loaded: LoadedArchive,
        options: AssemblyOptions,
    ) -> Self {
        let (raw, warnings) = RawTableSet::from_tree(decoder, &loaded.root, IndexPolicy::Unindexed);
        Self::assemble(raw, warnings, loaded.payloads, options)
    }

    /// Single-document ingestion: a bare XML file, raw tables keyed by the
    /// legacy index rules, no binary payloads
    pub fn from_xml_bytes(bytes: &[u8], options: AssemblyOptions) -> Result<Self> {
        let decoder = QuickXmlDecoder;
        let root = decoder.parse("solution.xml", bytes)?;
        let (raw, warnings) = RawTableSet::from_tree(&decoder, &root, IndexPolicy::Legacy);
        Ok(Self::assemble(raw, warnings, BTreeMap::new(), options))
    }

    pub fn from_xml_path(path: &Path, options: AssemblyOptions) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_xml_bytes(&bytes, options)
    }

    fn assemble(
        raw: RawTableSet,
        raw_warnings: Vec<ModelWarning>,
        payloads: BTreeMap<String, Vec<f64>>,
        options: AssemblyOptions,
    ) -> Self {
        for warning in &raw_warnings {
            warn!("{}", warning);
        }

        let (derived, mut report) = ModelAssembler::new(options).assemble(&raw);
        let mut warnings = raw_warnings;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;

        Self {
            raw,
            derived,
            payloads,
            report,
        }
    }

    pub fn raw_tables(&self) -> &RawTableSet {
        &self.raw
    }

    /// Raw table by tag (`t_class`) or bare record name (`class`)
    pub fn raw(&self, record: &str) -> Option<&Table> {
        self.raw.get(record)
    }

    pub fn derived(&self, table: DerivedTable) -> Option<&Table> {
        self.derived.get(&table)
    }

    pub fn class_catalog(&self) -> Option<&Table> {
        self.derived(DerivedTable::Class)
    }

    pub fn object_catalog(&self) -> Option<&Table> {
        self.derived(DerivedTable::Object)
    }

    pub fn property_catalog(&self) -> Option<&Table> {
        self.derived(DerivedTable::Property)
    }

    pub fn membership_catalog(&self) -> Option<&Table> {
        self.derived(DerivedTable::Membership)
    }

    pub fn zone_assignment(&self) -> Option<&Table> {
        self.derived(DerivedTable::Zone)
    }

    pub fn key_resolution(&self) -> Option<&Table> {
        self.derived(DerivedTable::Key)
    }

    pub fn phase_series(&self, phase: u8) -> Option<&Table> {
        DerivedTable::ALL
            .into_iter()
            .find(|t| t.phase() == Some(phase))
            .and_then(|t| self.derived(t))
    }

    /// Any table by name. Derived names (`class`, `key`, `phase_3`, ...)
    /// resolve to derived tables only; everything else to a raw table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        match DerivedTable::from_name(name) {
            Some(derived) => self.derived(derived),
            None => self.raw(name),
        }
    }

    /// Every table under a unique name: raw tables first (prefixed with
    /// `t_` if their tag collides with a derived name), then derived tables
    /// in build order
    pub fn named_tables(&self) -> Vec<(String, &Table)> {
        let raw = self.raw.iter().map(|(tag, table)| {
            let name = if DerivedTable::from_name(tag).is_some() {
                format!("t_{}", tag)
            } else {
                tag.to_string()
            };
            (name, table)
        });
        let derived = self
            .derived
            .iter()
            .map(|(table, t)| (table.name().to_string(), t));
        raw.chain(derived).collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.named_tables().into_iter().map(|(name, _)| name).collect()
    }

    pub fn payloads(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.payloads
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Resolved key rows should match raw key rows one for one; a mismatch
    /// means a property, collection or object failed to join
    pub fn check_consistency(&self) -> Option<ModelWarning> {
        check_key_consistency(self.raw("key"), self.key_resolution())
    }

    /// Samples addressed by one key, located through `t_key_index`
    pub fn key_series(&self, key_id: i64) -> Option<&[f64]> {
        let index = self.raw("key_index")?;
        let row = index
            .rows()
            .into_iter()
            .find(|row| row.get("key_id").and_then(Cell::parse_integer) == Some(key_id))?;

        let field = |column: &str| row.get(column).and_then(Cell::parse_integer);
        let period_type = field("period_type_id")?;
        let position = field("position")?;
        let length = field("length")?;
        if position < 0 || length < 0 || position % SAMPLE_BYTES != 0 {
            return None;
        }

        let entry = format!("t_data_{}.bin", period_type);
        let samples = self
            .payloads
            .iter()
            .find(|(name, _)| {
                let file = name.rsplit('/').next().unwrap_or(name.as_str());
                file.eq_ignore_ascii_case(&entry)
            })
            .map(|(_, samples)| samples)?;

        let start = usize::try_from(position / SAMPLE_BYTES).ok()?;
        let end = start.checked_add(usize::try_from(length).ok()?)?;
        samples.get(start..end)
    }
}
