//! Derived-table definitions. Each step reads the raw tables plus the
//! derived tables built before it and yields exactly one new table.

use polars::prelude::{col, concat_str, lit, when, DataFrame, Expr, NamedFrom, Series};
use std::collections::BTreeMap;
use std::fmt;

use super::options::AssemblyOptions;
use crate::error::{StepError, TableError};
use crate::table::{Cell, JoinKind, RawTableSet, Row, Table};

/// Membership collection that ties generators to regions
const GENERATORS_COLLECTION: &str = "Generators";
const REGION_CLASS: &str = "Region";
const SYSTEM_CLASS: &str = "System";
const TABLE_NAME_PREFIX: &str = "data_interval_";

/// Every table the assembler can derive, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DerivedTable {
    Class,
    Object,
    Property,
    Membership,
    ZoneId,
    Zone,
    Key,
    Phase1,
    Phase2,
    Phase3,
    Phase4,
}

impl DerivedTable {
    pub const ALL: [DerivedTable; 11] = [
        DerivedTable::Class,
        DerivedTable::Object,
        DerivedTable::Property,
        DerivedTable::Membership,
        DerivedTable::ZoneId,
        DerivedTable::Zone,
        DerivedTable::Key,
        DerivedTable::Phase1,
        DerivedTable::Phase2,
        DerivedTable::Phase3,
        DerivedTable::Phase4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DerivedTable::Class => "class",
            DerivedTable::Object => "object",
            DerivedTable::Property => "property",
            DerivedTable::Membership => "membership",
            DerivedTable::ZoneId => "zone_id",
            DerivedTable::Zone => "zone",
            DerivedTable::Key => "key",
            DerivedTable::Phase1 => "phase_1",
            DerivedTable::Phase2 => "phase_2",
            DerivedTable::Phase3 => "phase_3",
            DerivedTable::Phase4 => "phase_4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Simulation phase number for the phase series tables
    pub fn phase(self) -> Option<u8> {
        match self {
            DerivedTable::Phase1 => Some(1),
            DerivedTable::Phase2 => Some(2),
            DerivedTable::Phase3 => Some(3),
            DerivedTable::Phase4 => Some(4),
            _ => None,
        }
    }

    /// Build this table from what is available so far
    pub fn derive(self, input: &StepInput) -> Result<Table, StepError> {
        let table = match self {
            DerivedTable::Class => class_catalog(input)?,
            DerivedTable::Object => object_catalog(input)?,
            DerivedTable::Property => property_catalog(input)?,
            DerivedTable::Membership => membership_catalog(input)?,
            DerivedTable::ZoneId => zone_ids(input)?,
            DerivedTable::Zone => zone_assignment(input)?,
            DerivedTable::Key => key_resolution(input)?,
            DerivedTable::Phase1
            | DerivedTable::Phase2
            | DerivedTable::Phase3
            | DerivedTable::Phase4 => phase_series(input, self.phase().unwrap_or_default())?,
        };
        Ok(table.renamed(self.name()))
    }
}

impl fmt::Display for DerivedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view of everything a step may consume
pub struct StepInput<'a> {
    pub raw: &'a RawTableSet,
    pub derived: &'a BTreeMap<DerivedTable, Table>,
    pub options: &'a AssemblyOptions,
}

impl<'a> StepInput<'a> {
    fn raw(&self, record: &str) -> Result<&'a Table, StepError> {
        self.raw.require(record)
    }

    fn derived(&self, table: DerivedTable) -> Result<&'a Table, StepError> {
        self.derived
            .get(&table)
            .ok_or_else(|| StepError::MissingPrerequisite {
                table: table.name().to_string(),
            })
    }
}

fn text<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column).and_then(Cell::as_str)
}

/// `class` ⋈ `class_group` on `class_group_id`
fn class_catalog(input: &StepInput) -> Result<Table, StepError> {
    let class = input.raw("class")?;
    let group = input.raw("class_group")?;

    let class = class.select(&[
        ("class_id", "class_id"),
        ("name", "class"),
        ("class_group_id", "class_group_id"),
    ])?;
    let group = group.select(&[("class_group_id", "class_group_id"), ("name", "class_group")])?;

    let table = class
        .join(&group, &["class_group_id"], &["class_group_id"], JoinKind::Inner)?
        .select(&[
            ("class_id", "class_id"),
            ("class", "class"),
            ("class_group", "class_group"),
        ])?
        .set_index(&["class_id"])?;
    Ok(table)
}

/// `object` ⋈ class catalog on `class_id` ⋈ `category` on `category_id`
fn object_catalog(input: &StepInput) -> Result<Table, StepError> {
    let object = input.raw("object")?;
    let category = input.raw("category")?;
    let class = input.derived(DerivedTable::Class)?;

    let object = object.select(&[
        ("object_id", "object_id"),
        ("name", "name"),
        ("class_id", "class_id"),
        ("category_id", "category_id"),
    ])?;
    let category = category.select(&[("category_id", "category_id"), ("name", "category")])?;

    let table = object
        .join(class, &["class_id"], &["class_id"], JoinKind::Inner)?
        .join(&category, &["category_id"], &["category_id"], JoinKind::Inner)?
        .select(&[
            ("object_id", "object_id"),
            ("name", "name"),
            ("category", "category"),
            ("class", "class"),
            ("class_group", "class_group"),
        ])?
        .set_index(&["object_id"])?;
    Ok(table)
}

/// Unit names live in `value`; some exports use `name`
fn unit_names(unit: &Table) -> Result<Table, StepError> {
    let column = if unit.has_column("value") { "value" } else { "name" };
    Ok(unit.select(&[("unit_id", "unit_id"), (column, "unit")])?)
}

fn collection_names(collection: &Table) -> Result<Table, StepError> {
    Ok(collection.select(&[("collection_id", "collection_id"), ("name", "collection")])?)
}

/// One row per (property, period type): interval rows take `unit_id`,
/// summary rows take `summary_unit_id`
fn property_catalog(input: &StepInput) -> Result<Table, StepError> {
    let property = input.raw("property")?;
    let collection = input.raw("collection")?;
    let unit = input.raw("unit")?;

    let property = property.select(&[
        ("property_id", "property_id"),
        ("name", "property"),
        ("collection_id", "collection_id"),
        ("unit_id", "unit_id"),
        ("summary_unit_id", "summary_unit_id"),
    ])?;
    let collection = collection_names(collection)?;
    let unit = unit_names(unit)?;

    let base = property.join(&collection, &["collection_id"], &["collection_id"], JoinKind::Inner)?;

    let interval = base
        .join(&unit, &["unit_id"], &["unit_id"], JoinKind::Inner)?
        .with_constant("period_type_id", "0")?;
    let summary = base
        .join(&unit, &["summary_unit_id"], &["unit_id"], JoinKind::Inner)?
        .with_constant("period_type_id", "1")?;

    let table = interval
        .concat(summary)?
        .select(&[
            ("property_id", "property_id"),
            ("period_type_id", "period_type_id"),
            ("property", "property"),
            ("collection", "collection"),
            ("unit", "unit"),
        ])?
        .set_index(&["property_id", "period_type_id"])?;
    Ok(table)
}

/// Object catalog columns renamed for one side of a membership
fn membership_side(objects: &Table, side: &str) -> Result<Table, StepError> {
    let id = format!("{}_object_id", side);
    let name = format!("{}_name", side);
    let category = format!("{}_category", side);
    let class = format!("{}_class", side);
    let class_group = format!("{}_class_group", side);

    Ok(objects.select(&[
        ("object_id", id.as_str()),
        ("name", name.as_str()),
        ("category", category.as_str()),
        ("class", class.as_str()),
        ("class_group", class_group.as_str()),
    ])?)
}

/// Parent-child object relationships with both sides resolved, ordered by
/// numeric `membership_id`
fn membership_catalog(input: &StepInput) -> Result<Table, StepError> {
    let membership = input.raw("membership")?;
    let collection = input.raw("collection")?;
    let objects = input.derived(DerivedTable::Object)?;

    let membership = membership.select(&[
        ("membership_id", "membership_id"),
        ("collection_id", "collection_id"),
        ("parent_object_id", "parent_object_id"),
        ("child_object_id", "child_object_id"),
    ])?;
    let collection = collection_names(collection)?;
    let parents = membership_side(objects, "parent")?;
    let children = membership_side(objects, "child")?;

    let table = membership
        .join(&collection, &["collection_id"], &["collection_id"], JoinKind::Inner)?
        .join(&parents, &["parent_object_id"], &["parent_object_id"], JoinKind::Inner)?
        .join(&children, &["child_object_id"], &["child_object_id"], JoinKind::Inner)?
        .select(&[
            ("membership_id", "membership_id"),
            ("collection", "collection"),
            ("parent_name", "parent_name"),
            ("child_name", "child_name"),
            ("parent_class", "parent_class"),
            ("child_class", "child_class"),
            ("parent_class_group", "parent_class_group"),
            ("child_class_group", "child_class_group"),
            ("parent_category", "parent_category"),
            ("child_category", "child_category"),
            ("collection_id", "collection_id"),
            ("parent_object_id", "parent_object_id"),
            ("child_object_id", "child_object_id"),
        ])?
        .sort_by_integer("membership_id")?
        .reset_index();
    Ok(table)
}

/// Generator object id to the id of its governing region object. A
/// generator with several region parents keeps the smallest id under the
/// configured tie-break.
fn zone_ids(input: &StepInput) -> Result<Table, StepError> {
    let membership = input.derived(DerivedTable::Membership)?;
    let tie_break = input.options.zone_tie_break;

    let mut winners: BTreeMap<String, String> = BTreeMap::new();
    for row in membership.rows() {
        if text(&row, "collection") != Some(GENERATORS_COLLECTION)
            || text(&row, "parent_class") != Some(REGION_CLASS)
        {
            continue;
        }
        let (Some(child), Some(parent)) = (row.get("child_object_id"), row.get("parent_object_id"))
        else {
            continue;
        };

        let parent = parent.key_text();
        winners
            .entry(child.key_text())
            .and_modify(|current| {
                if tie_break.compare(&parent, current).is_lt() {
                    *current = parent.clone();
                }
            })
            .or_insert_with(|| parent.clone());
    }

    let (children, parents): (Vec<String>, Vec<String>) = winners.into_iter().unzip();
    let frame = DataFrame::new(vec![
        Series::new("object_id".into(), children).into(),
        Series::new("region_object_id".into(), parents).into(),
    ])
    .map_err(TableError::from)?;
    Ok(Table::from_frame(DerivedTable::ZoneId.name(), frame).set_index(&["object_id"])?)
}

/// Generator object id to region name and zone (the region's category)
fn zone_assignment(input: &StepInput) -> Result<Table, StepError> {
    let zone_ids = input.derived(DerivedTable::ZoneId)?;
    let objects = input.derived(DerivedTable::Object)?;

    let regions = objects.select(&[
        ("object_id", "region_object_id"),
        ("name", "region"),
        ("category", "zone"),
    ])?;

    let table = zone_ids
        .join(&regions, &["region_object_id"], &["region_object_id"], JoinKind::Inner)?
        .select(&[("object_id", "object_id"), ("region", "region"), ("zone", "zone")])?
        .set_index(&["object_id"])?;
    Ok(table)
}

/// Reporting collection of a key row: objects owned by the System object
/// report under their own class, everything else as `<parent class>.<collection>`
fn reporting_collection() -> Expr {
    when(col("parent_class").eq(lit(SYSTEM_CLASS)))
        .then(col("child_class"))
        .otherwise(concat_str(
            [col("parent_class"), lit("."), col("collection")],
            "",
            true,
        ))
        .alias("collection")
}

/// `data_interval_<collection>_<property>` with spaces removed
fn table_name() -> Expr {
    concat_str(
        [lit(TABLE_NAME_PREFIX), col("collection"), lit("_"), col("property")],
        "",
        true,
    )
    .str()
    .replace_all(lit(" "), lit(""), true)
    .alias("table_name")
}

/// Resolve every time-series key to its object, property, unit, timeslice
/// and region, ordered by numeric key
fn key_resolution(input: &StepInput) -> Result<Table, StepError> {
    let key = input.raw("key")?;
    let timeslice = input.raw("timeslice")?;
    let membership = input.derived(DerivedTable::Membership)?;
    let property = input.derived(DerivedTable::Property)?;
    let zone = input.derived(DerivedTable::Zone)?;

    let key = key.select(&[
        ("key_id", "key"),
        ("membership_id", "membership_id"),
        ("phase_id", "phase_id"),
        ("property_id", "property_id"),
        ("period_type_id", "period_type_id"),
        ("timeslice_id", "timeslice_id"),
        ("band_id", "band"),
        ("sample_id", "sample"),
    ])?;
    let timeslice = timeslice.select(&[("timeslice_id", "timeslice_id"), ("name", "timeslice")])?;
    let property = property.select(&[
        ("property_id", "property_id"),
        ("period_type_id", "period_type_id"),
        ("property", "property"),
        ("unit", "unit"),
    ])?;
    let zone = zone.select(&[
        ("object_id", "child_object_id"),
        ("region", "region"),
        ("zone", "zone"),
    ])?;
    let labels = input.options.sample_labels;

    let table = key
        .join(membership, &["membership_id"], &["membership_id"], JoinKind::Inner)?
        .join(&timeslice, &["timeslice_id"], &["timeslice_id"], JoinKind::Inner)?
        .join(
            &property,
            &["property_id", "period_type_id"],
            &["property_id", "period_type_id"],
            JoinKind::Inner,
        )?
        .join(&zone, &["child_object_id"], &["child_object_id"], JoinKind::Left)?
        .fill_missing("region", "")?
        .fill_missing("zone", "")?
        .with_column(reporting_collection())?
        .with_column(table_name())?
        .with_column(labels.expr("sample"))?
        .select(&[
            ("key", "key"),
            ("table_name", "table_name"),
            ("collection", "collection"),
            ("property", "property"),
            ("unit", "unit"),
            ("child_name", "name"),
            ("parent_name", "parent"),
            ("child_category", "category"),
            ("child_class", "class"),
            ("child_class_group", "class_group"),
            ("region", "region"),
            ("zone", "zone"),
            ("phase_id", "phase_id"),
            ("period_type_id", "period_type_id"),
            ("timeslice", "timeslice"),
            ("band", "band"),
            ("sample", "sample"),
            ("membership_id", "membership_id"),
        ])?
        .sort_by_integer("key")?
        .reset_index();
    Ok(table)
}

/// `period_0` ⋈ `phase_<n>` on `interval_id`, with parsed datetimes
fn phase_series(input: &StepInput, phase: u8) -> Result<Table, StepError> {
    let period = input.raw("period_0")?;
    let values = input.raw(&format!("phase_{}", phase))?;

    let table = period
        .join(values, &["interval_id"], &["interval_id"], JoinKind::Inner)?
        .parse_timestamps("datetime")?
        .set_index(&["interval_id"])?;
    Ok(table)
}
