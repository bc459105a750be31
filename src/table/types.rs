use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layouts accepted for `date` / `datetime` columns. Slashed
/// dates are month first; day first only when the month would be > 12.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// The value of one child element of a record: text, or a nested record
/// when the child has children of its own
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Nested(FieldMap),
}

/// Child-tag name to value, in document order. A repeated tag keeps the
/// position of its first occurrence and the value of its last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            match value {
                FieldValue::Text(text) => map.serialize_entry(key, text)?,
                FieldValue::Nested(nested) => map.serialize_entry(key, nested)?,
            }
        }
        map.end()
    }
}

/// A single table cell
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Real(f64),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used to match cells in joins and to group rows. Integer ids and
    /// their source strings compare equal.
    pub fn key_text(&self) -> String {
        self.to_string()
    }

    pub fn parse_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn parse_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

/// One table row; an absent column means the source had no value
pub type Row = BTreeMap<String, Cell>;

/// How rows of a table are keyed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TableIndex {
    /// Dense 0-based row position
    #[default]
    Positional,
    /// The values of these columns, in order
    Columns(Vec<String>),
}

impl TableIndex {
    pub fn on(columns: &[&str]) -> Self {
        TableIndex::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

/// Parse a PLEXOS date or datetime string
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_repeated_tag_keeps_last_value() {
        let mut map = FieldMap::new();
        map.insert("name", FieldValue::Text("a".into()));
        map.insert("id", FieldValue::Text("1".into()));
        map.insert("name", FieldValue::Text("b".into()));

        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "id"]);
        assert_eq!(map.get("name"), Some(&FieldValue::Text("b".into())));
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = at(2024, 1, 2, 13, 0);
        assert_eq!(parse_timestamp("2024-01-02T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("01/02/2024 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02"), Some(at(2024, 1, 2, 0, 0)));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_slashed_dates_are_month_first() {
        assert_eq!(parse_timestamp("02/01/2024 13:00:00"), Some(at(2024, 2, 1, 13, 0)));
        assert_eq!(parse_timestamp("02/01/2024"), Some(at(2024, 2, 1, 0, 0)));
        // no month 13, so day first
        assert_eq!(parse_timestamp("13/01/2024 00:30"), Some(at(2024, 1, 13, 0, 30)));
    }

    #[test]
    fn test_twelve_hour_clock() {
        assert_eq!(parse_timestamp("1/1/2024 12:00:00 AM"), Some(at(2024, 1, 1, 0, 0)));
        assert_eq!(parse_timestamp("1/1/2024 1:00:00 AM"), Some(at(2024, 1, 1, 1, 0)));
        assert_eq!(parse_timestamp("1/2/2024 1:30 PM"), Some(at(2024, 1, 2, 13, 30)));
    }

    #[test]
    fn test_integer_and_text_cells_share_key_text() {
        assert_eq!(Cell::Integer(42).key_text(), Cell::text("42").key_text());
        assert_eq!(Cell::text(" 7 ").parse_integer(), Some(7));
        assert_eq!(Cell::text("x").parse_integer(), None);
    }
}
