//! Flat row model shared by definitions, managers and queries.

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::IndexConfig;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum IndexValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl IndexValue {
    /// Encode a multi-valued field as one delimited string.
    ///
    /// Items are trimmed, blanks dropped, and any delimiter inside an item is
    /// replaced by a space so it cannot be mistaken for a boundary.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|item| normalize_list_item(item.as_ref()))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(&IndexConfig::LIST_DELIMITER.to_string());
        IndexValue::Text(joined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, IndexValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IndexValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IndexValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text rendering used by the scorer; numbers are formatted, NULL is empty.
    pub fn to_text(&self) -> String {
        match self {
            IndexValue::Null => String::new(),
            IndexValue::Integer(i) => i.to_string(),
            IndexValue::Real(f) => f.to_string(),
            IndexValue::Text(s) => s.clone(),
        }
    }

    pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => IndexValue::Null,
            ValueRef::Integer(i) => IndexValue::Integer(i),
            ValueRef::Real(f) => IndexValue::Real(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                IndexValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Normalize one list item the same way on write and on match.
pub(crate) fn normalize_list_item(item: &str) -> String {
    item.replace(IndexConfig::LIST_DELIMITER, " ")
        .trim()
        .to_string()
}

impl ToSql for IndexValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            IndexValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            IndexValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            IndexValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            IndexValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::Text(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::Text(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Integer(value)
    }
}

impl From<i32> for IndexValue {
    fn from(value: i32) -> Self {
        IndexValue::Integer(i64::from(value))
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        IndexValue::Real(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Integer(i64::from(value))
    }
}

impl<T: Into<IndexValue>> From<Option<T>> for IndexValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(IndexValue::Null)
    }
}

/// One index row: ordered column/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRow {
    values: Vec<(String, IndexValue)>,
}

impl IndexRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`IndexRow::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing any earlier value but keeping its position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<IndexValue>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&IndexValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Text of a column, if present and textual.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(IndexValue::as_str)
    }

    pub fn page_id(&self) -> Option<&str> {
        self.get_str(IndexConfig::PRIMARY_KEY)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for IndexRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
