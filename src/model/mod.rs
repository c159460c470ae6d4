//! Model layer: typed value objects and the DAO seam.
//!
//! The dispatcher treats persistence as an external collaborator behind
//! the [`Dao`] trait; the only hard rule is that statements are
//! parameterized — values never travel inside SQL text.

pub mod sql;
pub mod sqlite;

pub use sql::SqlBuilder;
pub use sqlite::{connect, SqliteDao};

use crate::error::FrameworkError;
use async_trait::async_trait;

/// A typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

/// An ordered column → value record, the unit the DAO layer moves.
///
/// Accessors are explicit; there is no magic name-based dispatch, so an
/// unknown column is an ordinary `None`, never dynamic code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueObject {
    columns: Vec<(String, SqlValue)>,
}

impl ValueObject {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any existing value for the column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        if let Some(entry) = self.columns.iter_mut().find(|(name, _)| *name == column) {
            entry.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    /// Read a column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Read a column as an integer.
    #[must_use]
    pub fn get_integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(SqlValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Read a column as text.
    #[must_use]
    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(SqlValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Remove a column; returns the removed value.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        let index = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(index).1)
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Columns and values in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// CRUD primitives over one table, keyed by a value-object mapping.
///
/// Persistence failures are non-retryable per call and surface as
/// [`FrameworkError::Database`], rendered generically in production.
#[async_trait]
pub trait Dao: Send + Sync {
    /// Fetch the record with the given id.
    async fn get(&self, id: i64) -> Result<Option<ValueObject>, FrameworkError>;

    /// Fetch every record.
    async fn get_all(&self) -> Result<Vec<ValueObject>, FrameworkError>;

    /// Fetch the first record, if any.
    async fn first(&self) -> Result<Option<ValueObject>, FrameworkError>;

    /// Insert a record; the id column is skipped. Returns whether a row
    /// was written.
    async fn save(&self, record: &ValueObject) -> Result<bool, FrameworkError>;

    /// Update the record identified by its id column. Returns whether a
    /// row changed.
    async fn update(&self, record: &ValueObject) -> Result<bool, FrameworkError>;

    /// Delete the record with the given id. Returns whether a row was
    /// removed.
    async fn delete(&self, id: i64) -> Result<bool, FrameworkError>;

    /// Fetch records whose column equals the value.
    async fn find_by(
        &self,
        column: &str,
        value: SqlValue,
    ) -> Result<Vec<ValueObject>, FrameworkError>;

    /// Fetch records whose column contains the pattern.
    async fn search(
        &self,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<ValueObject>, FrameworkError>;
}
