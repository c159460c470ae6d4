//! Parameterized SQL construction.
//!
//! Builders emit `?` placeholders only; values are bound by the caller.
//! Table and column identifiers are interpolated, so they are validated
//! against a strict identifier shape first — a name that fails
//! validation is refused, not escaped.

use crate::error::FrameworkError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Whether a name is safe to interpolate as a SQL identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn check_identifier(name: &str) -> Result<(), FrameworkError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(FrameworkError::PermissionDenied(format!(
            "unsafe sql identifier: {name}"
        )))
    }
}

fn check_all<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), FrameworkError> {
    for name in names {
        check_identifier(name)?;
    }
    Ok(())
}

/// Builds parameterized statements for the DAO layer.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder;

impl SqlBuilder {
    /// `INSERT` over the given columns, skipping the primary key.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers and an empty column list.
    pub fn insert(
        table: &str,
        columns: &[&str],
        primary_key: &str,
    ) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        check_all(columns.iter().copied())?;

        let names: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| *column != primary_key)
            .collect();
        if names.is_empty() {
            return Err(FrameworkError::Database(format!(
                "no insertable columns for table {table}"
            )));
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            names.join(", ")
        ))
    }

    /// `UPDATE ... SET` over the given columns, excluding the key
    /// columns from the SET list and matching on them in the WHERE
    /// clause.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers and an empty SET list.
    pub fn update(
        table: &str,
        columns: &[&str],
        key_columns: &[&str],
    ) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        check_all(columns.iter().copied())?;
        check_all(key_columns.iter().copied())?;

        let assignments: Vec<String> = columns
            .iter()
            .copied()
            .filter(|column| !key_columns.contains(column))
            .map(|column| format!("{column} = ?"))
            .collect();
        if assignments.is_empty() {
            return Err(FrameworkError::Database(format!(
                "no updatable columns for table {table}"
            )));
        }

        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        if !key_columns.is_empty() {
            let conditions: Vec<String> = key_columns
                .iter()
                .map(|column| format!("{column} = ?"))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        Ok(sql)
    }

    /// `SELECT *` over the whole table.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers.
    pub fn select_all(table: &str) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        Ok(format!("SELECT * FROM {table}"))
    }

    /// `SELECT *` matching one column.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers.
    pub fn select_by(table: &str, column: &str) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        check_identifier(column)?;
        Ok(format!("SELECT * FROM {table} WHERE {column} = ?"))
    }

    /// `SELECT *` with a `LIKE` match on one column.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers.
    pub fn search(table: &str, column: &str) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        check_identifier(column)?;
        Ok(format!("SELECT * FROM {table} WHERE {column} LIKE ?"))
    }

    /// `SELECT *` limited to the first row.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers.
    pub fn first(table: &str) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        Ok(format!("SELECT * FROM {table} LIMIT 1"))
    }

    /// `DELETE` matching one column.
    ///
    /// # Errors
    ///
    /// Refuses unsafe identifiers.
    pub fn delete(table: &str, column: &str) -> Result<String, FrameworkError> {
        check_identifier(table)?;
        check_identifier(column)?;
        Ok(format!("DELETE FROM {table} WHERE {column} = ?"))
    }
}
