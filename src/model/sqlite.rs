//! SQLite-backed DAO.

use super::sql::{is_valid_identifier, SqlBuilder};
use super::{Dao, SqlValue, ValueObject};
use crate::config::DatabaseConfig;
use crate::error::FrameworkError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

/// Open a connection pool for the configured database.
///
/// # Errors
///
/// Returns [`FrameworkError::Database`] when the pool cannot connect.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, FrameworkError> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(Into::into)
}

/// DAO over one SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteDao {
    pool: SqlitePool,
    table: String,
    id_column: String,
}

impl SqliteDao {
    /// Build a DAO for a table; the id column defaults to `id`.
    ///
    /// # Errors
    ///
    /// Refuses unsafe table names.
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Result<Self, FrameworkError> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(FrameworkError::PermissionDenied(format!(
                "unsafe sql identifier: {table}"
            )));
        }
        Ok(Self {
            pool,
            table,
            id_column: "id".to_string(),
        })
    }

    /// Use a different id column.
    ///
    /// # Errors
    ///
    /// Refuses unsafe column names.
    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Result<Self, FrameworkError> {
        let id_column = id_column.into();
        if !is_valid_identifier(&id_column) {
            return Err(FrameworkError::PermissionDenied(format!(
                "unsafe sql identifier: {id_column}"
            )));
        }
        self.id_column = id_column;
        Ok(self)
    }

    /// The table this DAO operates on.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Blob(v) => query.bind(v.clone()),
    }
}

fn row_to_object(row: &SqliteRow) -> Result<ValueObject, FrameworkError> {
    let mut record = ValueObject::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get(index)?),
                "REAL" => SqlValue::Real(row.try_get(index)?),
                "BLOB" => SqlValue::Blob(row.try_get(index)?),
                _ => SqlValue::Text(row.try_get(index)?),
            }
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

#[async_trait]
impl Dao for SqliteDao {
    async fn get(&self, id: i64) -> Result<Option<ValueObject>, FrameworkError> {
        let sql = SqlBuilder::select_by(&self.table, &self.id_column)?;
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_object).transpose()
    }

    async fn get_all(&self) -> Result<Vec<ValueObject>, FrameworkError> {
        let sql = SqlBuilder::select_all(&self.table)?;
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_object).collect()
    }

    async fn first(&self) -> Result<Option<ValueObject>, FrameworkError> {
        let sql = SqlBuilder::first(&self.table)?;
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_object).transpose()
    }

    async fn save(&self, record: &ValueObject) -> Result<bool, FrameworkError> {
        let columns = record.column_names();
        let sql = SqlBuilder::insert(&self.table, &columns, &self.id_column)?;

        let mut query = sqlx::query(&sql);
        for (name, value) in record.columns() {
            if name == self.id_column {
                continue;
            }
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, record: &ValueObject) -> Result<bool, FrameworkError> {
        let id = record.get(&self.id_column).cloned().ok_or_else(|| {
            FrameworkError::Database(format!(
                "record is missing its {} column",
                self.id_column
            ))
        })?;

        let columns = record.column_names();
        let sql = SqlBuilder::update(&self.table, &columns, &[self.id_column.as_str()])?;

        let mut query = sqlx::query(&sql);
        for (name, value) in record.columns() {
            if name == self.id_column {
                continue;
            }
            query = bind_value(query, value);
        }
        query = bind_value(query, &id);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, FrameworkError> {
        let sql = SqlBuilder::delete(&self.table, &self.id_column)?;
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by(
        &self,
        column: &str,
        value: SqlValue,
    ) -> Result<Vec<ValueObject>, FrameworkError> {
        let sql = SqlBuilder::select_by(&self.table, column)?;
        let rows = bind_value(sqlx::query(&sql), &value)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_object).collect()
    }

    async fn search(
        &self,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<ValueObject>, FrameworkError> {
        let sql = SqlBuilder::search(&self.table, column)?;
        let rows = sqlx::query(&sql)
            .bind(format!("%{pattern}%"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_object).collect()
    }
}
