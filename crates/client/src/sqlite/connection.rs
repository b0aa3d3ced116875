//! Read-only database handle.
//!
//! Every statement runs on the tokio-rusqlite background thread; rows come
//! back as JSON objects keyed by column name.

use std::path::Path;

use quire_core::Error;
use serde_json::{Map, Number, Value};
use tokio_rusqlite::rusqlite::types::{Value as SqlValue, ValueRef};
use tokio_rusqlite::rusqlite::functions::FunctionFlags;
use tokio_rusqlite::rusqlite::{OpenFlags, params_from_iter};
use tokio_rusqlite::Connection;

/// Unicode-aware lowercase available to every statement.
///
/// SQLite's built-in `lower` and `LIKE` fold ASCII only.
pub const LOWER_FUNCTION: &str = "quire_lower";

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Content database handle.
#[derive(Clone, Debug)]
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open an existing database for reading.
    ///
    /// The connection is opened read-only and additionally set to
    /// `query_only`, so no statement issued through it can write.
    /// [`LOWER_FUNCTION`] is registered on the connection.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags).await.map_err(|e| Error::Database(e.into()))?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA query_only = ON;")?;
            conn.create_scalar_function(
                LOWER_FUNCTION,
                1,
                FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                |ctx| {
                    Ok(match ctx.get_raw(0) {
                        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                        _ => None,
                    })
                },
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        Ok(Self { conn })
    }

    /// Run `sql` with positional `params` and collect every row.
    pub async fn query(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Result<Vec<Row>, Error> {
        let sql = sql.into();
        self.conn
            .call(move |conn| -> Result<Vec<Row>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut map = Map::with_capacity(columns.len());
                    for (i, column) in columns.iter().enumerate() {
                        map.insert(column.clone(), to_json(row.get_ref(i)?));
                    }
                    out.push(map);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// First row of `sql`, if any.
    pub async fn get(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Result<Option<Row>, Error> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

/// Bind a JSON value as a statement parameter.
///
/// Booleans bind as 0/1; arrays and objects bind as their JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use quire_core::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_rows_as_json() {
        let (_dir, path) = testutil::sqlite_fixture();
        let source = SqliteSource::open(&path).await.unwrap();

        let rows = source
            .query(r#"SELECT id, "order", scheduled FROM tbl_workitems WHERE id = ?"#, vec![to_sql(&json!("w2"))])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(Value::Object(rows[0].clone()), json!({ "id": "w2", "order": 1, "scheduled": 0 }));

        let none = source.get("SELECT id FROM tbl_tags WHERE id = ?", vec![to_sql(&json!("t9"))]).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let (_dir, path) = testutil::sqlite_fixture();
        let source = SqliteSource::open(&path).await.unwrap();

        let err = source.query("DELETE FROM tbl_tags", Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
        let tags = source.query("SELECT id FROM tbl_tags", Vec::new()).await.unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[tokio::test]
    async fn test_unicode_lowercase_function() {
        let (_dir, path) = testutil::sqlite_fixture();
        let source = SqliteSource::open(&path).await.unwrap();

        let row = source
            .get("SELECT quire_lower(?) AS folded, quire_lower(5) AS number", vec![to_sql(&json!("MAĞAZA İz"))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["folded"], json!("MAĞAZA İz".to_lowercase()));
        assert_eq!(row["number"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteSource::open(dir.path().join("absent.sqlite")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn test_to_sql() {
        assert_eq!(to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(to_sql(&json!(["a"])), SqlValue::Text(r#"["a"]"#.into()));
    }
}
