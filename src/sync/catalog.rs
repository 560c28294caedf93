use chrono::NaiveDateTime;
use sqlx::{query::Query, sqlite::SqliteArguments, Sqlite};

use super::columns::ValueMap;

pub type SceneQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Turns the named values of one CSV record into one statement parameter.
pub type RowConverter = fn(&ValueMap) -> anyhow::Result<SqlValue>;

/// A typed statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    pub fn bind_to(self, query: SceneQuery<'_>) -> SceneQuery<'_> {
        match self {
            SqlValue::Text(value) => query.bind(value),
            SqlValue::Integer(value) => query.bind(value),
            SqlValue::Real(value) => query.bind(value),
            SqlValue::Timestamp(value) => query.bind(value),
        }
    }
}

/// Describes a remote catalogue and the table it is ingested into.
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    /// Semantic column names the converters read. Every one must appear in
    /// the CSV header.
    fn required_columns(&self) -> &'static [&'static str];

    /// One converter per upsert parameter, in parameter order.
    fn converters(&self) -> &'static [RowConverter];

    /// Inserts one row. Must report one affected row when something was
    /// inserted or changed and zero when the stored row already matched.
    fn upsert_statement(&self) -> &'static str;

    fn maintenance_statement(&self) -> &'static str;
}
