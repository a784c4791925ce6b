use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;

use crate::filter::types::SqlResult;
use crate::filter::{is_valid_identifier, Filter, FilterData, FilterError};

/// Builds the JSON-in / JSON-out statements the Postgres store runs.
/// Rows travel as `row_to_json` objects; writes go through
/// `jsonb_populate_record` so column types come from the table itself.
pub struct QueryBuilder {
    table_name: String,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        Filter::new(&name)?;
        Ok(Self { table_name: name })
    }

    pub fn select(&self, filter_data: FilterData) -> Result<SqlResult, FilterError> {
        let filter = Filter::from_data(&self.table_name, filter_data)?;
        let inner = filter.to_sql()?;
        Ok(SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner.query),
            params: inner.params,
        })
    }

    /// `$1` is the record as JSON; only the keys it carries are written so
    /// column defaults still apply.
    pub fn insert(&self, record: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let columns = Self::columns(record)?;
        Ok(SqlResult {
            query: format!(
                "INSERT INTO \"{table}\" ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING row_to_json(\"{table}\".*) AS row",
                table = self.table_name,
                cols = columns,
            ),
            params: vec![Value::Object(record.clone())],
        })
    }

    /// `$1` is the change set; WHERE placeholders start at `$2`
    pub fn update(&self, filter_data: FilterData, changes: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let columns = Self::columns(changes)?;
        let filter = Filter::from_data(&self.table_name, filter_data)?;
        let where_result = filter.to_where_sql(1)?;

        let mut params = vec![Value::Object(changes.clone())];
        params.extend(where_result.params);

        Ok(SqlResult {
            query: format!(
                "UPDATE \"{table}\" SET ({cols}) = (SELECT {cols} FROM jsonb_populate_record(NULL::\"{table}\", $1)) WHERE {pred} RETURNING row_to_json(\"{table}\".*) AS row",
                table = self.table_name,
                cols = columns,
                pred = where_result.query,
            ),
            params,
        })
    }

    pub fn delete(&self, filter_data: FilterData) -> Result<SqlResult, FilterError> {
        let filter = Filter::from_data(&self.table_name, filter_data)?;
        let where_result = filter.to_where_sql(0)?;
        Ok(SqlResult {
            query: format!(
                "DELETE FROM \"{table}\" WHERE {pred} RETURNING row_to_json(\"{table}\".*) AS row",
                table = self.table_name,
                pred = where_result.query,
            ),
            params: where_result.params,
        })
    }

    fn columns(record: &Map<String, Value>) -> Result<String, FilterError> {
        if record.is_empty() {
            return Err(FilterError::InvalidColumn("No columns to write".to_string()));
        }
        let mut cols = Vec::with_capacity(record.len());
        for key in record.keys() {
            if !is_valid_identifier(key) {
                return Err(FilterError::InvalidColumn(key.clone()));
            }
            cols.push(format!("\"{}\"", key));
        }
        Ok(cols.join(", "))
    }
}

/// Bind one filter parameter. Arrays are expanded into separate placeholders
/// by the filter, so they only arrive here as whole JSON documents.
pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_wraps_row_to_json() {
        let sql = QueryBuilder::new("events").unwrap()
            .select(FilterData::where_(json!({ "family_id": "f" })))
            .unwrap();
        assert_eq!(
            sql.query,
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"events\" WHERE \"family_id\"::text = $1) t"
        );
    }

    #[test]
    fn test_update_numbers_where_after_changes() {
        let changes = json!({ "date": "2025-03-10" });
        let sql = QueryBuilder::new("events").unwrap()
            .update(FilterData::where_(json!({ "id": "e1" })), changes.as_object().unwrap())
            .unwrap();
        assert!(sql.query.contains("SET (\"date\") = (SELECT \"date\" FROM jsonb_populate_record(NULL::\"events\", $1))"));
        assert!(sql.query.contains("WHERE \"id\"::text = $2"));
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn test_insert_lists_only_given_columns() {
        let record = json!({ "id": "x", "title": "Dentist" });
        let sql = QueryBuilder::new("events").unwrap().insert(record.as_object().unwrap()).unwrap();
        assert!(sql.query.starts_with("INSERT INTO \"events\" (\"id\", \"title\") SELECT \"id\", \"title\""));
    }

    #[test]
    fn test_rejects_bad_column_names() {
        let record = json!({ "title\"; drop": 1 });
        assert!(QueryBuilder::new("events").unwrap().insert(record.as_object().unwrap()).is_err());
        assert!(QueryBuilder::new("events").unwrap().insert(&Map::new()).is_err());
    }
}
