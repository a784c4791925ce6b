use serde_json::Value;

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::{FilterOp, FilterWhereInfo};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    conditions: Vec<String>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(&mut self, where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        self.parse_where_data(where_data)?;
        let where_clause = if self.conditions.is_empty() { "1=1".to_string() } else { self.conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            Value::Null => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    /// Generate a nested clause that shares this builder's placeholder numbering
    fn nested(&mut self, value: &Value) -> Result<String, FilterError> {
        let (sql, params) = Self::generate(value, self.param_index)?;
        self.param_index += params.len();
        self.param_values.extend(params);
        Ok(sql)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match FilterOp::from_key(op) {
            Some(FilterOp::And) | Some(FilterOp::Or) => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    // Empty $or matches nothing, empty $and matches everything
                    self.conditions.push(if op == "$or" { "1=0" } else { "1=1" }.to_string());
                    return Ok(());
                }
                let mut sql_parts = Vec::new();
                for v in arr {
                    let sql = self.nested(v)?;
                    sql_parts.push(format!("({})", sql));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                self.conditions.push(format!("({})", sql_parts.join(joiner)));
                Ok(())
            }
            Some(FilterOp::Not) => {
                let sql = self.nested(value)?;
                self.conditions.push(format!("NOT ({})", sql));
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                let info = FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() };
                let sql = self.build_sql_condition(&info)?;
                self.conditions.push(sql);
            }
        } else {
            // Implicit equality: { field: value }
            let info = FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() };
            let sql = self.build_sql_condition(&info)?;
            self.conditions.push(sql);
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        match FilterOp::from_key(op_key) {
            Some(FilterOp::And) | Some(FilterOp::Or) | Some(FilterOp::Not) | None => {
                Err(FilterError::UnsupportedOperator(op_key.to_string()))
            }
            Some(op) => Ok(op),
        }
    }

    /// Column reference for a comparison. String parameters bind as text, so
    /// the column is compared through its text form (uuid, date and time
    /// columns all render in sortable ISO order).
    fn column_for(column: &str, data: &Value) -> String {
        if data.is_string() {
            format!("\"{}\"::text", column)
        } else {
            format!("\"{}\"", column)
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let data = &condition.data;
        let column = Self::column_for(&condition.column, data);
        let sql = match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { format!("\"{}\" IS NULL", condition.column) }
                else { format!("{} = {}", column, self.param(data.clone())) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("\"{}\" IS NOT NULL", condition.column) }
                else { format!("{} IS DISTINCT FROM {}", column, self.param(data.clone())) }
            }
            FilterOp::Gt => format!("{} > {}", column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = Self::as_list(data);
                if values.is_empty() {
                    return Ok(if condition.operator == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let column = Self::column_for(&condition.column, &values[0]);
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if condition.operator == FilterOp::In { "IN" } else { "NOT IN" };
                format!("{} {} ({})", column, keyword, params.join(", "))
            }
            FilterOp::Contains => {
                let values = Self::as_list(data);
                if values.is_empty() {
                    return Ok("1=1".to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                format!("\"{}\"::text[] @> ARRAY[{}]::text[]", condition.column, params.join(", "))
            }
            FilterOp::And | FilterOp::Or | FilterOp::Not => {
                return Err(FilterError::UnsupportedOperator(format!("{:?} on a column", condition.operator)));
            }
        };
        Ok(sql)
    }

    fn as_list(data: &Value) -> Vec<Value> {
        match data {
            Value::Array(values) => values.clone(),
            other => vec![other.clone()],
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
