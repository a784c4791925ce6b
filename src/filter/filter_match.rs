use serde_json::Value;
use std::cmp::Ordering;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOp, SortDirection};

/// In-process evaluation of the filter grammar, with the same semantics the
/// generated SQL has: string operands compare against the column's text form,
/// NULL never satisfies a comparison, and ascending order puts NULLs last.
pub struct FilterMatch;

impl FilterMatch {
    /// Apply where, order, offset and limit to a set of rows
    pub fn apply(filter: &Filter, rows: &[Value]) -> Result<Vec<Value>, FilterError> {
        let mut out = Vec::new();
        for row in rows {
            if Self::matches(filter.where_data(), row)? {
                out.push(row.clone());
            }
        }

        let order = filter.order_info();
        if !order.is_empty() {
            out.sort_by(|a, b| {
                for info in order {
                    let ord = compare_for_sort(&a[&info.column], &b[&info.column], &info.sort);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let mut out: Vec<Value> = out.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit_value() {
            out.truncate(limit.max(0) as usize);
        }
        Ok(out)
    }

    pub fn matches(where_data: Option<&Value>, row: &Value) -> Result<bool, FilterError> {
        match where_data {
            None | Some(Value::Null) => Ok(true),
            Some(Value::Object(obj)) => {
                for (key, value) in obj {
                    let ok = if key.starts_with('$') {
                        Self::logical(key, value, row)?
                    } else {
                        Self::field(key, value, row)?
                    };
                    if !ok {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Some(_) => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn logical(op: &str, value: &Value, row: &Value) -> Result<bool, FilterError> {
        match FilterOp::from_key(op) {
            Some(FilterOp::And) => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                for v in arr {
                    if !Self::matches(Some(v), row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Some(FilterOp::Or) => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                for v in arr {
                    if Self::matches(Some(v), row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(FilterOp::Not) => Ok(!Self::matches(Some(value), row)?),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field(column: &str, value: &Value, row: &Value) -> Result<bool, FilterError> {
        let actual = row.get(column).unwrap_or(&Value::Null);
        match value {
            Value::Object(obj) => {
                for (op_key, op_val) in obj {
                    let op = match FilterOp::from_key(op_key) {
                        Some(FilterOp::And) | Some(FilterOp::Or) | Some(FilterOp::Not) | None => {
                            return Err(FilterError::UnsupportedOperator(op_key.to_string()));
                        }
                        Some(op) => op,
                    };
                    if !Self::compare(&op, actual, op_val) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(Self::compare(&FilterOp::Eq, actual, value)),
        }
    }

    fn compare(op: &FilterOp, actual: &Value, expected: &Value) -> bool {
        match op {
            FilterOp::Eq => {
                if expected.is_null() { actual.is_null() } else { sql_cmp(actual, expected) == Some(Ordering::Equal) }
            }
            FilterOp::Ne => {
                if expected.is_null() { !actual.is_null() } else { sql_cmp(actual, expected) != Some(Ordering::Equal) }
            }
            FilterOp::Gt => sql_cmp(actual, expected) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(sql_cmp(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => sql_cmp(actual, expected) == Some(Ordering::Less),
            FilterOp::Lte => matches!(sql_cmp(actual, expected), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => {
                let (Some(text), Some(pattern)) = (text_form(actual), expected.as_str()) else {
                    return false;
                };
                if *op == FilterOp::ILike {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(&text, pattern)
                }
            }
            FilterOp::In | FilterOp::NIn => {
                let list = as_list(expected);
                if list.is_empty() {
                    return *op == FilterOp::NIn;
                }
                if actual.is_null() {
                    return false;
                }
                let found = list.iter().any(|v| sql_cmp(actual, v) == Some(Ordering::Equal));
                if *op == FilterOp::In { found } else { !found }
            }
            FilterOp::Contains => {
                let Value::Array(items) = actual else {
                    return false;
                };
                let have: Vec<String> = items.iter().filter_map(text_form).collect();
                as_list(expected)
                    .iter()
                    .filter_map(text_form)
                    .all(|wanted| have.contains(&wanted))
            }
            FilterOp::And | FilterOp::Or | FilterOp::Not => false,
        }
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    }
}

/// Text rendering of a scalar, as a `::text` cast would produce it
fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Three-valued comparison: `None` stands for SQL NULL / incomparable
fn sql_cmp(actual: &Value, expected: &Value) -> Option<Ordering> {
    if actual.is_null() || expected.is_null() {
        return None;
    }
    match expected {
        Value::String(s) => text_form(actual).map(|a| a.as_str().cmp(s.as_str())),
        Value::Number(n) => {
            let a = match actual {
                Value::Number(a) => a.as_f64(),
                Value::String(a) => a.parse::<f64>().ok(),
                _ => None,
            }?;
            a.partial_cmp(&n.as_f64()?)
        }
        Value::Bool(b) => actual.as_bool().map(|a| a.cmp(b)),
        _ => None,
    }
}

fn compare_for_sort(a: &Value, b: &Value, dir: &SortDirection) -> Ordering {
    let ord = match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        // NULLS LAST ascending, NULLS FIRST descending
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => sql_cmp(a, b).unwrap_or(Ordering::Equal),
    };
    match dir {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character
fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
