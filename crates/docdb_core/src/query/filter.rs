//! Filter tree parsing.

use crate::error::{CoreError, CoreResult};
use docdb_codec::Value;

/// Sort direction for `$orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending index order.
    Asc,
    /// Descending index order.
    Desc,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FilterExpr {
    Eq { field: String, value: Value },
    Gt { field: String, value: Value },
    Lt { field: String, value: Value },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    OrderBy { field: String, direction: Direction },
}

/// Parses a filter object into its top-level expressions, in key order.
///
/// # Errors
///
/// Returns `InvalidArgument` naming the offending token for unsupported
/// operators, malformed operand shapes, or non-scalar leaf literals.
pub(crate) fn parse_filter(filter: &Value) -> CoreResult<Vec<FilterExpr>> {
    let Some(operators) = filter.as_object() else {
        return Err(CoreError::invalid_argument(
            "filter must be an object of operators",
        ));
    };
    let mut exprs = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        exprs.push(parse_operator(op, operand, true)?);
    }
    Ok(exprs)
}

fn parse_operator(op: &str, operand: &Value, top_level: bool) -> CoreResult<FilterExpr> {
    match op {
        "$eq" => parse_leaf(op, operand).map(|(field, value)| FilterExpr::Eq { field, value }),
        "$gt" => parse_leaf(op, operand).map(|(field, value)| FilterExpr::Gt { field, value }),
        "$lt" => parse_leaf(op, operand).map(|(field, value)| FilterExpr::Lt { field, value }),
        "$and" => parse_children(op, operand).map(FilterExpr::And),
        "$or" => parse_children(op, operand).map(FilterExpr::Or),
        "$orderBy" if top_level => parse_order_by(operand),
        "$orderBy" => Err(CoreError::invalid_argument(
            "$orderBy is only valid at the top level of a filter",
        )),
        other => Err(CoreError::invalid_argument(format!(
            "unsupported filter operator: {other}"
        ))),
    }
}

/// A leaf operand is a one-entry object `{field: literal}` with a
/// scalar literal.
fn parse_leaf(op: &str, operand: &Value) -> CoreResult<(String, Value)> {
    let entry = single_entry(op, operand)?;
    let (field, literal) = entry;
    if !literal.is_scalar() {
        return Err(CoreError::invalid_argument(format!(
            "literal of {op} on {field} must be a scalar, got {}",
            literal.type_name()
        )));
    }
    Ok((field, literal))
}

/// Composite operands are arrays of sub-filter objects. Each object may
/// carry several operator entries; all are flattened into the child
/// list in order.
fn parse_children(op: &str, operand: &Value) -> CoreResult<Vec<FilterExpr>> {
    let Some(items) = operand.as_array() else {
        return Err(CoreError::invalid_argument(format!(
            "operand of {op} must be an array of sub-filters"
        )));
    };
    let mut children = Vec::new();
    for item in items {
        let Some(entries) = item.as_object() else {
            return Err(CoreError::invalid_argument(format!(
                "sub-filter of {op} must be an object"
            )));
        };
        for (child_op, child_operand) in entries {
            children.push(parse_operator(child_op, child_operand, false)?);
        }
    }
    Ok(children)
}

fn parse_order_by(operand: &Value) -> CoreResult<FilterExpr> {
    let (field, direction) = single_entry("$orderBy", operand)?;
    let direction = match direction.as_str() {
        Some("asc") => Direction::Asc,
        Some("desc") => Direction::Desc,
        _ => {
            return Err(CoreError::invalid_argument(
                "$orderBy direction must be \"asc\" or \"desc\"",
            ))
        }
    };
    Ok(FilterExpr::OrderBy { field, direction })
}

fn single_entry(op: &str, operand: &Value) -> CoreResult<(String, Value)> {
    let entries = operand.as_object().filter(|fields| fields.len() == 1);
    match entries.and_then(|fields| fields.iter().next()) {
        Some((field, value)) => Ok((field.clone(), value.clone())),
        None => Err(CoreError::invalid_argument(format!(
            "operand of {op} must be a one-entry object"
        ))),
    }
}
