//! Evaluates binary operators with the XPath 1.0 conversion rules.

use super::ast::BinaryOperator;
use super::engine::{XPathValue, into_document_order};
use crate::datasource::DataSourceNode;
use crate::error::XPathError;

/// Applies `op` to two evaluated operands.
pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    use BinaryOperator::*;
    match op {
        Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            Ok(XPathValue::Boolean(compare(op, &left, &right)))
        }
        Plus | Minus | Multiply | Divide | Modulo => {
            let (l, r) = (left.to_number(), right.to_number());
            let result = match op {
                Plus => l + r,
                Minus => l - r,
                Multiply => l * r,
                Divide => l / r,
                // Truncating remainder; the sign follows the dividend.
                _ => l % r,
            };
            Ok(XPathValue::Number(result))
        }
        Union => union(left, right),
    }
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) => {
            l.extend(r);
            Ok(XPathValue::NodeSet(into_document_order(l)))
        }
        (l, r) => Err(XPathError::TypeError(format!(
            "The union operator requires two node-sets, got {:?} and {:?}",
            l, r
        ))),
    }
}

/// A comparison involving a node-set holds if it holds for at least one of its nodes,
/// except against a boolean, where the node-set converts as a whole.
fn compare<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<XPathValue<N>> = r
                .iter()
                .map(|n| XPathValue::String(n.string_value()))
                .collect();
            l.iter().any(|n| {
                let left_value = XPathValue::String(n.string_value());
                right_values
                    .iter()
                    .any(|right_value| compare_atomic(op, &left_value, right_value))
            })
        }
        (XPathValue::NodeSet(_), XPathValue::Boolean(_)) => {
            compare_atomic(op, &XPathValue::Boolean(left.to_bool()), right)
        }
        (XPathValue::Boolean(_), XPathValue::NodeSet(_)) => {
            compare_atomic(op, left, &XPathValue::Boolean(right.to_bool()))
        }
        (XPathValue::NodeSet(nodes), other) => nodes
            .iter()
            .any(|n| compare_atomic(op, &XPathValue::String(n.string_value()), other)),
        (other, XPathValue::NodeSet(nodes)) => nodes
            .iter()
            .any(|n| compare_atomic(op, other, &XPathValue::String(n.string_value()))),
        _ => compare_atomic(op, left, right),
    }
}

fn compare_atomic<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    let is_bool = |v: &XPathValue<N>| matches!(v, XPathValue::Boolean(_));
    let is_number = |v: &XPathValue<N>| matches!(v, XPathValue::Number(_));

    match op {
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = if is_bool(left) || is_bool(right) {
                left.to_bool() == right.to_bool()
            } else if is_number(left) || is_number(right) {
                left.to_number() == right.to_number()
            } else {
                left.to_string() == right.to_string()
            };
            (op == BinaryOperator::Equals) == equal
        }
        _ => {
            let (l, r) = (left.to_number(), right.to_number());
            match op {
                BinaryOperator::LessThan => l < r,
                BinaryOperator::LessThanOrEqual => l <= r,
                BinaryOperator::GreaterThan => l > r,
                BinaryOperator::GreaterThanOrEqual => l >= r,
                _ => false,
            }
        }
    }
}
