//! The evaluation engine for executing a parsed XPath AST against a generic `DataSourceNode`.

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
use super::{axes, functions, operators};
use crate::datasource::{DataSourceNode, NodeType, QName};
use crate::error::XPathError;
use crate::parser::parse_expression;
use std::fmt;

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<N> {
    /// Always in document order without duplicates.
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => parse_number(s),
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| parse_number(&n.string_value()))
                .unwrap_or(f64::NAN),
        }
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// The XPath `Number` production with optional surrounding whitespace and leading minus;
/// anything else is NaN.
pub(crate) fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !unsigned.is_empty()
        && unsigned != "."
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The evaluation state of a single expression: the context node, its 1-based position
/// within the current node list and that list's size.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<N> {
    pub context_node: N,
    pub root_node: N,
    pub context_position: usize,
    pub context_size: usize,
}

impl<'a, N: DataSourceNode<'a>> EvaluationContext<N> {
    pub fn new(context_node: N) -> Self {
        Self {
            context_node,
            root_node: document_root(context_node),
            context_position: 1,
            context_size: 1,
        }
    }

    fn focus(&self, node: N, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            root_node: self.root_node,
            context_position: position,
            context_size: size,
        }
    }
}

/// The root of the tree containing `node`.
pub fn document_root<'a, N: DataSourceNode<'a>>(node: N) -> N {
    let mut current = node;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

/// Parses `expression` and evaluates it against `context`, which must yield a node-set.
pub fn select<'a, N>(expression: &str, context: N) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let parsed = parse_expression(expression)?;
    select_expression(&parsed, context)
}

/// Evaluates an already parsed expression against `context`, which must yield a node-set.
pub fn select_expression<'a, N>(expr: &Expression, context: N) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match evaluate(expr, &EvaluationContext::new(context))? {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::TypeError(format!(
            "Expression does not select nodes, got {:?}",
            other
        ))),
    }
}

/// Evaluates an expression and returns a concrete `XPathValue`.
pub fn evaluate<'a, N>(
    expr: &Expression,
    e_ctx: &EvaluationContext<N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Filter { base, predicates } => match evaluate(base, e_ctx)? {
            XPathValue::NodeSet(nodes) => {
                let filtered = apply_predicates(nodes, predicates, e_ctx)?;
                Ok(XPathValue::NodeSet(filtered))
            }
            other => Err(XPathError::TypeError(format!(
                "Predicates can only filter a node-set, got {:?}",
                other
            ))),
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated_args, e_ctx)
        }
        Expression::BinaryOp {
            left,
            op: op @ (BinaryOperator::Or | BinaryOperator::And),
            right,
        } => {
            let left_val = evaluate(left, e_ctx)?.to_bool();
            // The right operand is not evaluated once the left one decides.
            let result = match op {
                BinaryOperator::Or => left_val || evaluate(right, e_ctx)?.to_bool(),
                _ => left_val && evaluate(right, e_ctx)?.to_bool(),
            };
            Ok(XPathValue::Boolean(result))
        }
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate(left, e_ctx)?;
            let right_val = evaluate(right, e_ctx)?;
            operators::evaluate(*op, left_val, right_val)
        }
        Expression::Negate(expr) => {
            let val = evaluate(expr, e_ctx)?;
            Ok(XPathValue::Number(-val.to_number()))
        }
    }
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut current_nodes = if let Some(start_expr) = &path.start_point {
        match evaluate(start_expr, e_ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XPathError::TypeError(format!(
                    "A path can only continue from a node-set, got {:?}",
                    other
                )));
            }
        }
    } else if path.is_absolute {
        vec![e_ctx.root_node]
    } else {
        vec![e_ctx.context_node]
    };

    for step in &path.steps {
        current_nodes = evaluate_step(step, &current_nodes, e_ctx)?;
    }
    Ok(current_nodes)
}

/// Evaluates one step from every context node separately, so that predicates see
/// positions along the axis of their own context node, then merges the results.
fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    e_ctx: &EvaluationContext<N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut selected = Vec::new();
    for &node in context_nodes {
        let candidates: Vec<N> = axes::collect(step.axis, node)
            .into_iter()
            .filter(|candidate| matches_node_test(candidate, &step.node_test, step.axis))
            .collect();
        selected.extend(apply_predicates(candidates, &step.predicates, e_ctx)?);
    }
    Ok(into_document_order(selected))
}

pub(crate) fn into_document_order<'a, N: DataSourceNode<'a>>(mut nodes: Vec<N>) -> Vec<N> {
    nodes.sort();
    nodes.dedup();
    nodes
}

fn matches_node_test<'a, N>(node: &N, test: &NodeTest, axis: Axis) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };

    match test {
        NodeTest::Wildcard => node.node_type() == principal,
        NodeTest::Name(name) => {
            node.node_type() == principal && node.name().is_some_and(|q| name_matches(q, name))
        }
        NodeTest::NodeType(NodeTypeTest::Text) => node.node_type() == NodeType::Text,
        NodeTest::NodeType(NodeTypeTest::Comment) => node.node_type() == NodeType::Comment,
        NodeTest::NodeType(NodeTypeTest::ProcessingInstruction) => {
            node.node_type() == NodeType::ProcessingInstruction
        }
        NodeTest::NodeType(NodeTypeTest::Node) => true,
    }
}

/// An unprefixed test matches on the local part alone.
fn name_matches(q_name: QName<'_>, test: &str) -> bool {
    match test.split_once(':') {
        Some((prefix, local)) => q_name.prefix == Some(prefix) && q_name.local_part == local,
        None => q_name.local_part == test,
    }
}

/// Filters `nodes`, given in the order positions count along, by each predicate in turn.
fn apply_predicates<'a, N>(
    nodes: Vec<N>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut remaining = nodes;
    for predicate in predicates {
        let context_size = remaining.len();
        let mut kept = Vec::with_capacity(context_size);
        for (index, &node) in remaining.iter().enumerate() {
            let position = index + 1;
            let keep = match evaluate(predicate, &e_ctx.focus(node, position, context_size))? {
                XPathValue::Number(n) => n == position as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(node);
            }
        }
        remaining = kept;
    }
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{XmlDocument, XmlNode};

    const LIST: &str = r#"<root>
        <ul id="first"><li>a</li><li class="x">b</li><li>c</li></ul>
        <ul id="second"><li>d</li><li>e</li></ul>
    </root>"#;

    fn texts<'a>(nodes: &[XmlNode<'a, 'a>]) -> Vec<String> {
        nodes.iter().map(|n| n.string_value()).collect()
    }

    #[test]
    fn test_predicate_positions_are_per_context_node() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let firsts = select("//ul/li[1]", doc.root()).unwrap();
        assert_eq!(texts(&firsts), vec!["a", "d"]);

        let lasts = select("//li[last()]", doc.root()).unwrap();
        assert_eq!(texts(&lasts), vec!["c", "e"]);
    }

    #[test]
    fn test_filter_expression_positions_are_global() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let first = select("(//li)[1]", doc.root()).unwrap();
        assert_eq!(texts(&first), vec!["a"]);

        let tail = select("(//li)[position() > last() - 2]", doc.root()).unwrap();
        assert_eq!(texts(&tail), vec!["d", "e"]);

        let continued = select("(//ul)[2]/li", doc.root()).unwrap();
        assert_eq!(texts(&continued), vec!["d", "e"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let nearest = select("//li[@class='x']/preceding-sibling::*[1]", doc.root()).unwrap();
        assert_eq!(texts(&nearest), vec!["a"]);

        let parent = select("//li[@class='x']/ancestor::*[1]", doc.root()).unwrap();
        assert_eq!(parent.len(), 1);
        assert_eq!(parent[0].name().unwrap().local_part, "ul");
    }

    #[test]
    fn test_union_is_in_document_order() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let nodes = select("//li[2] | //ul[1]/li[1] | //li[2]", doc.root()).unwrap();
        assert_eq!(texts(&nodes), vec!["a", "b", "e"]);
    }

    #[test]
    fn test_relative_paths_use_the_context_node() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let second = select("//ul[@id='second']", doc.root()).unwrap();
        let items = select(".//li", second[0]).unwrap();
        assert_eq!(texts(&items), vec!["d", "e"]);

        // Absolute paths still start at the root.
        let all = select("//li", second[0]).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_attribute_axis() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let ids = select("//ul/@id", doc.root()).unwrap();
        assert_eq!(texts(&ids), vec!["first", "second"]);
        assert!(ids.iter().all(|n| n.node_type() == NodeType::Attribute));
    }

    #[test]
    fn test_evaluate_scalars() {
        let doc = XmlDocument::parse(LIST).unwrap();
        let ctx = EvaluationContext::new(doc.root());
        let value = evaluate(&parse_expression("count(//li) * 2").unwrap(), &ctx).unwrap();
        assert_eq!(value, XPathValue::Number(10.0));

        let value = evaluate(&parse_expression("1 div 0").unwrap(), &ctx).unwrap();
        assert_eq!(value.to_string(), "Infinity");
    }

    #[test]
    fn test_select_requires_a_node_set() {
        let doc = XmlDocument::parse(LIST).unwrap();
        assert!(matches!(
            select("1 + 1", doc.root()),
            Err(XPathError::TypeError(_))
        ));
        assert!(matches!(
            select("(1)[1]", doc.root()),
            Err(XPathError::TypeError(_))
        ));
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(parse_number(" 12 "), 12.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("").is_nan());
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
    }
}
