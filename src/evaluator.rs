//! The seam between compiled selectors and the engine that runs them.

use crate::error::EvaluationError;
use xdom_xpath1::DataSourceNode;

/// Evaluates XPath expressions against a tree.
///
/// Implementations return the matched nodes in document order and an empty list, not an
/// error, when nothing matches.
pub trait PathEvaluator {
    fn evaluate<'a, N>(&self, expression: &str, context: N) -> Result<Vec<N>, EvaluationError>
    where
        N: DataSourceNode<'a> + 'a;
}

/// The `xdom-xpath1` evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct XPathEngine;

impl PathEvaluator for XPathEngine {
    fn evaluate<'a, N>(&self, expression: &str, context: N) -> Result<Vec<N>, EvaluationError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        xdom_xpath1::select(expression, context).map_err(|source| EvaluationError {
            expression: expression.to_string(),
            source,
        })
    }
}
