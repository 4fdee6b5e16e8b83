use crate::ast::SelectorGroup;
use crate::error::SelectorError;
use crate::render::{FilterStage, render, render_stages};
use crate::tokenizer::tokenize;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// A compiled XPath expression. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledExpression(Arc<str>);

impl CompiledExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CompiledExpression {
    fn from(expression: String) -> Self {
        Self(Arc::from(expression))
    }
}

impl AsRef<str> for CompiledExpression {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compiles a selector against the document root without any caching.
pub fn compile(selector: &str) -> Result<CompiledExpression, SelectorError> {
    compile_with_prefix(selector, "")
}

/// Compiles a selector whose first step starts from the path `prefix`, such as `.`.
pub fn compile_with_prefix(
    selector: &str,
    prefix: &str,
) -> Result<CompiledExpression, SelectorError> {
    let group = tokenize(selector)?;
    Ok(CompiledExpression::from(render(&group, prefix, false)?))
}

/// Compiles a selector into a boolean expression that holds when the context node matches.
pub fn compile_condition(selector: &str) -> Result<CompiledExpression, SelectorError> {
    let group = tokenize(selector)?;
    Ok(CompiledExpression::from(render(&group, "", true)?))
}

/// A concurrent memo of tokenized selectors and of their root-relative compilations.
///
/// Entries are keyed by the exact selector string and are never evicted. Two threads
/// compiling the same uncached selector both do the work; the results are equal, so
/// whichever insert lands last is kept.
#[derive(Debug, Default)]
pub struct SelectorCache {
    groups: DashMap<String, Arc<SelectorGroup>>,
    compiled: DashMap<String, CompiledExpression>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokenize(&self, selector: &str) -> Result<Arc<SelectorGroup>, SelectorError> {
        let cached = self.groups.get(selector).map(|entry| Arc::clone(entry.value()));
        if let Some(group) = cached {
            return Ok(group);
        }

        log::debug!("Tokenizing uncached selector '{}'", selector);
        let group = Arc::new(tokenize(selector)?);
        self.groups.insert(selector.to_string(), Arc::clone(&group));
        Ok(group)
    }

    pub fn compile(&self, selector: &str) -> Result<CompiledExpression, SelectorError> {
        let cached = self.compiled.get(selector).map(|entry| entry.value().clone());
        if let Some(expression) = cached {
            return Ok(expression);
        }

        let expression = self.compile_with_prefix(selector, "")?;
        self.compiled
            .insert(selector.to_string(), expression.clone());
        Ok(expression)
    }

    /// Compiles `selector` relative to the path `prefix`. Only the tokenization is cached.
    pub fn compile_with_prefix(
        &self,
        selector: &str,
        prefix: &str,
    ) -> Result<CompiledExpression, SelectorError> {
        let group = self.tokenize(selector)?;
        let expression = render(&group, prefix, false)?;
        log::debug!("Compiled '{}' to '{}'", selector, expression);
        Ok(CompiledExpression::from(expression))
    }

    /// Boolean form of `selector`. Only the tokenization is cached.
    pub fn compile_condition(&self, selector: &str) -> Result<CompiledExpression, SelectorError> {
        let group = self.tokenize(selector)?;
        Ok(CompiledExpression::from(render(&group, "", true)?))
    }

    /// `selector` as passes over an ordered node list. Only the tokenization is cached.
    pub fn compile_stages(&self, selector: &str) -> Result<Vec<FilterStage>, SelectorError> {
        let group = self.tokenize(selector)?;
        render_stages(&group)
    }

    /// The number of distinct selectors tokenized so far.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
