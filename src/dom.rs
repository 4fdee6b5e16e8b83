// src/dom.rs
use crate::error::XDomError;
use crate::evaluator::{PathEvaluator, XPathEngine};
use crate::selection::Selection;
use std::sync::Arc;
use xdom_selector::{CompiledExpression, FilterStage, SelectorCache, SelectorError};
use xdom_xpath1::engine::document_root;
use xdom_xpath1::{DataSourceNode, NodeType};

/// Runs CSS and jQuery selectors against any tree implementing `DataSourceNode`.
#[derive(Debug, Clone)]
pub struct XDom<E = XPathEngine> {
    cache: Arc<SelectorCache>,
    cache_compiled: bool,
    evaluator: E,
}

/// A builder for creating an `XDom`.
#[derive(Debug)]
pub struct XDomBuilder<E = XPathEngine> {
    cache: Option<Arc<SelectorCache>>,
    cache_compiled: bool,
    evaluator: E,
}

impl Default for XDomBuilder {
    fn default() -> Self {
        Self {
            cache: None,
            cache_compiled: true,
            evaluator: XPathEngine,
        }
    }
}

impl XDomBuilder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<E: PathEvaluator> XDomBuilder<E> {
    /// Shares a selector cache with other `XDom` instances, possibly on other threads.
    pub fn with_cache(mut self, cache: Arc<SelectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// When disabled, compiled expressions are not memoized; tokenized selectors still are.
    pub fn with_compiled_cache(mut self, enabled: bool) -> Self {
        self.cache_compiled = enabled;
        self
    }

    /// Replaces the expression evaluator.
    pub fn with_evaluator<F: PathEvaluator>(self, evaluator: F) -> XDomBuilder<F> {
        XDomBuilder {
            cache: self.cache,
            cache_compiled: self.cache_compiled,
            evaluator,
        }
    }

    pub fn build(self) -> XDom<E> {
        XDom {
            cache: self.cache.unwrap_or_default(),
            cache_compiled: self.cache_compiled,
            evaluator: self.evaluator,
        }
    }
}

impl Default for XDom {
    fn default() -> Self {
        XDomBuilder::new().build()
    }
}

impl XDom {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn builder() -> XDomBuilder {
        XDomBuilder::new()
    }
}

impl<E: PathEvaluator> XDom<E> {
    pub fn cache(&self) -> &Arc<SelectorCache> {
        &self.cache
    }

    /// Compiles `selector` against the document root.
    pub fn compile(&self, selector: &str) -> Result<CompiledExpression, SelectorError> {
        if self.cache_compiled {
            self.cache.compile(selector)
        } else {
            self.cache.compile_with_prefix(selector, "")
        }
    }

    /// Finds the nodes matching `selector` below `context`.
    ///
    /// A document node is searched from the root; any other node only through its own
    /// descendants, or through its siblings for a selector starting with `+` or `~`.
    pub fn find<'a, N>(&self, context: N, selector: &str) -> Result<Vec<N>, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let expression = if context.node_type() == NodeType::Root {
            self.compile(selector)?
        } else {
            self.cache.compile_with_prefix(selector, ".")?
        };
        log::trace!("Evaluating '{}' for '{}'", expression, selector);
        Ok(self.evaluator.evaluate(expression.as_str(), context)?)
    }

    /// Whether `node` itself matches `selector`, like jQuery's `is`.
    ///
    /// Selectors with positional filters (`:first`, `:eq(1)`, ...) have no condition form;
    /// for those the node is looked up among the matches from the document root.
    pub fn matches<'a, N>(&self, node: N, selector: &str) -> Result<bool, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        match self.cache.compile_condition(selector) {
            Ok(condition) => {
                let expression = format!("self::node()[{}]", condition);
                Ok(!self.evaluator.evaluate(&expression, node)?.is_empty())
            }
            Err(SelectorError::UnsupportedFeature(feature)) => {
                log::debug!(
                    "No condition form for '{}' ({}), matching against the document",
                    selector,
                    feature
                );
                Ok(self.find(document_root(node), selector)?.contains(&node))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The members of `nodes` that match `selector`, in document order.
    ///
    /// Positional filters pick by index among the members that passed the conditions
    /// before them, as jQuery's `filter` does: from the cells of one row, `td:first`
    /// keeps that row's first cell. A positional filter before the last step, or in one
    /// of several alternatives, is resolved against the whole document instead.
    pub fn filter<'a, N>(&self, nodes: &[N], selector: &str) -> Result<Vec<N>, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let mut nodes = nodes.to_vec();
        nodes.sort();
        nodes.dedup();

        let stages = match self.cache.compile_condition(selector) {
            Ok(condition) => return self.keep_matching(nodes, condition.as_str()),
            Err(SelectorError::UnsupportedFeature(_)) => self.cache.compile_stages(selector),
            Err(e) => return Err(e.into()),
        };

        match stages {
            Ok(stages) => self.apply_stages(nodes, &stages),
            Err(SelectorError::UnsupportedFeature(feature)) => {
                log::debug!(
                    "Cannot filter '{}' within the set ({}), matching against the document",
                    selector,
                    feature
                );
                let expression = self.compile(selector)?;
                let Some(&first) = nodes.first() else {
                    return Ok(nodes);
                };
                let matched = self
                    .evaluator
                    .evaluate(expression.as_str(), document_root(first))?;
                Ok(nodes.into_iter().filter(|n| matched.contains(n)).collect())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn keep_matching<'a, N>(&self, nodes: Vec<N>, condition: &str) -> Result<Vec<N>, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let expression = format!("self::node()[{}]", condition);
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !self.evaluator.evaluate(&expression, node)?.is_empty() {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn apply_stages<'a, N>(
        &self,
        mut nodes: Vec<N>,
        stages: &[FilterStage],
    ) -> Result<Vec<N>, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        for stage in stages {
            nodes = match stage {
                FilterStage::Condition(condition) => self.keep_matching(nodes, condition)?,
                FilterStage::Positional(filter) => {
                    let len = nodes.len();
                    nodes
                        .into_iter()
                        .enumerate()
                        .filter(|(i, _)| filter.selects(*i, len))
                        .map(|(_, node)| node)
                        .collect()
                }
            };
        }
        Ok(nodes)
    }

    /// Wraps `nodes` in a `Selection` bound to this instance.
    pub fn select<'a, N>(&self, nodes: impl IntoIterator<Item = N>) -> Selection<'_, N, E>
    where
        N: DataSourceNode<'a> + 'a,
    {
        Selection::new(self, nodes.into_iter().collect())
    }

    /// Finds the nodes matching `selector` below `context` as a `Selection`.
    pub fn query<'a, N>(&self, context: N, selector: &str) -> Result<Selection<'_, N, E>, XDomError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let nodes = self.find(context, selector)?;
        Ok(Selection::new(self, nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use xdom_xpath1::{XmlDocument, XmlNode};

    const PAGE: &str = r#"<html><body>
        <ul id="menu"><li class="item">Home</li><li class="item active">About</li></ul>
        <p>Tail</p>
    </body></html>"#;

    /// Records every expression it is asked to run.
    #[derive(Default)]
    struct Recording(std::sync::Mutex<Vec<String>>);

    impl PathEvaluator for &Recording {
        fn evaluate<'a, N>(&self, expression: &str, _: N) -> Result<Vec<N>, EvaluationError>
        where
            N: DataSourceNode<'a> + 'a,
        {
            self.0.lock().unwrap().push(expression.to_string());
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_find_from_root_and_from_element() {
        let doc = XmlDocument::parse(PAGE).unwrap();
        let dom = XDom::new();

        let items = dom.find(doc.root(), "li.item").unwrap();
        assert_eq!(items.len(), 2);

        let menu = dom.find(doc.root(), "#menu").unwrap()[0];
        assert_eq!(dom.find(menu, "li").unwrap().len(), 2);
        assert_eq!(dom.find(menu, "> li.active").unwrap().len(), 1);
        assert_eq!(dom.find(menu, "+ p").unwrap().len(), 1);
        // The context element itself is not part of its own search.
        assert!(dom.find(menu, "ul").unwrap().is_empty());
    }

    #[test]
    fn test_matches() {
        let doc = XmlDocument::parse(PAGE).unwrap();
        let dom = XDom::new();
        let items = dom.find(doc.root(), "li").unwrap();

        assert!(dom.matches(items[1], ".active").unwrap());
        assert!(!dom.matches(items[0], ".active").unwrap());
        assert!(dom.matches(items[0], "#menu > li").unwrap());
        assert!(dom.matches(items[0], "li:first").unwrap());
        assert!(!dom.matches(items[1], "li:first").unwrap());
        assert!(matches!(
            dom.matches(items[0], "li:hover"),
            Err(XDomError::Selector(SelectorError::UnsupportedFeature(_)))
        ));
    }

    #[test]
    fn test_filter_applies_positions_within_the_set() {
        let doc = XmlDocument::parse(PAGE).unwrap();
        let dom = XDom::new();
        let items = dom.find(doc.root(), "li").unwrap();
        let active = &items[1..];

        assert_eq!(dom.filter(active, ":first").unwrap(), [items[1]]);
        assert_eq!(dom.filter(active, "li:eq(0)").unwrap(), [items[1]]);
        assert_eq!(dom.filter(&items, "li:last").unwrap(), [items[1]]);
        assert!(dom.filter(&items, ".item:first.active").unwrap().is_empty());
        assert_eq!(dom.filter(&items, ".item:gt(0).active").unwrap(), [items[1]]);
        // Still resolved against the whole document.
        assert!(dom.filter(active, "ul:first li:first").unwrap().is_empty());
        let none: &[XmlNode<'_, '_>] = &[];
        assert!(dom.filter(none, "li:first").unwrap().is_empty());
        assert!(matches!(
            dom.filter(none, "li:hover:first"),
            Err(XDomError::Selector(SelectorError::UnsupportedFeature(_)))
        ));
    }

    #[test]
    fn test_shared_cache() {
        let cache = Arc::new(SelectorCache::new());
        let first = XDom::builder().with_cache(Arc::clone(&cache)).build();
        let second = XDom::builder().with_cache(Arc::clone(&cache)).build();
        first.compile("ul li").unwrap();
        second.compile("ul li").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_custom_evaluator_receives_compiled_expressions() {
        let doc = XmlDocument::parse(PAGE).unwrap();
        let recording = Recording::default();
        let dom = XDom::builder()
            .with_compiled_cache(false)
            .with_evaluator(&recording)
            .build();

        assert!(dom.find(doc.root(), "ul > li").unwrap().is_empty());
        let menu = doc.root_element();
        dom.find(menu, "li, p").unwrap();

        let seen = recording.0.lock().unwrap();
        assert_eq!(*seen, vec!["//ul/li", "(.//li | .//p)"]);
    }

    #[test]
    fn test_selector_errors_surface() {
        let doc = XmlDocument::parse(PAGE).unwrap();
        let dom = XDom::new();
        assert!(matches!(
            dom.find(doc.root(), ""),
            Err(XDomError::Selector(SelectorError::Empty))
        ));
        assert!(matches!(
            dom.find(doc.root(), "li["),
            Err(XDomError::Selector(SelectorError::Syntax { .. }))
        ));
    }
}
