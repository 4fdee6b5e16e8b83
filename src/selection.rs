// src/selection.rs
use crate::dom::XDom;
use crate::error::XDomError;
use crate::evaluator::{PathEvaluator, XPathEngine};
use xdom_xpath1::{DataSourceNode, NodeType, QName};

/// An ordered set of nodes with jQuery-style traversal.
///
/// Nodes are kept in document order without duplicates. Operations return new selections
/// and leave the original untouched.
#[derive(Debug, Clone)]
pub struct Selection<'d, N, E = XPathEngine> {
    dom: &'d XDom<E>,
    nodes: Vec<N>,
}

impl<'d, 'a, N, E> Selection<'d, N, E>
where
    N: DataSourceNode<'a> + 'a,
    E: PathEvaluator,
{
    pub(crate) fn new(dom: &'d XDom<E>, mut nodes: Vec<N>) -> Self {
        nodes.sort();
        nodes.dedup();
        Self { dom, nodes }
    }

    fn with_nodes(&self, nodes: Vec<N>) -> Self {
        Self::new(self.dom, nodes)
    }

    /// Descendants of any selected node that match `selector`.
    pub fn find(&self, selector: &str) -> Result<Self, XDomError> {
        let mut found = Vec::new();
        for &node in &self.nodes {
            found.extend(self.dom.find(node, selector)?);
        }
        Ok(self.with_nodes(found))
    }

    /// The selected nodes that themselves match `selector`.
    ///
    /// Positional filters count within this selection, so `filter(":first")` keeps its
    /// first node.
    pub fn filter(&self, selector: &str) -> Result<Self, XDomError> {
        Ok(self.with_nodes(self.dom.filter(&self.nodes, selector)?))
    }

    pub fn first(&self) -> Self {
        self.with_nodes(self.nodes.first().copied().into_iter().collect())
    }

    pub fn last(&self) -> Self {
        self.with_nodes(self.nodes.last().copied().into_iter().collect())
    }

    /// The node at the zero-based `index`; negative indices count back from the end.
    pub fn eq(&self, index: isize) -> Self {
        let resolved = if index < 0 {
            self.nodes.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs())
        };
        let node = resolved.and_then(|i| self.nodes.get(i)).copied();
        self.with_nodes(node.into_iter().collect())
    }

    /// Element children of the selected nodes.
    pub fn children(&self) -> Self {
        let children = self
            .nodes
            .iter()
            .flat_map(|node| node.children())
            .filter(is_element)
            .collect();
        self.with_nodes(children)
    }

    /// Element parents of the selected nodes.
    pub fn parent(&self) -> Self {
        let parents = self
            .nodes
            .iter()
            .filter_map(|node| node.parent())
            .filter(is_element)
            .collect();
        self.with_nodes(parents)
    }

    /// Element siblings of the selected nodes, excluding the selected nodes themselves.
    pub fn siblings(&self) -> Self {
        let siblings = self
            .nodes
            .iter()
            .filter(|node| node.node_type() != NodeType::Attribute)
            .filter_map(|node| node.parent())
            .flat_map(|parent| parent.children())
            .filter(|sibling| is_element(sibling) && !self.nodes.contains(sibling))
            .collect();
        self.with_nodes(siblings)
    }

    /// The combined text content of the selected nodes.
    pub fn text(&self) -> String {
        self.nodes.iter().map(|node| node.string_value()).collect()
    }

    /// The value of attribute `name` on the first selected node.
    ///
    /// `name` is the qualified name as written in the document, e.g. `xml:lang`.
    pub fn attr(&self, name: &str) -> Option<String> {
        let node = self.nodes.first()?;
        node.attributes()
            .find(|attribute| attribute.name().is_some_and(|q| is_named(&q, name)))
            .map(|attribute| attribute.string_value())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = N> + '_ {
        self.nodes.iter().copied()
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.nodes
    }
}

fn is_named(qname: &QName<'_>, name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => qname.prefix == Some(prefix) && qname.local_part == local,
        None => qname.prefix.is_none() && qname.local_part == name,
    }
}

fn is_element<'a, N: DataSourceNode<'a>>(node: &N) -> bool {
    node.node_type() == NodeType::Element
}
