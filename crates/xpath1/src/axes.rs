//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Every collector returns nodes in axis order: document order for forward axes and
//! nearest-first for reverse axes, which is the order predicate positions count along.

use crate::ast::Axis;
use crate::datasource::{DataSourceNode, NodeType};

/// Collects the nodes on `axis` from `node`.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Attribute => node.attributes().collect(),
        Axis::Descendant => descendants(node),
        Axis::DescendantOrSelf => {
            let mut results = vec![node];
            results.extend(descendants(node));
            results
        }
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => ancestors(node),
        Axis::AncestorOrSelf => {
            let mut results = vec![node];
            results.extend(ancestors(node));
            results
        }
        Axis::SelfAxis => vec![node],
        Axis::FollowingSibling => following_siblings(node),
        Axis::PrecedingSibling => preceding_siblings(node),
        Axis::Following => following(node),
        Axis::Preceding => preceding(node),
    }
}

/// Pre-order traversal, excluding `node` itself.
pub fn descendants<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        results.push(current);
        let mut children: Vec<N> = current.children().collect();
        children.reverse();
        stack.extend(children);
    }
    results
}

fn ancestors<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        results.push(parent);
        current = parent.parent();
    }
    results
}

// Attributes have no siblings.
fn siblings<'a, N: DataSourceNode<'a>>(node: N) -> Option<Vec<N>> {
    if node.node_type() == NodeType::Attribute {
        return None;
    }
    node.parent().map(|parent| parent.children().collect())
}

fn following_siblings<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let Some(all) = siblings(node) else {
        return Vec::new();
    };
    all.into_iter().skip_while(|s| *s != node).skip(1).collect()
}

fn preceding_siblings<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let Some(all) = siblings(node) else {
        return Vec::new();
    };
    let mut before: Vec<N> = all.into_iter().take_while(|s| *s != node).collect();
    before.reverse();
    before
}

fn following<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut current = node;
    if node.node_type() == NodeType::Attribute {
        // The owner element's content follows its attributes.
        if let Some(owner) = node.parent() {
            results.extend(descendants(owner));
            current = owner;
        }
    }
    loop {
        for sibling in following_siblings(current) {
            results.push(sibling);
            results.extend(descendants(sibling));
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    results
}

fn preceding<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut current = match node.node_type() {
        NodeType::Attribute => match node.parent() {
            Some(owner) => owner,
            None => return results,
        },
        _ => node,
    };
    loop {
        for sibling in preceding_siblings(current) {
            let mut subtree = descendants(sibling);
            subtree.reverse();
            results.extend(subtree);
            results.push(sibling);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    results
}
