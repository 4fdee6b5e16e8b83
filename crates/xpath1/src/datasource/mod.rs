//! Defines the core abstraction for a navigable, read-only document tree.
use std::hash::Hash;

pub mod xml;

pub use xml::{XmlDocument, XmlNode};

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

/// The type of a node in the data source tree, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The contract for a node in a read-only document tree.
///
/// The XPath engine and the selector query layer are written against this trait, so any
/// parsed markup tree can be queried by implementing it. Nodes are cheap handles:
/// `Ord` must follow document order, with an element ordered before its attributes.
///
/// `'a` is the lifetime of the underlying document.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    /// The type of the node (Element, Text, Attribute, etc.).
    fn node_type(&self) -> NodeType;

    /// The qualified name of the node (e.g., `svg:rect`). Returns `None` for node
    /// types that do not have names, such as text or root nodes. For a processing-
    /// instruction, this is its target.
    fn name(&self) -> Option<QName<'a>>;

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    /// - For a text node, this is its content.
    /// - For an element, this is the concatenation of the string values of all
    ///   its descendant text nodes.
    /// - For an attribute, this is its value.
    /// - For a comment or processing instruction, this is its content.
    fn string_value(&self) -> String;

    /// An iterator over the attribute nodes of this node.
    /// The iterator will be empty for non-element nodes.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// An iterator over the child nodes of this node.
    /// The iterator will be empty for leaf nodes (like text or attributes).
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// A reference to the parent node. Returns `None` for the root node or attributes detached
    /// from an element. This is essential for axes like `parent::` and `ancestor::`.
    fn parent(&self) -> Option<Self>;
}
