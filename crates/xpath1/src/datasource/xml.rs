//! A `DataSourceNode` implementation over documents parsed by `roxmltree`.

use super::{DataSourceNode, NodeType, QName};
use roxmltree::Node;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A parsed XML or XHTML document.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self { doc })
    }

    /// The document node, parent of the root element.
    pub fn root<'a>(&'a self) -> XmlNode<'a, 'a> {
        XmlNode::Tree(self.doc.root())
    }

    /// The outermost element.
    pub fn root_element<'a>(&'a self) -> XmlNode<'a, 'a> {
        XmlNode::Tree(self.doc.root_element())
    }
}

/// A node of an `XmlDocument`.
///
/// `roxmltree` keeps attributes as data on their element, so an attribute node is
/// addressed by its owner element and its index.
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    /// The document, an element, text, comment or processing instruction.
    Tree(Node<'a, 'input>),
    Attribute { owner: Node<'a, 'input>, index: usize },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    /// The underlying tree node, or `None` for attributes.
    pub fn inner(&self) -> Option<Node<'a, 'input>> {
        match self {
            XmlNode::Tree(node) => Some(*node),
            XmlNode::Attribute { .. } => None,
        }
    }

    /// Node ids follow document order; attributes sort right after their owner.
    fn document_position(&self) -> (usize, usize) {
        match self {
            XmlNode::Tree(node) => (node.id().get() as usize, 0),
            XmlNode::Attribute { owner, index } => (owner.id().get() as usize, index + 1),
        }
    }

    fn attribute(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Attribute { owner, index } => owner.attributes().nth(*index),
            XmlNode::Tree(_) => None,
        }
    }
}

impl PartialEq for XmlNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        self.document_position() == other.document_position()
    }
}

impl Eq for XmlNode<'_, '_> {}

impl PartialOrd for XmlNode<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XmlNode<'_, '_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.document_position().cmp(&other.document_position())
    }
}

impl Hash for XmlNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document_position().hash(state);
    }
}

impl<'a> DataSourceNode<'a> for XmlNode<'a, 'a> {
    fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Tree(node) => match node.node_type() {
                roxmltree::NodeType::Root => NodeType::Root,
                roxmltree::NodeType::Element => NodeType::Element,
                roxmltree::NodeType::Text => NodeType::Text,
                roxmltree::NodeType::Comment => NodeType::Comment,
                roxmltree::NodeType::PI => NodeType::ProcessingInstruction,
            },
            XmlNode::Attribute { .. } => NodeType::Attribute,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Tree(node) if node.is_element() => {
                let tag = node.tag_name();
                Some(QName {
                    prefix: tag
                        .namespace()
                        .and_then(|uri| node.lookup_prefix(uri))
                        .filter(|prefix| !prefix.is_empty()),
                    local_part: tag.name(),
                })
            }
            XmlNode::Tree(node) => node.pi().map(|pi| QName {
                prefix: None,
                local_part: pi.target,
            }),
            XmlNode::Attribute { owner, .. } => self.attribute().map(|attr| {
                let prefix = match attr.namespace() {
                    Some(XML_NAMESPACE) => Some("xml"),
                    Some(uri) => owner.lookup_prefix(uri),
                    None => None,
                };
                QName {
                    prefix,
                    local_part: attr.name(),
                }
            }),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Tree(node) => match node.node_type() {
                roxmltree::NodeType::Root | roxmltree::NodeType::Element => node
                    .descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect(),
                roxmltree::NodeType::PI => node
                    .pi()
                    .and_then(|pi| pi.value)
                    .unwrap_or_default()
                    .to_string(),
                _ => node.text().unwrap_or_default().to_string(),
            },
            XmlNode::Attribute { .. } => self
                .attribute()
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) if node.is_element() => {
                let owner = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attribute { owner, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) => Box::new(node.children().map(XmlNode::Tree)),
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Tree(node) => node.parent().map(XmlNode::Tree),
            XmlNode::Attribute { owner, .. } => Some(XmlNode::Tree(*owner)),
        }
    }
}
