//! An XPath 1.0 parser and evaluator over any tree implementing [`DataSourceNode`].

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, Step};
pub use datasource::{DataSourceNode, NodeType, QName, XmlDocument, XmlNode};
pub use engine::{EvaluationContext, XPathValue, evaluate, select, select_expression};
pub use error::XPathError;
pub use parser::parse_expression;
