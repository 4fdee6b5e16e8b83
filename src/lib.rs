//! Query XML and XHTML trees with CSS and jQuery selectors.
//!
//! Selectors are compiled to XPath 1.0 by `xdom-selector` and evaluated by
//! `xdom-xpath1`, or by any other [`PathEvaluator`].
//!
//! ```
//! use xdom::{XDom, XmlDocument};
//!
//! let doc = XmlDocument::parse("<ul><li>a</li><li class='x'>b</li></ul>").unwrap();
//! let dom = XDom::new();
//! let items = dom.query(doc.root(), "li.x").unwrap();
//! assert_eq!(items.text(), "b");
//! ```

pub mod dom;
pub mod error;
pub mod evaluator;
pub mod selection;

pub use dom::{XDom, XDomBuilder};
pub use error::{EvaluationError, XDomError};
pub use evaluator::{PathEvaluator, XPathEngine};
pub use selection::Selection;
pub use xdom_selector::{CompiledExpression, SelectorCache, SelectorError, compile};
pub use xdom_xpath1::{DataSourceNode, NodeType, XmlDocument, XmlNode};
