//! Compiles CSS and jQuery selectors into XPath 1.0 expressions.
//!
//! ```
//! let xpath = xdom_selector::compile("#main > table td:nth-child(odd)").unwrap();
//! assert_eq!(
//!     xpath.as_str(),
//!     r#"//*[@id="main"]/table//td[count(preceding-sibling::*) mod 2 = 0]"#
//! );
//! ```

pub mod ast;
pub mod cache;
pub mod error;
mod escape;
mod nth;
pub mod render;
mod scanner;
pub mod tokenizer;

pub use ast::*;
pub use cache::{
    CompiledExpression, SelectorCache, compile, compile_condition, compile_with_prefix,
};
pub use error::SelectorError;
pub use escape::string_literal;
pub use render::{FilterStage, render, render_stages};
pub use tokenizer::tokenize;
