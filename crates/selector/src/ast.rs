//! Defines the token structure produced by the tokenizer and consumed by the renderer.
//!
//! Every value here is built once by [`crate::tokenize`] and never mutated afterwards,
//! which is what makes a tokenized group safe to share through the cache.

use std::fmt;

/// A comma-separated list of alternatives, e.g. `span, a.link`. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorGroup {
    pub sequences: Vec<Sequence>,
}

/// One full selector path, e.g. `.foo > span:first-child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub steps: Vec<Step>,
}

/// A compound term together with the combinator that relates it to the previous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub combinator: Combinator,
    pub compound: CompoundTerm,
}

/// How a step is reached from the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Whitespace, or the start of a selector.
    Descendant,
    /// `>`
    Child,
    /// `~`
    FollowingSibling,
    /// `+`
    AdjacentSibling,
    /// The node under test itself. Never produced by the tokenizer; the renderer
    /// uses it for the step matched against the context node of a boolean condition.
    SelfAxis,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Combinator::Descendant => " ",
            Combinator::Child => ">",
            Combinator::FollowingSibling => "~",
            Combinator::AdjacentSibling => "+",
            Combinator::SelfAxis => "&",
        };
        f.write_str(symbol)
    }
}

/// The constraints applying to a single node. The tag, when present, is always first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundTerm {
    pub tokens: Vec<Token>,
}

impl CompoundTerm {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The element name this compound is restricted to, if any.
    pub fn tag_name(&self) -> Option<&str> {
        match self.tokens.first() {
            Some(Token::Tag(TagName::Named(name))) => Some(name),
            _ => None,
        }
    }
}

/// A single constraint within a compound term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Tag(TagName),
    Id(String),
    Class(String),
    Attribute(AttributeSelector),
    Structural(Structural),
    Pseudo(Pseudo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagName {
    /// `*`
    Universal,
    Named(String),
}

/// `[name]`, `[name=value]`, `[name^="value"]`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: AttributeOperator,
    /// Empty for [`AttributeOperator::Exists`].
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeOperator {
    /// `[name]`
    Exists,
    /// `=`
    Equals,
    /// `!=`, jQuery extension: the attribute is absent or differs.
    NotEquals,
    /// `*=`
    Substring,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
}

/// `:first-child`, `:nth-last-of-type(2n+1)`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Structural {
    pub family: NthFamily,
    pub unit: NthUnit,
    pub formula: NthFormula,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NthFamily {
    Only,
    First,
    Last,
    Nth,
    NthLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NthUnit {
    Child,
    OfType,
}

/// The `an+b` pair of a structural pseudo-class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NthFormula {
    pub step: i64,
    pub offset: i64,
}

impl NthFormula {
    pub const EVEN: NthFormula = NthFormula { step: 2, offset: 0 };
    pub const ODD: NthFormula = NthFormula { step: 2, offset: 1 };
    /// The formula carried by `only-*`, `first-*` and `last-*`.
    pub const FIRST: NthFormula = NthFormula { step: 0, offset: 1 };

    pub fn new(step: i64, offset: i64) -> Self {
        Self { step, offset }
    }
}

/// `:name` or `:name(argument)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pseudo {
    /// Lower-cased.
    pub name: String,
    pub argument: Option<PseudoArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoArgument {
    /// Quoted or bare text, unescaped.
    Text(String),
    /// The integer argument of `:eq`, `:gt` and `:lt`.
    Index(i64),
    /// The nested selector of `:not` and `:has`.
    Selector(SelectorGroup),
}

/// A filter over the already matched sequence rather than a node condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionalFilter {
    First,
    Last,
    /// Zero-based; negative values count from the end.
    Eq(i64),
    Gt(i64),
    Lt(i64),
    /// Zero-based odd indices, i.e. the 2nd, 4th, ... match.
    Odd,
    /// Zero-based even indices, i.e. the 1st, 3rd, ... match.
    Even,
}

impl PositionalFilter {
    /// Whether the zero-based `index` of a list of `len` matches survives this filter.
    pub fn selects(&self, index: usize, len: usize) -> bool {
        let index = index as i128;
        let resolve = |n: i64| {
            let n = i128::from(n);
            if n < 0 {
                len as i128 + n
            } else {
                n
            }
        };
        match *self {
            PositionalFilter::First => index == 0,
            PositionalFilter::Last => index + 1 == len as i128,
            PositionalFilter::Eq(n) => index == resolve(n),
            PositionalFilter::Gt(n) => index > resolve(n),
            PositionalFilter::Lt(n) => index < resolve(n),
            PositionalFilter::Odd => index % 2 == 1,
            PositionalFilter::Even => index % 2 == 0,
        }
    }
}

impl Pseudo {
    pub fn new(name: impl Into<String>, argument: Option<PseudoArgument>) -> Self {
        Self {
            name: name.into(),
            argument,
        }
    }

    /// Classifies this pseudo-class as a positional filter, if it is one.
    pub fn positional(&self) -> Option<PositionalFilter> {
        match (self.name.as_str(), &self.argument) {
            ("first", None) => Some(PositionalFilter::First),
            ("last", None) => Some(PositionalFilter::Last),
            ("odd", None) => Some(PositionalFilter::Odd),
            ("even", None) => Some(PositionalFilter::Even),
            ("eq", Some(PseudoArgument::Index(n))) => Some(PositionalFilter::Eq(*n)),
            ("gt", Some(PseudoArgument::Index(n))) => Some(PositionalFilter::Gt(*n)),
            ("lt", Some(PseudoArgument::Index(n))) => Some(PositionalFilter::Lt(*n)),
            _ => None,
        }
    }
}

impl fmt::Display for Pseudo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name)?;
        match &self.argument {
            None => Ok(()),
            Some(PseudoArgument::Text(text)) => write!(f, "({})", text),
            Some(PseudoArgument::Index(n)) => write!(f, "({})", n),
            Some(PseudoArgument::Selector(_)) => f.write_str("(...)"),
        }
    }
}
