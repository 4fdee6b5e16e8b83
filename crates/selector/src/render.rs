//! Renders a tokenized [`SelectorGroup`] as an XPath 1.0 expression.
//!
//! Node-level constraints become one predicate each, in source order. Structural
//! pseudo-classes count siblings instead of using `position()`, so their meaning does
//! not depend on which axis reached the node. Positional filters (`:first`, `:eq(n)`,
//! ...) wrap everything rendered so far in a filter expression.

use crate::ast::*;
use crate::error::SelectorError;
use crate::escape::{is_xpath_name, string_literal};
use itertools::Itertools;
use std::mem;

/// Renders `group` as an XPath expression.
///
/// In path mode each alternative starts from `prefix` (the document root when empty)
/// and several alternatives are joined with `|`. In boolean mode (`as_boolean`) each
/// alternative is rendered as a condition on the context node and `prefix` is unused.
pub fn render(
    group: &SelectorGroup,
    prefix: &str,
    as_boolean: bool,
) -> Result<String, SelectorError> {
    if group.sequences.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut rendered = group
        .sequences
        .iter()
        .map(|sequence| {
            if as_boolean {
                render_condition(sequence)
            } else {
                render_path(sequence, prefix)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expression = if rendered.len() == 1 {
        rendered.remove(0)
    } else if as_boolean {
        rendered.join(" or ")
    } else {
        format!("({})", rendered.join(" | "))
    };

    log::trace!("Rendered selector group as '{}'", expression);
    Ok(expression)
}

// --- Path Mode ---

fn render_path(sequence: &Sequence, prefix: &str) -> Result<String, SelectorError> {
    let mut path = prefix.to_string();

    for step in &sequence.steps {
        let (axis, adjacent) = match step.combinator {
            Combinator::Descendant => ("//", false),
            Combinator::Child => ("/", false),
            Combinator::FollowingSibling => ("/following-sibling::", false),
            Combinator::AdjacentSibling => ("/following-sibling::", true),
            Combinator::SelfAxis if path.is_empty() => ("self::", false),
            Combinator::SelfAxis => ("/self::", false),
        };
        open_step(&mut path, axis, adjacent, &step.compound);

        for rendered in compound_conditions(&step.compound)? {
            match rendered {
                Rendered::Condition(condition) => push_predicate(&mut path, &condition),
                Rendered::Positional(filter) => {
                    path = format!("({}){}", path, positional_predicate(filter));
                }
            }
        }
    }
    Ok(path)
}

// --- Boolean Mode ---

/// Renders a sequence as a condition that holds when the context node matches it.
///
/// The last step is tested on the context node itself; each earlier step becomes a
/// nested condition reached through the reverse of the combinator that followed it.
fn render_condition(sequence: &Sequence) -> Result<String, SelectorError> {
    let Some(first) = sequence.steps.first() else {
        return Err(SelectorError::Empty);
    };
    if !matches!(
        first.combinator,
        Combinator::Descendant | Combinator::SelfAxis
    ) {
        return Err(SelectorError::UnsupportedFeature(format!(
            "leading '{}' combinator in a node condition",
            first.combinator
        )));
    }
    reverse_condition(&sequence.steps)
}

/// Builds the nested condition from the outermost step inwards, so that each step wraps
/// the condition of the step before it.
fn reverse_condition(steps: &[Step]) -> Result<String, SelectorError> {
    let mut nested: Option<String> = None;

    for (i, step) in steps.iter().enumerate() {
        let reached_by = steps
            .get(i + 1)
            .map_or(Combinator::SelfAxis, |next| next.combinator);
        let (axis, adjacent) = match reached_by {
            Combinator::Descendant => ("ancestor::", false),
            Combinator::Child => ("parent::", false),
            Combinator::FollowingSibling => ("preceding-sibling::", false),
            Combinator::AdjacentSibling => ("preceding-sibling::", true),
            Combinator::SelfAxis => ("self::", false),
        };
        let mut condition = String::new();
        open_step(&mut condition, axis, adjacent, &step.compound);

        for rendered in compound_conditions(&step.compound)? {
            match rendered {
                Rendered::Condition(c) => push_predicate(&mut condition, &c),
                Rendered::Positional(filter) => {
                    return Err(SelectorError::UnsupportedFeature(format!(
                        "positional filter {:?} in a node condition",
                        filter
                    )));
                }
            }
        }

        if let Some(earlier) = &nested {
            push_predicate(&mut condition, earlier);
        }
        nested = Some(condition);
    }

    nested.ok_or(SelectorError::Empty)
}

// --- Staged Filtering ---

/// One pass over an ordered list of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStage {
    /// Keeps the nodes for which this boolean expression holds.
    Condition(String),
    /// Keeps the nodes at the positions this filter selects.
    Positional(PositionalFilter),
}

/// Renders `group` as passes to apply in turn to an ordered list of nodes.
///
/// The conditions before the first positional filter pick from the list, each
/// positional filter then picks by index from what is left, and later conditions narrow
/// it further: `td.a:first.b` keeps the first `td.a` of the list if it is also `.b`.
/// Only a single alternative whose positional filters all sit in its last step can be
/// staged; anything else is an `UnsupportedFeature`.
pub fn render_stages(group: &SelectorGroup) -> Result<Vec<FilterStage>, SelectorError> {
    let [sequence] = group.sequences.as_slice() else {
        return Err(SelectorError::UnsupportedFeature(
            "positional filter across alternatives".to_string(),
        ));
    };
    let Some((last, earlier)) = sequence.steps.split_last() else {
        return Err(SelectorError::Empty);
    };

    let mut stages = Vec::new();
    let mut segment = Vec::new();
    let mut leading = true;
    for token in &last.compound.tokens {
        let filter = match token {
            Token::Pseudo(pseudo) => pseudo.positional(),
            _ => None,
        };
        match filter {
            Some(filter) => {
                let tokens = mem::take(&mut segment);
                push_condition_stage(&mut stages, tokens, earlier, last, leading)?;
                leading = false;
                stages.push(FilterStage::Positional(filter));
            }
            None => segment.push(token.clone()),
        }
    }
    push_condition_stage(&mut stages, segment, earlier, last, leading)?;

    log::trace!("Rendered selector group as {} filter stage(s)", stages.len());
    Ok(stages)
}

/// The leading segment carries the earlier steps; later ones only test the node itself.
fn push_condition_stage(
    stages: &mut Vec<FilterStage>,
    mut tokens: Vec<Token>,
    earlier: &[Step],
    last: &Step,
    leading: bool,
) -> Result<(), SelectorError> {
    let steps = if leading {
        if tokens.is_empty() && earlier.is_empty() {
            return Ok(());
        }
        let mut steps = earlier.to_vec();
        steps.push(Step {
            combinator: last.combinator,
            compound: CompoundTerm { tokens },
        });
        steps
    } else {
        if tokens.is_empty() {
            return Ok(());
        }
        // `*-of-type` needs the tag name.
        if let Some(tag @ Token::Tag(_)) = last.compound.tokens.first() {
            tokens.insert(0, tag.clone());
        }
        vec![Step {
            combinator: Combinator::SelfAxis,
            compound: CompoundTerm { tokens },
        }]
    };

    let condition = render_condition(&Sequence { steps })?;
    stages.push(FilterStage::Condition(condition));
    Ok(())
}

// --- Steps & Node Tests ---

/// The name test of a compound, plus a `name()` check when the tag is not a valid XPath name.
struct NodeTest {
    name: String,
    check: Option<String>,
}

fn node_test(compound: &CompoundTerm) -> NodeTest {
    match compound.tag_name() {
        Some(tag) => named_test(tag),
        None => NodeTest {
            name: "*".to_string(),
            check: None,
        },
    }
}

fn named_test(tag: &str) -> NodeTest {
    if is_xpath_name(tag) {
        NodeTest {
            name: tag.to_string(),
            check: None,
        }
    } else {
        NodeTest {
            name: "*".to_string(),
            check: Some(format!("name()={}", string_literal(tag))),
        }
    }
}

impl NodeTest {
    /// The test as a self-contained step expression, e.g. `li` or `*[name()="1st"]`.
    fn as_step(&self) -> String {
        match &self.check {
            Some(check) => format!("{}[{}]", self.name, check),
            None => self.name.clone(),
        }
    }
}

fn open_step(out: &mut String, axis: &str, adjacent: bool, compound: &CompoundTerm) {
    let test = node_test(compound);
    out.push_str(axis);
    if adjacent {
        // Only the nearest sibling qualifies; its name is then tested on it.
        out.push_str("*[1]");
        if test.name != "*" {
            push_predicate(out, &format!("self::{}", test.name));
        }
    } else {
        out.push_str(&test.name);
    }
    if let Some(check) = &test.check {
        push_predicate(out, check);
    }
}

fn push_predicate(out: &mut String, condition: &str) {
    out.push('[');
    out.push_str(condition);
    out.push(']');
}

// --- Compound Terms ---

enum Rendered {
    Condition(String),
    Positional(PositionalFilter),
}

/// Renders every token of `compound` except the leading tag, which is part of the node test.
fn compound_conditions(compound: &CompoundTerm) -> Result<Vec<Rendered>, SelectorError> {
    let skip = usize::from(matches!(compound.tokens.first(), Some(Token::Tag(_))));
    compound.tokens[skip..]
        .iter()
        .map(|token| render_token(token, compound))
        .collect()
}

fn render_token(token: &Token, compound: &CompoundTerm) -> Result<Rendered, SelectorError> {
    let condition = match token {
        Token::Tag(TagName::Universal) => "self::*".to_string(),
        Token::Tag(TagName::Named(name)) => format!("self::{}", named_test(name).as_step()),
        Token::Id(id) => format!("@id={}", string_literal(id)),
        Token::Class(class) => format!(
            "contains(concat(\" \", normalize-space(@class), \" \"), {})",
            string_literal(&format!(" {} ", class))
        ),
        Token::Attribute(attribute) => attribute_condition(attribute),
        Token::Structural(structural) => structural_condition(structural, compound)?,
        Token::Pseudo(pseudo) => match pseudo.positional() {
            Some(filter) => return Ok(Rendered::Positional(filter)),
            None => pseudo_condition(pseudo)?,
        },
    };
    Ok(Rendered::Condition(condition))
}

// --- Attributes ---

fn attribute_condition(attribute: &AttributeSelector) -> String {
    let attr = if is_xpath_name(&attribute.name) {
        format!("@{}", attribute.name)
    } else {
        format!("@*[name()={}]", string_literal(&attribute.name))
    };
    let value = attribute.value.as_str();
    let literal = string_literal(value);

    match attribute.operator {
        AttributeOperator::Exists => attr,
        AttributeOperator::Equals => format!("{}={}", attr, literal),
        AttributeOperator::NotEquals => format!("not({}={})", attr, literal),
        AttributeOperator::DashMatch => format!(
            "({}={} or starts-with({}, {}))",
            attr,
            literal,
            attr,
            string_literal(&format!("{}-", value))
        ),
        // An empty or whitespace-bearing operand can never match these.
        AttributeOperator::Includes if value.is_empty() || value.contains(char::is_whitespace) => {
            "false()".to_string()
        }
        AttributeOperator::Substring | AttributeOperator::Prefix | AttributeOperator::Suffix
            if value.is_empty() =>
        {
            "false()".to_string()
        }
        AttributeOperator::Includes => format!(
            "contains(concat(\" \", normalize-space({}), \" \"), {})",
            attr,
            string_literal(&format!(" {} ", value))
        ),
        AttributeOperator::Substring => format!("contains({}, {})", attr, literal),
        AttributeOperator::Prefix => format!("starts-with({}, {})", attr, literal),
        AttributeOperator::Suffix => {
            let tail = value.chars().count() - 1;
            if tail == 0 {
                format!("substring({}, string-length({}))={}", attr, attr, literal)
            } else {
                format!(
                    "substring({}, string-length({}) - {})={}",
                    attr, attr, tail, literal
                )
            }
        }
    }
}

// --- Structural Pseudo-Classes ---

fn structural_condition(
    structural: &Structural,
    compound: &CompoundTerm,
) -> Result<String, SelectorError> {
    let siblings = match structural.unit {
        NthUnit::Child => "*".to_string(),
        NthUnit::OfType => match compound.tag_name() {
            Some(tag) => named_test(tag).as_step(),
            None => {
                return Err(SelectorError::UnsupportedFeature(
                    "*-of-type pseudo-class without a tag name".to_string(),
                ));
            }
        },
    };
    let before = format!("preceding-sibling::{}", siblings);
    let after = format!("following-sibling::{}", siblings);

    let condition = match structural.family {
        NthFamily::First => format!("not({})", before),
        NthFamily::Last => format!("not({})", after),
        NthFamily::Only => format!("not({}) and not({})", before, after),
        NthFamily::Nth => formula_condition(&format!("count({})", before), structural.formula),
        NthFamily::NthLast => formula_condition(&format!("count({})", after), structural.formula),
    };
    Ok(condition)
}

/// The node's 1-based index is `counted + 1`; it must equal `step * n + offset` for some `n >= 0`.
fn formula_condition(counted: &str, formula: NthFormula) -> String {
    let step = i128::from(formula.step);
    let offset = i128::from(formula.offset);
    // `counted` is compared against `offset - 1` throughout.
    let bound = offset - 1;

    if step == 0 {
        return if bound < 0 {
            "false()".to_string()
        } else {
            format!("{} = {}", counted, bound)
        };
    }

    let guard = if step > 0 {
        (bound > 0).then(|| format!("{} >= {}", counted, bound))
    } else if bound < 0 {
        return "false()".to_string();
    } else {
        Some(format!("{} <= {}", counted, bound))
    };

    let modulus = step.abs();
    let cycle = if modulus == 1 {
        None
    } else {
        let shifted = match -bound {
            0 => counted.to_string(),
            shift if shift > 0 => format!("({} + {})", counted, shift),
            shift => format!("({} - {})", counted, -shift),
        };
        Some(format!("{} mod {} = 0", shifted, modulus))
    };

    match (cycle, guard) {
        (Some(cycle), Some(guard)) => format!("{} and {}", cycle, guard),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => "true()".to_string(),
    }
}

// --- Positional Filters ---

/// `last()`, or `last() - distance` when `distance` is positive.
fn from_end(distance: i128) -> String {
    if distance == 0 {
        "last()".to_string()
    } else {
        format!("last() - {}", distance)
    }
}

/// The 1-based position expression for a zero-based, possibly negative, jQuery index.
fn position_of(index: i64) -> String {
    let index = i128::from(index);
    if index >= 0 {
        (index + 1).to_string()
    } else {
        from_end(-index - 1)
    }
}

fn positional_predicate(filter: PositionalFilter) -> String {
    match filter {
        PositionalFilter::First => "[1]".to_string(),
        PositionalFilter::Last => "[last()]".to_string(),
        PositionalFilter::Eq(index) => format!("[position() = {}]", position_of(index)),
        PositionalFilter::Gt(index) => format!("[position() > {}]", position_of(index)),
        PositionalFilter::Lt(index) => format!("[position() < {}]", position_of(index)),
        PositionalFilter::Odd => "[position() mod 2 = 0]".to_string(),
        PositionalFilter::Even => "[position() mod 2 = 1]".to_string(),
    }
}

// --- Other Pseudo-Classes ---

fn self_is_any(names: &[&str]) -> String {
    format!(
        "({})",
        names.iter().map(|name| format!("self::{}", name)).join(" or ")
    )
}

fn pseudo_condition(pseudo: &Pseudo) -> Result<String, SelectorError> {
    let condition = match (pseudo.name.as_str(), &pseudo.argument) {
        ("not", Some(PseudoArgument::Selector(group))) => {
            format!("not({})", render(group, "", true)?)
        }
        ("has", Some(PseudoArgument::Selector(group))) => render(group, ".", false)?,
        ("contains", Some(PseudoArgument::Text(text))) => {
            format!("contains(., {})", string_literal(text))
        }
        ("checked", None) => {
            "((self::input and @checked) or (self::option and @selected))".to_string()
        }
        ("selected", None) => "(self::option and @selected)".to_string(),
        ("disabled", None) => "@disabled".to_string(),
        ("enabled", None) => format!(
            "({} and not(@disabled))",
            self_is_any(&["input", "button", "select", "textarea", "option"])
        ),
        ("input", None) => self_is_any(&["input", "textarea", "select", "button"]),
        ("button", None) => "(self::button or (self::input and @type=\"button\"))".to_string(),
        ("submit", None) => "((self::input or self::button) and @type=\"submit\")".to_string(),
        ("reset", None) => "((self::input or self::button) and @type=\"reset\")".to_string(),
        ("text", None) => "(self::input and (not(@type) or @type=\"text\"))".to_string(),
        ("checkbox" | "radio" | "file" | "password" | "image", None) => {
            format!("(self::input and @type=\"{}\")", pseudo.name)
        }
        ("header", None) => self_is_any(&["h1", "h2", "h3", "h4", "h5", "h6"]),
        ("empty", None) => "not(* or text())".to_string(),
        ("parent", None) => "(* or text())".to_string(),
        ("root", None) => "not(parent::*)".to_string(),
        _ => {
            return Err(SelectorError::UnsupportedFeature(format!(
                "pseudo-class '{}'",
                pseudo
            )));
        }
    };
    Ok(condition)
}
