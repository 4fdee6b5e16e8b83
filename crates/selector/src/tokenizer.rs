//! A `nom`-based tokenizer for CSS/jQuery selectors.
//!
//! The scan is a loop over the unconsumed suffix of the input: a comma starts a new
//! alternative, a combinator starts a new step, and the compound-term matchers are
//! tried in a fixed priority order until none of them advances the cursor.

use crate::ast::*;
use crate::error::SelectorError;
use crate::nth::parse_formula;
use crate::scanner::split_argument;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{anychar, char, multispace0, multispace1, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    multi::many1_count,
    sequence::{delimited, pair, preceded},
};
use std::mem;

// --- Main Public Tokenizer ---

/// How deeply `:not(...)` and `:has(...)` arguments may nest.
pub const MAX_NESTING: usize = 64;

/// Tokenizes a selector into its alternatives, steps and compound terms.
pub fn tokenize(input: &str) -> Result<SelectorGroup, SelectorError> {
    tokenize_nested(input, 0)
}

fn tokenize_nested(input: &str, depth: usize) -> Result<SelectorGroup, SelectorError> {
    let selector = input.trim();
    if selector.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut sequences = Vec::new();
    let mut steps: Vec<Step> = Vec::new();
    let mut cursor = selector;

    while !cursor.is_empty() {
        if !steps.is_empty()
            && let Ok((rest, _)) = comma(cursor)
        {
            sequences.push(Sequence {
                steps: mem::take(&mut steps),
            });
            cursor = rest;
            continue;
        }

        let (rest, joined_by) = match combinator(cursor) {
            Ok((rest, kind)) => (rest, Some(kind)),
            Err(_) => (cursor, None),
        };
        // After the first step of an alternative, only a combinator may introduce another.
        if joined_by.is_none() && !steps.is_empty() {
            break;
        }

        let (rest, compound) = compound_term(rest, depth)?;
        if compound.is_empty() {
            break;
        }
        steps.push(Step {
            combinator: joined_by.unwrap_or(Combinator::Descendant),
            compound,
        });
        cursor = rest;
    }

    if !cursor.is_empty() {
        return Err(SelectorError::syntax(cursor));
    }
    if !steps.is_empty() {
        sequences.push(Sequence { steps });
    }

    log::trace!(
        "Tokenized '{}' into {} alternative(s)",
        selector,
        sequences.len()
    );
    Ok(SelectorGroup { sequences })
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn comma(input: &str) -> IResult<&str, char> {
    ws(char(',')).parse(input)
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        ws(alt((
            value(Combinator::Child, char('>')),
            value(Combinator::FollowingSibling, char('~')),
            value(Combinator::AdjacentSibling, char('+')),
        ))),
        value(Combinator::Descendant, multispace1),
    ))
    .parse(input)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || u32::from(c) >= 0xA0
}

/// A CSS identifier; backslash escapes are accepted and removed.
fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(many1_count(alt((
            recognize(pair(char('\\'), anychar)),
            recognize(satisfy(is_identifier_char)),
        )))),
        unescape,
    )
    .parse(input)
}

fn unescape(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            unescaped.extend(chars.next());
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

/// A single- or double-quoted string with backslash escapes.
fn quoted_string(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut text = String::new();
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            text.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[idx + c.len_utf8()..], text));
        } else {
            text.push(c);
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

// --- Compound Terms ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermKind {
    Tag,
    Id,
    Class,
    Attribute,
    Structural,
    Pseudo,
}

impl TermKind {
    const PRIORITY: [TermKind; 6] = [
        TermKind::Tag,
        TermKind::Id,
        TermKind::Class,
        TermKind::Attribute,
        TermKind::Structural,
        TermKind::Pseudo,
    ];
}

type TermMatch<'a> = Result<Option<(&'a str, Token)>, SelectorError>;

fn compound_term(input: &str, depth: usize) -> Result<(&str, CompoundTerm), SelectorError> {
    let mut cursor = input;
    let mut compound = CompoundTerm::default();

    loop {
        let mut advanced = false;
        for kind in TermKind::PRIORITY {
            // A tag name is only meaningful at the start of a compound.
            if kind == TermKind::Tag && !compound.is_empty() {
                continue;
            }
            if let Some((rest, token)) = match_term(kind, cursor, depth)? {
                compound.tokens.push(token);
                cursor = rest;
                advanced = true;
            }
        }
        if !advanced {
            break;
        }
    }
    Ok((cursor, compound))
}

fn match_term(kind: TermKind, input: &str, depth: usize) -> TermMatch<'_> {
    match kind {
        TermKind::Tag => Ok(tag_name(input).ok().map(|(rest, t)| (rest, Token::Tag(t)))),
        TermKind::Id => Ok(preceded(char('#'), identifier)
            .parse(input)
            .ok()
            .map(|(rest, id)| (rest, Token::Id(id)))),
        TermKind::Class => Ok(preceded(char('.'), identifier)
            .parse(input)
            .ok()
            .map(|(rest, class)| (rest, Token::Class(class)))),
        TermKind::Attribute => Ok(attribute(input)
            .ok()
            .map(|(rest, attr)| (rest, Token::Attribute(attr)))),
        TermKind::Structural => match_structural(input),
        TermKind::Pseudo => match_pseudo(input, depth),
    }
}

fn tag_name(input: &str) -> IResult<&str, TagName> {
    alt((
        value(TagName::Universal, char('*')),
        map(identifier, TagName::Named),
    ))
    .parse(input)
}

// --- Attribute Selectors ---

fn attribute_operator(input: &str) -> IResult<&str, AttributeOperator> {
    alt((
        value(AttributeOperator::Substring, tag("*=")),
        value(AttributeOperator::Prefix, tag("^=")),
        value(AttributeOperator::Suffix, tag("$=")),
        value(AttributeOperator::DashMatch, tag("|=")),
        value(AttributeOperator::NotEquals, tag("!=")),
        value(AttributeOperator::Includes, tag("~=")),
        value(AttributeOperator::Equals, tag("=")),
    ))
    .parse(input)
}

fn attribute(input: &str) -> IResult<&str, AttributeSelector> {
    let (input, _) = char('[').parse(input)?;
    let (input, name) = ws(identifier).parse(input)?;
    let (input, matcher) = opt(pair(
        ws(attribute_operator),
        ws(alt((quoted_string, identifier))),
    ))
    .parse(input)?;
    let (input, _) = char(']').parse(input)?;

    let (operator, value) = matcher.unwrap_or((AttributeOperator::Exists, String::new()));
    Ok((
        input,
        AttributeSelector {
            name,
            operator,
            value,
        },
    ))
}

// --- Structural Pseudo-Classes ---

fn structural_head(input: &str) -> IResult<&str, (NthFamily, NthUnit)> {
    let (input, _) = char(':').parse(input)?;
    let (input, family) = alt((
        value(NthFamily::NthLast, tag_no_case("nth-last")),
        value(NthFamily::Nth, tag_no_case("nth")),
        value(NthFamily::Only, tag_no_case("only")),
        value(NthFamily::First, tag_no_case("first")),
        value(NthFamily::Last, tag_no_case("last")),
    ))
    .parse(input)?;
    let (input, _) = char('-').parse(input)?;
    let (input, unit) = alt((
        value(NthUnit::Child, tag_no_case("child")),
        value(NthUnit::OfType, tag_no_case("of-type")),
    ))
    .parse(input)?;
    // `:first-childish` is some other pseudo-class, not a truncated `:first-child`.
    let (input, _) = not(peek(satisfy(is_identifier_char))).parse(input)?;
    Ok((input, (family, unit)))
}

fn match_structural(input: &str) -> TermMatch<'_> {
    let Ok((rest, (family, unit))) = structural_head(input) else {
        return Ok(None);
    };
    let pseudo = &input[..input.len() - rest.len()];

    let (rest, argument) = match rest.strip_prefix('(') {
        Some(inner) => {
            let (argument, rest) =
                split_argument(inner).ok_or_else(|| SelectorError::UnbalancedArgument {
                    pseudo: pseudo.to_string(),
                    input: input.to_string(),
                })?;
            (rest, Some(argument))
        }
        None => (rest, None),
    };

    let formula = match (family, argument) {
        (NthFamily::Nth | NthFamily::NthLast, Some(argument)) => {
            parse_formula(argument).ok_or_else(|| SelectorError::malformed(pseudo, argument))?
        }
        (NthFamily::Nth | NthFamily::NthLast, None) => {
            return Err(SelectorError::malformed(pseudo, ""));
        }
        (_, Some(argument)) => return Err(SelectorError::malformed(pseudo, argument)),
        (_, None) => NthFormula::FIRST,
    };

    Ok(Some((
        rest,
        Token::Structural(Structural {
            family,
            unit,
            formula,
        }),
    )))
}

// --- Other Pseudo-Classes ---

/// The argument a known pseudo-class takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Bare,
    Selector,
    Text,
    Index,
}

fn arity(name: &str) -> Option<Arity> {
    let arity = match name {
        "not" | "has" => Arity::Selector,
        "contains" => Arity::Text,
        "eq" | "gt" | "lt" => Arity::Index,
        "first" | "last" | "odd" | "even" | "checked" | "selected" | "disabled" | "enabled"
        | "input" | "button" | "submit" | "reset" | "text" | "checkbox" | "radio" | "file"
        | "password" | "image" | "header" | "empty" | "parent" | "root" => Arity::Bare,
        _ => return None,
    };
    Some(arity)
}

fn match_pseudo(input: &str, depth: usize) -> TermMatch<'_> {
    let Ok((rest, name)) = preceded(char(':'), identifier).parse(input) else {
        return Ok(None);
    };
    let name = name.to_ascii_lowercase();
    let pseudo = format!(":{}", name);

    let (rest, raw) = match rest.strip_prefix('(') {
        Some(inner) => {
            let (raw, rest) =
                split_argument(inner).ok_or_else(|| SelectorError::UnbalancedArgument {
                    pseudo: pseudo.clone(),
                    input: input.to_string(),
                })?;
            (rest, Some(raw))
        }
        None => (rest, None),
    };

    let argument = match (arity(&name), raw) {
        // Unknown names are rejected by the renderer.
        (None, raw) => raw.map(|raw| PseudoArgument::Text(text_argument(raw))),
        (Some(Arity::Bare), None) => None,
        (Some(Arity::Bare), Some(raw)) => return Err(SelectorError::malformed(pseudo, raw)),
        (Some(_), None) => return Err(SelectorError::malformed(pseudo, "")),
        (Some(arity), Some(raw)) => Some(pseudo_argument(arity, &pseudo, raw, depth)?),
    };
    Ok(Some((rest, Token::Pseudo(Pseudo::new(name, argument)))))
}

fn pseudo_argument(
    arity: Arity,
    pseudo: &str,
    raw: &str,
    depth: usize,
) -> Result<PseudoArgument, SelectorError> {
    let trimmed = raw.trim();
    match arity {
        Arity::Selector if depth + 1 >= MAX_NESTING => Err(SelectorError::malformed(
            pseudo,
            format!("nested more than {} levels deep", MAX_NESTING),
        )),
        Arity::Selector => match tokenize_nested(trimmed, depth + 1) {
            Ok(group) => Ok(PseudoArgument::Selector(group)),
            Err(SelectorError::Empty) => Err(SelectorError::malformed(pseudo, raw)),
            Err(e) => Err(e),
        },
        Arity::Index => trimmed
            .parse::<i64>()
            .map(PseudoArgument::Index)
            .map_err(|_| SelectorError::malformed(pseudo, raw)),
        Arity::Text => Ok(PseudoArgument::Text(text_argument(trimmed))),
        Arity::Bare => Err(SelectorError::malformed(pseudo, raw)),
    }
}

/// Quoted text is unquoted; anything else is taken as-is after unescaping.
fn text_argument(raw: &str) -> String {
    let trimmed = raw.trim();
    match quoted_string(trimmed) {
        Ok(("", text)) => text,
        _ => unescape(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_sequence(selector: &str) -> Vec<Step> {
        let mut group = tokenize(selector).unwrap();
        assert_eq!(group.sequences.len(), 1, "expected one alternative");
        group.sequences.remove(0).steps
    }

    fn named(name: &str) -> Token {
        Token::Tag(TagName::Named(name.to_string()))
    }

    #[test]
    fn test_tag_and_class_share_a_step() {
        let steps = single_sequence("table.test");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].combinator, Combinator::Descendant);
        assert_eq!(
            steps[0].compound.tokens,
            vec![named("table"), Token::Class("test".into())]
        );
    }

    #[test]
    fn test_combinators() {
        let steps = single_sequence("#main > table  td + th ~ span");
        let combinators: Vec<Combinator> = steps.iter().map(|s| s.combinator).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Descendant,
                Combinator::AdjacentSibling,
                Combinator::FollowingSibling,
            ]
        );
        assert_eq!(steps[0].compound.tokens, vec![Token::Id("main".into())]);
    }

    #[test]
    fn test_alternatives() {
        let group = tokenize("span , a.link,div").unwrap();
        assert_eq!(group.sequences.len(), 3);
        assert_eq!(group.sequences[1].steps[0].compound.tokens.len(), 2);
    }

    #[test]
    fn test_trailing_comma_is_noise() {
        let group = tokenize("span,").unwrap();
        assert_eq!(group.sequences.len(), 1);
    }

    #[test]
    fn test_attribute_forms() {
        let steps = single_sequence(r#"[name][a='x y'][b="q\"q"][c|=en][d != 3]"#);
        let attrs: Vec<&AttributeSelector> = steps[0]
            .compound
            .tokens
            .iter()
            .map(|t| match t {
                Token::Attribute(a) => a,
                other => panic!("unexpected token {:?}", other),
            })
            .collect();
        assert_eq!(attrs[0].operator, AttributeOperator::Exists);
        assert_eq!(attrs[1].operator, AttributeOperator::Equals);
        assert_eq!(attrs[1].value, "x y");
        assert_eq!(attrs[2].value, "q\"q");
        assert_eq!(attrs[3].operator, AttributeOperator::DashMatch);
        assert_eq!(attrs[3].value, "en");
        assert_eq!(attrs[4].operator, AttributeOperator::NotEquals);
        assert_eq!(attrs[4].value, "3");
    }

    #[test]
    fn test_structural_tokens() {
        let steps = single_sequence("li:nth-last-of-type(-2n+3):first-child");
        assert_eq!(
            steps[0].compound.tokens[1],
            Token::Structural(Structural {
                family: NthFamily::NthLast,
                unit: NthUnit::OfType,
                formula: NthFormula::new(-2, 3),
            })
        );
        assert_eq!(
            steps[0].compound.tokens[2],
            Token::Structural(Structural {
                family: NthFamily::First,
                unit: NthUnit::Child,
                formula: NthFormula::FIRST,
            })
        );
    }

    #[test]
    fn test_structural_argument_validation() {
        assert!(matches!(
            tokenize(".foo:nth-child()"),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize(".foo:nth-child"),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize(".foo:first-child(2)"),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize(".foo:nth-child(2n+)"),
            Err(SelectorError::MalformedArgument { .. })
        ));
    }

    #[test]
    fn test_nested_selector_arguments() {
        let steps = single_sequence(".foo:not(:has(a#id)):first");
        let tokens = &steps[0].compound.tokens;
        assert_eq!(tokens.len(), 3);

        let Token::Pseudo(not) = &tokens[1] else {
            panic!("expected :not");
        };
        assert_eq!(not.name, "not");
        let Some(PseudoArgument::Selector(inner)) = &not.argument else {
            panic!("expected a nested selector");
        };
        let Token::Pseudo(has) = &inner.sequences[0].steps[0].compound.tokens[0] else {
            panic!("expected :has");
        };
        let Some(PseudoArgument::Selector(innermost)) = &has.argument else {
            panic!("expected a nested selector");
        };
        assert_eq!(
            innermost.sequences[0].steps[0].compound.tokens,
            vec![named("a"), Token::Id("id".into())]
        );

        assert_eq!(tokens[2], Token::Pseudo(Pseudo::new("first", None)));
    }

    #[test]
    fn test_text_and_index_arguments() {
        let steps = single_sequence(r#"span:contains("a (b)"):eq(-1):contains(S1)"#);
        let tokens = &steps[0].compound.tokens;
        assert_eq!(
            tokens[1],
            Token::Pseudo(Pseudo::new(
                "contains",
                Some(PseudoArgument::Text("a (b)".into()))
            ))
        );
        assert_eq!(
            tokens[2],
            Token::Pseudo(Pseudo::new("eq", Some(PseudoArgument::Index(-1))))
        );
        assert_eq!(
            tokens[3],
            Token::Pseudo(Pseudo::new(
                "contains",
                Some(PseudoArgument::Text("S1".into()))
            ))
        );
    }

    #[test]
    fn test_escaped_identifiers() {
        let steps = single_sequence(r"#foo\:bar.a\.b");
        assert_eq!(
            steps[0].compound.tokens,
            vec![Token::Id("foo:bar".into()), Token::Class("a.b".into())]
        );
    }

    #[test]
    fn test_leading_combinator() {
        let steps = single_sequence("> a");
        assert_eq!(steps[0].combinator, Combinator::Child);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(tokenize("   "), Err(SelectorError::Empty));
        assert_eq!(
            tokenize("a >"),
            Err(SelectorError::Syntax {
                remaining: " >".into()
            })
        );
        assert_eq!(
            tokenize("a,,b"),
            Err(SelectorError::Syntax {
                remaining: ",b".into()
            })
        );
        assert_eq!(
            tokenize("a[b"),
            Err(SelectorError::Syntax {
                remaining: "[b".into()
            })
        );
        assert_eq!(
            tokenize(":not(a)b"),
            Err(SelectorError::Syntax {
                remaining: "b".into()
            })
        );
    }

    #[test]
    fn test_argument_errors() {
        assert!(matches!(
            tokenize("a:not(b"),
            Err(SelectorError::UnbalancedArgument { .. })
        ));
        assert!(matches!(
            tokenize("a:not()"),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize("a:eq(x)"),
            Err(SelectorError::MalformedArgument { .. })
        ));
    }

    #[test]
    fn test_pseudo_arity() {
        for selector in ["a:not", "a:has", "a:contains", "a:eq", "a:gt", "a:lt"] {
            assert!(
                matches!(
                    tokenize(selector),
                    Err(SelectorError::MalformedArgument { .. })
                ),
                "'{}' should need an argument",
                selector
            );
        }
        assert_eq!(
            tokenize("a:checked(x)"),
            Err(SelectorError::MalformedArgument {
                pseudo: ":checked".into(),
                argument: "x".into(),
            })
        );
        assert!(matches!(
            tokenize("a:first(1)"),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize("a:EVEN()"),
            Err(SelectorError::MalformedArgument { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}a{}", ":not(".repeat(depth), ")".repeat(depth));
        assert!(tokenize(&nested(MAX_NESTING - 1)).is_ok());
        assert!(matches!(
            tokenize(&nested(MAX_NESTING)),
            Err(SelectorError::MalformedArgument { .. })
        ));
        assert!(matches!(
            tokenize(&nested(1000)),
            Err(SelectorError::MalformedArgument { .. })
        ));

        let has = format!("{}a{}", ":has(".repeat(1000), ")".repeat(1000));
        assert!(tokenize(&has).is_err());
    }

    #[test]
    fn test_unknown_pseudo_is_tokenized() {
        // Rejected later by the renderer, not here.
        let steps = single_sequence("a:hover");
        assert_eq!(
            steps[0].compound.tokens[1],
            Token::Pseudo(Pseudo::new("hover", None))
        );
    }

    #[test]
    fn test_structural_prefix_of_longer_name() {
        let steps = single_sequence("a:first-childish");
        assert_eq!(
            steps[0].compound.tokens[1],
            Token::Pseudo(Pseudo::new("first-childish", None))
        );
    }
}
