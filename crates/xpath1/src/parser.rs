//! A `nom`-based parser for the XPath 1.0 expression language.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// An operator name such as `and` or `mod`, which must not run into a following name.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(peek(satisfy(is_name_char))))
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Or, keyword("or")).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::And, keyword("and")).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Equals, tag("=")),
        value(BinaryOperator::NotEquals, tag("!=")),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::LessThanOrEqual, tag("<=")),
        value(BinaryOperator::GreaterThanOrEqual, tag(">=")),
        value(BinaryOperator::LessThan, tag("<")),
        value(BinaryOperator::GreaterThan, tag(">")),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Plus, char('+')),
        value(BinaryOperator::Minus, char('-')),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Multiply, char('*')),
        value(BinaryOperator::Divide, keyword("div")),
        value(BinaryOperator::Modulo, keyword("mod")),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Union, char('|')).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(ws(char('-')), unary_expr), |expr| {
            Expression::Negate(Box::new(expr))
        }),
        union_expr,
    ))
    .parse(input)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(path_expr, union_op)(input)
}

/// A filter expression optionally continued by a relative path, or a plain location path.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first: `last()` would otherwise be read as a step named `last`.
    if let Ok((i, base)) = filter_expr(input) {
        let (i, steps) = relative_steps(i)?;
        if steps.is_empty() {
            return Ok((i, base));
        }
        return Ok((
            i,
            Expression::LocationPath(LocationPath {
                start_point: Some(Box::new(base)),
                is_absolute: false,
                steps,
            }),
        ));
    }
    map(location_path, Expression::LocationPath).parse(input)
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, base) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        return Ok((i, base));
    }
    Ok((
        i,
        Expression::Filter {
            base: Box::new(base),
            predicates,
        },
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        map(number, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

// --- Literal Parsers ---

/// `Digits ('.' Digits?)?` or `'.' Digits`. No sign, exponent or `inf`.
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        str::parse::<f64>,
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

// --- Name and NodeTest Parsers ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(char(':'), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                value(NodeTypeTest::Text, tag("text")),
                value(NodeTypeTest::Node, tag("node")),
                value(NodeTypeTest::Comment, tag("comment")),
                value(
                    NodeTypeTest::ProcessingInstruction,
                    tag("processing-instruction"),
                ),
            )),
            pair(ws(char('(')), char(')')),
        ),
        NodeTest::NodeType,
    )
    .parse(input)
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        value(NodeTest::Wildcard, char('*')),
        node_type_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis(input: &str) -> IResult<&str, Axis> {
    terminated(
        alt((
            value(Axis::Child, tag("child")),
            value(Axis::DescendantOrSelf, tag("descendant-or-self")),
            value(Axis::Descendant, tag("descendant")),
            value(Axis::Attribute, tag("attribute")),
            value(Axis::Parent, tag("parent")),
            value(Axis::AncestorOrSelf, tag("ancestor-or-self")),
            value(Axis::Ancestor, tag("ancestor")),
            value(Axis::SelfAxis, tag("self")),
            value(Axis::FollowingSibling, tag("following-sibling")),
            value(Axis::PrecedingSibling, tag("preceding-sibling")),
            value(Axis::Following, tag("following")),
            value(Axis::Preceding, tag("preceding")),
        )),
        tag("::"),
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let any_node = NodeTest::NodeType(NodeTypeTest::Node);
    let (i, (axis, node_test)) = alt((
        value((Axis::Parent, any_node.clone()), tag("..")),
        value((Axis::SelfAxis, any_node), char('.')),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

/// Steps following a `/` or `//` separator; `//` expands to `descendant-or-self::node()/`.
fn relative_steps(input: &str) -> IResult<&str, Vec<Step>> {
    let (i, separated) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(input)?;

    let mut steps = Vec::with_capacity(separated.len());
    for (separator, next_step) in separated {
        if separator == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next_step);
    }
    Ok((i, steps))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, lead) = opt(alt((tag("//"), tag("/")))).parse(input)?;

    let mut steps = Vec::new();
    let i = match lead {
        Some("//") => {
            let (i, first) = step(i)?;
            steps.push(Step::descendant_or_self());
            steps.push(first);
            i
        }
        // A lone `/` selects the root node.
        Some(_) => {
            let (i, first) = opt(step).parse(i)?;
            steps.extend(first);
            i
        }
        None => {
            let (i, first) = step(i)?;
            steps.push(first);
            i
        }
    };

    let (i, rest) = relative_steps(i)?;
    steps.extend(rest);

    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute: lead.is_some(),
            steps,
        },
    ))
}

// --- Function Call Parser ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    // The `(` lookahead keeps a step name like `foo` in `foo/bar` from being read as a call.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;

    // Node-type tests like text() are not functions. They are handled by the step parser.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        char(')'),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(name: &str) -> Step {
        Step {
            axis: Axis::Child,
            node_test: NodeTest::Name(name.into()),
            predicates: vec![],
        }
    }

    fn relative(steps: Vec<Step>) -> Expression {
        Expression::LocationPath(LocationPath {
            start_point: None,
            is_absolute: false,
            steps,
        })
    }

    #[test]
    fn test_parse_simple_path() {
        let result = parse_expression("foo/bar").unwrap();
        assert_eq!(result, relative(vec![child("foo"), child("bar")]));
    }

    #[test]
    fn test_parse_descendant_or_self() {
        let result = parse_expression("//foo").unwrap();
        assert_eq!(
            result,
            Expression::LocationPath(LocationPath {
                start_point: None,
                is_absolute: true,
                steps: vec![Step::descendant_or_self(), child("foo")]
            })
        );
    }

    #[test]
    fn test_parse_root_only() {
        let result = parse_expression("/").unwrap();
        assert_eq!(
            result,
            Expression::LocationPath(LocationPath {
                start_point: None,
                is_absolute: true,
                steps: vec![]
            })
        );
    }

    #[test]
    fn test_parse_negation() {
        let result = parse_expression("10 - -5").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(Expression::Number(10.0)),
                op: BinaryOperator::Minus,
                right: Box::new(Expression::Negate(Box::new(Expression::Number(5.0)))),
            }
        );
    }

    #[test]
    fn test_parse_axes() {
        for (text, expected) in [
            ("following-sibling::foo", Axis::FollowingSibling),
            ("preceding::*", Axis::Preceding),
            ("ancestor-or-self::div", Axis::AncestorOrSelf),
            ("self::p", Axis::SelfAxis),
        ] {
            let Expression::LocationPath(lp) = parse_expression(text).unwrap() else {
                panic!("expected a location path for {}", text);
            };
            assert_eq!(lp.steps[0].axis, expected, "{}", text);
        }
    }

    #[test]
    fn test_parse_abbreviated_steps() {
        let Expression::LocationPath(lp) = parse_expression("../.").unwrap() else {
            panic!("expected a location path");
        };
        assert_eq!(lp.steps[0].axis, Axis::Parent);
        assert_eq!(lp.steps[1].axis, Axis::SelfAxis);
        assert_eq!(
            lp.steps[1].node_test,
            NodeTest::NodeType(NodeTypeTest::Node)
        );
    }

    #[test]
    fn test_parse_predicate() {
        let result = parse_expression("foo[@id = 'a']").unwrap();
        let attribute = relative(vec![Step {
            axis: Axis::Attribute,
            node_test: NodeTest::Name("id".into()),
            predicates: vec![],
        }]);
        let mut expected = child("foo");
        expected.predicates.push(Expression::BinaryOp {
            left: Box::new(attribute),
            op: BinaryOperator::Equals,
            right: Box::new(Expression::Literal("a".into())),
        });
        assert_eq!(result, relative(vec![expected]));
    }

    #[test]
    fn test_parse_filter_expression_with_path() {
        let result = parse_expression("(//ul)[1]//li").unwrap();
        let Expression::LocationPath(lp) = result else {
            panic!("expected a location path");
        };
        assert_eq!(lp.steps, vec![Step::descendant_or_self(), child("li")]);
        let Some(start) = lp.start_point else {
            panic!("expected a start point");
        };
        let Expression::Filter { base, predicates } = *start else {
            panic!("expected a filter expression");
        };
        assert!(base.is_location_path());
        assert_eq!(predicates, vec![Expression::Number(1.0)]);
    }

    #[test]
    fn test_parse_text_node_test() {
        let Expression::LocationPath(lp) = parse_expression("foo/text()").unwrap() else {
            panic!("expected a location path");
        };
        assert_eq!(
            lp.steps[1].node_test,
            NodeTest::NodeType(NodeTypeTest::Text)
        );
    }

    #[test]
    fn test_node_type_prefix_is_a_name() {
        let result = parse_expression("self::textarea").unwrap();
        let Expression::LocationPath(lp) = result else {
            panic!("expected a location path");
        };
        assert_eq!(lp.steps[0].node_test, NodeTest::Name("textarea".into()));
    }

    #[test]
    fn test_parse_operator_precedence() {
        let result = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(Expression::Number(1.0)),
                op: BinaryOperator::Plus,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(Expression::Number(2.0)),
                    op: BinaryOperator::Multiply,
                    right: Box::new(Expression::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_boolean_logic() {
        let eq = |l: &str, r: &str| Expression::BinaryOp {
            left: Box::new(relative(vec![child(l)])),
            op: BinaryOperator::Equals,
            right: Box::new(relative(vec![child(r)])),
        };

        let result = parse_expression("a = b or c = d and e = f").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(eq("a", "b")),
                op: BinaryOperator::Or,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(eq("c", "d")),
                    op: BinaryOperator::And,
                    right: Box::new(eq("e", "f")),
                }),
            }
        );
    }

    #[test]
    fn test_keywords_need_a_boundary() {
        // `order` is a name, not `or` followed by `der`.
        assert!(parse_expression("a order").is_err());
        let result = parse_expression("count(*) mod 2").unwrap();
        assert!(matches!(
            result,
            Expression::BinaryOp {
                op: BinaryOperator::Modulo,
                ..
            }
        ));
    }

    #[test]
    fn test_names_are_not_numbers() {
        let result = parse_expression("self::info").unwrap();
        assert!(result.is_location_path());
        assert_eq!(parse_expression(".5").unwrap(), Expression::Number(0.5));
        assert_eq!(parse_expression("3.").unwrap(), Expression::Number(3.0));
    }

    #[test]
    fn test_parse_selector_output() {
        for expression in [
            r#"//*[@id="main"]/table//td[count(preceding-sibling::*) mod 2 = 0]"#,
            r#"(//a[not(self::*[.//span])])[1]"#,
            r#"(//span | //a)"#,
            r#"//*[substring(@href, string-length(@href) - 3)=".pdf"]"#,
            r#"//a/following-sibling::*[1][self::b]"#,
            r#"(//a)[position() = last() - 2]"#,
            r#"//p[not(* or text())]"#,
            r#"//*[@*[name()="1x"]]"#,
            r#"//*[contains(concat(" ", normalize-space(@class), " "), concat("a", '"', "b"))]"#,
        ] {
            assert!(
                parse_expression(expression).is_ok(),
                "failed to parse {}",
                expression
            );
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_expression("//a["),
            Err(XPathError::XPathParse(..))
        ));
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("").is_err());
    }
}
