//! A `nom`-based parser for the `an+b` arguments of structural pseudo-classes.

use crate::ast::NthFormula;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_opt, opt, value},
    sequence::pair,
};

/// Parses `even`, `odd`, `b`, or `an+b`. Whitespace is insignificant and the keywords
/// are case-insensitive. Returns `None` for anything else, including an empty argument.
pub fn parse_formula(argument: &str) -> Option<NthFormula> {
    let compact: String = argument
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    all_consuming(formula)
        .parse(compact.as_str())
        .ok()
        .map(|(_, formula)| formula)
}

fn formula(input: &str) -> IResult<&str, NthFormula> {
    alt((
        value(NthFormula::EVEN, tag("even")),
        value(NthFormula::ODD, tag("odd")),
        stepped,
        map(signed_integer, |offset| NthFormula::new(0, offset)),
    ))
    .parse(input)
}

/// `an`, `an+b`, `-n+b`, `+n`, ...
fn stepped(input: &str) -> IResult<&str, NthFormula> {
    let (input, sign) = opt(one_of("+-")).parse(input)?;
    let (input, digits) = opt(map_opt(digit1, |d: &str| d.parse::<i64>().ok())).parse(input)?;
    let (input, _) = char('n').parse(input)?;
    let (input, offset) = opt(signed_offset).parse(input)?;

    let magnitude = digits.unwrap_or(1);
    let step = if sign == Some('-') { -magnitude } else { magnitude };
    Ok((input, NthFormula::new(step, offset.unwrap_or(0))))
}

/// The `+b` / `-b` tail of `an+b`; the sign is mandatory here.
fn signed_offset(input: &str) -> IResult<&str, i64> {
    map_opt(pair(one_of("+-"), digit1), |(sign, digits): (char, &str)| {
        let magnitude = digits.parse::<i64>().ok()?;
        Some(if sign == '-' { -magnitude } else { magnitude })
    })
    .parse(input)
}

fn signed_integer(input: &str) -> IResult<&str, i64> {
    map_opt(pair(opt(one_of("+-")), digit1), |(sign, digits): (Option<char>, &str)| {
        let magnitude = digits.parse::<i64>().ok()?;
        Some(if sign == Some('-') { -magnitude } else { magnitude })
    })
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(step: i64, offset: i64) -> Option<NthFormula> {
        Some(NthFormula::new(step, offset))
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_formula("even"), f(2, 0));
        assert_eq!(parse_formula("odd"), f(2, 1));
        assert_eq!(parse_formula(" ODD "), f(2, 1));
    }

    #[test]
    fn test_integers() {
        assert_eq!(parse_formula("3"), f(0, 3));
        assert_eq!(parse_formula("+3"), f(0, 3));
        assert_eq!(parse_formula("-1"), f(0, -1));
    }

    #[test]
    fn test_stepped_formulas() {
        assert_eq!(parse_formula("4n+1"), f(4, 1));
        assert_eq!(parse_formula("-2n+3"), f(-2, 3));
        assert_eq!(parse_formula("n"), f(1, 0));
        assert_eq!(parse_formula("-n+6"), f(-1, 6));
        assert_eq!(parse_formula("+n-2"), f(1, -2));
        assert_eq!(parse_formula("2n"), f(2, 0));
        assert_eq!(parse_formula(" 3n - 1 "), f(3, -1));
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_formula(""), None);
        assert_eq!(parse_formula("   "), None);
        assert_eq!(parse_formula("n+"), None);
        assert_eq!(parse_formula("2n1"), None);
        assert_eq!(parse_formula("evenly"), None);
        assert_eq!(parse_formula("a"), None);
        assert_eq!(parse_formula("99999999999999999999"), None);
    }
}
