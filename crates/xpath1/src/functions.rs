//! Built-in implementations of the XPath 1.0 core function library.

use super::engine::{EvaluationContext, XPathValue, parse_number};
use crate::datasource::DataSourceNode;
use crate::error::XPathError;

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<N>,
) -> Result<XPathValue<N>, XPathError> {
    match name {
        // Node-set
        "last" => {
            expect_args(name, &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_size as f64))
        }
        "position" => {
            expect_args(name, &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_position as f64))
        }
        "count" => func_count(args),
        "local-name" => func_name(name, args, e_ctx, true),
        "name" => func_name(name, args, e_ctx, false),

        // String
        "string" => {
            expect_args(name, &args, 0, 1)?;
            Ok(XPathValue::String(string_or_context(args, e_ctx)))
        }
        "concat" => {
            expect_args(name, &args, 2, usize::MAX)?;
            Ok(XPathValue::String(
                args.iter().map(|v| v.to_string()).collect(),
            ))
        }
        "starts-with" => func_string_pair(name, args, |s1, s2| {
            XPathValue::Boolean(s1.starts_with(s2))
        }),
        "contains" => func_string_pair(name, args, |s1, s2| XPathValue::Boolean(s1.contains(s2))),
        "substring-before" => func_string_pair(name, args, |s1, s2| {
            XPathValue::String(s1.find(s2).map(|i| s1[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => func_string_pair(name, args, |s1, s2| {
            XPathValue::String(
                s1.find(s2)
                    .map(|i| s1[i + s2.len()..].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring" => func_substring(args),
        "string-length" => {
            expect_args(name, &args, 0, 1)?;
            let s = string_or_context(args, e_ctx);
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            expect_args(name, &args, 0, 1)?;
            let s = string_or_context(args, e_ctx);
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => func_translate(args),

        // Boolean
        "boolean" => {
            expect_args(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(args[0].to_bool()))
        }
        "not" => {
            expect_args(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(!args[0].to_bool()))
        }
        "true" | "false" => {
            expect_args(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(name == "true"))
        }

        // Number
        "number" => {
            expect_args(name, &args, 0, 1)?;
            let n = match args.first() {
                Some(value) => value.to_number(),
                None => parse_number(&e_ctx.context_node.string_value()),
            };
            Ok(XPathValue::Number(n))
        }
        "sum" => func_sum(args),
        "floor" => {
            expect_args(name, &args, 1, 1)?;
            Ok(XPathValue::Number(args[0].to_number().floor()))
        }
        "ceiling" => {
            expect_args(name, &args, 1, 1)?;
            Ok(XPathValue::Number(args[0].to_number().ceil()))
        }
        "round" => {
            expect_args(name, &args, 1, 1)?;
            Ok(XPathValue::Number(round(args[0].to_number())))
        }

        _ => Err(XPathError::function(name, "Unknown XPath function")),
    }
}

fn expect_args<N>(
    function: &str,
    args: &[XPathValue<N>],
    min: usize,
    max: usize,
) -> Result<(), XPathError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("Expected {} argument(s)", min)
    } else if max == usize::MAX {
        format!("Expected at least {} arguments", min)
    } else {
        format!("Expected {} to {} arguments", min, max)
    };
    Err(XPathError::function(
        function,
        format!("{}, got {}", expected, args.len()),
    ))
}

/// The single optional argument as a string, defaulting to the context node's string value.
fn string_or_context<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<N>,
) -> String {
    match args.into_iter().next() {
        Some(value) => value.to_string(),
        None => e_ctx.context_node.string_value(),
    }
}

fn func_count<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    expect_args("count", &args, 1, 1)?;
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        v => Err(XPathError::TypeError(format!(
            "count() argument must be a node-set, got {:?}",
            v
        ))),
    }
}

fn func_name<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<N>,
    local: bool,
) -> Result<XPathValue<N>, XPathError> {
    expect_args(function, &args, 0, 1)?;
    let node = if args.is_empty() {
        Some(e_ctx.context_node)
    } else {
        match args.remove(0) {
            XPathValue::NodeSet(nodes) => nodes.first().copied(),
            v => {
                return Err(XPathError::TypeError(format!(
                    "{}() argument must be a node-set, got {:?}",
                    function, v
                )));
            }
        }
    };

    let name = match node.and_then(|n| n.name()) {
        Some(q) if local => q.local_part.to_string(),
        Some(q) => match q.prefix {
            Some(prefix) => format!("{}:{}", prefix, q.local_part),
            None => q.local_part.to_string(),
        },
        None => String::new(),
    };
    Ok(XPathValue::String(name))
}

fn func_string_pair<'a, N, F>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    apply: F,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a>,
    F: FnOnce(&str, &str) -> XPathValue<N>,
{
    expect_args(function, &args, 2, 2)?;
    let s2 = args.remove(1).to_string();
    let s1 = args.remove(0).to_string();
    Ok(apply(&s1, &s2))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    expect_args("substring", &args, 2, 3)?;
    let length_val = if args.len() == 3 {
        Some(args.remove(2).to_number())
    } else {
        None
    };
    let start_val = args.remove(1).to_number();
    let s = args.remove(0).to_string();

    // Characters at 1-based positions in [round(start), round(start) + round(length)).
    // NaN bounds fail both comparisons and select nothing.
    let first = round(start_val);
    let last = length_val.map_or(f64::INFINITY, |l| first + round(l));

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64;
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    expect_args("translate", &args, 3, 3)?;
    let to_str: Vec<char> = args.remove(2).to_string().chars().collect();
    let from_str: Vec<char> = args.remove(1).to_string().chars().collect();
    let source_str = args.remove(0).to_string();
    let result = source_str
        .chars()
        .filter_map(|c| match from_str.iter().position(|&fc| fc == c) {
            Some(pos) => to_str.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_sum<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    expect_args("sum", &args, 1, 1)?;
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(
            nodes.iter().map(|n| parse_number(&n.string_value())).sum(),
        )),
        v => Err(XPathError::TypeError(format!(
            "sum() argument must be a node-set, got {:?}",
            v
        ))),
    }
}

/// Rounds halves towards positive infinity, leaving NaN, infinities and zero untouched.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        n
    } else {
        (n + 0.5).floor()
    }
}
