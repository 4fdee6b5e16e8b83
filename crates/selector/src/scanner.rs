//! Finds the closing parenthesis of a pseudo-class argument.
//!
//! Arguments may themselves contain parentheses (`:not(:has(a))`), brackets with
//! quoted values (`:not([title=")"])`) and quoted text (`:contains("a)b")`), so the
//! boundary is found by counting depth rather than by pattern matching.

/// Splits `input`, which starts right after an opening `(`, into the argument and the
/// text following its closing `)`. Returns `None` when the argument never closes or
/// when a bracket or quote is left open.
pub fn split_argument(input: &str) -> Option<(&str, &str)> {
    let mut paren_depth = 1usize;
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.checked_sub(1)?,
            '(' if bracket_depth == 0 => paren_depth += 1,
            ')' if bracket_depth == 0 => {
                paren_depth -= 1;
                if paren_depth == 0 {
                    return Some((&input[..idx], &input[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}
