//! Helpers for emitting XPath 1.0 literals and names that are always well-formed.

/// Renders `value` as an XPath string literal.
///
/// XPath 1.0 literals have no escape syntax, so a value containing both quote kinds is
/// split and rebuilt with `concat()`.
pub fn string_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }

    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// Whether `name` can be emitted as a bare XPath name test (an NCName, optionally prefixed).
pub fn is_xpath_name(name: &str) -> bool {
    let mut parts = name.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), None, None) => is_nc_name(local),
        (Some(prefix), Some(local), None) => is_nc_name(prefix) && is_nc_name(local),
        _ => false,
    }
}

fn is_nc_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_quoting() {
        assert_eq!(string_literal("plain"), "\"plain\"");
        assert_eq!(string_literal("say \"hi\""), "'say \"hi\"'");
        assert_eq!(string_literal("it's"), "\"it's\"");
        assert_eq!(
            string_literal("it's \"x\""),
            "concat(\"it's \", '\"', \"x\", '\"', \"\")"
        );
    }

    #[test]
    fn test_xpath_names() {
        assert!(is_xpath_name("span"));
        assert!(is_xpath_name("data-index"));
        assert!(is_xpath_name("svg:rect"));
        assert!(!is_xpath_name("1st"));
        assert!(!is_xpath_name("a b"));
        assert!(!is_xpath_name("foo:bar:baz"));
        assert!(!is_xpath_name(""));
    }
}
