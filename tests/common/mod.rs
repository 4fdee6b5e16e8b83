#![allow(dead_code)]

use xdom::{DataSourceNode, XmlNode};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Two sections of six `.text` spans each; the even-numbered spans are also `.bold`.
pub fn sections_document() -> String {
    let section = |name: &str| {
        let spans: String = (1..=6)
            .map(|i| {
                let class = if i % 2 == 0 { "text bold" } else { "text" };
                format!(r#"<span id="{}{}" class="{}">{}</span>"#, name, i, class, i)
            })
            .collect();
        format!(r#"<section id="{}">{}</section>"#, name, spans)
    };
    format!("<html><body>{}{}</body></html>", section("s"), section("t"))
}

/// The `id` attribute of each node, or an empty string.
pub fn ids<'a>(nodes: &[XmlNode<'a, 'a>]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| {
            node.attributes()
                .find(|a| a.name().is_some_and(|q| q.local_part == "id"))
                .map(|a| a.string_value())
                .unwrap_or_default()
        })
        .collect()
}
