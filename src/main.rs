use std::env;
use std::fs;
use std::process::ExitCode;
use xdom::{DataSourceNode, XDom, XDomError, XmlDocument};

/// Prints the XPath for a selector and, given a file, the text of every match.
fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        eprintln!("Compiles a CSS/jQuery selector to XPath and optionally runs it.");
        eprintln!();
        eprintln!("{}", usage(&args));
        return ExitCode::FAILURE;
    }

    match run(&args[1], args.get(2).map(String::as_str)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn usage(args: &[String]) -> String {
    let program = args.first().map_or("xdom", String::as_str);
    format!("Usage: {} <selector> [path/to/document.xml]", program)
}

fn run(selector: &str, document_path: Option<&str>) -> Result<(), XDomError> {
    let dom = XDom::new();
    println!("{}", dom.compile(selector)?);

    let Some(path) = document_path else {
        return Ok(());
    };
    log::info!("Loading document from {}", path);
    let text = fs::read_to_string(path)?;
    let doc = XmlDocument::parse(&text)?;

    let matches = dom.find(doc.root(), selector)?;
    log::info!("{} node(s) matched", matches.len());
    for node in matches {
        println!("{}", node.string_value());
    }
    Ok(())
}
