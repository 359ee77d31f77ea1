//! Parse-tree export for a single statement
//!
//! Parses one statement and prints its parse document as JSON.
//!
//! Run: `cargo run --example export_tree`

use sql_corpus_tools::{build_document, Error, Grammar, ParseAttempt, SqlGrammar};

fn main() -> Result<(), Error> {
    let grammar = SqlGrammar::new();
    let input = "SELECT name -- the customer\nFROM customers WHERE id = 7;\n";

    match grammar.parse(input, "parse")? {
        ParseAttempt::Parsed(parsed) => {
            let document = build_document("inline.sql", &parsed, &grammar);
            println!("{}", document.to_json_pretty()?);
        }
        ParseAttempt::Rejected(diagnostics) => {
            for diagnostic in diagnostics {
                eprintln!("{diagnostic}");
            }
        }
    }

    Ok(())
}
