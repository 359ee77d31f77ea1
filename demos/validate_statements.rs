//! Statement validation
//!
//! Splits a small corpus text into statements and validates each one with
//! the built-in SQL grammar.
//!
//! Run: `cargo run --example validate_statements`

use sql_corpus_tools::{split_statements, Error, StatementValidator};

const CORPUS: &str = "
SELECT a, b FROM db.t WHERE a = 1;
SEL TOP 10 * FROM db.t ORDER BY 1;
SELEC a FROM t;
UPDATE t SET a = a + 1 WHERE b IS NULL;
";

fn main() -> Result<(), Error> {
    let validator = StatementValidator::builtin();

    for statement in split_statements(CORPUS) {
        let outcome = validator.validate(&format!("{statement}\n"))?;
        if outcome.is_valid() {
            println!("ok      {statement}");
        } else {
            println!("invalid {statement}");
            for diagnostic in outcome.diagnostics() {
                println!("        {diagnostic}");
            }
        }
    }

    Ok(())
}
