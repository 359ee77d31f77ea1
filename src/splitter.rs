//! Statement splitting for raw corpus files
//!
//! Splitting is purely lexical: every `;` ends a statement, including one
//! inside a string literal or comment.

/// Statement separator
pub const SEPARATOR: char = ';';

/// Normalize `\r\n` and lone `\r` line endings to `\n`
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split raw file text into trimmed, non-empty statements
#[must_use]
pub fn split_statements(text: &str) -> Vec<String> {
    let normalized = normalize_line_endings(text);
    normalized
        .trim()
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Terminate a statement with the newline the grammar expects
#[must_use]
pub fn terminate(statement: &str) -> String {
    let mut text = String::with_capacity(statement.len() + 1);
    text.push_str(statement);
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        assert_eq!(split_statements("A;B;"), vec!["A", "B"]);
    }

    #[test]
    fn test_split_line_endings_agree() {
        let unix = split_statements("SELECT 1\nFROM t;\nSELECT 2;\n");
        let windows = split_statements("SELECT 1\r\nFROM t;\r\nSELECT 2;\r\n");
        let classic_mac = split_statements("SELECT 1\rFROM t;\rSELECT 2;\r");
        assert_eq!(unix, vec!["SELECT 1\nFROM t", "SELECT 2"]);
        assert_eq!(unix, windows);
        assert_eq!(unix, classic_mac);
    }

    #[test]
    fn test_split_drops_empty_pieces() {
        assert_eq!(split_statements(" ;; A ;\n\n; B"), vec!["A", "B"]);
        assert!(split_statements("   \n\t ").is_empty());
        assert!(split_statements(";;;").is_empty());
    }

    #[test]
    fn test_split_is_idempotent_on_clean_input() {
        let once = split_statements("A;B;");
        let rejoined = once.join(";");
        assert_eq!(split_statements(&rejoined), once);
    }

    #[test]
    fn test_split_ignores_quoting() {
        let pieces = split_statements("SELECT 'a;b' FROM t;");
        assert_eq!(pieces, vec!["SELECT 'a", "b' FROM t"]);
    }

    #[test]
    fn test_terminate() {
        assert_eq!(terminate("SELECT 1"), "SELECT 1\n");
    }
}
