//! Caret-style rendering of positioned errors.

use crate::error::Error;
use crate::error::SyntaxError;
use colored::Colorize;

impl SyntaxError {
    /// Renders the error under the pattern it came from:
    ///
    /// ```text
    /// error: Unclosed character class
    ///   a[b
    ///    ^
    /// ```
    ///
    /// Bytes outside printable ASCII are shown as `.` so the caret column
    /// always equals the byte offset.
    pub fn render(&self, source: &[u8]) -> String {
        let line: String = source.iter().map(|&byte| printable(byte)).collect();
        let caret = format!("{}^", " ".repeat(self.offset));
        format!(
            "{}: {}\n  {}\n  {}",
            "error".red().bold(),
            self.kind,
            line,
            caret.red().bold()
        )
    }
}

impl Error {
    /// Like [`SyntaxError::render`], falling back to the plain message for
    /// errors that have no position.
    pub fn render(&self, source: &[u8]) -> String {
        match self {
            Error::Syntax(err) => err.render(source),
            other => format!("{}: {}", "error".red().bold(), other),
        }
    }
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}
