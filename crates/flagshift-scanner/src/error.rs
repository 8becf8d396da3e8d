//! Error types for source parsing

use std::path::PathBuf;

/// Errors while turning a source file into a syntax tree
///
/// All of these are per-file failures: the file is skipped and reported.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No parser registered for file extension
    #[error("no parser registered for extension: '{0}'")]
    NoParserForExtension(String),

    /// Grammar could not be loaded
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    /// Parser returned no tree
    #[error("parse failed for {0}")]
    ParseFailed(PathBuf),

    /// Syntax error in source file
    #[error("syntax error in {path} at line {line}: {message}")]
    SyntaxError {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl ParseError {
    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
