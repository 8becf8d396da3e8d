//! Source parsers
//!
//! JavaScript and TypeScript sources are parsed with the tree-sitter
//! TypeScript grammars. `.ts` files use the plain TypeScript grammar; every
//! other extension uses TSX, which also accepts JSX and plain JavaScript.

use std::path::{Path, PathBuf};

use crate::error::ParseError;
use crate::hash::ContentHash;

/// Grammar used for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// TypeScript without JSX
    TypeScript,
    /// TypeScript/JavaScript with JSX
    Tsx,
}

impl Language {
    /// Get file extensions for this language
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx", "js", "jsx", "mjs", "cjs"],
        }
    }

    /// Detect language from file extension
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        [Language::TypeScript, Language::Tsx]
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }

    #[inline]
    #[must_use]
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        }
    }
}

/// A parsed source file
pub struct ParsedFile {
    /// Path relative to the project root
    pub path: PathBuf,
    pub source: String,
    pub tree: tree_sitter::Tree,
    pub language: Language,
    pub hash: ContentHash,
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Parser trait for turning source text into a syntax tree
///
/// Implement this trait to plug in another front end.
pub trait SourceParser: Send + Sync + 'static {
    /// Parse source into a tree
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the grammar fails to load or the source
    /// contains syntax errors.
    fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile, ParseError>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }

    /// Parser priority (higher = tried first when multiple parsers match)
    fn priority(&self) -> i32 {
        0
    }
}

/// tree-sitter backed parser for one grammar
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterParser {
    language: Language,
}

impl TreeSitterParser {
    #[inline]
    #[must_use]
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    #[inline]
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.language.tree_sitter_language())
            .map_err(|e| ParseError::ParserInit(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParseError::ParseFailed(path.to_path_buf()))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, message) = first_error(root);
            return Err(ParseError::syntax_error(path, line, message));
        }

        Ok(ParsedFile {
            path: path.to_path_buf(),
            source: source.to_string(),
            tree,
            language: self.language,
            hash: ContentHash::compute(source.as_bytes()),
        })
    }

    fn extensions(&self) -> &[&str] {
        self.language.extensions()
    }
}

/// Locate the first error or missing node (1-based line)
fn first_error(root: tree_sitter::Node<'_>) -> (usize, String) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() {
            return (node.start_position().row + 1, "unexpected token".to_string());
        }
        if node.is_missing() {
            return (node.start_position().row + 1, format!("missing {}", node.kind()));
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() || child.is_missing() {
                    stack.push(child);
                }
            }
        }
    }
    (root.start_position().row + 1, "syntax error".to_string())
}

/// Parser registration keyed by extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn SourceParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Register a parser
    pub fn register<P: SourceParser>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        self.parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn SourceParser> {
        self.parsers.iter().find(|p| p.can_parse(path)).map(|p| &**p)
    }

    /// Parse with the parser registered for the path's extension
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::NoParserForExtension`] when nothing handles the
    /// path, otherwise whatever the parser reports.
    pub fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile, ParseError> {
        let parser = self.find_for_path(path).ok_or_else(|| {
            ParseError::NoParserForExtension(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            )
        })?;
        parser.parse(path, source)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }
}

/// Create default parser registry with both grammars
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(TreeSitterParser::new(Language::TypeScript));
    registry.register(TreeSitterParser::new(Language::Tsx));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("jsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("cjs"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("py"), None);
    }

    #[test]
    fn registry_parses_by_extension() {
        let registry = default_parsers();
        let parsed = registry
            .parse(Path::new("src/app.tsx"), "const a = <div>{x}</div>;")
            .unwrap();
        assert_eq!(parsed.language, Language::Tsx);
        assert!(!parsed.tree.root_node().has_error());

        let typed = registry
            .parse(Path::new("src/cast.ts"), "const n = <number>value;")
            .unwrap();
        assert_eq!(typed.language, Language::TypeScript);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let registry = default_parsers();
        let err = registry.parse(Path::new("README.md"), "# hi").unwrap_err();
        assert!(matches!(err, ParseError::NoParserForExtension(ext) if ext == "md"));
    }

    #[test]
    fn syntax_errors_report_a_line() {
        let registry = default_parsers();
        let err = registry
            .parse(Path::new("src/broken.js"), "const a = 1;\nfunction (\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::SyntaxError { line, .. } if line >= 2));
    }
}
