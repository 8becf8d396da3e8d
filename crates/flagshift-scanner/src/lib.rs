//! flagshift scanner
//!
//! Parses JavaScript/TypeScript sources with tree-sitter and finds every
//! Statsig SDK usage in them.
//!
//! # Architecture
//!
//! ```text
//! source text → ParserRegistry → ParsedFile
//!             → Scanner (binding pre-pass) → FileScan → Findings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use flagshift_scanner::{default_parsers, Scanner};
//!
//! let scanner = Scanner::new(Arc::new(Catalog::new()?));
//! let scanned = scanner.scan_source(&default_parsers(), Path::new("src/app.tsx"), &source)?;
//! for finding in &scanned.findings {
//!     println!("{} {}", finding.kind, finding.source_name);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bindings;
pub mod error;
pub mod hash;
pub mod parser;
pub mod scanner;

pub use bindings::{Binding, BindingTable, PluginUse, PragmaSite};
pub use error::ParseError;
pub use hash::ContentHash;
pub use parser::{
    default_parsers, Language, ParsedFile, ParserRegistry, SourceParser, TreeSitterParser,
};
pub use scanner::{FileScan, Findings, ScannedFile, Scanner, DEFAULT_PRAGMA_WINDOW};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
