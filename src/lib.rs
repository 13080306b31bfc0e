//! objc-inject: insert code at the top of an Objective-C method body.
//!
//! A run finds the first instance method whose selector matches a
//! [`Target`], locates the token right after the body's opening `{`, and
//! splices caller-supplied text in at that byte offset. Every byte before and
//! after the insertion point is preserved.
//!
//! # Architecture
//!
//! - [`index`]: the parser/indexer capability ([`Indexer`],
//!   [`TranslationUnit`]) and its tree-sitter Objective-C backend.
//! - [`matcher`]: the traversal callback that picks the declaration.
//! - [`resolver`]: maps the body's token stream to the injection anchor.
//! - [`splice`]: the byte-level `prefix + text + suffix` rewrite.
//! - [`driver`]: ties a run together and reports its [`Outcome`].
//!
//! # Example
//!
//! ```no_run
//! use objc_inject::{InjectionRequest, Injector, Outcome, Target};
//!
//! let request = InjectionRequest::new(
//!     "AppDelegate.m",
//!     Target::parse("-[AppDelegate application:didFinishLaunchingWithOptions:]")?,
//!     "[self setup];\n    ",
//! );
//!
//! match Injector::objc(false)?.inject(&request)? {
//!     Outcome::Matched(report) => println!("injected at line {}", report.located.anchor.line),
//!     Outcome::NoMatch { target, .. } => println!("{target} not found"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Running twice injects twice: the engine does not detect earlier
//! insertions.

pub mod config;
pub mod driver;
pub mod error;
pub mod index;
pub mod matcher;
pub mod resolver;
pub mod splice;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, LoadedRequest, RequestConfig};
pub use driver::{
    DeclarationSummary, InjectionRequest, Injector, Located, Outcome, Preview, Report,
};
pub use error::InjectError;
pub use index::{
    DeclKind, Declaration, DeclarationVisitor, IndexError, Indexer, ObjcIndexer, ObjcUnit,
    SourceExtent, SourceLocation, Token, TokenKind, TranslationUnit, VisitControl,
};
pub use matcher::{DeclarationMatcher, MatchState, Target, TargetError};
pub use resolver::find_anchor;
pub use splice::{Splice, SpliceError, SpliceResult};
