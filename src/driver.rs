//! Run orchestration: parse, match, resolve, splice.
//!
//! An [`Injector`] owns the indexer. Each run builds a fresh translation
//! unit, hands a [`DeclarationMatcher`] to its traversal and drops the unit
//! before any file is written, so nothing outlives the run whichever way it
//! ends.

use crate::error::InjectError;
use crate::index::{
    Cursor, DeclKind, Declaration, Indexer, ObjcIndexer, SourceLocation,
    TranslationUnit, VisitControl,
};
use crate::matcher::{DeclarationMatcher, MatchState, MatchedDeclaration, Target};
use crate::splice::Splice;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything one run needs. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRequest {
    pub file: PathBuf,
    /// Compiler flags handed to the indexer untouched.
    pub args: Vec<String>,
    pub target: Target,
    pub code: String,
    /// Skip declarations that have no body.
    pub definitions_only: bool,
}

impl InjectionRequest {
    pub fn new(file: impl Into<PathBuf>, target: Target, code: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            args: Vec::new(),
            target,
            code: code.into(),
            definitions_only: false,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn definitions_only(mut self, definitions_only: bool) -> Self {
        self.definitions_only = definitions_only;
        self
    }
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Matched(T),
    /// No declaration matched; the file was not touched.
    NoMatch {
        target: String,
        suggestions: Vec<String>,
    },
}

impl<T> Outcome<T> {
    pub fn matched(self) -> Option<T> {
        match self {
            Outcome::Matched(value) => Some(value),
            Outcome::NoMatch { .. } => None,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Outcome::NoMatch { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Matched(value) => Outcome::Matched(f(value)),
            Outcome::NoMatch {
                target,
                suggestions,
            } => Outcome::NoMatch {
                target,
                suggestions,
            },
        }
    }
}

/// A matched declaration and its injection anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub declaration: MatchedDeclaration,
    pub anchor: SourceLocation,
}

/// What an applied injection changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub located: Located,
    pub bytes_inserted: usize,
    /// False when the file changed on disk after it was parsed.
    pub fingerprint_matched: bool,
}

/// Spliced content computed against the current file, not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub located: Located,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

/// One line of `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationSummary {
    pub kind: DeclKind,
    pub name: String,
    pub container: Option<String>,
    pub line: usize,
    pub is_definition: bool,
}

struct Resolved {
    located: Located,
    fingerprint: Option<u64>,
}

pub struct Injector<I: Indexer> {
    indexer: I,
}

impl Injector<ObjcIndexer> {
    /// An injector backed by the tree-sitter Objective-C indexer.
    pub fn objc(strict: bool) -> Result<Self, InjectError> {
        Ok(Self::new(ObjcIndexer::new()?.strict(strict)))
    }
}

impl<I: Indexer> Injector<I> {
    pub fn new(indexer: I) -> Self {
        Self { indexer }
    }

    /// Find the anchor without modifying anything.
    pub fn locate(&mut self, request: &InjectionRequest) -> Result<Outcome<Located>, InjectError> {
        Ok(self.resolve(request)?.map(|resolved| resolved.located))
    }

    /// Find the anchor and splice the request's code into the file.
    pub fn inject(&mut self, request: &InjectionRequest) -> Result<Outcome<Report>, InjectError> {
        let resolved = match self.resolve(request)? {
            Outcome::Matched(resolved) => resolved,
            Outcome::NoMatch {
                target,
                suggestions,
            } => {
                return Ok(Outcome::NoMatch {
                    target,
                    suggestions,
                })
            }
        };

        let anchor = &resolved.located.anchor;
        let result = Splice::new(&anchor.file, anchor.offset, request.code.as_str())
            .with_fingerprint(resolved.fingerprint)
            .apply()?;

        info!(
            file = %anchor.file.display(),
            line = anchor.line,
            column = anchor.column,
            bytes = result.bytes_inserted,
            "injected"
        );

        Ok(Outcome::Matched(Report {
            located: resolved.located,
            bytes_inserted: result.bytes_inserted,
            fingerprint_matched: result.fingerprint_matched,
        }))
    }

    /// Compute the spliced content without writing it.
    pub fn preview(&mut self, request: &InjectionRequest) -> Result<Outcome<Preview>, InjectError> {
        let resolved = match self.resolve(request)? {
            Outcome::Matched(resolved) => resolved,
            Outcome::NoMatch {
                target,
                suggestions,
            } => {
                return Ok(Outcome::NoMatch {
                    target,
                    suggestions,
                })
            }
        };

        let anchor = &resolved.located.anchor;
        let (before, after) = Splice::new(&anchor.file, anchor.offset, request.code.as_str())
            .with_fingerprint(resolved.fingerprint)
            .preview()?;

        Ok(Outcome::Matched(Preview {
            located: resolved.located,
            before,
            after,
        }))
    }

    /// Every declaration the indexer reports for `path`, in traversal order.
    pub fn declarations(
        &mut self,
        path: &Path,
        args: &[String],
    ) -> Result<Vec<DeclarationSummary>, InjectError> {
        let unit = self.indexer.parse(path, args)?;
        let mut summaries = Vec::new();
        let mut collect = |unit: &dyn TranslationUnit, decl: &Declaration<'_>| {
            let location = unit.resolve_location(&Cursor {
                kind: "declaration",
                offset: decl.extent.start,
            });
            summaries.push(DeclarationSummary {
                kind: decl.kind,
                name: decl.name.to_string(),
                container: decl.container.map(str::to_string),
                line: location.line,
                is_definition: decl.is_definition,
            });
            VisitControl::Continue
        };
        unit.traverse(&mut collect);
        Ok(summaries)
    }

    fn resolve(&mut self, request: &InjectionRequest) -> Result<Outcome<Resolved>, InjectError> {
        debug!(
            file = %request.file.display(),
            target = %request.target,
            definitions_only = request.definitions_only,
            "starting run"
        );

        let unit = self.indexer.parse(&request.file, &request.args)?;
        let mut matcher = DeclarationMatcher::new(&request.target, request.definitions_only);
        unit.traverse(&mut matcher);

        match matcher.finish() {
            MatchState::Found {
                declaration,
                anchor,
            } => Ok(Outcome::Matched(Resolved {
                located: Located {
                    declaration,
                    anchor,
                },
                fingerprint: unit.fingerprint(),
            })),
            MatchState::AnchorNotFound { declaration } => {
                let location = unit.resolve_location(&Cursor {
                    kind: "declaration",
                    offset: declaration.extent.start,
                });
                Err(InjectError::AnchorNotFound {
                    target: request.target.to_string(),
                    file: location.file,
                    line: location.line,
                })
            }
            MatchState::NoMatch { suggestions } => {
                info!(target = %request.target, "no matching declaration");
                Ok(Outcome::NoMatch {
                    target: request.target.to_string(),
                    suggestions,
                })
            }
        }
    }
}
