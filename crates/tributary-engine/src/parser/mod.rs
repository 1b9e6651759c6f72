//! Syntax tree provider seam and the built-in C++ header parser
//!
//! The pipeline only depends on [`SyntaxTreeProvider`]. [`HeaderParser`] is
//! the implementation shipped with the engine: it lexes and parses every
//! candidate header, follows `#include` directives through the module's
//! include search paths, merges the per-file declarations and resolves field
//! types against the merged tree.

pub mod ast;
pub mod diagnostic;
pub mod guards;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod resolve;
pub mod token;

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

pub use ast::{DeclarationTree, Namespace, TypeDeclaration};
pub use diagnostic::{Diagnostic, Severity};

use crate::error::ParseFailure;
use crate::parser::lexer::IncludeDirective;
use crate::parser::parser::Parser;
use crate::parser::token::Span;

/// Input of one module parse
#[derive(Debug, Clone, Default)]
pub struct ParseRequest {
    /// Module name, for diagnostics
    pub module: String,
    /// Candidate headers, in scan order
    pub files: Vec<PathBuf>,
    /// Searched when following includes
    pub include_paths: Vec<PathBuf>,
    /// Known to the provider but never searched or generated
    pub system_include_paths: Vec<PathBuf>,
}

/// Produces a declaration tree for a module's candidate headers
pub trait SyntaxTreeProvider {
    fn parse(&self, request: &ParseRequest) -> Result<DeclarationTree, ParseFailure>;
}

/// Built-in provider parsing headers directly
#[derive(Debug, Clone)]
pub struct HeaderParser {
    follow_includes: bool,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            follow_includes: true,
        }
    }

    /// Parse only the candidate files
    pub fn without_includes() -> Self {
        Self {
            follow_includes: false,
        }
    }

    fn resolve_include(
        &self,
        include: &IncludeDirective,
        from: &Path,
        request: &ParseRequest,
    ) -> Option<PathBuf> {
        let mut search = Vec::with_capacity(request.include_paths.len() + 1);
        if !include.angled {
            if let Some(dir) = from.parent() {
                search.push(dir.to_path_buf());
            }
        }
        search.extend(request.include_paths.iter().cloned());

        search
            .into_iter()
            .map(|dir| normalize_lexically(&dir.join(&include.target)))
            .find(|candidate| candidate.is_file())
    }
}

impl SyntaxTreeProvider for HeaderParser {
    fn parse(&self, request: &ParseRequest) -> Result<DeclarationTree, ParseFailure> {
        let mut queue: VecDeque<(PathBuf, bool)> = VecDeque::new();
        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
        for file in &request.files {
            let file = normalize_lexically(file);
            if seen.insert(file.clone()) {
                queue.push_back((file, true));
            }
        }

        let mut tree = DeclarationTree::default();
        let mut sources: FxHashMap<PathBuf, String> = FxHashMap::default();
        let mut diagnostics = Vec::new();

        while let Some((path, candidate)) = queue.pop_front() {
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    let diagnostic = Diagnostic::error(
                        format!("Cannot read header: {}", e),
                        path.clone(),
                        Span::default(),
                    );
                    diagnostics.push(if candidate {
                        diagnostic
                    } else {
                        diagnostic.downgrade()
                    });
                    continue;
                }
            };

            trace!("Parsing {}", path.display());
            let parsed = Parser::parse_source(&source, &path);
            diagnostics.extend(
                parsed
                    .diagnostics
                    .into_iter()
                    .map(|d| if candidate { d } else { d.downgrade() }),
            );

            if self.follow_includes {
                for include in &parsed.includes {
                    if let Some(target) = self.resolve_include(include, &path, request) {
                        if seen.insert(target.clone()) {
                            debug!(
                                "Following include '{}' from {}",
                                include.target,
                                path.display()
                            );
                            queue.push_back((target, false));
                        }
                    }
                }
            }

            for (name, duplicate_path) in tree.root.merge(parsed.root) {
                diagnostics.push(Diagnostic::info(
                    format!("Duplicate definition of '{}' ignored", name),
                    duplicate_path,
                    Span::default(),
                ));
            }
            tree.files.push(path.clone());
            sources.insert(path, source);
        }

        resolve::resolve_tree(&mut tree);

        if diagnostics.iter().any(Diagnostic::is_error) {
            let errors: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
            let rendered = diagnostic::render(&errors, &sources);
            return Err(ParseFailure {
                module: request.module.clone(),
                diagnostics,
                rendered,
            });
        }

        tree.diagnostics = diagnostics;
        Ok(tree)
    }
}

/// Remove `.` and resolvable `..` components without touching the
/// filesystem
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./../c/d.hpp")),
            PathBuf::from("/a/c/d.hpp")
        );
        assert_eq!(
            normalize_lexically(Path::new("../x/./y")),
            PathBuf::from("../x/y")
        );
        assert_eq!(normalize_lexically(Path::new("a/../..")), PathBuf::from(".."));
    }

    #[test]
    fn test_parse_and_follow_includes() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("core");
        fs::create_dir_all(module.join("math")).unwrap();
        fs::create_dir_all(dir.path().join("third")).unwrap();
        fs::write(
            dir.path().join("third/base.hpp"),
            "namespace ext { struct Base { int b; }; }",
        )
        .unwrap();
        fs::write(
            module.join("math/vec.hpp"),
            "#include <third/base.hpp>\nnamespace core { struct [[reflectable]] Vec : ext::Base { float x; }; }",
        )
        .unwrap();

        let request = ParseRequest {
            module: "core".into(),
            files: vec![module.join("math/vec.hpp")],
            include_paths: vec![dir.path().to_path_buf()],
            system_include_paths: Vec::new(),
        };
        let tree = HeaderParser::new().parse(&request).unwrap();
        let names: Vec<_> = tree.walk_types().iter().map(|t| t.qualified_name()).collect();
        assert_eq!(names, vec!["core::Vec", "ext::Base"]);
        assert_eq!(tree.files.len(), 2);

        let vec = tree.walk_types()[0];
        assert_eq!(vec.bases[0].resolved.as_deref(), Some("ext::Base"));
        assert_eq!(tree.types_under(&module).count(), 1);

        let alone = HeaderParser::without_includes().parse(&request).unwrap();
        assert_eq!(alone.files.len(), 1);
    }

    #[test]
    fn test_errors_in_candidates_fail_the_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.hpp"), "struct Broken { int a;").unwrap();

        let request = ParseRequest {
            module: "m".into(),
            files: vec![dir.path().join("broken.hpp")],
            ..Default::default()
        };
        let failure = HeaderParser::new().parse(&request).unwrap_err();
        assert_eq!(failure.module, "m");
        assert_eq!(failure.error_count(), 1);
        assert!(failure.rendered.contains("Unterminated body of 'Broken'"));
    }

    #[test]
    fn test_errors_in_included_files_are_downgraded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dep.hpp"), "struct Dep { int a;").unwrap();
        fs::write(
            dir.path().join("main.hpp"),
            "#include \"dep.hpp\"\nstruct Main { int m; };",
        )
        .unwrap();

        let request = ParseRequest {
            module: "m".into(),
            files: vec![dir.path().join("main.hpp")],
            ..Default::default()
        };
        let tree = HeaderParser::new().parse(&request).unwrap();
        assert!(!tree.has_errors());
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.hpp"), "struct Twice { int first; };").unwrap();
        fs::write(dir.path().join("b.hpp"), "struct Twice { int second; };").unwrap();

        let request = ParseRequest {
            module: "m".into(),
            files: vec![dir.path().join("a.hpp"), dir.path().join("b.hpp")],
            ..Default::default()
        };
        let tree = HeaderParser::new().parse(&request).unwrap();
        let types = tree.walk_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].fields[0].name, "first");
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Info && d.message.contains("Twice")));
    }
}
