//! Source verification of type annotations
//!
//! The declaration tree can report attributes that never appear in front of
//! the type in its own file (macro expansions, forwarding headers). An
//! annotation only counts when the comment-free source text shows the
//! attribute between the type's keyword and its name, followed eventually
//! by the opening brace.

use regex::Regex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use crate::parser::ast::{AttributeDeclaration, TypeDeclaration};

/// Re-reads declaring files and checks annotations against their text
#[derive(Debug, Default)]
pub struct SourceVerifier {
    /// Comment-stripped text per file; `None` when the file is unreadable
    normalized: FxHashMap<PathBuf, Option<String>>,
}

impl SourceVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `attribute` textually precedes the definition of `ty`
    pub fn verify(&mut self, ty: &TypeDeclaration, attribute: &AttributeDeclaration) -> bool {
        let pattern = match annotation_pattern(ty.keyword.as_str(), &ty.name, attribute) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("Cannot build verification pattern for '{}': {}", ty.name, e);
                return false;
            }
        };

        let Some(text) = self.normalized_text(&ty.path) else {
            return false;
        };
        let verified = pattern.is_match(text);
        if !verified {
            trace!(
                "Attribute '{}' on '{}' has no matching annotation in {}",
                attribute.qualified_name(),
                ty.qualified_name(),
                ty.path.display()
            );
        }
        verified
    }

    fn normalized_text(&mut self, path: &Path) -> Option<&str> {
        self.normalized
            .entry(path.to_path_buf())
            .or_insert_with(|| match fs::read_to_string(path) {
                Ok(text) => Some(strip_comments(&text)),
                Err(e) => {
                    warn!("Cannot re-read {} for verification: {}", path.display(), e);
                    None
                }
            })
            .as_deref()
    }
}

/// Replace comments with whitespace, leaving string and character literals
/// untouched
pub fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        StringLiteral,
        CharLiteral,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    let mut previous = '\0';

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push(' ');
                    state = State::BlockComment;
                }
                '"' => {
                    out.push(c);
                    state = State::StringLiteral;
                }
                // digit separators: 1'000'000
                '\'' if !previous.is_ascii_alphanumeric() => {
                    out.push(c);
                    state = State::CharLiteral;
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
            State::StringLiteral | State::CharLiteral => {
                out.push(c);
                let quote = if state == State::StringLiteral { '"' } else { '\'' };
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
        }
        previous = c;
    }
    out
}

/// Regex matching `keyword [[... attribute ...]] Name ... {`
pub fn annotation_pattern(
    keyword: &str,
    type_name: &str,
    attribute: &AttributeDeclaration,
) -> Result<Regex, regex::Error> {
    let name = regex::escape(&attribute.name);
    let target = match &attribute.scope {
        None => format!(r"\[\[(?:[^\]]*?[,\s])?{name}\b[^\]]*\]\]"),
        Some(scope) => {
            let scope = scope
                .split("::")
                .map(|part| regex::escape(part.trim()))
                .collect::<Vec<_>>()
                .join(r"\s*::\s*");
            format!(
                r"\[\[(?:(?:[^\]]*?[,\s])?{scope}\s*::\s*{name}\b|\s*using\s+{scope}\s*:[^\]]*?\b{name}\b)[^\]]*\]\]"
            )
        }
    };

    let pattern = format!(
        concat!(
            r"\b{keyword}\b\s*",
            r"(?:[A-Z_][A-Z0-9_]*\s+)*",
            r"(?:\[\[[^\]]*\]\]\s*)*",
            "{target}",
            r"(?:\s*\[\[[^\]]*\]\])*\s*",
            r"(?:alignas\s*\([^)]*\)\s*)?",
            r"(?:[A-Za-z_]\w*\s+)*?",
            r"{type_name}\b\s*",
            r"(?:final\b\s*)?",
            r"(?::[^{{;]*)?\{{"
        ),
        keyword = regex::escape(keyword),
        target = target,
        type_name = regex::escape(type_name),
    );
    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::TypeKeyword;

    fn matches(source: &str, keyword: &str, ty: &str, attr: AttributeDeclaration) -> bool {
        let text = strip_comments(source);
        annotation_pattern(keyword, ty, &attr).unwrap().is_match(&text)
    }

    #[test]
    fn test_strip_comments_keeps_literals() {
        let text = strip_comments("a /* b */ c // d\n\"// not\" '/' 1'000");
        assert_eq!(text, "a   c \n\"// not\" '/' 1'000");
    }

    #[test]
    fn test_unscoped_annotation() {
        let attr = AttributeDeclaration::new(None, "reflectable", None);
        assert!(matches("struct [[reflectable]] Vec2 { float x; };", "struct", "Vec2", attr.clone()));
        assert!(matches(
            "struct [[nodiscard, reflectable]]\n  Vec2 final : public Base<int> {",
            "struct",
            "Vec2",
            attr.clone()
        ));
        assert!(!matches("struct [[reflectable]] Other {}; struct Vec2 {};", "struct", "Vec2", attr.clone()));
        assert!(!matches("struct Vec2 { [[reflectable]] int x; };", "struct", "Vec2", attr.clone()));
        assert!(!matches("class [[reflectable]] Vec2 {};", "struct", "Vec2", attr));
    }

    #[test]
    fn test_commented_annotation_does_not_count() {
        let attr = AttributeDeclaration::new(None, "reflectable", None);
        assert!(!matches("struct /*[[reflectable]]*/ Vec2 {};", "struct", "Vec2", attr));
    }

    #[test]
    fn test_scoped_annotation_forms() {
        let attr = AttributeDeclaration::new(Some("rythe"), "reflectable", None);
        assert!(matches("struct [[rythe::reflectable]] A {", "struct", "A", attr.clone()));
        assert!(matches("struct [[ rythe :: reflectable ]] A {", "struct", "A", attr.clone()));
        assert!(matches("struct [[using rythe: range(0, 1), reflectable]] A {", "struct", "A", attr.clone()));
        assert!(!matches("struct [[other::reflectable]] A {", "struct", "A", attr));
    }

    #[test]
    fn test_decorators_around_annotation() {
        let attr = AttributeDeclaration::new(None, "reflectable", None);
        assert!(matches(
            "class RYTHE_API [[reflectable]] alignas(16) Mat4 : public Base {",
            "class",
            "Mat4",
            attr
        ));
    }

    #[test]
    fn test_verifier_reads_declaring_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hpp");
        fs::write(&path, "// struct [[reflectable]] Fake {};\nstruct [[reflectable]] Real {};").unwrap();

        let mut verifier = SourceVerifier::new();
        let attr = AttributeDeclaration::new(None, "reflectable", None);
        let real = TypeDeclaration::new("Real", TypeKeyword::Struct, path.clone());
        let fake = TypeDeclaration::new("Fake", TypeKeyword::Struct, path);
        assert!(verifier.verify(&real, &attr));
        assert!(!verifier.verify(&fake, &attr));

        let missing = TypeDeclaration::new("Real", TypeKeyword::Struct, dir.path().join("gone.hpp"));
        assert!(!verifier.verify(&missing, &attr));
    }
}
