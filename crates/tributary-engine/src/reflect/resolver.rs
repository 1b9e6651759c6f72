//! Reflectability verdicts
//!
//! Every in-module type gets one [`Verdict`]. A reflect attribute only
//! counts after [`SourceVerifier`] finds it in front of the definition;
//! otherwise an explicit opt-out wins, and unannotated types fall back to
//! the per-keyword policy. Types that are opted out but serve as a base of
//! a reflectable type are promoted to dummies.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::{PolicyConfig, UnannotatedPolicy};
use crate::parser::ast::{DeclarationTree, TypeDeclaration, TypeKeyword, Visibility};
use crate::reflect::verify::SourceVerifier;

/// Generation outcome for one type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Full reflector and prototype
    Reflectable,
    /// Opted out with the no-reflect attribute
    NoReflectExplicit,
    /// Opted out by the keyword policy
    NoReflectDefault,
    /// Identity-only stub artifacts
    DummyRequired,
}

impl Verdict {
    /// Whether artifacts are written for this verdict
    pub fn emits_artifacts(self) -> bool {
        matches!(self, Verdict::Reflectable | Verdict::DummyRequired)
    }

    pub fn is_no_reflect(self) -> bool {
        matches!(self, Verdict::NoReflectExplicit | Verdict::NoReflectDefault)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Reflectable => write!(f, "reflectable"),
            Verdict::NoReflectExplicit => write!(f, "no_reflect (explicit)"),
            Verdict::NoReflectDefault => write!(f, "no_reflect (default)"),
            Verdict::DummyRequired => write!(f, "dummy"),
        }
    }
}

/// A type of the tree together with what its enclosing context allows
#[derive(Debug, Clone, Copy)]
pub struct IndexedType<'t> {
    pub decl: &'t TypeDeclaration,
    /// Public all the way up through enclosing types
    pub accessible: bool,
    /// Declared as, or inside, a template
    pub templated: bool,
}

/// Types of a declaration tree by qualified name, first definition wins
#[derive(Debug, Default)]
pub struct TypeIndex<'t> {
    by_name: FxHashMap<String, IndexedType<'t>>,
    order: Vec<String>,
}

impl<'t> TypeIndex<'t> {
    pub fn build(tree: &'t DeclarationTree) -> Self {
        let mut index = TypeIndex::default();
        for ty in &tree.root.types {
            index.add(ty, true, false);
        }
        let mut stack: Vec<_> = tree.root.namespaces.iter().rev().collect();
        while let Some(ns) = stack.pop() {
            for ty in &ns.types {
                index.add(ty, true, false);
            }
            stack.extend(ns.namespaces.iter().rev());
        }
        index
    }

    fn add(&mut self, decl: &'t TypeDeclaration, parent_accessible: bool, parent_templated: bool) {
        let accessible = parent_accessible && decl.visibility == Visibility::Public;
        let templated = parent_templated || decl.is_template;
        if !decl.name.is_empty() {
            let name = decl.qualified_name();
            if !self.by_name.contains_key(&name) {
                self.order.push(name.clone());
                self.by_name.insert(
                    name,
                    IndexedType {
                        decl,
                        accessible,
                        templated,
                    },
                );
            }
        }
        for nested in &decl.nested {
            self.add(nested, accessible, templated);
        }
    }

    pub fn get(&self, qualified_name: &str) -> Option<&IndexedType<'t>> {
        self.by_name.get(qualified_name)
    }

    pub fn decl(&self, qualified_name: &str) -> Option<&'t TypeDeclaration> {
        self.get(qualified_name).map(|t| t.decl)
    }

    /// Types in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &IndexedType<'t>> + '_ {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Verdicts of one module, by qualified type name
#[derive(Debug, Default, Clone)]
pub struct Verdicts {
    by_name: FxHashMap<String, Verdict>,
    /// Generation candidates in declaration order
    order: Vec<String>,
}

impl Verdicts {
    pub fn get(&self, qualified_name: &str) -> Option<Verdict> {
        self.by_name.get(qualified_name).copied()
    }

    /// Set a verdict; new names are appended to the candidate order
    pub fn insert(&mut self, qualified_name: &str, verdict: Verdict) {
        if self
            .by_name
            .insert(qualified_name.to_string(), verdict)
            .is_none()
        {
            self.order.push(qualified_name.to_string());
        }
    }

    /// Candidates with their verdicts, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Verdict)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name).map(|v| (name.as_str(), *v)))
    }

    pub fn count(&self, predicate: impl Fn(Verdict) -> bool) -> usize {
        self.by_name.values().filter(|v| predicate(**v)).count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Decides verdicts from attributes, source text and policy
pub struct ReflectabilityResolver<'c> {
    policy: &'c PolicyConfig,
    verifier: SourceVerifier,
}

impl<'c> ReflectabilityResolver<'c> {
    pub fn new(policy: &'c PolicyConfig) -> Self {
        Self {
            policy,
            verifier: SourceVerifier::new(),
        }
    }

    /// Verdict of a single type, before base promotion
    pub fn resolve(&mut self, ty: &TypeDeclaration) -> Verdict {
        let policy = self.policy;
        let reflect_claims = ty
            .attributes_named(&policy.reflect_attribute)
            .filter(|a| policy.accepts_scope(a.scope.as_deref()));
        for attribute in reflect_claims {
            if self.verifier.verify(ty, attribute) {
                return Verdict::Reflectable;
            }
        }

        let opted_out = ty
            .attributes_named(&policy.no_reflect_attribute)
            .any(|a| policy.accepts_scope(a.scope.as_deref()));
        if opted_out {
            return Verdict::NoReflectExplicit;
        }

        let default = match ty.keyword {
            TypeKeyword::Class => policy.class_default,
            TypeKeyword::Struct | TypeKeyword::Union => policy.struct_default,
        };
        match default {
            UnannotatedPolicy::Skip => Verdict::NoReflectDefault,
            UnannotatedPolicy::Dummy => Verdict::DummyRequired,
            UnannotatedPolicy::Reflect => Verdict::Reflectable,
        }
    }

    /// Verdicts for every generation candidate of a module: types declared
    /// in a file accepted by `is_candidate` that are neither templates nor
    /// hidden inside a non-public scope.
    pub fn resolve_module(
        &mut self,
        index: &TypeIndex<'_>,
        is_candidate: impl Fn(&Path) -> bool,
    ) -> Verdicts {
        let mut verdicts = Verdicts::default();

        for entry in index.iter() {
            let decl = entry.decl;
            if !is_candidate(&decl.path) {
                continue;
            }
            let name = decl.qualified_name();
            if entry.templated {
                debug!("Skipping template '{}'", name);
                continue;
            }
            if !entry.accessible {
                debug!("Skipping non-public nested type '{}'", name);
                continue;
            }

            let verdict = self.resolve(decl);
            debug!("'{}' resolved to {}", name, verdict);
            verdicts.insert(&name, verdict);
        }

        promote_base_dummies(&mut verdicts, index);
        verdicts
    }
}

/// Opted-out bases of reflectable types still need identity stubs
fn promote_base_dummies(verdicts: &mut Verdicts, index: &TypeIndex<'_>) {
    let mut promoted = Vec::new();
    for (name, verdict) in verdicts.iter() {
        if verdict != Verdict::Reflectable {
            continue;
        }
        let Some(decl) = index.decl(name) else {
            continue;
        };
        for base in &decl.bases {
            let Some(base_name) = base.resolved.as_deref() else {
                continue;
            };
            if verdicts.get(base_name).is_some_and(Verdict::is_no_reflect) {
                promoted.push(base_name.to_string());
            }
        }
    }

    for name in promoted {
        debug!("'{}' promoted to dummy as a base of a reflectable type", name);
        verdicts.insert(&name, Verdict::DummyRequired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{HeaderParser, ParseRequest, SyntaxTreeProvider};
    use std::fs;

    fn module_verdicts(source: &str, policy: &PolicyConfig) -> Verdicts {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.hpp");
        fs::write(&path, source).unwrap();
        let request = ParseRequest {
            module: "m".into(),
            files: vec![path],
            ..Default::default()
        };
        let tree = HeaderParser::new().parse(&request).unwrap();
        let index = TypeIndex::build(&tree);
        ReflectabilityResolver::new(policy).resolve_module(&index, |p| p.starts_with(dir.path()))
    }

    #[test]
    fn test_verdict_rules() {
        let verdicts = module_verdicts(
            "struct [[reflectable]] A {};\n\
             struct [[no_reflect]] B {};\n\
             struct C {};\n\
             class D {};\n\
             class [[reflectable]] E {};\n\
             union U {};",
            &PolicyConfig::default(),
        );
        assert_eq!(verdicts.get("A"), Some(Verdict::Reflectable));
        assert_eq!(verdicts.get("B"), Some(Verdict::NoReflectExplicit));
        assert_eq!(verdicts.get("C"), Some(Verdict::DummyRequired));
        assert_eq!(verdicts.get("D"), Some(Verdict::NoReflectDefault));
        assert_eq!(verdicts.get("E"), Some(Verdict::Reflectable));
        assert_eq!(verdicts.get("U"), Some(Verdict::DummyRequired));
    }

    #[test]
    fn test_policy_overrides() {
        let policy = PolicyConfig {
            struct_default: UnannotatedPolicy::Skip,
            class_default: UnannotatedPolicy::Reflect,
            ..PolicyConfig::default()
        };
        let verdicts = module_verdicts("struct C {};\nclass D {};", &policy);
        assert_eq!(verdicts.get("C"), Some(Verdict::NoReflectDefault));
        assert_eq!(verdicts.get("D"), Some(Verdict::Reflectable));
    }

    #[test]
    fn test_scope_filter() {
        let policy = PolicyConfig {
            attribute_scopes: vec!["rythe".into()],
            class_default: UnannotatedPolicy::Skip,
            ..PolicyConfig::default()
        };
        let verdicts = module_verdicts(
            "class [[rythe::reflectable]] A {};\nclass [[other::reflectable]] B {};\nclass [[reflectable]] C {};",
            &policy,
        );
        assert_eq!(verdicts.get("A"), Some(Verdict::Reflectable));
        assert_eq!(verdicts.get("B"), Some(Verdict::NoReflectDefault));
        assert_eq!(verdicts.get("C"), Some(Verdict::NoReflectDefault));
    }

    #[test]
    fn test_base_promotion() {
        let verdicts = module_verdicts(
            "class [[no_reflect]] Hidden {};\n\
             class Unused {};\n\
             struct [[reflectable]] Derived : Hidden {};",
            &PolicyConfig::default(),
        );
        assert_eq!(verdicts.get("Hidden"), Some(Verdict::DummyRequired));
        assert_eq!(verdicts.get("Unused"), Some(Verdict::NoReflectDefault));
        assert_eq!(verdicts.get("Derived"), Some(Verdict::Reflectable));
    }

    #[test]
    fn test_templates_and_hidden_nested_excluded() {
        let verdicts = module_verdicts(
            "template<typename T> struct [[reflectable]] Box { T v; };\n\
             struct [[reflectable]] Outer {\n\
               struct [[reflectable]] Open { int a; };\n\
             private:\n\
               struct [[reflectable]] Closed { struct [[reflectable]] Deep {}; };\n\
             };",
            &PolicyConfig::default(),
        );
        let names: Vec<_> = verdicts.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["Outer", "Outer::Open"]);
    }

    #[test]
    fn test_unverified_attribute_falls_back_to_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.hpp");
        fs::write(&path, "#define REFLECT [[reflectable]]\nclass REFLECTED_BY_MACRO {};").unwrap();

        let mut decl = TypeDeclaration::new("REFLECTED_BY_MACRO", TypeKeyword::Class, path);
        decl.attributes
            .push(crate::parser::ast::AttributeDeclaration::new(None, "reflectable", None));
        let policy = PolicyConfig::default();
        let mut resolver = ReflectabilityResolver::new(&policy);
        assert_eq!(resolver.resolve(&decl), Verdict::NoReflectDefault);
    }
}
