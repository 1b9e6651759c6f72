//! Name resolution for field types and base classes.
//!
//! Runs after all headers of a module are merged. Each field spelling is
//! looked up from the scope of its declaring type outward, the way C++
//! unqualified lookup would, and turned into a [`TypeKind`].

use rustc_hash::{FxHashMap, FxHashSet};

use crate::parser::ast::{
    is_std_name, DeclarationTree, Namespace, TypeDeclaration, TypeKind, TypeRef,
};

/// Words that make up arithmetic builtin type names
const BUILTIN_WORDS: &[&str] = &[
    "void", "bool", "char", "char8_t", "char16_t", "char32_t", "wchar_t", "short", "int", "long",
    "signed", "unsigned", "float", "double",
];

/// Fixed-width and size names, with or without `std::`
const FIXED_WIDTH: &[&str] = &[
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "size_t", "ptrdiff_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t", "max_align_t",
];

#[derive(Debug, Clone)]
enum Symbol {
    Record,
    Enum,
    Alias { scope: Vec<String>, target: TypeRef },
}

/// Every named type of a declaration tree, by qualified name
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: FxHashMap<String, Symbol>,
    /// `using namespace` targets, by the namespace they appear in
    usings: FxHashMap<String, Vec<String>>,
}

impl SymbolTable {
    pub fn build(root: &Namespace) -> Self {
        let mut table = SymbolTable::default();
        table.add_namespace(root, &[]);
        table
    }

    fn add_namespace(&mut self, ns: &Namespace, scope: &[String]) {
        if !ns.using_namespaces.is_empty() {
            self.usings
                .entry(scope.join("::"))
                .or_default()
                .extend(ns.using_namespaces.iter().cloned());
        }
        for ty in &ns.types {
            self.add_type(ty);
        }
        for decl in &ns.enums {
            if !decl.name.is_empty() {
                self.insert(decl.qualified_name(), Symbol::Enum);
            }
        }
        for alias in &ns.aliases {
            self.insert(
                alias.qualified_name(),
                Symbol::Alias {
                    scope: alias.scope.clone(),
                    target: alias.target.clone(),
                },
            );
        }
        for child in &ns.namespaces {
            let mut child_scope = scope.to_vec();
            child_scope.push(child.name.clone());
            self.add_namespace(child, &child_scope);
        }
    }

    fn add_type(&mut self, ty: &TypeDeclaration) {
        self.insert(ty.qualified_name(), Symbol::Record);
        for decl in &ty.enums {
            if !decl.name.is_empty() {
                self.insert(decl.qualified_name(), Symbol::Enum);
            }
        }
        for alias in &ty.aliases {
            self.insert(
                alias.qualified_name(),
                Symbol::Alias {
                    scope: alias.scope.clone(),
                    target: alias.target.clone(),
                },
            );
        }
        for nested in &ty.nested {
            self.add_type(nested);
        }
    }

    fn insert(&mut self, name: String, symbol: Symbol) {
        self.symbols.entry(name).or_insert(symbol);
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.symbols.contains_key(qualified_name)
    }

    /// Resolve a type spelling as seen from `scope`
    pub fn resolve(&self, spelling: &str, scope: &[String]) -> TypeKind {
        let mut visited = FxHashSet::default();
        self.resolve_inner(spelling, scope, &mut visited)
    }

    fn resolve_inner(
        &self,
        spelling: &str,
        scope: &[String],
        visited: &mut FxHashSet<String>,
    ) -> TypeKind {
        let spelling = spelling.trim();
        if is_builtin(spelling) {
            return TypeKind::Primitive(spelling.to_string());
        }

        let (base, template_args) = split_template_args(spelling);
        let Some((qualified, symbol)) = self.lookup(base, scope) else {
            return self.fallback(base, template_args, scope);
        };

        match symbol {
            Symbol::Record => TypeKind::Record {
                qualified_name: qualified,
                template_args: template_args.map(str::to_string),
            },
            Symbol::Enum => TypeKind::Enum(qualified),
            Symbol::Alias { scope, target } => {
                if !visited.insert(qualified.clone()) {
                    return TypeKind::Unresolved;
                }
                let target_kind = match target.kind {
                    TypeKind::Unresolved => self.resolve_inner(&target.spelling, scope, visited),
                    ref kind => kind.clone(),
                };
                TypeKind::Typedef {
                    name: qualified,
                    target: Box::new(target_kind),
                }
            }
        }
    }

    /// Names that are not declared in the tree
    fn fallback(&self, base: &str, template_args: Option<&str>, scope: &[String]) -> TypeKind {
        let base = base.trim_start_matches("::");
        if is_std_name(base) {
            return TypeKind::Record {
                qualified_name: base.to_string(),
                template_args: template_args.map(str::to_string),
            };
        }
        // `using namespace std;` makes undeclared names standard library ones
        let std_visible = (0..=scope.len()).any(|i| {
            self.usings
                .get(&scope[..i].join("::"))
                .is_some_and(|targets| targets.iter().any(|t| t.trim_start_matches("::") == "std"))
        });
        if std_visible && !base.contains("::") {
            return TypeKind::Record {
                qualified_name: format!("std::{}", base),
                template_args: template_args.map(str::to_string),
            };
        }
        TypeKind::Unresolved
    }

    /// Find `name` from `scope` outward. Returns the qualified name.
    fn lookup(&self, name: &str, scope: &[String]) -> Option<(String, &Symbol)> {
        if let Some(absolute) = name.strip_prefix("::") {
            return self.symbols.get(absolute).map(|s| (absolute.to_string(), s));
        }

        for i in (0..=scope.len()).rev() {
            let prefix = scope[..i].join("::");
            let candidate = join_scope(&prefix, name);
            if let Some(symbol) = self.symbols.get(&candidate) {
                return Some((candidate, symbol));
            }

            if let Some(targets) = self.usings.get(&prefix) {
                for target in targets {
                    let target = target.trim_start_matches("::");
                    for candidate in [
                        join_scope(&join_scope(&prefix, target), name),
                        join_scope(target, name),
                    ] {
                        if let Some(symbol) = self.symbols.get(&candidate) {
                            return Some((candidate, symbol));
                        }
                    }
                }
            }
        }
        None
    }

    /// Qualified name of a base class, template arguments included
    pub fn resolve_base(&self, spelling: &str, scope: &[String]) -> Option<String> {
        let kind = self.resolve(spelling, scope);
        match kind.canonical() {
            TypeKind::Record {
                qualified_name,
                template_args,
            } => Some(format!(
                "{}{}",
                qualified_name,
                template_args.as_deref().unwrap_or("")
            )),
            _ => None,
        }
    }
}

fn join_scope(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", prefix, name)
    }
}

fn is_builtin(spelling: &str) -> bool {
    let unqualified = spelling
        .trim_start_matches("::")
        .trim_start_matches("std::");
    if FIXED_WIDTH.contains(&unqualified) {
        return true;
    }
    let mut words = spelling.split_whitespace().peekable();
    words.peek().is_some() && words.all(|w| BUILTIN_WORDS.contains(&w))
}

/// `ns::Name<args>` into `ns::Name` and `<args>`
fn split_template_args(spelling: &str) -> (&str, Option<&str>) {
    match spelling.find('<') {
        Some(index) => (spelling[..index].trim_end(), Some(&spelling[index..])),
        None => (spelling, None),
    }
}

/// Resolve every field type and base class in the tree
pub fn resolve_tree(tree: &mut DeclarationTree) {
    let table = SymbolTable::build(&tree.root);
    resolve_namespace(&mut tree.root, &table);
}

fn resolve_namespace(ns: &mut Namespace, table: &SymbolTable) {
    for ty in &mut ns.types {
        resolve_type(ty, table);
    }
    for child in &mut ns.namespaces {
        resolve_namespace(child, table);
    }
}

fn resolve_type(ty: &mut TypeDeclaration, table: &SymbolTable) {
    let scope = ty.scope();
    for field in &mut ty.fields {
        if field.ty.kind != TypeKind::Unresolved {
            continue;
        }
        field.ty.kind = match table.resolve(&field.ty.spelling, &scope) {
            TypeKind::Unresolved if ty.is_template => TypeKind::Templated,
            kind => kind,
        };
    }

    // bases are looked up from the enclosing scope
    let parent = ty.parent_scope();
    for base in &mut ty.bases {
        base.resolved = table.resolve_base(&base.spelling, &parent);
    }

    for nested in &mut ty.nested {
        resolve_type(nested, table);
    }
}
