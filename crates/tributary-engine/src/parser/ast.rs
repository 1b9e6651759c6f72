//! Declaration tree
//!
//! The provider-neutral model the rest of the engine reads: namespaces,
//! aggregate types with their fields, attributes and bases, plus enums and
//! aliases needed for canonical type resolution.

use std::path::{Path, PathBuf};

use crate::parser::diagnostic::Diagnostic;
use crate::parser::token::Span;

/// Member or base access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Keyword a type was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKeyword {
    Struct,
    Class,
    Union,
}

impl TypeKeyword {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "struct" => Some(TypeKeyword::Struct),
            "class" => Some(TypeKeyword::Class),
            "union" => Some(TypeKeyword::Union),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeKeyword::Struct => "struct",
            TypeKeyword::Class => "class",
            TypeKeyword::Union => "union",
        }
    }

    /// Access level of members before any access specifier
    pub fn default_visibility(self) -> Visibility {
        match self {
            TypeKeyword::Class => Visibility::Private,
            TypeKeyword::Struct | TypeKeyword::Union => Visibility::Public,
        }
    }
}

/// `[[scope::name(arguments)]]`
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDeclaration {
    /// Namespace qualifier, absent for unscoped attributes
    pub scope: Option<String>,
    pub name: String,
    /// Raw text between the parentheses, passed through uninterpreted
    pub arguments: Option<String>,
    pub span: Span,
}

impl AttributeDeclaration {
    pub fn new(scope: Option<&str>, name: &str, arguments: Option<&str>) -> Self {
        Self {
            scope: scope.map(str::to_string),
            name: name.to_string(),
            arguments: arguments.map(str::to_string),
            span: Span::default(),
        }
    }

    /// `scope::name`, or just `name`
    pub fn qualified_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}::{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

/// Resolved shape of a field's declared type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Arithmetic builtin or fixed-width integer name
    Primitive(String),
    /// Enumeration, by qualified name
    Enum(String),
    /// Struct, class or union, by qualified name
    Record {
        qualified_name: String,
        /// Template argument text including the angle brackets
        template_args: Option<String>,
    },
    /// Alias of another type
    Typedef { name: String, target: Box<TypeKind> },
    /// Template parameter or dependent type
    Templated,
    Pointer,
    Reference,
    Array,
    Bitfield,
    Unresolved,
}

impl TypeKind {
    /// The kind with every typedef layer removed
    pub fn canonical(&self) -> &TypeKind {
        let mut kind = self;
        while let TypeKind::Typedef { target, .. } = kind {
            kind = target;
        }
        kind
    }

    /// Whether a record lives in the standard library namespace
    pub fn is_std_record(&self) -> bool {
        match self.canonical() {
            TypeKind::Record { qualified_name, .. } => is_std_name(qualified_name),
            _ => false,
        }
    }
}

/// Whether a qualified name is rooted in `std`
pub fn is_std_name(qualified_name: &str) -> bool {
    let name = qualified_name.trim_start_matches("::");
    name == "std" || name.starts_with("std::")
}

/// A field's declared type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Type as written, without cv-qualifiers or declarator parts
    pub spelling: String,
    pub kind: TypeKind,
}

impl TypeRef {
    /// An unresolved type reference
    pub fn new(spelling: impl Into<String>) -> Self {
        Self {
            spelling: spelling.into(),
            kind: TypeKind::Unresolved,
        }
    }

    pub fn with_kind(spelling: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            spelling: spelling.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    pub name: String,
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub attributes: Vec<AttributeDeclaration>,
    pub span: Span,
}

impl FieldDeclaration {
    pub fn new(name: &str, ty: TypeRef, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            ty,
            visibility,
            attributes: Vec::new(),
            span: Span::default(),
        }
    }
}

/// Reference to a base class
#[derive(Debug, Clone, PartialEq)]
pub struct BaseClassRef {
    /// Base as written
    pub spelling: String,
    /// Qualified name of the base declaration, when found
    pub resolved: Option<String>,
    pub access: Visibility,
    pub is_virtual: bool,
}

impl BaseClassRef {
    pub fn new(spelling: &str, access: Visibility) -> Self {
        Self {
            spelling: spelling.to_string(),
            resolved: None,
            access,
            is_virtual: false,
        }
    }

    /// Name used in generated code
    pub fn display_name(&self) -> &str {
        self.resolved
            .as_deref()
            .unwrap_or_else(|| self.spelling.trim_start_matches("::"))
    }
}

/// A struct, class or union definition
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    pub name: String,
    /// Enclosing namespaces, outermost first
    pub namespace: Vec<String>,
    /// Enclosing types for nested declarations, outermost first
    pub enclosing: Vec<String>,
    pub keyword: TypeKeyword,
    /// Declaring file
    pub path: PathBuf,
    pub span: Span,
    pub fields: Vec<FieldDeclaration>,
    pub attributes: Vec<AttributeDeclaration>,
    pub bases: Vec<BaseClassRef>,
    /// Access of the declaration within its enclosing type
    pub visibility: Visibility,
    /// Template or partial/explicit specialization
    pub is_template: bool,
    pub nested: Vec<TypeDeclaration>,
    pub enums: Vec<EnumDeclaration>,
    pub aliases: Vec<AliasDeclaration>,
}

impl TypeDeclaration {
    pub fn new(name: &str, keyword: TypeKeyword, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            namespace: Vec::new(),
            enclosing: Vec::new(),
            keyword,
            path: path.into(),
            span: Span::default(),
            fields: Vec::new(),
            attributes: Vec::new(),
            bases: Vec::new(),
            visibility: Visibility::Public,
            is_template: false,
            nested: Vec::new(),
            enums: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Scope components for names declared inside this type
    pub fn scope(&self) -> Vec<String> {
        let mut scope = self.namespace.clone();
        scope.extend(self.enclosing.iter().cloned());
        scope.push(self.name.clone());
        scope
    }

    /// `ns::Outer::Name`, without a leading `::`
    pub fn qualified_name(&self) -> String {
        self.scope().join("::")
    }

    /// `ns::Outer`, the scope the type is declared in
    pub fn parent_scope(&self) -> Vec<String> {
        let mut scope = self.namespace.clone();
        scope.extend(self.enclosing.iter().cloned());
        scope
    }

    pub fn is_nested(&self) -> bool {
        !self.enclosing.is_empty()
    }

    /// Attributes named `name`, in encounter order
    pub fn attributes_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a AttributeDeclaration> + 'a {
        self.attributes.iter().filter(move |a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDeclaration {
    pub name: String,
    pub namespace: Vec<String>,
    pub enclosing: Vec<String>,
    pub is_scoped: bool,
    pub span: Span,
}

impl EnumDeclaration {
    pub fn qualified_name(&self) -> String {
        let mut parts = self.namespace.clone();
        parts.extend(self.enclosing.iter().cloned());
        parts.push(self.name.clone());
        parts.join("::")
    }
}

/// `typedef T Name;` or `using Name = T;`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclaration {
    pub name: String,
    /// Scope the alias is declared in
    pub scope: Vec<String>,
    pub target: TypeRef,
    pub span: Span,
}

impl AliasDeclaration {
    pub fn qualified_name(&self) -> String {
        let mut parts = self.scope.clone();
        parts.push(self.name.clone());
        parts.join("::")
    }
}

/// A namespace and everything declared directly in it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    /// Empty for the global namespace
    pub name: String,
    pub namespaces: Vec<Namespace>,
    pub types: Vec<TypeDeclaration>,
    pub enums: Vec<EnumDeclaration>,
    pub aliases: Vec<AliasDeclaration>,
    /// Targets of `using namespace` directives, as written
    pub using_namespaces: Vec<String>,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Child namespace, created on first use
    pub fn child_mut(&mut self, name: &str) -> &mut Namespace {
        let index = match self.namespaces.iter().position(|ns| ns.name == name) {
            Some(index) => index,
            None => {
                self.namespaces.push(Namespace::new(name));
                self.namespaces.len() - 1
            }
        };
        &mut self.namespaces[index]
    }

    /// Namespace at `path`, created on first use
    pub fn descend_mut(&mut self, path: &[String]) -> &mut Namespace {
        path.iter().fold(self, |ns, name| ns.child_mut(name))
    }

    /// Merge another namespace with the same name into this one.
    ///
    /// The first definition of a type wins; the qualified names of dropped
    /// duplicates are returned.
    pub fn merge(&mut self, other: Namespace) -> Vec<(String, PathBuf)> {
        let mut dropped = Vec::new();

        for ty in other.types {
            if self.types.iter().any(|existing| existing.name == ty.name) {
                dropped.push((ty.qualified_name(), ty.path));
            } else {
                self.types.push(ty);
            }
        }
        self.enums.extend(other.enums);
        self.aliases.extend(other.aliases);
        for target in other.using_namespaces {
            if !self.using_namespaces.contains(&target) {
                self.using_namespaces.push(target);
            }
        }
        for child in other.namespaces {
            let name = child.name.clone();
            dropped.extend(self.child_mut(&name).merge(child));
        }
        dropped
    }

    /// Every type in this namespace and below, nested types included,
    /// in declaration order
    pub fn walk_types(&self) -> Vec<&TypeDeclaration> {
        fn visit<'a>(ty: &'a TypeDeclaration, out: &mut Vec<&'a TypeDeclaration>) {
            out.push(ty);
            for nested in &ty.nested {
                visit(nested, out);
            }
        }

        let mut out = Vec::new();
        for ty in &self.types {
            visit(ty, &mut out);
        }
        for ns in &self.namespaces {
            out.extend(ns.walk_types());
        }
        out
    }
}

/// Everything a provider extracted from one module's headers
#[derive(Debug, Clone, Default)]
pub struct DeclarationTree {
    /// The global namespace
    pub root: Namespace,
    /// Every file that contributed declarations
    pub files: Vec<PathBuf>,
    /// Non-fatal diagnostics of the parse
    pub diagnostics: Vec<Diagnostic>,
}

impl DeclarationTree {
    pub fn new(root: Namespace) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn walk_types(&self) -> Vec<&TypeDeclaration> {
        self.root.walk_types()
    }

    /// Types declared in files under `dir`
    pub fn types_under<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a TypeDeclaration> + 'a {
        self.walk_types()
            .into_iter()
            .filter(move |ty| ty.path.starts_with(dir))
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}
