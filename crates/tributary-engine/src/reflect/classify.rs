//! Member and base classification for one reflectable type

use tracing::{debug, trace};

use crate::parser::ast::{is_std_name, FieldDeclaration, TypeDeclaration, TypeKind};
use crate::reflect::resolver::{Verdict, Verdicts};

/// Why a field is left out of the generated artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPublic,
    /// Template parameter or non-standard template instantiation
    Templated,
    /// Pointer, reference, array or bitfield
    Indirection,
    /// Declared type could not be resolved
    Unresolved,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::NotPublic => "not public",
            SkipReason::Templated => "templated type",
            SkipReason::Indirection => "pointer, reference, array or bitfield",
            SkipReason::Unresolved => "unresolved type",
        }
    }
}

/// How a field is emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberClass {
    /// Type hash plus direct storage access (or a value copy)
    Primitive,
    /// Recursive reflector/prototype of the field's record type
    Nested { qualified_name: String },
    Skip(SkipReason),
}

/// A field with its classification
#[derive(Debug, Clone)]
pub struct ClassifiedMember<'t> {
    pub field: &'t FieldDeclaration,
    pub class: MemberClass,
}

impl ClassifiedMember<'_> {
    pub fn is_emitted(&self) -> bool {
        !matches!(self.class, MemberClass::Skip(_))
    }
}

/// How a base class entry is emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseLink {
    /// Call the base's own constructor on the sliced object
    Delegate(String),
    /// Identity-only entry for a base that is not reflectable
    Placeholder(String),
}

impl BaseLink {
    pub fn name(&self) -> &str {
        match self {
            BaseLink::Delegate(name) | BaseLink::Placeholder(name) => name,
        }
    }
}

/// Classification of every field and base of a type
#[derive(Debug, Clone, Default)]
pub struct Classification<'t> {
    /// All fields in declaration order, skipped ones included
    pub members: Vec<ClassifiedMember<'t>>,
    pub bases: Vec<BaseLink>,
}

impl<'t> Classification<'t> {
    pub fn emitted(&self) -> impl Iterator<Item = &ClassifiedMember<'t>> + '_ {
        self.members.iter().filter(|m| m.is_emitted())
    }

    /// Emitted fields that carry attributes, in encounter order
    pub fn attributed(&self) -> impl Iterator<Item = &'t FieldDeclaration> + '_ {
        self.emitted()
            .map(|m| m.field)
            .filter(|f| !f.attributes.is_empty())
    }

    /// Record types reached through nested members
    pub fn nested_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.members.iter().filter_map(|m| match &m.class {
            MemberClass::Nested { qualified_name } => Some(qualified_name.as_str()),
            _ => None,
        })
    }
}

/// Classify one field by visibility and canonical type
pub fn classify_field(field: &FieldDeclaration) -> MemberClass {
    if !field.visibility.is_public() {
        return MemberClass::Skip(SkipReason::NotPublic);
    }

    match field.ty.kind.canonical() {
        TypeKind::Primitive(_) | TypeKind::Enum(_) => MemberClass::Primitive,
        TypeKind::Record {
            qualified_name,
            template_args,
        } => {
            if is_std_name(qualified_name) {
                MemberClass::Primitive
            } else if template_args.is_some() {
                MemberClass::Skip(SkipReason::Templated)
            } else {
                MemberClass::Nested {
                    qualified_name: qualified_name.clone(),
                }
            }
        }
        TypeKind::Templated => MemberClass::Skip(SkipReason::Templated),
        TypeKind::Pointer | TypeKind::Reference | TypeKind::Array | TypeKind::Bitfield => {
            MemberClass::Skip(SkipReason::Indirection)
        }
        TypeKind::Unresolved | TypeKind::Typedef { .. } => MemberClass::Skip(SkipReason::Unresolved),
    }
}

/// Classify the fields and bases of `ty`.
///
/// A base is delegated to only when it is public, resolved, and reflectable
/// in this module; every other base becomes a placeholder.
pub fn classify_type<'t>(ty: &'t TypeDeclaration, verdicts: &Verdicts) -> Classification<'t> {
    let members = ty
        .fields
        .iter()
        .map(|field| {
            let class = classify_field(field);
            match &class {
                MemberClass::Skip(SkipReason::NotPublic) => {
                    trace!("{}::{} skipped: not public", ty.name, field.name)
                }
                MemberClass::Skip(reason) => debug!(
                    "{}::{} ({}) skipped: {}",
                    ty.name,
                    field.name,
                    field.ty.spelling,
                    reason.describe()
                ),
                _ => {}
            }
            ClassifiedMember { field, class }
        })
        .collect();

    let bases = ty
        .bases
        .iter()
        .map(|base| {
            let name = base.display_name().to_string();
            let reflectable = base.resolved.as_deref().and_then(|r| verdicts.get(r))
                == Some(Verdict::Reflectable);
            if reflectable && base.access.is_public() {
                BaseLink::Delegate(name)
            } else {
                BaseLink::Placeholder(name)
            }
        })
        .collect();

    Classification { members, bases }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{BaseClassRef, TypeKeyword, TypeRef, Visibility};

    fn field(name: &str, kind: TypeKind, visibility: Visibility) -> FieldDeclaration {
        FieldDeclaration::new(name, TypeRef::with_kind("T", kind), visibility)
    }

    fn record(name: &str, args: Option<&str>) -> TypeKind {
        TypeKind::Record {
            qualified_name: name.into(),
            template_args: args.map(str::to_string),
        }
    }

    #[test]
    fn test_field_rules() {
        use Visibility::*;
        assert_eq!(
            classify_field(&field("a", TypeKind::Primitive("float".into()), Public)),
            MemberClass::Primitive
        );
        assert_eq!(
            classify_field(&field("b", TypeKind::Enum("Mode".into()), Public)),
            MemberClass::Primitive
        );
        assert_eq!(
            classify_field(&field("c", record("math::Vec2", None), Public)),
            MemberClass::Nested {
                qualified_name: "math::Vec2".into()
            }
        );
        assert_eq!(
            classify_field(&field("d", record("std::vector", Some("<Vec2>")), Public)),
            MemberClass::Primitive
        );
        assert_eq!(
            classify_field(&field("e", record("Pool", Some("<int>")), Public)),
            MemberClass::Skip(SkipReason::Templated)
        );
        assert_eq!(
            classify_field(&field("f", TypeKind::Pointer, Public)),
            MemberClass::Skip(SkipReason::Indirection)
        );
        assert_eq!(
            classify_field(&field("g", TypeKind::Primitive("int".into()), Private)),
            MemberClass::Skip(SkipReason::NotPublic)
        );
        assert_eq!(
            classify_field(&field("h", TypeKind::Primitive("int".into()), Protected)),
            MemberClass::Skip(SkipReason::NotPublic)
        );
        assert_eq!(
            classify_field(&field("i", TypeKind::Unresolved, Public)),
            MemberClass::Skip(SkipReason::Unresolved)
        );
    }

    #[test]
    fn test_typedefs_are_canonicalized() {
        let alias = TypeKind::Typedef {
            name: "core::string_t".into(),
            target: Box::new(record("std::string", None)),
        };
        assert_eq!(
            classify_field(&field("s", alias, Visibility::Public)),
            MemberClass::Primitive
        );
    }

    #[test]
    fn test_attributed_only_counts_emitted_fields() {
        let mut ty = TypeDeclaration::new("A", TypeKeyword::Struct, "a.hpp");
        let mut shown = field("shown", TypeKind::Primitive("int".into()), Visibility::Public);
        shown.attributes.push(crate::parser::ast::AttributeDeclaration::new(Some("rythe"), "range", Some("0, 1")));
        let mut hidden = field("hidden", TypeKind::Primitive("int".into()), Visibility::Private);
        hidden.attributes = shown.attributes.clone();
        ty.fields = vec![shown, hidden];

        let classification = classify_type(&ty, &Verdicts::default());
        let names: Vec<_> = classification.attributed().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["shown"]);
        assert_eq!(classification.emitted().count(), 1);
    }

    #[test]
    fn test_unknown_bases_are_placeholders() {
        let mut ty = TypeDeclaration::new("A", TypeKeyword::Struct, "a.hpp");
        ty.bases.push(BaseClassRef::new("ext::Base", Visibility::Public));
        let classification = classify_type(&ty, &Verdicts::default());
        assert_eq!(classification.bases, vec![BaseLink::Placeholder("ext::Base".into())]);
    }

    #[test]
    fn test_reflectable_public_bases_delegate() {
        let mut ty = TypeDeclaration::new("A", TypeKeyword::Class, "a.hpp");
        let mut public = BaseClassRef::new("Vec2", Visibility::Public);
        public.resolved = Some("math::Vec2".into());
        let mut private = BaseClassRef::new("Vec2", Visibility::Private);
        private.resolved = Some("math::Vec2".into());
        ty.bases = vec![public, private];

        let mut verdicts = Verdicts::default();
        verdicts.insert("math::Vec2", Verdict::Reflectable);
        let classification = classify_type(&ty, &verdicts);
        assert_eq!(
            classification.bases,
            vec![
                BaseLink::Delegate("math::Vec2".into()),
                BaseLink::Placeholder("math::Vec2".into())
            ]
        );
    }
}
