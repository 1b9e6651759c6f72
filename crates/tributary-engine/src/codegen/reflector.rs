//! `make_reflector` specializations
//!
//! A reflector is a live view: primitive members point into the object and
//! nested members are reflectors of the sub-objects. The const overload
//! captures the object's address as an integer before any member access
//! and converts it back only for the final data handle.

use crate::config::EmitConfig;
use crate::reflect::{BaseLink, MemberClass};

use super::{
    attribute_sections, forward_declaration, namespace_prelude, type_identity, ArtifactKind,
    CodeWriter, EmitTarget,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Constness {
    Mutable,
    Const,
}

impl Constness {
    fn prefix(self) -> &'static str {
        match self {
            Constness::Mutable => "",
            Constness::Const => "const ",
        }
    }
}

pub fn header(target: &EmitTarget<'_, '_>, emit: &EmitConfig) -> String {
    let qualified = target.qualified_name();
    let mut w = CodeWriter::new();

    w.line("#pragma once");
    w.line(format!("#include <{}>", emit.reflector_include));
    forward_declaration(&mut w, target);

    w.block_start(format!("namespace {}", emit.target_namespace));
    for constness in [Constness::Mutable, Constness::Const] {
        let c = constness.prefix();
        w.line("template<>");
        w.line(format!(
            "{} extern {c}reflector make_reflector<{c}{q}>({c}{q}& obj);",
            emit.nodiscard_macro,
            c = c,
            q = qualified
        ));
    }
    w.close_block();

    w.finish()
}

pub fn implementation(target: &EmitTarget<'_, '_>, emit: &EmitConfig) -> String {
    let mut w = CodeWriter::new();

    w.line(format!(
        "#include \"{}\"",
        ArtifactKind::ReflectorHeader.file_name(target.stem)
    ));
    w.line(format!("#include \"{}\"", target.source_include));
    namespace_prelude(&mut w, &emit.target_namespace);

    w.block_start(format!("namespace {}", emit.target_namespace));
    function(&mut w, target, emit, Constness::Mutable);
    function(&mut w, target, emit, Constness::Const);
    w.close_block();

    w.finish()
}

fn function(w: &mut CodeWriter, target: &EmitTarget<'_, '_>, emit: &EmitConfig, constness: Constness) {
    let qualified = target.qualified_name();
    let c = constness.prefix();

    w.line("template<>");
    w.block_start(format!(
        "{} {c}reflector make_reflector<{c}{q}>({c}{q}& obj)",
        emit.nodiscard_macro,
        c = c,
        q = qualified
    ));
    if constness == Constness::Const {
        w.line("ptr_type address = reinterpret_cast<ptr_type>(std::addressof(obj));");
    }
    w.line("reflector refl;");
    type_identity(w, "refl", &qualified);

    if target.is_full() {
        members(w, target);
        attribute_sections(w, "refl", target);
        bases(w, target, constness);
    }

    match constness {
        Constness::Mutable => w.line("refl.data = std::addressof(obj);"),
        Constness::Const => w.line("refl.data = reinterpret_cast<void*>(address);"),
    }
    w.line("return refl;");
    w.close_block();
}

fn members(w: &mut CodeWriter, target: &EmitTarget<'_, '_>) {
    for member in target.classification.emitted() {
        let name = &member.field.name;
        let value = match &member.class {
            MemberClass::Primitive => format!(
                "primitive_reference{{typeHash(obj.{n}), &obj.{n}}}",
                n = name
            ),
            MemberClass::Nested { .. } => format!("make_reflector(obj.{})", name),
            MemberClass::Skip(_) => continue,
        };
        w.line(format!(
            "refl.members.emplace(\"{n}\", member_reference(\"{n}\", {v}));",
            n = name,
            v = value
        ));
    }
}

fn bases(w: &mut CodeWriter, target: &EmitTarget<'_, '_>, constness: Constness) {
    let c = constness.prefix();
    for base in &target.classification.bases {
        let entry = match base {
            BaseLink::Delegate(name) => format!(
                "make_reflector(*static_cast<{}{}*>(std::addressof(obj)))",
                c, name
            ),
            BaseLink::Placeholder(name) => {
                let data = match constness {
                    Constness::Mutable => "std::addressof(obj)",
                    Constness::Const => "reinterpret_cast<void*>(address)",
                };
                format!(
                    "reflector(typeHash<{n}>(), nameOfType<{n}>(), reflector::member_container(), {d})",
                    n = name,
                    d = data
                )
            }
        };
        w.line(format!("refl.baseclasses.push_back({});", entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::test_support::{transform, vec2};
    use crate::codegen::ArtifactGenerator;
    use crate::parser::ast::{AttributeDeclaration, TypeDeclaration, TypeKeyword};
    use crate::reflect::{classify_type, Classification, Verdict, Verdicts};

    fn generate(ty: &TypeDeclaration, verdict: Verdict, verdicts: &Verdicts) -> (String, String) {
        let emit = EmitConfig::default();
        let classification = if verdict == Verdict::Reflectable {
            classify_type(ty, verdicts)
        } else {
            Classification::default()
        };
        let generator = ArtifactGenerator::new(&emit, "/mod/core/autogen");
        let artifacts = generator.generate(ty, verdict, &classification, &ty.name);
        (artifacts[0].content.clone(), artifacts[1].content.clone())
    }

    #[test]
    fn test_header_declares_both_overloads() {
        let (header, _) = generate(&vec2(), Verdict::Reflectable, &Verdicts::default());
        assert_eq!(
            header,
            "#pragma once\n\
             #include <core/types/reflector.hpp>\n\
             namespace math\n\
             {\n\
             \x20   struct Vec2;\n\
             }\n\
             namespace legion::core\n\
             {\n\
             \x20   template<>\n\
             \x20   L_NODISCARD extern reflector make_reflector<math::Vec2>(math::Vec2& obj);\n\
             \x20   template<>\n\
             \x20   L_NODISCARD extern const reflector make_reflector<const math::Vec2>(const math::Vec2& obj);\n\
             }\n"
        );
    }

    #[test]
    fn test_primitive_members() {
        let (_, body) = generate(&vec2(), Verdict::Reflectable, &Verdicts::default());
        assert!(body.starts_with("#include \"autogen_reflector_Vec2.hpp\"\n#include \"../math.hpp\"\n"));
        assert!(body.contains("namespace legion { using namespace core; }"));
        assert!(body.contains(
            "refl.members.emplace(\"x\", member_reference(\"x\", primitive_reference{typeHash(obj.x), &obj.x}));"
        ));
        assert!(body.contains("static const reflectable_attribute reflectable_attr{};"));
        assert!(body.contains("refl.data = std::addressof(obj);"));
        assert!(body.contains("refl.data = reinterpret_cast<void*>(address);"));
        // identity is identical in both overloads
        assert_eq!(body.matches("refl.typeId = typeHash<math::Vec2>();").count(), 2);
        assert_eq!(body.matches("refl.typeName = \"math::Vec2\";").count(), 2);
    }

    #[test]
    fn test_address_captured_before_member_access() {
        let (_, body) = generate(&vec2(), Verdict::Reflectable, &Verdicts::default());
        let const_fn = body
            .find("const reflector make_reflector<const math::Vec2>")
            .unwrap();
        let tail = &body[const_fn..];
        let capture = tail.find("ptr_type address").unwrap();
        let first_member = tail.find("refl.members.emplace").unwrap();
        assert!(capture < first_member);
    }

    #[test]
    fn test_nested_member_and_delegated_base() {
        let mut verdicts = Verdicts::default();
        verdicts.insert("math::Vec2", Verdict::Reflectable);
        let (_, body) = generate(&transform(), Verdict::Reflectable, &verdicts);

        assert!(body.contains(
            "refl.members.emplace(\"position\", member_reference(\"position\", make_reflector(obj.position)));"
        ));
        assert!(!body.contains("cache"));
        assert!(body.contains(
            "refl.baseclasses.push_back(make_reflector(*static_cast<math::Vec2*>(std::addressof(obj))));"
        ));
        assert!(body.contains(
            "refl.baseclasses.push_back(make_reflector(*static_cast<const math::Vec2*>(std::addressof(obj))));"
        ));
    }

    #[test]
    fn test_placeholder_base() {
        let (_, body) = generate(&transform(), Verdict::Reflectable, &Verdicts::default());
        assert!(body.contains(
            "refl.baseclasses.push_back(reflector(typeHash<math::Vec2>(), nameOfType<math::Vec2>(), reflector::member_container(), std::addressof(obj)));"
        ));
        assert!(body.contains(
            "reflector::member_container(), reinterpret_cast<void*>(address)));"
        ));
    }

    #[test]
    fn test_field_attributes_follow_members() {
        let mut ty = vec2();
        ty.fields[0]
            .attributes
            .push(AttributeDeclaration::new(Some("rythe"), "range", Some("0.f, 1.f")));
        let (_, body) = generate(&ty, Verdict::Reflectable, &Verdicts::default());

        let block = "        {\n            auto& member = refl.members.at(\"x\");\n            static const rythe::range_attribute range_attr{0.f, 1.f};\n            member.attributes.push_back(std::cref(range_attr));\n        }\n";
        assert!(body.contains(block));
        let emplace = body.find("refl.members.emplace(\"y\"").unwrap();
        let lookup = body.find("refl.members.at(\"x\")").unwrap();
        assert!(emplace < lookup);
    }

    #[test]
    fn test_dummy_carries_identity_only() {
        let mut hidden = TypeDeclaration::new("Hidden", TypeKeyword::Class, "/mod/core/hidden.hpp");
        hidden
            .attributes
            .push(AttributeDeclaration::new(None, "no_reflect", None));
        hidden.fields = vec2().fields;
        let (header, body) = generate(&hidden, Verdict::DummyRequired, &Verdicts::default());

        assert!(header.contains("class Hidden;"));
        assert!(body.contains("refl.typeName = \"Hidden\";"));
        assert!(!body.contains("members"));
        assert!(!body.contains("attributes"));
        assert!(!body.contains("baseclasses"));
    }

    #[test]
    fn test_nested_type_includes_its_header() {
        let mut inner = TypeDeclaration::new("Inner", TypeKeyword::Struct, "/mod/core/outer.hpp");
        inner.enclosing = vec!["Outer".into()];
        let (header, body) = generate(&inner, Verdict::Reflectable, &Verdicts::default());
        assert!(header.contains("#include \"../outer.hpp\"\n"));
        assert!(!header.contains("struct Inner;"));
        assert!(body.contains("make_reflector<Outer::Inner>(Outer::Inner& obj)"));
    }
}
