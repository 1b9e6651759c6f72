//! `make_prototype` specializations
//!
//! A prototype is detached from the source object: primitive members are
//! copied into `std::any` and nested members are owned prototypes.

use crate::config::EmitConfig;
use crate::reflect::{BaseLink, MemberClass};

use super::{
    attribute_sections, forward_declaration, namespace_prelude, type_identity, ArtifactKind,
    CodeWriter, EmitTarget,
};

pub fn header(target: &EmitTarget<'_, '_>, emit: &EmitConfig) -> String {
    let qualified = target.qualified_name();
    let mut w = CodeWriter::new();

    w.line("#pragma once");
    w.line(format!("#include <{}>", emit.prototype_include));
    forward_declaration(&mut w, target);

    w.block_start(format!("namespace {}", emit.target_namespace));
    w.line("template<>");
    w.line(format!(
        "{} extern prototype make_prototype<{q}>(const {q}& obj);",
        emit.nodiscard_macro,
        q = qualified
    ));
    w.close_block();

    w.finish()
}

pub fn implementation(target: &EmitTarget<'_, '_>, emit: &EmitConfig) -> String {
    let qualified = target.qualified_name();
    let mut w = CodeWriter::new();

    w.line(format!(
        "#include \"{}\"",
        ArtifactKind::PrototypeHeader.file_name(target.stem)
    ));
    w.line(format!("#include \"{}\"", target.source_include));
    namespace_prelude(&mut w, &emit.target_namespace);

    w.block_start(format!("namespace {}", emit.target_namespace));
    w.line("template<>");
    w.block_start(format!(
        "{} prototype make_prototype<{q}>(const {q}& obj)",
        emit.nodiscard_macro,
        q = qualified
    ));
    w.line("prototype prot;");
    type_identity(&mut w, "prot", &qualified);

    if target.is_full() {
        for member in target.classification.emitted() {
            let name = &member.field.name;
            let value = match &member.class {
                MemberClass::Primitive => format!(
                    "primitive_value{{typeHash(obj.{n}), std::any(obj.{n})}}",
                    n = name
                ),
                MemberClass::Nested { .. } => format!("make_prototype(obj.{})", name),
                MemberClass::Skip(_) => continue,
            };
            w.line(format!(
                "prot.members.emplace(\"{n}\", member_value(\"{n}\", {v}));",
                n = name,
                v = value
            ));
        }

        attribute_sections(&mut w, "prot", target);

        for base in &target.classification.bases {
            let entry = match base {
                BaseLink::Delegate(name) => format!(
                    "make_prototype(*static_cast<const {}*>(std::addressof(obj)))",
                    name
                ),
                BaseLink::Placeholder(name) => format!(
                    "prototype(typeHash<{n}>(), nameOfType<{n}>(), prototype::member_container())",
                    n = name
                ),
            };
            w.line(format!("prot.baseclasses.push_back({});", entry));
        }
    }

    w.line("return prot;");
    w.close_block();
    w.close_block();

    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::test_support::{transform, vec2};
    use crate::codegen::ArtifactGenerator;
    use crate::parser::ast::TypeDeclaration;
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
        (artifacts[2].content.clone(), artifacts[3].content.clone())
    }

    #[test]
    fn test_header_declares_single_constructor() {
        let (header, _) = generate(&vec2(), Verdict::Reflectable, &Verdicts::default());
        assert!(header.starts_with("#pragma once\n#include <core/types/prototype.hpp>\n"));
        assert!(header.contains(
            "L_NODISCARD extern prototype make_prototype<math::Vec2>(const math::Vec2& obj);"
        ));
        assert_eq!(header.matches("make_prototype").count(), 1);
    }

    #[test]
    fn test_values_are_copied() {
        let (_, body) = generate(&vec2(), Verdict::Reflectable, &Verdicts::default());
        assert!(body.starts_with("#include \"autogen_prototype_Vec2.hpp\"\n"));
        assert!(body.contains(
            "prot.members.emplace(\"y\", member_value(\"y\", primitive_value{typeHash(obj.y), std::any(obj.y)}));"
        ));
        assert!(body.contains("prot.typeName = \"math::Vec2\";"));
        assert!(body.trim_end().ends_with("return prot;\n    }\n}"));
    }

    #[test]
    fn test_nested_and_base_entries() {
        let mut verdicts = Verdicts::default();
        verdicts.insert("math::Vec2", Verdict::Reflectable);
        let (_, body) = generate(&transform(), Verdict::Reflectable, &verdicts);
        assert!(body.contains(
            "prot.members.emplace(\"position\", member_value(\"position\", make_prototype(obj.position)));"
        ));
        assert!(body.contains(
            "prot.baseclasses.push_back(make_prototype(*static_cast<const math::Vec2*>(std::addressof(obj))));"
        ));
        assert!(!body.contains("cache"));

        let (_, placeholder) = generate(&transform(), Verdict::Reflectable, &Verdicts::default());
        assert!(placeholder.contains(
            "prot.baseclasses.push_back(prototype(typeHash<math::Vec2>(), nameOfType<math::Vec2>(), prototype::member_container()));"
        ));
    }

    #[test]
    fn test_dummy_prototype_is_identity_only() {
        let (_, body) = generate(&transform(), Verdict::DummyRequired, &Verdicts::default());
        assert!(body.contains("prot.typeId = typeHash<math::Transform>();"));
        assert!(!body.contains("prot.members"));
        assert!(!body.contains("prot.baseclasses"));
    }
}
