//! End-to-end module passes over real header trees
//!
//! Each test lays out a module under a temporary root, runs the built-in
//! header parser through the orchestrator, and inspects the files written to
//! `<root>/core/autogen`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tributary_engine::{
    GeneratorConfig, HeaderParser, ImplMode, ModuleDescriptor, ModuleReport, Orchestrator,
};

const MATH: &str = r#"#pragma once
#include <string>

namespace math
{
    struct [[reflectable]] Vec2
    {
        float x;
        float y;
    };

    struct [[reflectable]] Transform : Vec2
    {
        Vec2 position;
    private:
        int cache;
    };
}
"#;

const DOCUMENTED: &str = r#"#pragma once

/**
 * A 2D vector. "Quoted" text and ' quotes are fine here.
 */
namespace math
{
    /* plain */ struct [[reflectable]] Vec2
    {
        float x; /* x */
        float y; // y
    };

    namespace detail
    {
        /// Holder of vectors
        struct [[reflectable]] Holder
        {
            Vec2 v;
            ::math::Vec2 w;
        };
    }
}
"#;

/// Write `files` (relative to the root) into a fresh temporary root
fn setup(files: &[(&str, &str)]) -> TempDir {
    let root = TempDir::new().unwrap();
    for (relative, content) in files {
        write(root.path(), relative, content);
    }
    root
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run(root: &Path, config: &GeneratorConfig) -> ModuleReport {
    let module = ModuleDescriptor::new(root, Some("core".to_string()), config).unwrap();
    let provider = HeaderParser::new();
    Orchestrator::new(&provider, config).run_module(&module)
}

fn output_dir(root: &Path) -> PathBuf {
    root.join("core").join("autogen")
}

fn read(root: &Path, name: &str) -> String {
    let path = output_dir(root).join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn exists(root: &Path, name: &str) -> bool {
    output_dir(root).join(name).is_file()
}

/// Every regular file of the output directory, by name
fn snapshot(root: &Path) -> BTreeMap<String, String> {
    fs::read_dir(output_dir(root))
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| {
            (
                p.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read_to_string(&p).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_vec2_and_transform() {
    let root = setup(&[("core/math.hpp", MATH)]);
    let report = run(root.path(), &GeneratorConfig::default());

    assert!(report.aborted.is_none(), "{:?}", report.aborted);
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.reflectable, 2);
    assert_eq!(report.artifacts_written, 8);

    let vec2 = read(root.path(), "autogen_reflector_Vec2.inl");
    assert!(vec2.contains("#include \"../math.hpp\""));
    assert!(vec2.contains(
        "refl.members.emplace(\"x\", member_reference(\"x\", primitive_reference{typeHash(obj.x), &obj.x}));"
    ));
    assert!(vec2.contains(
        "refl.members.emplace(\"y\", member_reference(\"y\", primitive_reference{typeHash(obj.y), &obj.y}));"
    ));
    assert!(!vec2.contains("baseclasses"));

    let transform = read(root.path(), "autogen_reflector_Transform.inl");
    assert!(transform.contains(
        "refl.members.emplace(\"position\", member_reference(\"position\", make_reflector(obj.position)));"
    ));
    assert!(transform.contains(
        "refl.baseclasses.push_back(make_reflector(*static_cast<math::Vec2*>(std::addressof(obj))));"
    ));
    assert!(transform.contains(
        "refl.baseclasses.push_back(make_reflector(*static_cast<const math::Vec2*>(std::addressof(obj))));"
    ));
    assert!(!transform.contains("cache"));

    let prototype = read(root.path(), "autogen_prototype_Transform.inl");
    assert!(prototype.contains("member_value(\"position\", make_prototype(obj.position))"));
    assert!(prototype.contains(
        "prot.baseclasses.push_back(make_prototype(*static_cast<const math::Vec2*>(std::addressof(obj))));"
    ));
    assert!(!prototype.contains("cache"));
}

#[test]
fn test_commented_header_keeps_types() {
    let root = setup(&[("core/documented.hpp", DOCUMENTED)]);
    let report = run(root.path(), &GeneratorConfig::default());

    assert!(report.aborted.is_none(), "{:?}", report.aborted);
    assert_eq!(report.types_discovered, 2);
    assert_eq!(report.reflectable, 2);
    assert_eq!(report.artifacts_written, 8);

    let holder = read(root.path(), "autogen_reflector_Holder.inl");
    assert!(holder.contains(
        "refl.members.emplace(\"v\", member_reference(\"v\", make_reflector(obj.v)));"
    ));
    assert!(holder.contains(
        "refl.members.emplace(\"w\", member_reference(\"w\", make_reflector(obj.w)));"
    ));
}

#[test]
fn test_overloads_share_identity() {
    let root = setup(&[("core/math.hpp", MATH)]);
    run(root.path(), &GeneratorConfig::default());

    let body = read(root.path(), "autogen_reflector_Transform.inl");
    let (mutable, constant) = body
        .split_once("const reflector make_reflector<const math::Transform>")
        .unwrap();
    for part in [mutable, constant] {
        assert!(part.contains("refl.typeId = typeHash<math::Transform>();"));
        assert!(part.contains("refl.typeName = \"math::Transform\";"));
    }
}

#[test]
fn test_umbrellas_list_every_artifact() {
    let root = setup(&[("core/math.hpp", MATH)]);
    run(root.path(), &GeneratorConfig::default());

    let header = read(root.path(), "autogen.hpp");
    assert!(header.starts_with("#pragma once\n#include <core/platform/platform.hpp>\n"));
    assert!(header.contains("#if __has_include_next(<autogen/autogen.hpp>)"));
    for name in [
        "autogen_reflector_Vec2.hpp",
        "autogen_prototype_Vec2.hpp",
        "autogen_reflector_Transform.hpp",
        "autogen_prototype_Transform.hpp",
    ] {
        assert!(header.contains(&format!("#include \"{}\"", name)), "{}", name);
    }

    let implementation = read(root.path(), "autogen.cpp");
    assert!(implementation.starts_with("#include \"autogen.hpp\"\n"));
    assert!(implementation.contains("#include \"autogen_prototype_Transform.inl\""));
    assert!(!implementation.contains("#error"));
}

#[test]
fn test_opted_out_base_becomes_dummy() {
    let root = setup(&[(
        "core/hidden.hpp",
        "class [[no_reflect]] Hidden\n{\npublic:\n    int secret;\n};\n\n\
         struct [[reflectable]] Shown : Hidden\n{\n    int visible;\n};\n",
    )]);
    let report = run(root.path(), &GeneratorConfig::default());
    assert_eq!(report.dummy, 1);

    let hidden = read(root.path(), "autogen_reflector_Hidden.inl");
    assert!(hidden.contains("refl.typeName = \"Hidden\";"));
    assert!(!hidden.contains("secret"));
    assert!(!hidden.contains("attributes"));

    let shown = read(root.path(), "autogen_reflector_Shown.inl");
    assert!(shown.contains(
        "refl.baseclasses.push_back(reflector(typeHash<Hidden>(), nameOfType<Hidden>(), reflector::member_container(), std::addressof(obj)));"
    ));
    assert!(shown.contains("primitive_reference{typeHash(obj.visible), &obj.visible}"));
}

#[test]
fn test_opted_out_types_write_nothing() {
    let root = setup(&[(
        "core/hidden.hpp",
        "class [[no_reflect]] Hidden {};\n\
         struct [[no_reflect]] Internal { int a; };\n\
         class Plain\n{\npublic:\n    int a;\n};\n",
    )]);
    let report = run(root.path(), &GeneratorConfig::default());

    assert_eq!(report.no_reflect, 3);
    assert_eq!(report.artifacts_written, 0);
    assert!(!exists(root.path(), "autogen_reflector_Hidden.hpp"));
    assert!(!exists(root.path(), "autogen_reflector_Internal.hpp"));
    assert!(!exists(root.path(), "autogen_reflector_Plain.hpp"));
    // the umbrellas are still written
    assert!(exists(root.path(), "autogen.hpp"));
}

#[test]
fn test_unannotated_struct_gets_dummy() {
    let root = setup(&[("core/loose.hpp", "struct Loose { int a; };\n")]);
    let report = run(root.path(), &GeneratorConfig::default());
    assert_eq!(report.dummy, 1);

    let body = read(root.path(), "autogen_prototype_Loose.inl");
    assert!(body.contains("prot.typeName = \"Loose\";"));
    assert!(!body.contains("obj.a"));
}

#[test]
fn test_std_and_private_fields() {
    let root = setup(&[(
        "core/entity.hpp",
        "#include <string>\n#include <vector>\n\n\
         namespace ecs\n{\n\
         \x20   class [[reflectable]] Entity\n    {\n\
         \x20   public:\n\
         \x20       std::string name;\n\
         \x20       std::vector<int> children;\n\
         \x20       Entity* parent;\n\
         \x20   protected:\n\
         \x20       int generation;\n\
         \x20   private:\n\
         \x20       int id;\n\
         \x20   };\n}\n",
    )]);
    run(root.path(), &GeneratorConfig::default());

    let body = read(root.path(), "autogen_reflector_Entity.inl");
    assert!(body.contains("primitive_reference{typeHash(obj.name), &obj.name}"));
    assert!(body.contains("primitive_reference{typeHash(obj.children), &obj.children}"));
    assert!(!body.contains("make_reflector(obj.name)"));
    assert!(!body.contains("obj.parent"));
    assert!(!body.contains("generation"));
    assert!(!body.contains("obj.id"));
}

#[test]
fn test_excluded_file_contributes_nothing() {
    let root = setup(&[
        ("core/math.hpp", MATH),
        (
            "core/third_party/external.hpp",
            "struct [[reflectable]] External { int a; };\n",
        ),
    ]);
    let mut config = GeneratorConfig::default();
    config.scan.exclude = vec!["**/third_party/**".to_string()];
    let report = run(root.path(), &config);

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_excluded, 1);
    assert!(!exists(root.path(), "autogen_reflector_External.hpp"));
    assert!(!read(root.path(), "autogen.hpp").contains("External"));
}

#[test]
fn test_regeneration_is_idempotent() {
    let root = setup(&[("core/math.hpp", MATH)]);
    let config = GeneratorConfig::default();

    run(root.path(), &config);
    let first = snapshot(root.path());
    run(root.path(), &config);
    let second = snapshot(root.path());

    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
}

#[test]
fn test_removed_type_leaves_no_stale_files() {
    let root = setup(&[("core/math.hpp", MATH)]);
    let config = GeneratorConfig::default();
    run(root.path(), &config);
    assert!(exists(root.path(), "autogen_reflector_Transform.inl"));

    write(
        root.path(),
        "core/math.hpp",
        "namespace math { struct [[reflectable]] Vec2 { float x; float y; }; }\n",
    );
    run(root.path(), &config);

    assert!(exists(root.path(), "autogen_reflector_Vec2.inl"));
    assert!(!exists(root.path(), "autogen_reflector_Transform.inl"));
    assert!(!read(root.path(), "autogen.hpp").contains("Transform"));
}

#[test]
fn test_overrides_are_merged_and_kept() {
    let root = setup(&[
        ("core/math.hpp", MATH),
        ("core/autogen/override/custom.hpp", "#pragma once\n"),
        ("core/autogen/override/custom.inl", "\n"),
    ]);
    let report = run(root.path(), &GeneratorConfig::default());
    assert_eq!(report.overrides, 2);

    let header = read(root.path(), "autogen.hpp");
    let implementation = read(root.path(), "autogen.cpp");
    assert!(header.contains("#include \"override/custom.hpp\""));
    assert!(implementation.contains("#include \"override/custom.inl\""));
    assert!(output_dir(root.path()).join("override/custom.hpp").is_file());
}

#[test]
fn test_inl_impl_mode() {
    let root = setup(&[("core/math.hpp", MATH)]);
    let mut config = GeneratorConfig::default();
    config.output.impl_mode = ImplMode::Inl;
    run(root.path(), &config);

    assert!(exists(root.path(), "autogen.inl"));
    assert!(!exists(root.path(), "autogen.cpp"));
}

#[test]
fn test_parse_error_aborts_module() {
    let root = setup(&[(
        "core/broken.hpp",
        "struct [[reflectable]] Broken { int a; \"unterminated\n",
    )]);
    let report = run(root.path(), &GeneratorConfig::default());
    assert!(report.aborted.is_some());
    assert_eq!(report.artifacts_written, 0);
}
