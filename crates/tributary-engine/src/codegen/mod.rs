//! Per-type artifact generation
//!
//! Every reflectable or dummy type yields four files in the module's
//! output directory:
//!
//! - `autogen_reflector_<stem>.hpp`: forward declaration and the two
//!   `make_reflector` specialization declarations
//! - `autogen_reflector_<stem>.inl`: their definitions
//! - `autogen_prototype_<stem>.hpp`: the `make_prototype` declaration
//! - `autogen_prototype_<stem>.inl`: its definition

pub mod prototype;
pub mod reflector;
pub mod writer;

use std::fmt;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::config::EmitConfig;
use crate::error::GenerateError;
use crate::parser::ast::{AttributeDeclaration, TypeDeclaration};
use crate::reflect::{Classification, Verdict};

pub use writer::CodeWriter;

/// Prefix shared by every generated file name
pub const ARTIFACT_PREFIX: &str = "autogen";

/// Standard attributes that carry no metadata type
const STANDARD_ATTRIBUTES: &[&str] = &[
    "nodiscard",
    "deprecated",
    "maybe_unused",
    "no_unique_address",
    "likely",
    "unlikely",
    "noreturn",
    "fallthrough",
    "carries_dependency",
];

/// The four files generated per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ReflectorHeader,
    ReflectorImpl,
    PrototypeHeader,
    PrototypeImpl,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::ReflectorHeader,
        ArtifactKind::ReflectorImpl,
        ArtifactKind::PrototypeHeader,
        ArtifactKind::PrototypeImpl,
    ];

    pub fn family(self) -> &'static str {
        match self {
            ArtifactKind::ReflectorHeader | ArtifactKind::ReflectorImpl => "reflector",
            ArtifactKind::PrototypeHeader | ArtifactKind::PrototypeImpl => "prototype",
        }
    }

    pub fn is_header(self) -> bool {
        matches!(self, ArtifactKind::ReflectorHeader | ArtifactKind::PrototypeHeader)
    }

    pub fn extension(self) -> &'static str {
        if self.is_header() {
            "hpp"
        } else {
            "inl"
        }
    }

    /// `autogen_<family>_<stem>.<ext>`
    pub fn file_name(self, stem: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            ARTIFACT_PREFIX,
            self.family(),
            stem,
            self.extension()
        )
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = if self.is_header() { "header" } else { "implementation" };
        write!(f, "{} {}", self.family(), part)
    }
}

/// One generated file, not yet written
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    /// Qualified name of the type it was generated for
    pub type_name: String,
    pub path: PathBuf,
    pub content: String,
}

impl GeneratedArtifact {
    /// File name relative to the output directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn write(&self) -> Result<(), GenerateError> {
        std::fs::write(&self.path, &self.content).map_err(|source| GenerateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Everything the generators need about one type
#[derive(Debug)]
pub struct EmitTarget<'a, 't> {
    pub ty: &'t TypeDeclaration,
    pub verdict: Verdict,
    /// Empty for dummy types
    pub classification: &'a Classification<'t>,
    /// File name stem shared by the four artifacts
    pub stem: &'a str,
    /// Path of the declaring header, relative to the output directory
    pub source_include: String,
}

impl EmitTarget<'_, '_> {
    /// Dummy artifacts carry type identity only
    pub fn is_full(&self) -> bool {
        self.verdict == Verdict::Reflectable
    }

    pub fn qualified_name(&self) -> String {
        self.ty.qualified_name()
    }
}

/// Produces the artifact set of each type into one output directory
#[derive(Debug)]
pub struct ArtifactGenerator<'c> {
    emit: &'c EmitConfig,
    output_dir: PathBuf,
}

impl<'c> ArtifactGenerator<'c> {
    pub fn new(emit: &'c EmitConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            emit,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate the four artifacts of `ty`, in [`ArtifactKind::ALL`] order
    pub fn generate(
        &self,
        ty: &TypeDeclaration,
        verdict: Verdict,
        classification: &Classification<'_>,
        stem: &str,
    ) -> Vec<GeneratedArtifact> {
        let target = EmitTarget {
            ty,
            verdict,
            classification,
            stem,
            source_include: relative_include(&ty.path, &self.output_dir),
        };

        ArtifactKind::ALL
            .iter()
            .map(|&kind| {
                let content = match kind {
                    ArtifactKind::ReflectorHeader => reflector::header(&target, self.emit),
                    ArtifactKind::ReflectorImpl => reflector::implementation(&target, self.emit),
                    ArtifactKind::PrototypeHeader => prototype::header(&target, self.emit),
                    ArtifactKind::PrototypeImpl => prototype::implementation(&target, self.emit),
                };
                GeneratedArtifact {
                    kind,
                    type_name: target.qualified_name(),
                    path: self.output_dir.join(kind.file_name(stem)),
                    content,
                }
            })
            .collect()
    }
}

/// Hands out file name stems, unique within one module pass
#[derive(Debug)]
pub struct StemAllocator {
    used: FxHashSet<String>,
    fold_case: bool,
}

impl StemAllocator {
    /// `fold_case` treats stems differing only by case as colliding
    pub fn new(fold_case: bool) -> Self {
        Self {
            used: FxHashSet::default(),
            fold_case,
        }
    }

    /// The simple name when free, then the namespace-mangled name
    pub fn allocate(&mut self, ty: &TypeDeclaration) -> String {
        let simple = ty.name.clone();
        if self.claim(&simple) {
            return simple;
        }

        let mangled = ty.scope().join("_");
        if self.claim(&mangled) {
            return mangled;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", mangled, n);
            if self.claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn claim(&mut self, stem: &str) -> bool {
        let key = if self.fold_case {
            stem.to_ascii_lowercase()
        } else {
            stem.to_string()
        };
        self.used.insert(key)
    }
}

/// `path` relative to `base`, always with forward slashes
pub fn relative_include(path: &Path, base: &Path) -> String {
    let relative = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    relative.to_string_lossy().replace('\\', "/")
}

/// Whether an attribute gets a metadata object in generated code
pub fn is_emitted_attribute(attribute: &AttributeDeclaration) -> bool {
    attribute.scope.is_some() || !STANDARD_ATTRIBUTES.contains(&attribute.name.as_str())
}

/// Forward declaration of the type inside its namespace.
///
/// Nested types cannot be forward-declared; their declaring header is
/// included instead.
pub(crate) fn forward_declaration(w: &mut CodeWriter, target: &EmitTarget<'_, '_>) {
    let ty = target.ty;
    if ty.is_nested() {
        w.line(format!("#include \"{}\"", target.source_include));
        return;
    }

    let declaration = format!("{} {};", ty.keyword.as_str(), ty.name);
    if ty.namespace.is_empty() {
        w.line(declaration);
    } else {
        w.block_start(format!("namespace {}", ty.namespace.join("::")));
        w.line(declaration);
        w.close_block();
    }
}

/// `namespace a { using namespace b; }` for a target namespace `a::b`
pub(crate) fn namespace_prelude(w: &mut CodeWriter, target_namespace: &str) {
    if let Some((outer, inner)) = target_namespace.rsplit_once("::") {
        w.line(format!("namespace {} {{ using namespace {}; }}", outer, inner));
    }
}

/// `refl.typeId` and `refl.typeName` assignments
pub(crate) fn type_identity(w: &mut CodeWriter, var: &str, qualified: &str) {
    w.line(format!("{}.typeId = typeHash<{}>();", var, qualified));
    w.line(format!("{}.typeName = \"{}\";", var, qualified));
}

/// One block appending a static metadata object per attribute to `list`.
///
/// `preamble` lines are written first inside the block.
pub(crate) fn attribute_block(
    w: &mut CodeWriter,
    preamble: Option<&str>,
    list: &str,
    attributes: &[AttributeDeclaration],
) {
    let emitted: Vec<&AttributeDeclaration> =
        attributes.iter().filter(|a| is_emitted_attribute(a)).collect();
    if emitted.is_empty() {
        return;
    }

    w.open_block();
    if let Some(preamble) = preamble {
        w.line(preamble);
    }
    let mut seen: Vec<&str> = Vec::new();
    for attribute in emitted {
        let repeats = seen.iter().filter(|n| **n == attribute.name).count();
        seen.push(&attribute.name);
        let var = if repeats == 0 {
            format!("{}_attr", attribute.name)
        } else {
            format!("{}_attr_{}", attribute.name, repeats)
        };
        w.line(format!(
            "static const {}_attribute {}{{{}}};",
            attribute.qualified_name(),
            var,
            attribute.arguments.as_deref().unwrap_or("").trim()
        ));
        w.line(format!("{}.push_back(std::cref({}));", list, var));
    }
    w.close_block();
}

/// Type attributes, then one block per attributed emitted field
pub(crate) fn attribute_sections(w: &mut CodeWriter, var: &str, target: &EmitTarget<'_, '_>) {
    attribute_block(
        w,
        None,
        &format!("{}.attributes", var),
        &target.ty.attributes,
    );
    for field in target.classification.attributed() {
        let preamble = format!("auto& member = {}.members.at(\"{}\");", var, field.name);
        attribute_block(w, Some(&preamble), "member.attributes", &field.attributes);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::parser::ast::TypeKeyword;
    use crate::reflect::{classify_type, Verdicts};

    #[test]
    fn test_file_names() {
        assert_eq!(
            ArtifactKind::ReflectorHeader.file_name("Vec2"),
            "autogen_reflector_Vec2.hpp"
        );
        assert_eq!(
            ArtifactKind::PrototypeImpl.file_name("Vec2"),
            "autogen_prototype_Vec2.inl"
        );
        assert_eq!(ArtifactKind::ReflectorImpl.to_string(), "reflector implementation");
    }

    #[test]
    fn test_stem_collisions_use_mangled_name() {
        let mut a = TypeDeclaration::new("Handle", TypeKeyword::Struct, "a.hpp");
        a.namespace = vec!["gfx".into()];
        let mut b = TypeDeclaration::new("Handle", TypeKeyword::Struct, "b.hpp");
        b.namespace = vec!["audio".into(), "detail".into()];
        let c = TypeDeclaration::new("handle", TypeKeyword::Struct, "c.hpp");

        let mut stems = StemAllocator::new(true);
        assert_eq!(stems.allocate(&a), "Handle");
        assert_eq!(stems.allocate(&b), "audio_detail_Handle");
        assert_eq!(stems.allocate(&c), "handle_2");

        let mut exact = StemAllocator::new(false);
        exact.allocate(&a);
        assert_eq!(exact.allocate(&c), "handle");
    }

    #[test]
    fn test_relative_include() {
        assert_eq!(
            relative_include(Path::new("/mod/core/math.hpp"), Path::new("/mod/core/autogen")),
            "../math.hpp"
        );
    }

    #[test]
    fn test_standard_attributes_not_emitted() {
        let mut w = CodeWriter::new();
        let attrs = vec![
            AttributeDeclaration::new(None, "nodiscard", None),
            AttributeDeclaration::new(Some("rythe"), "range", Some(" 0, 1 ")),
            AttributeDeclaration::new(Some("rythe"), "range", Some("2, 3")),
        ];
        attribute_block(&mut w, None, "refl.attributes", &attrs);
        assert_eq!(
            w.finish(),
            "{\n\
             \x20   static const rythe::range_attribute range_attr{0, 1};\n\
             \x20   refl.attributes.push_back(std::cref(range_attr));\n\
             \x20   static const rythe::range_attribute range_attr_1{2, 3};\n\
             \x20   refl.attributes.push_back(std::cref(range_attr_1));\n\
             }\n"
        );

        let mut empty = CodeWriter::new();
        attribute_block(&mut empty, None, "refl.attributes", &attrs[..1]);
        assert_eq!(empty.finish(), "");
    }

    #[test]
    fn test_generate_produces_four_artifacts() {
        let emit = EmitConfig::default();
        let ty = vec2();
        let classification = classify_type(&ty, &Verdicts::default());
        let generator = ArtifactGenerator::new(&emit, "/mod/core/autogen");
        let artifacts = generator.generate(&ty, Verdict::Reflectable, &classification, "Vec2");

        let names: Vec<_> = artifacts.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "autogen_reflector_Vec2.hpp",
                "autogen_reflector_Vec2.inl",
                "autogen_prototype_Vec2.hpp",
                "autogen_prototype_Vec2.inl",
            ]
        );
        assert!(artifacts.iter().all(|a| a.type_name == "math::Vec2"));
        assert!(artifacts[1].content.contains("#include \"../math.hpp\""));
    }
}
