//! Generator configuration (tributary.toml) and module descriptors
//!
//! Configuration comes from command-line flags, optionally layered over a
//! TOML file. The merged [`GeneratorConfig`] is read-only for the run, and
//! each module gets one immutable [`ModuleDescriptor`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::scan::pattern::PatternSet;

/// Default config file looked up in the module root
pub const CONFIG_FILE_NAME: &str = "tributary.toml";

/// Name of the generated-output directory inside a module
pub const OUTPUT_DIR_NAME: &str = "autogen";

/// Name of the developer override directory inside the output directory
pub const OVERRIDE_DIR_NAME: &str = "override";

/// What to do with a type that carries neither the reflect nor the
/// no-reflect attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnannotatedPolicy {
    /// No artifacts
    Skip,
    /// Identity-only stub artifacts
    Dummy,
    /// Full artifacts, as if annotated
    Reflect,
}

impl FromStr for UnannotatedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "dummy" => Ok(Self::Dummy),
            "reflect" => Ok(Self::Reflect),
            _ => Err(ConfigError::InvalidValue {
                key: "unannotated policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UnannotatedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Dummy => write!(f, "dummy"),
            Self::Reflect => write!(f, "reflect"),
        }
    }
}

/// Case handling for exclusion pattern matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    /// Follow the host filesystem convention
    #[default]
    Host,
    /// Always match case
    Sensitive,
    /// Never match case
    Insensitive,
}

impl CaseSensitivity {
    /// Whether matching ignores case once the host policy is applied.
    ///
    /// Windows and macOS filesystems are case-insensitive by default.
    pub fn is_insensitive(self) -> bool {
        match self {
            Self::Host => cfg!(any(windows, target_os = "macos")),
            Self::Sensitive => false,
            Self::Insensitive => true,
        }
    }
}

/// How the umbrella implementation unit is integrated into the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplMode {
    /// `autogen.cpp`, compiled as its own translation unit
    #[default]
    Cpp,
    /// `autogen.inl`, included by a hand-written translation unit
    Inl,
}

impl ImplMode {
    /// File name of the umbrella implementation unit
    pub fn umbrella_name(self) -> &'static str {
        match self {
            Self::Cpp => "autogen.cpp",
            Self::Inl => "autogen.inl",
        }
    }
}

impl FromStr for ImplMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpp" => Ok(Self::Cpp),
            "inl" => Ok(Self::Inl),
            _ => Err(ConfigError::InvalidValue {
                key: "impl mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Reflectability rules (`[policy]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Verdict for `struct`/`union` types without a reflect attribute
    pub struct_default: UnannotatedPolicy,
    /// Verdict for `class` types without a reflect attribute
    pub class_default: UnannotatedPolicy,
    /// Attribute name opting a type in
    pub reflect_attribute: String,
    /// Attribute name opting a type out
    pub no_reflect_attribute: String,
    /// Accepted attribute scopes; empty accepts any scope
    pub attribute_scopes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            struct_default: UnannotatedPolicy::Dummy,
            class_default: UnannotatedPolicy::Skip,
            reflect_attribute: "reflectable".to_string(),
            no_reflect_attribute: "no_reflect".to_string(),
            attribute_scopes: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Whether an attribute scope is accepted
    pub fn accepts_scope(&self, scope: Option<&str>) -> bool {
        if self.attribute_scopes.is_empty() {
            return true;
        }
        scope.is_some_and(|s| self.attribute_scopes.iter().any(|accepted| accepted == s))
    }
}

/// Generated text settings (`[emit]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    /// Namespace the `make_reflector`/`make_prototype` specializations live in
    pub target_namespace: String,
    /// Header declaring the reflector type
    pub reflector_include: String,
    /// Header declaring the prototype type
    pub prototype_include: String,
    /// Platform header included first by the umbrella header
    pub platform_include: String,
    /// Macro placed before every generated function
    pub nodiscard_macro: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            target_namespace: "legion::core".to_string(),
            reflector_include: "core/types/reflector.hpp".to_string(),
            prototype_include: "core/types/prototype.hpp".to_string(),
            platform_include: "core/platform/platform.hpp".to_string(),
            nodiscard_macro: "L_NODISCARD".to_string(),
        }
    }
}

/// Header discovery settings (`[scan]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Header file extensions, without the dot
    pub extensions: Vec<String>,
    /// Exclusion globs applied to every module
    pub exclude: Vec<String>,
    /// Case handling for exclusion patterns
    pub case_sensitivity: CaseSensitivity,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["h".to_string(), "hpp".to_string()],
            exclude: Vec::new(),
            case_sensitivity: CaseSensitivity::Host,
        }
    }
}

/// Output settings (`[output]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Umbrella implementation integration mode
    pub impl_mode: ImplMode,
    /// Directory the run log is flushed into, if any
    pub log_dir: Option<PathBuf>,
}

/// One `[[modules]]` batch entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module root directory
    pub root: PathBuf,
    /// Module name; defaults to the root's last path segment
    #[serde(default)]
    pub name: Option<String>,
    /// Extra exclusion globs for this module only
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Complete generator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Reflectability rules
    pub policy: PolicyConfig,
    /// Generated text settings
    pub emit: EmitConfig,
    /// Header discovery settings
    pub scan: ScanConfig,
    /// Output settings
    pub output: OutputConfig,
    /// Batch of modules to generate
    pub modules: Vec<ModuleEntry>,
}

impl GeneratorConfig {
    /// Parse a config from TOML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `<root>/tributary.toml` when it exists, defaults otherwise
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}

/// Everything one module pass needs to know about its module
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    /// Module name
    pub name: String,
    /// Module root; sources live in `<root>/<name>`
    pub root: PathBuf,
    /// Search paths used to follow includes (the root is always first)
    pub include_paths: Vec<PathBuf>,
    /// System include paths, never followed and never generated
    pub system_include_paths: Vec<PathBuf>,
    /// Compiled exclusion patterns
    pub exclusions: PatternSet,
}

impl ModuleDescriptor {
    /// Build a descriptor from a root and an optional explicit name.
    ///
    /// Exclusions are compiled from the config's `[scan]` table.
    pub fn new(
        root: impl Into<PathBuf>,
        name: Option<String>,
        config: &GeneratorConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_exclusions(root, name, &[], config)
    }

    /// Build a descriptor with extra module-specific exclusion globs
    pub fn with_exclusions(
        root: impl Into<PathBuf>,
        name: Option<String>,
        extra_exclusions: &[String],
        config: &GeneratorConfig,
    ) -> Result<Self, ConfigError> {
        let root = strip_trailing_separator(root.into());
        let name = match name {
            Some(name) => name,
            None => module_name_from_root(&root)?,
        };

        let exclusions = PatternSet::compile(
            config.scan.exclude.iter().chain(extra_exclusions),
            config.scan.case_sensitivity.is_insensitive(),
        )?;

        Ok(Self {
            name,
            include_paths: vec![root.clone()],
            root,
            system_include_paths: Vec::new(),
            exclusions,
        })
    }

    /// Add a search path used when following includes
    pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
        self.include_paths.push(path.into());
    }

    /// Add a system include path
    pub fn add_system_include_path(&mut self, path: impl Into<PathBuf>) {
        self.system_include_paths.push(path.into());
    }

    /// Directory holding the module's headers
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    /// Directory receiving generated files
    pub fn output_dir(&self) -> PathBuf {
        self.source_dir().join(OUTPUT_DIR_NAME)
    }

    /// Directory scanned for hand-written overrides
    pub fn override_dir(&self) -> PathBuf {
        self.output_dir().join(OVERRIDE_DIR_NAME)
    }
}

fn strip_trailing_separator(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() || trimmed.len() == text.len() {
        path
    } else {
        PathBuf::from(trimmed)
    }
}

fn module_name_from_root(root: &Path) -> Result<String, ConfigError> {
    let resolved;
    let root = if root.file_name().is_none() {
        // "." or ".." have no final segment; use the directory they point at
        resolved = root
            .canonicalize()
            .map_err(|_| ConfigError::ModuleName(root.to_path_buf()))?;
        resolved.as_path()
    } else {
        root
    };

    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::ModuleName(root.to_path_buf()))
}
