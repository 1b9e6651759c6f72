//! Per-module build context and umbrella files
//!
//! Layout of a module's output directory:
//!
//! ```text
//! <root>/<module>/autogen/
//! ├── autogen.hpp                      umbrella header
//! ├── autogen.cpp | autogen.inl        umbrella implementation
//! ├── autogen_reflector_<Type>.hpp
//! ├── autogen_reflector_<Type>.inl
//! ├── autogen_prototype_<Type>.hpp
//! ├── autogen_prototype_<Type>.inl
//! └── override/                        hand-written, never deleted
//! ```
//!
//! A pass runs [`ModuleBuildContext::prepare`], then
//! [`ModuleBuildContext::merge_overrides`], records each written artifact,
//! and ends with [`ModuleBuildContext::finalize`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codegen::{relative_include, GeneratedArtifact, ARTIFACT_PREFIX};
use crate::config::{EmitConfig, ImplMode, ModuleDescriptor, OUTPUT_DIR_NAME};
use crate::error::AggregateError;
use crate::parser::normalize_lexically;

/// File name of the umbrella header
pub const UMBRELLA_HEADER: &str = "autogen.hpp";

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];
const IMPL_EXTENSIONS: &[&str] = &["inl", "cpp", "cc", "cxx"];

/// Umbrella accumulation for one module pass
#[derive(Debug)]
pub struct ModuleBuildContext {
    module: String,
    output_dir: PathBuf,
    override_dir: PathBuf,
    impl_mode: ImplMode,
    header_includes: String,
    impl_includes: String,
    recorded: usize,
}

impl ModuleBuildContext {
    /// Seed both umbrella buffers for `descriptor`
    pub fn new(descriptor: &ModuleDescriptor, emit: &EmitConfig, impl_mode: ImplMode) -> Self {
        let chained = format!("{}/{}", OUTPUT_DIR_NAME, UMBRELLA_HEADER);
        let mut header_includes = String::new();
        header_includes.push_str("#pragma once\n");
        header_includes.push_str(&format!("#include <{}>\n", emit.platform_include));
        header_includes.push_str(&format!("#if __has_include_next(<{}>)\n", chained));
        header_includes.push_str(&format!("#include_next <{}>\n", chained));
        header_includes.push_str("#endif\n");

        let impl_includes = format!("#include \"{}\"\n", UMBRELLA_HEADER);

        Self {
            module: descriptor.name.clone(),
            output_dir: normalize_lexically(&descriptor.output_dir()),
            override_dir: normalize_lexically(&descriptor.override_dir()),
            impl_mode,
            header_includes,
            impl_includes,
            recorded: 0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn header_path(&self) -> PathBuf {
        self.output_dir.join(UMBRELLA_HEADER)
    }

    pub fn impl_path(&self) -> PathBuf {
        self.output_dir.join(self.impl_mode.umbrella_name())
    }

    /// Current umbrella header text
    pub fn header_content(&self) -> &str {
        &self.header_includes
    }

    /// Current umbrella implementation text
    pub fn impl_content(&self) -> &str {
        &self.impl_includes
    }

    /// Artifacts recorded so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Create the output directory, delete generated files from earlier
    /// passes, and write `#error` placeholders in place of the umbrellas.
    ///
    /// Returns the number of stale files removed.
    pub fn prepare(&self) -> Result<usize, AggregateError> {
        let dir_error = |source| AggregateError::OutputDir {
            path: self.output_dir.clone(),
            source,
        };

        fs::create_dir_all(&self.output_dir).map_err(dir_error)?;

        let mut removed = 0;
        for entry in fs::read_dir(&self.output_dir).map_err(dir_error)? {
            let entry = entry.map_err(dir_error)?;
            let path = entry.path();
            let generated = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(ARTIFACT_PREFIX));
            if generated && path.is_file() {
                fs::remove_file(&path).map_err(|source| AggregateError::OutputDir {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        debug!(
            "Removed {} stale file(s) from {}",
            removed,
            self.output_dir.display()
        );

        for path in [self.header_path(), self.impl_path()] {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let placeholder = format!(
                "#pragma once\n#error \"{} of module '{}' is being regenerated\"\n",
                name, self.module
            );
            fs::write(&path, placeholder)
                .map_err(|source| AggregateError::Umbrella { path, source })?;
        }

        Ok(removed)
    }

    /// Splice hand-written files under `override/` into the umbrellas.
    ///
    /// Headers go to the umbrella header and implementation fragments to the
    /// umbrella implementation, in sorted path order. Returns the number of
    /// files merged.
    pub fn merge_overrides(&mut self) -> Result<usize, AggregateError> {
        if !self.override_dir.is_dir() {
            return Ok(0);
        }

        let mut files = Vec::new();
        collect_files(&self.override_dir, &mut files)?;
        files.sort();

        let mut merged = 0;
        for file in files {
            let extension = file
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            let include = format!(
                "#include \"{}\"\n",
                relative_include(&file, &self.output_dir)
            );
            if HEADER_EXTENSIONS.contains(&extension.as_str()) {
                self.header_includes.push_str(&include);
            } else if IMPL_EXTENSIONS.contains(&extension.as_str()) {
                self.impl_includes.push_str(&include);
            } else {
                debug!("Ignoring override file {}", file.display());
                continue;
            }
            merged += 1;
        }

        if merged > 0 {
            info!("Merged {} override file(s) for module '{}'", merged, self.module);
        }
        Ok(merged)
    }

    /// Append the include line of a written artifact
    pub fn record(&mut self, artifact: &GeneratedArtifact) {
        let include = format!(
            "#include \"{}\"\n",
            relative_include(&artifact.path, &self.output_dir)
        );
        if artifact.kind.is_header() {
            self.header_includes.push_str(&include);
        } else {
            self.impl_includes.push_str(&include);
        }
        self.recorded += 1;
    }

    /// Replace the placeholders with the finished umbrellas
    pub fn finalize(self) -> Result<(), AggregateError> {
        let header = self.header_path();
        let implementation = self.impl_path();
        fs::write(&header, &self.header_includes)
            .map_err(|source| AggregateError::Umbrella { path: header, source })?;
        fs::write(&implementation, &self.impl_includes).map_err(|source| {
            AggregateError::Umbrella {
                path: implementation,
                source,
            }
        })?;

        if self.recorded == 0 {
            warn!("Module '{}' produced no artifacts", self.module);
        }
        Ok(())
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), AggregateError> {
    let read_error = |source| AggregateError::Override {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
